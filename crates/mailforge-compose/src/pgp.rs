//! PGP/MIME encapsulation (RFC 3156).
//!
//! The cryptography itself happens behind [`CryptoProvider`]. This module
//! only decides which bytes go to the provider and how its output is wrapped:
//!
//! - signing produces `multipart/signed` with the original body as first
//!   child and the detached signature as second;
//! - encryption produces `multipart/encrypted` with a `Version: 1` control
//!   part and the ciphertext.

use crate::config::SignSafeLatch;
use crate::error::{Error, Result};
use mailforge_mime::{
    BodySource, ContentType, EncryptionType, Leaf, Message, Multipart, TextEncoding,
    TransferEncoding,
};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, error, info};

/// Protocol parameter of `multipart/signed`.
pub const PGP_SIGNATURE_PROTOCOL: &str = "application/pgp-signature";

/// Protocol parameter of `multipart/encrypted`.
pub const PGP_ENCRYPTED_PROTOCOL: &str = "application/pgp-encrypted";

/// Hash algorithm announced when the provider does not name one.
pub const DEFAULT_MICALG: &str = "pgp-sha256";

/// Body of the PGP/MIME control part.
const VERSION_CONTROL: &[u8] = b"Version: 1";

/// What a crypto request asks the provider to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoOperation {
    /// Produce a detached signature over the input.
    DetachedSign,
    /// Encrypt the input into the output sink.
    Encrypt,
}

/// Opaque request handed through to the provider.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CryptoRequest {
    /// Requested operation.
    pub operation: CryptoOperation,
    /// Provider-specific parameters (key ids, recipients, ...).
    pub params: BTreeMap<String, String>,
}

impl CryptoRequest {
    /// Creates a detached-signature request.
    #[must_use]
    pub const fn detached_sign() -> Self {
        Self {
            operation: CryptoOperation::DetachedSign,
            params: BTreeMap::new(),
        }
    }

    /// Creates an encryption request.
    #[must_use]
    pub const fn encrypt() -> Self {
        Self {
            operation: CryptoOperation::Encrypt,
            params: BTreeMap::new(),
        }
    }

    /// Adds a provider parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn ensure(&self, expected: CryptoOperation) -> Result<()> {
        if self.operation == expected {
            Ok(())
        } else {
            Err(Error::RequestMismatch {
                expected,
                actual: self.operation,
            })
        }
    }
}

/// Outcome of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoStatus {
    /// The operation completed.
    Success,
    /// The provider needs the user to act (unlock a key, pick a key, ...).
    UserInteractionRequired,
    /// The operation failed.
    Error,
}

/// Structured error reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct CryptoError {
    /// Provider error code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

impl CryptoError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Reply from a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoResult {
    /// Overall status.
    pub status: CryptoStatus,
    /// Detached signature bytes (sign requests only).
    pub detached_signature: Option<Vec<u8>>,
    /// Hash algorithm used for the signature, e.g. `pgp-sha512`.
    pub micalg: Option<String>,
    /// Error detail when the status is not success.
    pub error: Option<CryptoError>,
}

impl CryptoResult {
    /// Successful reply without payload (encryption writes to the sink).
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: CryptoStatus::Success,
            detached_signature: None,
            micalg: None,
            error: None,
        }
    }

    /// Successful sign reply.
    #[must_use]
    pub const fn signed(signature: Vec<u8>, micalg: Option<String>) -> Self {
        Self {
            status: CryptoStatus::Success,
            detached_signature: Some(signature),
            micalg,
            error: None,
        }
    }

    /// Failed reply.
    #[must_use]
    pub const fn failure(error: CryptoError) -> Self {
        Self {
            status: CryptoStatus::Error,
            detached_signature: None,
            micalg: None,
            error: Some(error),
        }
    }

    /// Reply asking for user interaction.
    #[must_use]
    pub const fn interaction_required() -> Self {
        Self {
            status: CryptoStatus::UserInteractionRequired,
            detached_signature: None,
            micalg: None,
            error: None,
        }
    }

    fn into_error(self) -> CryptoError {
        self.error.unwrap_or_else(|| match self.status {
            CryptoStatus::UserInteractionRequired => {
                CryptoError::new(0, "user interaction required")
            }
            CryptoStatus::Success | CryptoStatus::Error => {
                CryptoError::new(0, "provider reported an error without detail")
            }
        })
    }
}

/// External OpenPGP capability.
///
/// `input` is the exact byte sequence to sign or encrypt. Encryption writes
/// ciphertext into `output`; signing returns the detached signature in the
/// result. Implementations must not retain `input` or `output`.
pub trait CryptoProvider {
    /// Executes a request.
    fn execute(
        &self,
        request: &CryptoRequest,
        input: &[u8],
        output: Option<&mut Vec<u8>>,
    ) -> impl Future<Output = CryptoResult> + Send;
}

/// Placeholder provider for builders that never sign or encrypt.
///
/// It has no values, so a builder typed with it can only refuse PGP/MIME
/// requests.
#[derive(Debug, Clone, Copy)]
pub enum NoCrypto {}

impl CryptoProvider for NoCrypto {
    fn execute(
        &self,
        _request: &CryptoRequest,
        _input: &[u8],
        _output: Option<&mut Vec<u8>>,
    ) -> impl Future<Output = CryptoResult> + Send {
        std::future::ready::<CryptoResult>(match *self {})
    }
}

/// PGP/MIME transforms requested for a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgpMime {
    /// Detached-sign request, if the message is to be signed.
    pub sign: Option<CryptoRequest>,
    /// Encrypt request, if the message is to be encrypted.
    pub encrypt: Option<CryptoRequest>,
}

impl PgpMime {
    /// Returns true if any transform is requested.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        self.sign.is_some() || self.encrypt.is_some()
    }

    /// Checks that each request matches the transform it is attached to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestMismatch`] on a mismatch.
    pub fn validate(&self) -> Result<()> {
        if let Some(request) = &self.sign {
            request.ensure(CryptoOperation::DetachedSign)?;
        }
        if let Some(request) = &self.encrypt {
            request.ensure(CryptoOperation::Encrypt)?;
        }
        Ok(())
    }
}

/// Applies the requested transforms: sign first, then encrypt.
///
/// # Errors
///
/// Returns [`Error::NoCryptoProvider`] if a transform is requested without a
/// provider, or any error from [`sign`] or [`encrypt`].
pub async fn encapsulate<P: CryptoProvider>(
    message: Message,
    pgp: &PgpMime,
    provider: Option<&P>,
    latch: &SignSafeLatch,
) -> Result<Message> {
    if !pgp.is_requested() {
        return Ok(message);
    }
    let provider = provider.ok_or(Error::NoCryptoProvider)?;

    let message = match &pgp.sign {
        Some(request) => sign(message, request, provider, latch).await?,
        None => message,
    };
    match &pgp.encrypt {
        Some(request) => encrypt(message, request, provider).await,
        None => Ok(message),
    }
}

/// Wraps the message body in `multipart/signed`.
///
/// Engages the sign-safe latch, re-renders the body for 7-bit transport,
/// signs its exact serialization and places those same bytes as the first
/// child.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the provider fails, [`Error::MissingSignature`]
/// if it succeeds without a signature, or a MIME error if the body cannot be
/// prepared.
pub async fn sign<P: CryptoProvider>(
    message: Message,
    request: &CryptoRequest,
    provider: &P,
    latch: &SignSafeLatch,
) -> Result<Message> {
    request.ensure(CryptoOperation::DetachedSign)?;
    latch.engage();

    let (headers, body, encryption) = message.into_parts();
    let body = body.into_seven_bit(TextEncoding::SignSafe)?;
    let signed_bytes = body.to_bytes()?;
    debug!(bytes = signed_bytes.len(), "Requesting detached signature");

    let result = provider.execute(request, &signed_bytes, None).await;
    if result.status != CryptoStatus::Success {
        let err = result.into_error();
        error!(code = err.code, message = %err.message, "Signing failed");
        return Err(Error::Signing(err));
    }

    let micalg = result
        .micalg
        .unwrap_or_else(|| DEFAULT_MICALG.to_string());
    let signature = result.detached_signature.ok_or(Error::MissingSignature)?;
    let encoding = if signature.is_ascii() {
        TransferEncoding::SevenBit
    } else {
        TransferEncoding::Base64
    };
    let signature_part = Leaf::binary(
        BodySource::Memory(signature),
        ContentType::new("application", "pgp-signature"),
        encoding,
    );

    let signed = Multipart::new("signed", vec![body, signature_part.into()])
        .with_parameter("protocol", PGP_SIGNATURE_PROTOCOL)
        .with_parameter("micalg", micalg.to_lowercase());
    info!(micalg = %micalg, "Message signed");

    Ok(Message::new(headers, signed.into()).with_encryption(encryption))
}

/// Wraps the message body in `multipart/encrypted`.
///
/// # Errors
///
/// Returns [`Error::Encryption`] if the provider fails, or a MIME error if
/// the body cannot be serialized.
pub async fn encrypt<P: CryptoProvider>(
    message: Message,
    request: &CryptoRequest,
    provider: &P,
) -> Result<Message> {
    request.ensure(CryptoOperation::Encrypt)?;

    let (headers, body, _) = message.into_parts();
    let plaintext = body.materialize()?.to_bytes()?;
    debug!(bytes = plaintext.len(), "Requesting encryption");

    let mut ciphertext = Vec::new();
    let result = provider
        .execute(request, &plaintext, Some(&mut ciphertext))
        .await;
    if result.status != CryptoStatus::Success {
        let err = result.into_error();
        error!(code = err.code, message = %err.message, "Encryption failed");
        return Err(Error::Encryption(err));
    }

    let encoding = if ciphertext.is_ascii() {
        TransferEncoding::SevenBit
    } else {
        TransferEncoding::Base64
    };
    let control = Leaf::binary(
        BodySource::Memory(VERSION_CONTROL.to_vec()),
        ContentType::new("application", "pgp-encrypted"),
        TransferEncoding::SevenBit,
    );
    let data = Leaf::binary(
        BodySource::Memory(ciphertext),
        ContentType::new("application", "octet-stream"),
        encoding,
    );

    let encrypted = Multipart::new("encrypted", vec![control.into(), data.into()])
        .with_parameter("protocol", PGP_ENCRYPTED_PROTOCOL);
    info!(plaintext_bytes = plaintext.len(), "Message encrypted");

    Ok(Message::new(headers, encrypted.into()).with_encryption(EncryptionType::PgpMime))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use mailforge_mime::{Headers, MimePart};
    use std::sync::Mutex;

    /// Records inputs and replies with a canned result.
    struct Recorder {
        reply: CryptoResult,
        ciphertext: Vec<u8>,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl Recorder {
        fn new(reply: CryptoResult) -> Self {
            Self {
                reply,
                ciphertext: b"-----BEGIN PGP MESSAGE-----\r\nabc\r\n-----END PGP MESSAGE-----"
                    .to_vec(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CryptoProvider for Recorder {
        async fn execute(
            &self,
            _request: &CryptoRequest,
            input: &[u8],
            output: Option<&mut Vec<u8>>,
        ) -> CryptoResult {
            self.seen.lock().unwrap().push(input.to_vec());
            if let Some(output) = output {
                output.extend_from_slice(&self.ciphertext);
            }
            self.reply.clone()
        }
    }

    fn message() -> Message {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        let body = Leaf::text(
            "From here\r\nbye ",
            ContentType::text_plain(),
            TextEncoding::Standard,
        );
        Message::new(headers, body.into())
    }

    #[tokio::test]
    async fn test_sign_wraps_exact_signed_bytes() {
        let provider = Recorder::new(CryptoResult::signed(b"SIG".to_vec(), None));
        let latch = SignSafeLatch::new();
        let signed = sign(message(), &CryptoRequest::detached_sign(), &provider, &latch)
            .await
            .unwrap();

        assert!(latch.is_engaged());
        let body = signed.body();
        assert_eq!(body.multipart_subtype(), Some("signed"));
        assert_eq!(
            body.content_type().parameter("protocol"),
            Some(PGP_SIGNATURE_PROTOCOL)
        );
        assert_eq!(body.content_type().parameter("micalg"), Some(DEFAULT_MICALG));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(body.children()[0].to_bytes().unwrap(), seen[0]);
        let text = String::from_utf8(seen[0].clone()).unwrap();
        assert!(text.contains("=46rom here"));
        assert!(text.contains("bye=20"));

        let signature = body.children()[1].as_leaf().unwrap();
        assert_eq!(signature.content_type().mime_type(), "application/pgp-signature");
        assert_eq!(signature.content().unwrap().as_ref(), b"SIG");
    }

    #[tokio::test]
    async fn test_sign_uses_provider_micalg() {
        let provider = Recorder::new(CryptoResult::signed(
            b"SIG".to_vec(),
            Some("PGP-SHA512".to_string()),
        ));
        let signed = sign(
            message(),
            &CryptoRequest::detached_sign(),
            &provider,
            &SignSafeLatch::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            signed.body().content_type().parameter("micalg"),
            Some("pgp-sha512")
        );
    }

    #[tokio::test]
    async fn test_sign_failure_carries_detail() {
        let provider = Recorder::new(CryptoResult::failure(CryptoError::new(2, "no key")));
        let err = sign(
            message(),
            &CryptoRequest::detached_sign(),
            &provider,
            &SignSafeLatch::new(),
        )
        .await
        .unwrap_err();
        match err {
            Error::Signing(detail) => assert_eq!(detail.message, "no key"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sign_interaction_required_is_failure() {
        let provider = Recorder::new(CryptoResult::interaction_required());
        let err = sign(
            message(),
            &CryptoRequest::detached_sign(),
            &provider,
            &SignSafeLatch::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_crypto_failure());
    }

    #[tokio::test]
    async fn test_sign_without_signature() {
        let provider = Recorder::new(CryptoResult::success());
        let err = sign(
            message(),
            &CryptoRequest::detached_sign(),
            &provider,
            &SignSafeLatch::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::MissingSignature));
    }

    #[tokio::test]
    async fn test_encrypt_structure() {
        let provider = Recorder::new(CryptoResult::success());
        let encrypted = encrypt(message(), &CryptoRequest::encrypt(), &provider)
            .await
            .unwrap();

        assert_eq!(encrypted.encryption(), EncryptionType::PgpMime);
        let body = encrypted.body();
        assert_eq!(body.multipart_subtype(), Some("encrypted"));
        assert_eq!(
            body.content_type().parameter("protocol"),
            Some(PGP_ENCRYPTED_PROTOCOL)
        );

        let children = body.children();
        assert_eq!(children.len(), 2);
        let control = children[0].as_leaf().unwrap();
        assert_eq!(control.content_type().mime_type(), "application/pgp-encrypted");
        assert_eq!(control.content().unwrap().as_ref(), b"Version: 1");
        let data = children[1].as_leaf().unwrap();
        assert_eq!(data.content_type().mime_type(), "application/octet-stream");
        assert_eq!(data.content().unwrap().as_ref(), provider.ciphertext.as_slice());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0], message().body().to_bytes().unwrap());
    }

    #[tokio::test]
    async fn test_request_mismatch() {
        let provider = Recorder::new(CryptoResult::success());
        let err = encrypt(message(), &CryptoRequest::detached_sign(), &provider)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RequestMismatch {
                expected: CryptoOperation::Encrypt,
                actual: CryptoOperation::DetachedSign,
            }
        ));
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_encapsulate_without_provider() {
        let pgp = PgpMime {
            sign: Some(CryptoRequest::detached_sign()),
            encrypt: None,
        };
        let err = encapsulate::<NoCrypto>(message(), &pgp, None, &SignSafeLatch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoCryptoProvider));
    }

    #[tokio::test]
    async fn test_encapsulate_passthrough() {
        let original = message();
        let result = encapsulate::<NoCrypto>(
            original.clone(),
            &PgpMime::default(),
            None,
            &SignSafeLatch::new(),
        )
        .await
        .unwrap();
        assert_eq!(result, original);
    }

    #[tokio::test]
    async fn test_encapsulate_sign_then_encrypt() {
        let provider = Recorder::new(CryptoResult::signed(b"SIG".to_vec(), None));
        let pgp = PgpMime {
            sign: Some(CryptoRequest::detached_sign()),
            encrypt: Some(CryptoRequest::encrypt()),
        };
        let result = encapsulate(message(), &pgp, Some(&provider), &SignSafeLatch::new())
            .await
            .unwrap();
        assert_eq!(result.body().multipart_subtype(), Some("encrypted"));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let plaintext = String::from_utf8(seen[1].clone()).unwrap();
        assert!(plaintext.starts_with("Content-Type: multipart/signed;"));
    }

    #[test]
    fn test_validate_requests() {
        let good = PgpMime {
            sign: Some(CryptoRequest::detached_sign().with_param("key", "0xABCD")),
            encrypt: Some(CryptoRequest::encrypt()),
        };
        assert!(good.validate().is_ok());

        let swapped = PgpMime {
            sign: Some(CryptoRequest::encrypt()),
            encrypt: None,
        };
        assert!(swapped.validate().is_err());
        assert!(!PgpMime::default().is_requested());
    }

    #[test]
    fn test_signed_part_is_leaf_tree() {
        let part: MimePart = Leaf::binary(
            BodySource::Memory(b"x".to_vec()),
            ContentType::new("application", "pgp-signature"),
            TransferEncoding::SevenBit,
        )
        .into();
        assert!(!part.is_multipart());
    }
}
