//! Error types for message composition.

use crate::pgp::{CryptoError, CryptoOperation};
use thiserror::Error;

/// Errors that can occur while building a message.
#[derive(Debug, Error)]
pub enum Error {
    /// A mailbox or address list could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A required field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A message that is not a draft has no recipients.
    #[error("Message has no recipients")]
    NoRecipients,

    /// MIME construction or serialization failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailforge_mime::Error),

    /// The crypto provider failed to sign.
    #[error("Signing failed: {0}")]
    Signing(#[source] CryptoError),

    /// The crypto provider failed to encrypt.
    #[error("Encryption failed: {0}")]
    Encryption(#[source] CryptoError),

    /// The provider reported success without returning a signature.
    #[error("Crypto provider returned no detached signature")]
    MissingSignature,

    /// PGP/MIME was requested but no crypto provider is configured.
    #[error("PGP/MIME requested without a crypto provider")]
    NoCryptoProvider,

    /// A request descriptor was passed to the wrong transform.
    #[error("Crypto request is for {actual:?}, expected {expected:?}")]
    RequestMismatch {
        /// Operation the transform performs.
        expected: CryptoOperation,
        /// Operation the request describes.
        actual: CryptoOperation,
    },

    /// A draft metadata header could not be decoded.
    #[error("Invalid draft metadata: {0}")]
    DraftMetadata(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if the crypto provider failed.
    ///
    /// Retrying may succeed once the provider is reachable again or the user
    /// has completed whatever interaction it asked for.
    #[must_use]
    pub const fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            Self::Signing(_) | Self::Encryption(_) | Self::MissingSignature
        )
    }

    /// Returns true if the message contents need fixing before a retry.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::MissingField(_) | Self::NoRecipients
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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

    #[test]
    fn test_classification() {
        let signing = Error::Signing(CryptoError::new(3, "no key"));
        assert!(signing.is_crypto_failure());
        assert!(!signing.is_input_error());

        assert!(Error::NoRecipients.is_input_error());
        assert!(Error::InvalidAddress("x".into()).is_input_error());
        assert!(!Error::NoCryptoProvider.is_crypto_failure());
        assert!(!Error::NoCryptoProvider.is_input_error());
    }

    #[test]
    fn test_display_carries_provider_detail() {
        let err = Error::Encryption(CryptoError::new(7, "keyring locked"));
        assert_eq!(
            err.to_string(),
            "Encryption failed: keyring locked (code 7)"
        );
    }

    #[test]
    fn test_mime_error_converts() {
        let err: Error = mailforge_mime::Error::InvalidHeader("bad".into()).into();
        assert!(matches!(err, Error::Mime(_)));
    }
}
