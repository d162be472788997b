//! Integration tests for message assembly.
//!
//! These tests use a fake crypto provider that records every request and
//! answers with canned signatures or ciphertext.

#![allow(clippy::unwrap_used, clippy::similar_names)]

use std::sync::{Arc, Mutex};

use mailforge_compose::mailforge_mime::{
    EncryptionType, Error as MimeError, Message, MimePart, TransferEncoding,
};
use mailforge_compose::{
    AttachmentDescriptor, ComposeConfig, CryptoError, CryptoOperation, CryptoProvider,
    CryptoRequest, CryptoResult, DraftMetadata, DraftState, Error, Identity, LoadingState,
    Mailbox, MessageBuilder, MessageFormat, MessageSpec, MessageSpecBuilder, QuoteStyle,
    QuotedHtml, QuotedTextMode, QuotingPolicy,
};
use proptest::prelude::*;

type Calls = Arc<Mutex<Vec<(CryptoOperation, Vec<u8>)>>>;

/// Fake provider: signs with fixed bytes, "encrypts" into an armored stub.
struct FakeProvider {
    signature: Vec<u8>,
    failure: Option<CryptoError>,
    calls: Calls,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            signature: b"SIG".to_vec(),
            failure: None,
            calls: Arc::default(),
        }
    }

    fn failing(error: CryptoError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }
}

impl CryptoProvider for FakeProvider {
    async fn execute(
        &self,
        request: &CryptoRequest,
        input: &[u8],
        output: Option<&mut Vec<u8>>,
    ) -> CryptoResult {
        self.calls
            .lock()
            .unwrap()
            .push((request.operation, input.to_vec()));

        if let Some(error) = &self.failure {
            return CryptoResult::failure(error.clone());
        }
        match request.operation {
            CryptoOperation::DetachedSign => CryptoResult::signed(self.signature.clone(), None),
            CryptoOperation::Encrypt => {
                if let Some(output) = output {
                    output.extend_from_slice(b"-----BEGIN PGP MESSAGE-----\r\n");
                    output.extend_from_slice(format!("{} bytes\r\n", input.len()).as_bytes());
                    output.extend_from_slice(b"-----END PGP MESSAGE-----\r\n");
                }
                CryptoResult::success()
            }
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn identity() -> Identity {
    Identity::new("Alice Example", "alice@example.com").with_signature("-- \r\nAlice")
}

fn base_spec() -> MessageSpecBuilder {
    MessageSpec::builder(identity())
        .to(Mailbox::parse("Bob <bob@example.org>").unwrap())
        .subject("Quarterly report")
        .text("Hi Bob,\nthe report is attached.")
}

fn pdf() -> AttachmentDescriptor {
    AttachmentDescriptor::from_bytes("report.pdf", "application/pdf", b"%PDF-1.4 \x00\xff".to_vec())
}

/// Renders the tree shape, e.g. `mixed[alternative[text/html,text/plain],application/pdf]`.
fn skeleton(part: &MimePart) -> String {
    part.as_multipart().map_or_else(
        || part.content_type().mime_type(),
        |multipart| {
            let children: Vec<String> = multipart.children().iter().map(skeleton).collect();
            format!("{}[{}]", multipart.sub_type(), children.join(","))
        },
    )
}

fn text_of(part: &MimePart) -> String {
    part.as_leaf().unwrap().text_content().unwrap().to_string()
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn stable_headers(message: &Message) -> Vec<(String, String)> {
    message
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("date") && !name.eq_ignore_ascii_case("message-id"))
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_plain_message_is_single_leaf() {
    init_tracing();
    let spec = base_spec().build();
    let message = MessageBuilder::new(ComposeConfig::default())
        .build(&spec)
        .await
        .unwrap();

    assert_eq!(skeleton(message.body()), "text/plain");
    assert_eq!(
        text_of(message.body()),
        "Hi Bob,\r\nthe report is attached.\r\n-- \r\nAlice"
    );
    assert_eq!(message.encryption(), EncryptionType::None);

    let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
    assert!(bytes.contains("\r\nTo: Bob <bob@example.org>\r\n"));
    assert!(bytes.contains("\r\nMIME-Version: 1.0\r\n"));
    assert!(bytes.contains("Content-Transfer-Encoding: 7bit\r\n\r\nHi Bob,"));
}

#[tokio::test]
async fn test_html_message_is_alternative_html_first() {
    init_tracing();
    let spec = base_spec().format(MessageFormat::Html).build();
    let message = MessageBuilder::new(ComposeConfig::default())
        .build(&spec)
        .await
        .unwrap();

    assert_eq!(skeleton(message.body()), "alternative[text/html,text/plain]");
    let children = message.body().children();
    assert!(text_of(&children[0]).contains("<br>"));
    let plain = text_of(&children[1]);
    assert!(!plain.contains('<'));
    assert!(plain.starts_with("Hi Bob,\r\n"));
}

#[tokio::test]
async fn test_attachments_follow_content_and_incomplete_are_skipped() {
    init_tracing();
    let spec = base_spec()
        .format(MessageFormat::Html)
        .attachment(pdf())
        .attachment(
            AttachmentDescriptor::from_bytes("pending.zip", "application/zip", vec![0; 4])
                .with_state(LoadingState::Metadata),
        )
        .attachment(AttachmentDescriptor::from_bytes(
            "notes.txt",
            "text/plain",
            b"notes".to_vec(),
        ))
        .build();
    let message = MessageBuilder::new(ComposeConfig::default())
        .build(&spec)
        .await
        .unwrap();

    assert_eq!(
        skeleton(message.body()),
        "mixed[alternative[text/html,text/plain],application/pdf,text/plain]"
    );
    let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
    assert!(!bytes.contains("pending.zip"));
    assert!(bytes.contains("Content-Disposition: attachment; filename=report.pdf; size=11"));
}

#[tokio::test]
async fn test_building_twice_gives_same_structure() {
    init_tracing();
    let spec = base_spec()
        .format(MessageFormat::Html)
        .attachment(pdf())
        .build();
    let builder = MessageBuilder::new(ComposeConfig::default());
    let first = builder.build(&spec).await.unwrap();
    let second = builder.build(&spec).await.unwrap();

    assert_eq!(skeleton(first.body()), skeleton(second.body()));
    assert_eq!(stable_headers(&first), stable_headers(&second));
    assert_ne!(first.message_id(), second.message_id());
}

#[tokio::test]
async fn test_signed_bytes_match_first_child() {
    init_tracing();
    let provider = FakeProvider::new();
    let calls = provider.calls.clone();
    let spec = base_spec()
        .text("From the desk of Alice \nsee attached")
        .attachment(pdf())
        .attachment(AttachmentDescriptor::from_bytes(
            "fwd.eml",
            "message/rfc822",
            "Subject: fwd\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nnaïve café".as_bytes().to_vec(),
        ))
        .sign(CryptoRequest::detached_sign().with_param("key_id", "0xA11CE"))
        .build();
    let message = MessageBuilder::with_crypto(ComposeConfig::default(), provider)
        .build(&spec)
        .await
        .unwrap();

    let body = message.body();
    assert_eq!(
        skeleton(body),
        "signed[mixed[text/plain,application/pdf,message/rfc822],application/pgp-signature]"
    );
    assert_eq!(
        body.content_type().parameter("protocol"),
        Some("application/pgp-signature")
    );
    assert_eq!(body.content_type().parameter("micalg"), Some("pgp-sha256"));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let signed_input = &calls[0].1;
    assert_eq!(&body.children()[0].to_bytes().unwrap(), signed_input);
    assert!(contains_bytes(&message.to_bytes().unwrap(), signed_input));
    assert!(signed_input.is_ascii());

    let signed_text = String::from_utf8(signed_input.clone()).unwrap();
    assert!(signed_text.contains("=46rom the desk of Alice=20\r\n"));

    let signature = body.children()[1].as_leaf().unwrap();
    assert_eq!(signature.content().unwrap().as_ref(), b"SIG");

    let embedded = body.children()[0].children()[2].as_leaf().unwrap();
    assert_eq!(embedded.encoding(), TransferEncoding::SevenBit);
}

#[tokio::test]
async fn test_signing_failure_produces_no_message() {
    init_tracing();
    let provider = FakeProvider::failing(CryptoError::new(11, "secret key not available"));
    let spec = base_spec().sign(CryptoRequest::detached_sign()).build();
    let err = MessageBuilder::with_crypto(ComposeConfig::default(), provider)
        .build(&spec)
        .await
        .unwrap_err();

    assert!(err.is_crypto_failure());
    match err {
        Error::Signing(detail) => {
            assert_eq!(detail.code, 11);
            assert_eq!(detail.message, "secret key not available");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_sign_safe_latch_outlives_the_signed_build() {
    init_tracing();
    let config = ComposeConfig::default();
    let signing = MessageBuilder::with_crypto(config.clone(), FakeProvider::new());
    let plain = MessageBuilder::new(config.clone());

    let before = plain.build(&base_spec().build()).await.unwrap();
    assert_eq!(
        before.body().as_leaf().unwrap().encoding(),
        TransferEncoding::SevenBit
    );

    signing
        .build(&base_spec().sign(CryptoRequest::detached_sign()).build())
        .await
        .unwrap();
    assert!(config.sign_safe.is_engaged());

    let after = plain.build(&base_spec().build()).await.unwrap();
    assert_eq!(
        after.body().as_leaf().unwrap().encoding(),
        TransferEncoding::QuotedPrintable
    );

    let independent = MessageBuilder::new(ComposeConfig::default())
        .build(&base_spec().build())
        .await
        .unwrap();
    assert_eq!(
        independent.body().as_leaf().unwrap().encoding(),
        TransferEncoding::SevenBit
    );
}

#[tokio::test]
async fn test_sign_then_encrypt() {
    init_tracing();
    let provider = FakeProvider::new();
    let calls = provider.calls.clone();
    let spec = base_spec()
        .sign(CryptoRequest::detached_sign())
        .encrypt(CryptoRequest::encrypt().with_param("recipient", "bob@example.org"))
        .build();
    let message = MessageBuilder::with_crypto(ComposeConfig::default(), provider)
        .build(&spec)
        .await
        .unwrap();

    assert_eq!(message.encryption(), EncryptionType::PgpMime);
    assert_eq!(
        skeleton(message.body()),
        "encrypted[application/pgp-encrypted,application/octet-stream]"
    );
    assert_eq!(
        message.body().content_type().parameter("protocol"),
        Some("application/pgp-encrypted")
    );

    let calls = calls.lock().unwrap();
    let operations: Vec<_> = calls.iter().map(|(op, _)| *op).collect();
    assert_eq!(
        operations,
        vec![CryptoOperation::DetachedSign, CryptoOperation::Encrypt]
    );
    let plaintext = String::from_utf8(calls[1].1.clone()).unwrap();
    assert!(plaintext.starts_with("Content-Type: multipart/signed;"));

    let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
    assert!(bytes.contains("Version: 1"));
    assert!(bytes.contains("-----BEGIN PGP MESSAGE-----"));
}

#[tokio::test]
async fn test_encryption_failure() {
    init_tracing();
    let provider = FakeProvider::failing(CryptoError::new(1, "no public key for bob@example.org"));
    let spec = base_spec().encrypt(CryptoRequest::encrypt()).build();
    let err = MessageBuilder::with_crypto(ComposeConfig::default(), provider)
        .build(&spec)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encryption(_)));
}

#[tokio::test]
async fn test_hidden_quote_only_in_drafts() {
    init_tracing();
    let hidden = QuotingPolicy {
        mode: QuotedTextMode::Hide,
        style: QuoteStyle::Prefix,
        reply_after_quote: false,
        signature_before_quoted_text: false,
    };
    let reply = || {
        base_spec()
            .text("Sounds good")
            .quoted_text("> Shall we meet?")
            .quoting(hidden)
    };
    let builder = MessageBuilder::new(ComposeConfig::default());

    let sent = builder.build(&reply().build()).await.unwrap();
    assert!(!text_of(sent.body()).contains("Shall we meet"));

    let draft = builder
        .build(&reply().draft(DraftState::default()).build())
        .await
        .unwrap();
    let draft_text = text_of(draft.body());
    assert!(draft_text.contains("> Shall we meet?"));
    assert!(!draft_text.contains("Alice"));
}

#[tokio::test]
async fn test_html_draft_with_attachment_and_hidden_quote() {
    init_tracing();
    let spec = base_spec()
        .format(MessageFormat::Html)
        .text("Draft reply")
        .quoted_text("> original text")
        .quoted_html(QuotedHtml::new("<blockquote>original html</blockquote>"))
        .quoting(QuotingPolicy {
            mode: QuotedTextMode::Hide,
            signature_before_quoted_text: true,
            ..QuotingPolicy::default()
        })
        .attachment(pdf())
        .draft(DraftState {
            cursor_position: 3,
            identity_changed: false,
            signature_changed: false,
        })
        .build();
    let config = ComposeConfig::default();
    let message = MessageBuilder::new(config.clone())
        .build(&spec)
        .await
        .unwrap();

    assert_eq!(
        skeleton(message.body()),
        "mixed[alternative[text/html,text/plain],application/pdf]"
    );
    let alternative = &message.body().children()[0];
    let html = text_of(&alternative.children()[0]);
    let plain = text_of(&alternative.children()[1]);
    assert!(html.contains("<blockquote>original html</blockquote>"));
    assert!(plain.contains("> original text"));

    let header = message.headers.get(&config.draft_header).unwrap();
    let metadata = DraftMetadata::from_header_value(header).unwrap();
    assert_eq!(metadata.cursor_position, 3);
    assert_eq!(metadata.message_format, MessageFormat::Html);
    assert_eq!(metadata.quoted_text_mode, QuotedTextMode::Hide);
    assert!(!metadata.reply_after_quote);
    assert!(metadata.signature_before_quoted_text);
    assert_eq!(
        &html[metadata.body_offset..metadata.body_offset + metadata.body_length],
        "Draft reply"
    );
    assert!(metadata.plain_length.is_some());
}

#[tokio::test]
async fn test_missing_attachment_file_aborts_build() {
    init_tracing();
    let spec = base_spec()
        .attachment(AttachmentDescriptor::from_file(
            "gone.bin",
            "application/octet-stream",
            "/nonexistent/mailforge/gone.bin",
            42,
        ))
        .sign(CryptoRequest::detached_sign())
        .build();
    let provider = FakeProvider::new();
    let calls = provider.calls.clone();
    let err = MessageBuilder::with_crypto(ComposeConfig::default(), provider)
        .build(&spec)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Mime(_)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_attachment_file_aborts_unsigned_build() {
    init_tracing();
    let spec = base_spec()
        .attachment(AttachmentDescriptor::from_file(
            "gone.bin",
            "application/octet-stream",
            "/nonexistent/mailforge/gone.bin",
            42,
        ))
        .build();
    let err = MessageBuilder::new(ComposeConfig::default())
        .build(&spec)
        .await
        .unwrap_err();

    match err {
        Error::Mime(MimeError::BodyAccess { path, source }) => {
            assert_eq!(path, "/nonexistent/mailforge/gone.bin");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_file_attachment_content() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("mailforge-attachment-{}.bin", std::process::id()));
    std::fs::write(&path, b"file-backed content").unwrap();

    let spec = base_spec()
        .attachment(AttachmentDescriptor::from_file(
            "data.bin",
            "application/octet-stream",
            &path,
            19,
        ))
        .build();
    let message = MessageBuilder::new(ComposeConfig::default())
        .build(&spec)
        .await
        .unwrap();
    let bytes = String::from_utf8(message.to_bytes().unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(bytes.contains("ZmlsZS1iYWNrZWQgY29udGVudA=="));
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn prop_structure_follows_format_and_attachments(
        html in any::<bool>(),
        complete in 0usize..3,
        pending in 0usize..3,
        text in "[a-zA-Z0-9 .,\n]{0,120}",
    ) {
        let mut spec = base_spec()
            .text(text)
            .format(if html { MessageFormat::Html } else { MessageFormat::Text });
        for i in 0..complete {
            spec = spec.attachment(AttachmentDescriptor::from_bytes(
                format!("file{i}.bin"),
                "application/octet-stream",
                vec![0, 1, 2],
            ));
        }
        for i in 0..pending {
            spec = spec.attachment(
                AttachmentDescriptor::from_bytes(format!("pending{i}.bin"), "application/octet-stream", vec![])
                    .with_state(LoadingState::Cancelled),
            );
        }
        let message = block_on(MessageBuilder::new(ComposeConfig::default()).build(&spec.build())).unwrap();

        let content = if html { "alternative[text/html,text/plain]" } else { "text/plain" };
        let expected = if complete == 0 {
            content.to_string()
        } else {
            let attachments = vec!["application/octet-stream"; complete].join(",");
            format!("mixed[{content},{attachments}]")
        };
        prop_assert_eq!(skeleton(message.body()), expected);
    }

    #[test]
    fn prop_signed_region_is_byte_identical(text in "[ -~\n]{0,300}") {
        let provider = FakeProvider::new();
        let calls = provider.calls.clone();
        let spec = base_spec().text(text).sign(CryptoRequest::detached_sign()).build();
        let message = block_on(
            MessageBuilder::with_crypto(ComposeConfig::default(), provider).build(&spec),
        )
        .unwrap();

        let calls = calls.lock().unwrap();
        let first_child = message.body().children()[0].to_bytes().unwrap();
        prop_assert_eq!(&first_child, &calls[0].1);
    }
}
