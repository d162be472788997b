//! Message assembly.
//!
//! [`MessageBuilder::build`] turns a [`MessageSpec`] into a [`Message`]:
//!
//! 1. validate the spec,
//! 2. build the top-level headers,
//! 3. build the MIME tree from the text bodies and attachments,
//! 4. add draft metadata for drafts,
//! 5. apply the requested PGP/MIME transforms.
//!
//! The body structure follows from the format and the attachments:
//!
//! | format | attachments | body                                              |
//! |--------|-------------|---------------------------------------------------|
//! | text   | none        | `text/plain`                                      |
//! | text   | some        | `multipart/mixed` [text, attachments...]          |
//! | html   | none        | `multipart/alternative` [html, plain]             |
//! | html   | some        | `multipart/mixed` [alternative, attachments...]   |

use crate::address::format_mailbox_list;
use crate::attachment;
use crate::config::ComposeConfig;
use crate::draft::DraftMetadata;
use crate::error::{Error, Result};
use crate::pgp::{self, CryptoProvider, NoCrypto};
use crate::spec::{MessageFormat, MessageSpec};
use crate::text::{self, TextContent};
use chrono::{Local, Utc};
use mailforge_mime::{EncryptionType, Headers, Message, MimePart, Multipart, TextEncoding};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info};

/// Random characters in the local part of a generated Message-ID.
const MESSAGE_ID_LENGTH: usize = 24;

/// Builds outgoing messages and drafts.
#[derive(Debug, Clone)]
pub struct MessageBuilder<P = NoCrypto> {
    config: ComposeConfig,
    crypto: Option<P>,
}

impl MessageBuilder<NoCrypto> {
    /// Creates a builder that cannot sign or encrypt.
    #[must_use]
    pub const fn new(config: ComposeConfig) -> Self {
        Self {
            config,
            crypto: None,
        }
    }
}

impl<P: CryptoProvider> MessageBuilder<P> {
    /// Creates a builder backed by a crypto provider.
    #[must_use]
    pub const fn with_crypto(config: ComposeConfig, provider: P) -> Self {
        Self {
            config,
            crypto: Some(provider),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Builds the message described by `spec`.
    ///
    /// # Errors
    ///
    /// - input errors ([`Error::MissingField`], [`Error::InvalidAddress`],
    ///   [`Error::NoRecipients`]) before anything is built;
    /// - [`Error::NoCryptoProvider`] or [`Error::RequestMismatch`] if the
    ///   PGP/MIME request cannot be honored;
    /// - [`Error::Mime`] if an attachment cannot be read or encoded;
    /// - [`Error::Signing`], [`Error::Encryption`] or
    ///   [`Error::MissingSignature`] if the provider fails.
    pub async fn build(&self, spec: &MessageSpec) -> Result<Message> {
        self.validate(spec)?;

        // Read once; signing may engage the latch for later builds.
        let encoding = self.config.sign_safe.text_encoding();
        info!(
            format = ?spec.format,
            draft = spec.is_draft,
            attachments = spec.attachments.len(),
            sign = spec.pgp.sign.is_some(),
            encrypt = spec.pgp.encrypt.is_some(),
            "Building message"
        );

        let mut headers = self.build_headers(spec)?;
        let (body, primary, plain) = build_body(spec, encoding)?;

        if spec.is_draft {
            let metadata = DraftMetadata::new(spec, &primary, plain.as_ref());
            headers.add(self.config.draft_header.as_str(), metadata.to_header_value()?);
        }

        let encryption = if spec.inline_encrypted.is_some() {
            EncryptionType::Inline
        } else {
            EncryptionType::None
        };
        let message = Message::new(headers, body).with_encryption(encryption);

        pgp::encapsulate(
            message,
            &spec.pgp,
            self.crypto.as_ref(),
            &self.config.sign_safe,
        )
        .await
    }

    fn validate(&self, spec: &MessageSpec) -> Result<()> {
        spec.identity.mailbox()?;
        spec.identity.reply_to_mailboxes()?;
        if !spec.is_draft && !spec.has_recipients() {
            return Err(Error::NoRecipients);
        }
        spec.pgp.validate()?;
        if spec.pgp.is_requested() && self.crypto.is_none() {
            return Err(Error::NoCryptoProvider);
        }
        Ok(())
    }

    fn build_headers(&self, spec: &MessageSpec) -> Result<Headers> {
        let from = spec.identity.mailbox()?;
        let from_value = from.to_header_value()?;
        let mut headers = Headers::new();

        let date = if self.config.hide_time_zone {
            Utc::now().to_rfc2822()
        } else {
            Local::now().to_rfc2822()
        };
        headers.add("Date", date);
        headers.add("From", from_value.as_str());

        for (name, recipients) in [("To", &spec.to), ("Cc", &spec.cc), ("Bcc", &spec.bcc)] {
            if !recipients.is_empty() {
                headers.add(name, format_mailbox_list(recipients)?);
            }
        }

        headers.add("Subject", Headers::encode_value(&spec.subject)?);

        if spec.request_read_receipt {
            headers.add("Disposition-Notification-To", from_value.as_str());
            headers.add("X-Confirm-Reading-To", from_value.as_str());
            headers.add("Return-Receipt-To", from_value.as_str());
        }

        if !self.config.hide_user_agent {
            headers.add("User-Agent", single_line("User-Agent", &self.config.user_agent)?);
        }

        let reply_to = spec.identity.reply_to_mailboxes()?;
        if !reply_to.is_empty() {
            headers.add("Reply-To", format_mailbox_list(&reply_to)?);
        }

        if let Some(in_reply_to) = spec.in_reply_to.as_deref().filter(|v| !v.is_empty()) {
            headers.add("In-Reply-To", single_line("In-Reply-To", in_reply_to)?);
        }
        if let Some(references) = spec.references.as_deref().filter(|v| !v.is_empty()) {
            headers.add("References", single_line("References", references)?);
        }

        headers.add("Message-ID", generate_message_id(from.address.domain()));
        headers.add("MIME-Version", "1.0");
        Ok(headers)
    }
}

/// Builds the body tree.
///
/// Returns the tree plus the primary text body and, for HTML, the plain
/// alternative, so draft metadata can record where the user's text sits.
fn build_body(
    spec: &MessageSpec,
    encoding: TextEncoding,
) -> Result<(MimePart, TextContent, Option<TextContent>)> {
    let (content, primary, plain) = if let Some(payload) = &spec.inline_encrypted {
        let body = TextContent {
            text: payload.clone(),
            format: MessageFormat::Text,
            encoding,
            composed_length: payload.len(),
            composed_offset: 0,
            footer_offset: None,
        };
        (MimePart::from(body.to_leaf()), body, None)
    } else {
        match spec.format {
            MessageFormat::Text => {
                let body = text::compose(spec, MessageFormat::Text, encoding);
                (MimePart::from(body.to_leaf()), body, None)
            }
            MessageFormat::Html => {
                let html = text::compose(spec, MessageFormat::Html, encoding);
                let plain = text::compose(spec, MessageFormat::Text, encoding);
                let alternative =
                    Multipart::new("alternative", vec![html.to_leaf().into(), plain.to_leaf().into()]);
                (MimePart::from(alternative), html, Some(plain))
            }
        }
    };

    let attachments = attachment::embed(&spec.attachments)?;
    let structure = if attachments.is_empty() {
        content
    } else {
        let mut children = Vec::with_capacity(attachments.len() + 1);
        children.push(content);
        children.extend(attachments);
        Multipart::new("mixed", children).into()
    };
    debug!(content_type = %structure.content_type().mime_type(), "Body structure chosen");

    // File-backed attachments are read now so a missing file fails the build.
    let structure = structure.materialize()?;

    Ok((structure, primary, plain))
}

/// Rejects raw header values that would start a new header line.
fn single_line<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        return Err(mailforge_mime::Error::InvalidHeader(format!(
            "{name} value contains a line break"
        ))
        .into());
    }
    Ok(value)
}

/// Generates `<random@domain>`.
fn generate_message_id(domain: &str) -> String {
    let local: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MESSAGE_ID_LENGTH)
        .map(char::from)
        .collect();
    format!("<{local}@{domain}>")
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
    use crate::address::Mailbox;
    use crate::identity::Identity;
    use crate::pgp::CryptoRequest;
    use crate::spec::{AttachmentDescriptor, DraftState, MessageSpecBuilder};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn builder() -> MessageBuilder {
        MessageBuilder::new(ComposeConfig::default())
    }

    fn spec() -> MessageSpecBuilder {
        MessageSpec::builder(Identity::new("Alice", "alice@example.com"))
            .to(Mailbox::new("bob@example.com").unwrap())
            .subject("Hello")
            .text("Hi Bob")
    }

    fn header_names(message: &Message) -> Vec<String> {
        message.headers.iter().map(|(n, _)| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_header_order() {
        let spec = spec()
            .cc(Mailbox::new("carol@example.com").unwrap())
            .in_reply_to("<orig@example.com>")
            .references("<orig@example.com>")
            .request_read_receipt(true)
            .build();
        let message = builder().build(&spec).await.unwrap();
        assert_eq!(
            header_names(&message),
            vec![
                "Date",
                "From",
                "To",
                "Cc",
                "Subject",
                "Disposition-Notification-To",
                "X-Confirm-Reading-To",
                "Return-Receipt-To",
                "User-Agent",
                "In-Reply-To",
                "References",
                "Message-ID",
                "MIME-Version",
            ]
        );

        let from = message.headers.get("From").unwrap();
        assert_eq!(from, "Alice <alice@example.com>");
        for name in ["Disposition-Notification-To", "X-Confirm-Reading-To", "Return-Receipt-To"] {
            assert_eq!(message.headers.get(name), Some(from), "{name}");
        }
    }

    #[tokio::test]
    async fn test_message_id_uses_sender_domain() {
        let message = builder().build(&spec().build()).await.unwrap();
        let id = message.message_id().unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert_eq!(id.len(), 1 + MESSAGE_ID_LENGTH + "@example.com>".len());
    }

    #[tokio::test]
    async fn test_hidden_time_zone_and_user_agent() {
        let config = ComposeConfig::default()
            .hide_time_zone(true)
            .hide_user_agent(true);
        let message = MessageBuilder::new(config)
            .build(&spec().build())
            .await
            .unwrap();
        assert!(message.date().unwrap().ends_with("+0000"));
        assert!(!message.headers.contains("User-Agent"));
    }

    #[tokio::test]
    async fn test_reply_to_from_identity() {
        let identity =
            Identity::new("Alice", "alice@example.com").with_reply_to("Team <team@example.com>");
        let spec = MessageSpec::builder(identity)
            .to(Mailbox::new("bob@example.com").unwrap())
            .build();
        let message = builder().build(&spec).await.unwrap();
        assert_eq!(
            message.headers.get("Reply-To"),
            Some("Team <team@example.com>")
        );
    }

    #[tokio::test]
    async fn test_line_breaks_in_raw_headers_rejected() {
        let injected = spec()
            .in_reply_to("<orig@example.com>\r\nBcc: eve@example.com")
            .build();
        let err = builder().build(&injected).await.unwrap_err();
        assert!(matches!(err, Error::Mime(mailforge_mime::Error::InvalidHeader(_))));

        let injected = spec().references("<a@example.com>\n<b@example.com>").build();
        assert!(builder().build(&injected).await.is_err());

        let config = ComposeConfig::default().user_agent("mailforge\r\nX-Injected: 1");
        let err = MessageBuilder::new(config)
            .build(&spec().build())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mime(mailforge_mime::Error::InvalidHeader(_))));

        let hidden = ComposeConfig::default()
            .user_agent("mailforge\r\nX-Injected: 1")
            .hide_user_agent(true);
        assert!(MessageBuilder::new(hidden).build(&spec().build()).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_ascii_subject_is_encoded() {
        let message = builder()
            .build(&spec().subject("Grüße").build())
            .await
            .unwrap();
        let subject = message.subject().unwrap();
        let payload = subject
            .strip_prefix("=?utf-8?B?")
            .and_then(|w| w.strip_suffix("?="))
            .unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), "Grüße".as_bytes());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let no_recipients = MessageSpec::builder(Identity::new("Alice", "alice@example.com")).build();
        assert!(matches!(
            builder().build(&no_recipients).await,
            Err(Error::NoRecipients)
        ));

        let no_email = MessageSpec::builder(Identity::new("Alice", ""))
            .to(Mailbox::new("bob@example.com").unwrap())
            .build();
        assert!(matches!(
            builder().build(&no_email).await,
            Err(Error::MissingField(_))
        ));

        let bad_reply_to = MessageSpec::builder(
            Identity::new("Alice", "alice@example.com").with_reply_to("not an address"),
        )
        .to(Mailbox::new("bob@example.com").unwrap())
        .build();
        assert!(matches!(
            builder().build(&bad_reply_to).await,
            Err(Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_draft_without_recipients() {
        let spec = MessageSpec::builder(Identity::new("Alice", "alice@example.com"))
            .text("later")
            .draft(DraftState::default())
            .build();
        let message = builder().build(&spec).await.unwrap();
        let value = message.headers.get("X-Mailforge-Identity").unwrap();
        let metadata = DraftMetadata::from_header_value(value).unwrap();
        assert_eq!(metadata.identity_email, "alice@example.com");
        assert_eq!(header_names(&message).last().unwrap(), "X-Mailforge-Identity");
    }

    #[tokio::test]
    async fn test_no_provider_fails_before_building() {
        let spec = spec().sign(CryptoRequest::detached_sign()).build();
        assert!(matches!(
            builder().build(&spec).await,
            Err(Error::NoCryptoProvider)
        ));
    }

    #[tokio::test]
    async fn test_mismatched_request_rejected() {
        let spec = spec().encrypt(CryptoRequest::detached_sign()).build();
        assert!(matches!(
            builder().build(&spec).await,
            Err(Error::RequestMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_inline_payload() {
        let payload = "-----BEGIN PGP MESSAGE-----\r\n\r\nhQEMA\r\n-----END PGP MESSAGE-----";
        let spec = spec()
            .format(MessageFormat::Html)
            .inline_encrypted(payload)
            .build();
        let message = builder().build(&spec).await.unwrap();
        assert_eq!(message.encryption(), EncryptionType::Inline);
        let leaf = message.body().as_leaf().unwrap();
        assert_eq!(leaf.content_type().mime_type(), "text/plain");
        assert_eq!(leaf.text_content(), Some(payload));
    }

    #[tokio::test]
    async fn test_incomplete_attachments_do_not_force_mixed() {
        let spec = spec()
            .attachment(
                AttachmentDescriptor::from_bytes("a.bin", "application/octet-stream", vec![1])
                    .with_state(crate::spec::LoadingState::Metadata),
            )
            .build();
        let message = builder().build(&spec).await.unwrap();
        assert!(!message.is_multipart());
    }
}
