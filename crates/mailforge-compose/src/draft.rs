//! Draft metadata header.
//!
//! Drafts carry the editor state needed to reopen them: which identity and
//! signature were used, where the cursor was, how quoting and signature
//! placement were set up and
//! where the user's own text sits inside the body. The state is stored as
//! JSON, base64 encoded (URL-safe alphabet, no padding) into a single header:
//!
//! ```text
//! X-Mailforge-Identity: v1; eyJ2ZXJzaW9uIjoxLCJpZGVudGl0eV9lbWFpbCI6...
//! ```

use crate::error::{Error, Result};
use crate::spec::{MessageFormat, MessageReference, MessageSpec, QuoteStyle, QuotedTextMode};
use crate::text::TextContent;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Current metadata format version.
pub const DRAFT_METADATA_VERSION: u32 = 1;

/// Payload characters per space-separated chunk, so the header can fold.
const CHUNK_LENGTH: usize = 60;

/// Editor state stored with a draft.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DraftMetadata {
    /// Format version.
    pub version: u32,
    /// Email of the identity used.
    pub identity_email: String,
    /// Display name of the identity used.
    pub identity_name: String,
    /// The identity differs from the account default.
    pub identity_changed: bool,
    /// Edited signature text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// The signature was edited.
    pub signature_changed: bool,
    /// Cursor position in the composed text.
    pub cursor_position: usize,
    /// Body format.
    pub message_format: MessageFormat,
    /// Quote style.
    pub quote_style: QuoteStyle,
    /// Quoted text mode.
    pub quoted_text_mode: QuotedTextMode,
    /// The reply was placed below the quote.
    pub reply_after_quote: bool,
    /// The signature was placed right after the reply.
    pub signature_before_quoted_text: bool,
    /// Message replied to or forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
    /// Length of the user's text in the primary body.
    pub body_length: usize,
    /// Offset of the user's text in the primary body.
    pub body_offset: usize,
    /// Quoted HTML footer offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_offset: Option<usize>,
    /// Length of the user's text in the plain alternative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_length: Option<usize>,
    /// Offset of the user's text in the plain alternative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_offset: Option<usize>,
}

impl DraftMetadata {
    /// Collects the metadata for a draft.
    ///
    /// `body` is the primary body; `plain` the plain-text alternative of an
    /// HTML draft.
    #[must_use]
    pub fn new(spec: &MessageSpec, body: &TextContent, plain: Option<&TextContent>) -> Self {
        let state = spec.draft_state;
        let signature = state
            .signature_changed
            .then(|| {
                spec.signature
                    .clone()
                    .or_else(|| spec.identity.signature.clone())
            })
            .flatten();

        Self {
            version: DRAFT_METADATA_VERSION,
            identity_email: spec.identity.email.clone(),
            identity_name: spec.identity.name.clone(),
            identity_changed: state.identity_changed,
            signature,
            signature_changed: state.signature_changed,
            cursor_position: state.cursor_position,
            message_format: spec.format,
            quote_style: spec.quoting.style,
            quoted_text_mode: spec.quoting.mode,
            reply_after_quote: spec.quoting.reply_after_quote,
            signature_before_quoted_text: spec.quoting.signature_before_quoted_text,
            message_reference: spec.message_reference.clone(),
            body_length: body.composed_length,
            body_offset: body.composed_offset,
            footer_offset: body.footer_offset,
            plain_length: plain.map(|p| p.composed_length),
            plain_offset: plain.map(|p| p.composed_offset),
        }
    }

    /// Encodes the metadata as a header value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_header_value(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut value = format!("v{};", self.version);
        for chunk in payload.as_bytes().chunks(CHUNK_LENGTH) {
            value.push(' ');
            // base64 output is ASCII, so every chunk is valid UTF-8.
            value.push_str(&String::from_utf8_lossy(chunk));
        }
        Ok(value)
    }

    /// Decodes a header value produced by [`DraftMetadata::to_header_value`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DraftMetadata`] if the version is unknown or the
    /// payload is malformed.
    pub fn from_header_value(value: &str) -> Result<Self> {
        let (version, payload) = value
            .trim()
            .split_once(';')
            .ok_or_else(|| Error::DraftMetadata("missing version prefix".to_string()))?;

        let version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| Error::DraftMetadata(format!("bad version: {version}")))?;
        if version != DRAFT_METADATA_VERSION {
            return Err(Error::DraftMetadata(format!(
                "unsupported version: {version}"
            )));
        }

        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::DraftMetadata(e.to_string()))?;
        let metadata: Self = serde_json::from_slice(&json)?;
        if metadata.version != version {
            return Err(Error::DraftMetadata(format!(
                "version mismatch: header v{version}, payload v{}",
                metadata.version
            )));
        }
        Ok(metadata)
    }
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
    use crate::identity::Identity;
    use crate::spec::{DraftState, QuotingPolicy};
    use crate::text::compose;
    use mailforge_mime::{TextEncoding, fold};

    fn spec(signature_changed: bool) -> MessageSpec {
        MessageSpec::builder(
            Identity::new("Alice Example", "alice@example.com").with_signature("-- \r\nAlice"),
        )
        .text("Draft text")
        .quoted_text("> earlier")
        .quoting(QuotingPolicy {
            mode: QuotedTextMode::Hide,
            reply_after_quote: true,
            signature_before_quoted_text: true,
            ..QuotingPolicy::default()
        })
        .message_reference(MessageReference {
            account_uuid: "0b7c9a".to_string(),
            folder: "INBOX".to_string(),
            uid: "1234".to_string(),
            flag: Some("ANSWERED".to_string()),
        })
        .draft(DraftState {
            cursor_position: 5,
            identity_changed: true,
            signature_changed,
        })
        .build()
    }

    #[test]
    fn test_header_value_roundtrip() {
        let spec = spec(true);
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        let metadata = DraftMetadata::new(&spec, &body, None);

        assert_eq!(metadata.signature.as_deref(), Some("-- \r\nAlice"));
        assert_eq!(metadata.cursor_position, 5);
        assert_eq!(metadata.quoted_text_mode, QuotedTextMode::Hide);
        assert!(metadata.reply_after_quote);
        assert!(metadata.signature_before_quoted_text);
        assert_eq!(metadata.body_length, "Draft text".len());

        let value = metadata.to_header_value().unwrap();
        assert!(value.starts_with("v1; "));
        let parsed = DraftMetadata::from_header_value(&value).unwrap();
        assert_eq!(parsed, metadata);
        assert!(parsed.reply_after_quote && parsed.signature_before_quoted_text);
    }

    #[test]
    fn test_unchanged_signature_not_stored() {
        let spec = spec(false);
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        let metadata = DraftMetadata::new(&spec, &body, None);
        assert!(metadata.signature.is_none());
    }

    #[test]
    fn test_survives_folding() {
        let spec = spec(true);
        let body = compose(&spec, MessageFormat::Text, TextEncoding::Standard);
        let value = DraftMetadata::new(&spec, &body, None)
            .to_header_value()
            .unwrap();

        let folded = fold("X-Mailforge-Identity", &value);
        for line in folded.split("\r\n") {
            assert!(line.len() <= 78, "{line}");
        }
        let unfolded = folded
            .replace("\r\n", "")
            .trim_start_matches("X-Mailforge-Identity:")
            .to_string();
        assert_eq!(
            DraftMetadata::from_header_value(&unfolded).unwrap().identity_email,
            "alice@example.com"
        );
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = DraftMetadata::from_header_value("v2; abc").unwrap_err();
        assert!(matches!(err, Error::DraftMetadata(_)));
        assert!(DraftMetadata::from_header_value("garbage").is_err());
        assert!(DraftMetadata::from_header_value("v1; !!!").is_err());
    }
}
