//! Input model for a message build.

use crate::address::Mailbox;
use crate::identity::Identity;
use crate::pgp::{CryptoRequest, PgpMime};
use mailforge_mime::BodySource;

/// Format of the primary text body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// `text/plain` only.
    #[default]
    Text,
    /// `text/html` with a `text/plain` fallback.
    Html,
}

/// How quoted text is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    /// Each quoted line is prefixed (`> `).
    #[default]
    Prefix,
    /// The quote is introduced by a header block (Outlook style).
    Header,
}

/// Whether quoted text is part of the outgoing body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotedTextMode {
    /// There is no quoted text.
    #[default]
    None,
    /// Quoted text is shown and sent.
    Show,
    /// Quoted text exists but the user hid it; it is sent only in drafts.
    Hide,
}

/// Quoting decisions made by the compose screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotingPolicy {
    /// Whether quoted text is included.
    pub mode: QuotedTextMode,
    /// Presentation style.
    pub style: QuoteStyle,
    /// Put the reply below the quote. Honored only with [`QuoteStyle::Prefix`].
    pub reply_after_quote: bool,
    /// Put the signature right after the reply instead of at the very end.
    pub signature_before_quoted_text: bool,
}

impl QuotingPolicy {
    /// Returns true if the reply goes below the quote.
    #[must_use]
    pub fn replies_after_quote(&self) -> bool {
        self.reply_after_quote && self.style == QuoteStyle::Prefix
    }
}

/// Quoted HTML with the points where new content may be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedHtml {
    content: String,
    header_insertion_point: usize,
    footer_insertion_point: usize,
}

impl QuotedHtml {
    /// Wraps quoted HTML; content is inserted at its start or end.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let footer = content.len();
        Self {
            content,
            header_insertion_point: 0,
            footer_insertion_point: footer,
        }
    }

    /// Sets explicit insertion points (byte offsets).
    ///
    /// Offsets are clamped to the content and moved back to the nearest
    /// character boundary; the header point never lies after the footer point.
    #[must_use]
    pub fn with_insertion_points(mut self, header: usize, footer: usize) -> Self {
        let footer = floor_char_boundary(&self.content, footer);
        let header = floor_char_boundary(&self.content, header.min(footer));
        self.header_insertion_point = header;
        self.footer_insertion_point = footer;
        self
    }

    /// Returns the quoted HTML.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns where content above the quote is inserted.
    #[must_use]
    pub const fn header_insertion_point(&self) -> usize {
        self.header_insertion_point
    }

    /// Returns where content below the quote is inserted.
    #[must_use]
    pub const fn footer_insertion_point(&self) -> usize {
        self.footer_insertion_point
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Load progress of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    /// Only metadata is known; the content is not available yet.
    #[default]
    Metadata,
    /// Content is fully available.
    Complete,
    /// Loading was cancelled.
    Cancelled,
}

/// An attachment as chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// Where the content lives.
    pub content: BodySource,
    /// Display name, used for `name` and `filename`.
    pub name: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Load progress.
    pub state: LoadingState,
}

impl AttachmentDescriptor {
    /// Creates a complete in-memory attachment.
    #[must_use]
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            size: bytes.len() as u64,
            content: BodySource::Memory(bytes),
            name: name.into(),
            content_type: content_type.into(),
            state: LoadingState::Complete,
        }
    }

    /// Creates a complete file-backed attachment.
    #[must_use]
    pub fn from_file(
        name: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
        size: u64,
    ) -> Self {
        Self {
            content: BodySource::File(path.into()),
            name: name.into(),
            content_type: content_type.into(),
            size,
            state: LoadingState::Complete,
        }
    }

    /// Sets the loading state.
    #[must_use]
    pub const fn with_state(mut self, state: LoadingState) -> Self {
        self.state = state;
        self
    }

    /// Returns true if the content may be embedded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == LoadingState::Complete
    }
}

/// The message being replied to or forwarded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageReference {
    /// Account the message belongs to.
    pub account_uuid: String,
    /// Folder holding the message.
    pub folder: String,
    /// Server uid of the message.
    pub uid: String,
    /// Flag to set on the original once sent (e.g. `ANSWERED`, `FORWARDED`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

/// Editor state carried into draft metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DraftState {
    /// Cursor position in the composed text.
    pub cursor_position: usize,
    /// The user picked another identity than the account default.
    pub identity_changed: bool,
    /// The user edited the signature.
    pub signature_changed: bool,
}

/// Everything needed to build one message.
///
/// Assembled with [`MessageSpec::builder`] and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    /// Subject line.
    pub subject: String,
    /// Sending identity.
    pub identity: Identity,
    /// Primary recipients.
    pub to: Vec<Mailbox>,
    /// Carbon-copy recipients.
    pub cc: Vec<Mailbox>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<Mailbox>,
    /// `In-Reply-To` value.
    pub in_reply_to: Option<String>,
    /// `References` value.
    pub references: Option<String>,
    /// Ask for a read receipt.
    pub request_read_receipt: bool,
    /// Primary body format.
    pub format: MessageFormat,
    /// Text the user typed.
    pub text: String,
    /// Quoted plain text.
    pub quoted_text: String,
    /// Quoted HTML, for HTML replies.
    pub quoted_html: Option<QuotedHtml>,
    /// Quoting decisions.
    pub quoting: QuotingPolicy,
    /// Signature override. Falls back to the identity's signature.
    pub signature: Option<String>,
    /// Attachments in display order.
    pub attachments: Vec<AttachmentDescriptor>,
    /// Build a draft instead of an outgoing message.
    pub is_draft: bool,
    /// Editor state for draft metadata.
    pub draft_state: DraftState,
    /// Message replied to or forwarded.
    pub message_reference: Option<MessageReference>,
    /// PGP/MIME transforms.
    pub pgp: PgpMime,
    /// Pre-encrypted inline PGP payload replacing the body text.
    pub inline_encrypted: Option<String>,
}

impl MessageSpec {
    /// Starts building a spec for the given identity.
    #[must_use]
    pub fn builder(identity: Identity) -> MessageSpecBuilder {
        MessageSpecBuilder::new(identity)
    }

    /// Returns the signature to append, if any.
    ///
    /// Drafts never get a signature appended, and neither do identities
    /// with signatures disabled.
    #[must_use]
    pub fn effective_signature(&self) -> Option<&str> {
        if self.is_draft || !self.identity.signature_use {
            return None;
        }
        self.signature
            .as_deref()
            .or(self.identity.signature.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Returns true if quoted text belongs in the body.
    #[must_use]
    pub fn includes_quoted_text(&self) -> bool {
        self.is_draft || self.quoting.mode == QuotedTextMode::Show
    }

    /// Returns true if there is at least one recipient.
    #[must_use]
    pub fn has_recipients(&self) -> bool {
        !(self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty())
    }
}

/// Consuming builder for [`MessageSpec`].
#[derive(Debug, Clone)]
#[must_use]
pub struct MessageSpecBuilder {
    spec: MessageSpec,
}

impl MessageSpecBuilder {
    /// Creates a builder with empty content.
    pub fn new(identity: Identity) -> Self {
        Self {
            spec: MessageSpec {
                subject: String::new(),
                identity,
                to: Vec::new(),
                cc: Vec::new(),
                bcc: Vec::new(),
                in_reply_to: None,
                references: None,
                request_read_receipt: false,
                format: MessageFormat::Text,
                text: String::new(),
                quoted_text: String::new(),
                quoted_html: None,
                quoting: QuotingPolicy::default(),
                signature: None,
                attachments: Vec::new(),
                is_draft: false,
                draft_state: DraftState::default(),
                message_reference: None,
                pgp: PgpMime::default(),
                inline_encrypted: None,
            },
        }
    }

    /// Sets the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.spec.subject = subject.into();
        self
    }

    /// Adds a primary recipient.
    pub fn to(mut self, mailbox: Mailbox) -> Self {
        self.spec.to.push(mailbox);
        self
    }

    /// Adds a carbon-copy recipient.
    pub fn cc(mut self, mailbox: Mailbox) -> Self {
        self.spec.cc.push(mailbox);
        self
    }

    /// Adds a blind carbon-copy recipient.
    pub fn bcc(mut self, mailbox: Mailbox) -> Self {
        self.spec.bcc.push(mailbox);
        self
    }

    /// Sets `In-Reply-To`.
    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.spec.in_reply_to = Some(message_id.into());
        self
    }

    /// Sets `References`.
    pub fn references(mut self, references: impl Into<String>) -> Self {
        self.spec.references = Some(references.into());
        self
    }

    /// Requests a read receipt.
    pub const fn request_read_receipt(mut self, request: bool) -> Self {
        self.spec.request_read_receipt = request;
        self
    }

    /// Sets the body format.
    pub const fn format(mut self, format: MessageFormat) -> Self {
        self.spec.format = format;
        self
    }

    /// Sets the text the user typed.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.spec.text = text.into();
        self
    }

    /// Sets the quoted plain text.
    pub fn quoted_text(mut self, quoted: impl Into<String>) -> Self {
        self.spec.quoted_text = quoted.into();
        self
    }

    /// Sets the quoted HTML.
    pub fn quoted_html(mut self, quoted: QuotedHtml) -> Self {
        self.spec.quoted_html = Some(quoted);
        self
    }

    /// Sets the quoting policy.
    pub const fn quoting(mut self, quoting: QuotingPolicy) -> Self {
        self.spec.quoting = quoting;
        self
    }

    /// Overrides the identity's signature.
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.spec.signature = Some(signature.into());
        self
    }

    /// Adds an attachment.
    pub fn attachment(mut self, attachment: AttachmentDescriptor) -> Self {
        self.spec.attachments.push(attachment);
        self
    }

    /// Marks the build as a draft with the given editor state.
    pub const fn draft(mut self, state: DraftState) -> Self {
        self.spec.is_draft = true;
        self.spec.draft_state = state;
        self
    }

    /// Sets the message being replied to or forwarded.
    pub fn message_reference(mut self, reference: MessageReference) -> Self {
        self.spec.message_reference = Some(reference);
        self
    }

    /// Requests a detached PGP/MIME signature.
    pub fn sign(mut self, request: CryptoRequest) -> Self {
        self.spec.pgp.sign = Some(request);
        self
    }

    /// Requests PGP/MIME encryption.
    pub fn encrypt(mut self, request: CryptoRequest) -> Self {
        self.spec.pgp.encrypt = Some(request);
        self
    }

    /// Replaces the body with a pre-encrypted inline PGP payload.
    pub fn inline_encrypted(mut self, payload: impl Into<String>) -> Self {
        self.spec.inline_encrypted = Some(payload.into());
        self
    }

    /// Finishes the spec.
    #[must_use]
    pub fn build(self) -> MessageSpec {
        self.spec
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

    fn identity() -> Identity {
        Identity::new("Alice", "alice@example.com").with_signature("Alice")
    }

    #[test]
    fn test_reply_after_quote_needs_prefix_style() {
        let mut policy = QuotingPolicy {
            reply_after_quote: true,
            ..QuotingPolicy::default()
        };
        assert!(policy.replies_after_quote());
        policy.style = QuoteStyle::Header;
        assert!(!policy.replies_after_quote());
    }

    #[test]
    fn test_quoted_html_insertion_points() {
        let quoted = QuotedHtml::new("<blockquote>hi</blockquote>");
        assert_eq!(quoted.header_insertion_point(), 0);
        assert_eq!(quoted.footer_insertion_point(), quoted.content().len());

        let clamped = QuotedHtml::new("héllo").with_insertion_points(10, 2);
        assert_eq!(clamped.footer_insertion_point(), 1);
        assert_eq!(clamped.header_insertion_point(), 1);
    }

    #[test]
    fn test_effective_signature() {
        let spec = MessageSpec::builder(identity()).build();
        assert_eq!(spec.effective_signature(), Some("Alice"));

        let spec = MessageSpec::builder(identity()).signature("Override").build();
        assert_eq!(spec.effective_signature(), Some("Override"));

        let spec = MessageSpec::builder(identity())
            .draft(DraftState::default())
            .build();
        assert_eq!(spec.effective_signature(), None);

        let mut no_use = identity();
        no_use.signature_use = false;
        let spec = MessageSpec::builder(no_use).build();
        assert_eq!(spec.effective_signature(), None);
    }

    #[test]
    fn test_includes_quoted_text() {
        let hidden = QuotingPolicy {
            mode: QuotedTextMode::Hide,
            ..QuotingPolicy::default()
        };
        let spec = MessageSpec::builder(identity()).quoting(hidden).build();
        assert!(!spec.includes_quoted_text());

        let draft = MessageSpec::builder(identity())
            .quoting(hidden)
            .draft(DraftState::default())
            .build();
        assert!(draft.includes_quoted_text());
    }

    #[test]
    fn test_recipients() {
        let spec = MessageSpec::builder(identity()).build();
        assert!(!spec.has_recipients());

        let spec = MessageSpec::builder(identity())
            .bcc(Mailbox::new("hidden@example.com").unwrap())
            .build();
        assert!(spec.has_recipients());
    }

    #[test]
    fn test_attachment_states() {
        let attachment = AttachmentDescriptor::from_bytes("a.txt", "text/plain", b"abc".to_vec());
        assert!(attachment.is_complete());
        assert_eq!(attachment.size, 3);
        let pending = attachment.with_state(LoadingState::Metadata);
        assert!(!pending.is_complete());
    }

    #[test]
    fn test_message_reference_serde() {
        let reference = MessageReference {
            account_uuid: "acc-1".to_string(),
            folder: "INBOX".to_string(),
            uid: "42".to_string(),
            flag: None,
        };
        let json = serde_json::to_string(&reference).unwrap();
        assert!(!json.contains("flag"));
        let back: MessageReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reference);
    }
}
