//! Top-level MIME message.

use crate::content_type::ContentType;
use crate::error::Result;
use crate::header::Headers;
use crate::part::MimePart;
use std::io::Write;

/// How the message body is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EncryptionType {
    /// Not encrypted.
    #[default]
    None,
    /// Legacy inline PGP: the text body is already an armored payload.
    Inline,
    /// PGP/MIME `multipart/encrypted` (RFC 3156 section 4).
    PgpMime,
}

/// MIME message: RFC 5322 headers plus exactly one top-level body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers (From, To, Subject, ...). Content headers live on the body.
    pub headers: Headers,
    body: MimePart,
    encryption: EncryptionType,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub const fn new(headers: Headers, body: MimePart) -> Self {
        Self {
            headers,
            body,
            encryption: EncryptionType::None,
        }
    }

    /// Replaces the top-level body, keeping headers and encryption mode.
    #[must_use]
    pub fn with_body(mut self, body: MimePart) -> Self {
        self.body = body;
        self
    }

    /// Sets the encryption mode.
    #[must_use]
    pub const fn with_encryption(mut self, encryption: EncryptionType) -> Self {
        self.encryption = encryption;
        self
    }

    /// Returns the top-level body part.
    ///
    /// Its serialization is what PGP/MIME signs or encrypts.
    #[must_use]
    pub const fn body(&self) -> &MimePart {
        &self.body
    }

    /// Consumes the message, returning headers, body and encryption mode.
    #[must_use]
    pub fn into_parts(self) -> (Headers, MimePart, EncryptionType) {
        (self.headers, self.body, self.encryption)
    }

    /// Returns the encryption mode.
    #[must_use]
    pub const fn encryption(&self) -> EncryptionType {
        self.encryption
    }

    /// Gets the content type of the body.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        self.body.content_type()
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.body.is_multipart()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Writes the complete message.
    ///
    /// # Errors
    ///
    /// Returns an error if body content cannot be read or the writer fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.headers.write_to(out)?;
        self.body.write_headers(out)?;
        out.write_all(b"\r\n")?;
        self.body.write_body(out)
    }

    /// Serializes the complete message into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an error if body content cannot be read.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
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
    use crate::part::{Leaf, Multipart, TextEncoding};

    fn headers() -> Headers {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");
        headers.add("Subject", "Test");
        headers.add("MIME-Version", "1.0");
        headers
    }

    #[test]
    fn test_message_single_part() {
        let body = Leaf::text("Hello, World!", ContentType::text_plain(), TextEncoding::Standard);
        let message = Message::new(headers(), body.into());

        assert_eq!(message.from(), Some("sender@example.com"));
        assert_eq!(message.to(), Some("recipient@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert!(!message.is_multipart());
        assert_eq!(message.encryption(), EncryptionType::None);

        let text = String::from_utf8(message.to_bytes().unwrap()).unwrap();
        assert_eq!(
            text,
            "From: sender@example.com\r\n\
             To: recipient@example.com\r\n\
             Subject: Test\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             Hello, World!"
        );
    }

    #[test]
    fn test_message_multipart() {
        let part1 = Leaf::text("Part 1", ContentType::text_plain(), TextEncoding::Standard);
        let part2 = Leaf::text("Part 2", ContentType::text_plain(), TextEncoding::Standard);
        let body = Multipart::new("mixed", vec![part1.into(), part2.into()]);
        let message = Message::new(headers(), body.into());

        assert!(message.is_multipart());
        assert_eq!(message.body().children().len(), 2);
        assert_eq!(message.content_type().sub_type, "mixed");
    }

    #[test]
    fn test_message_body_serializes_inside_message() {
        let body = Leaf::text("naïve", ContentType::text_plain(), TextEncoding::Standard);
        let message = Message::new(headers(), body.into());
        let whole = message.to_bytes().unwrap();
        let part = message.body().to_bytes().unwrap();
        assert!(whole.ends_with(&part));
    }

    #[test]
    fn test_with_body_keeps_headers() {
        let first = Leaf::text("one", ContentType::text_plain(), TextEncoding::Standard);
        let second = Leaf::text("two", ContentType::text_plain(), TextEncoding::Standard);
        let message = Message::new(headers(), first.into())
            .with_encryption(EncryptionType::Inline)
            .with_body(second.into());
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(message.encryption(), EncryptionType::Inline);
        assert_eq!(message.body().as_leaf().unwrap().text_content(), Some("two"));
    }
}
