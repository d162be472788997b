//! MIME part tree and its serialization.
//!
//! A [`MimePart`] is either a [`Leaf`] carrying content or a [`Multipart`]
//! container with ordered children. Boundaries are chosen when a container
//! is created, so serializing the same tree twice yields the same bytes.

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable_bytes};
use crate::error::{Error, Result};
use crate::header::Headers;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// Longest line allowed in a 7bit or 8bit body (RFC 5322 section 2.1.1).
const MAX_UNENCODED_LINE: usize = 998;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Chooses the encoding for a text body.
    ///
    /// Sign-safe text is always quoted-printable. Otherwise short-lined pure
    /// ASCII goes out as 7bit and anything else as quoted-printable.
    #[must_use]
    pub fn for_text(content: &str, mode: TextEncoding) -> Self {
        if mode == TextEncoding::SignSafe || !is_seven_bit_clean(content.as_bytes()) {
            Self::QuotedPrintable
        } else {
            Self::SevenBit
        }
    }

    /// Chooses the encoding for an attachment of the given content type.
    ///
    /// Embedded messages must keep their own structure and are never
    /// base64 wrapped; everything else is.
    #[must_use]
    pub fn for_content_type(content_type: &ContentType) -> Self {
        if content_type.is_message() {
            Self::SevenBit
        } else {
            Self::Base64
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// How text bodies are rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    /// Plain 7bit where possible, quoted-printable otherwise.
    #[default]
    Standard,
    /// Always quoted-printable, with `From ` and trailing whitespace escaped
    /// (RFC 3156 section 3).
    SignSafe,
}

/// Returns true if the bytes are ASCII without NUL, bare CR or overlong lines.
fn is_seven_bit_clean(data: &[u8]) -> bool {
    data.is_ascii()
        && !data.contains(&0)
        && data.split(|&b| b == b'\n').all(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            line.len() <= MAX_UNENCODED_LINE && !line.contains(&b'\r')
        })
}

/// Where the bytes of a binary or embedded-message body live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    /// Content held in memory.
    Memory(Vec<u8>),
    /// Content read from a file when the part is serialized.
    File(PathBuf),
}

impl BodySource {
    /// Returns the raw content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyAccess`] if a file-backed body cannot be read.
    pub fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            Self::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::File(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| Error::BodyAccess {
                    path: path.display().to_string(),
                    source,
                }),
        }
    }

    /// Loads file-backed content into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyAccess`] if the file cannot be read.
    pub fn materialize(self) -> Result<Self> {
        if let Self::File(_) = &self {
            let bytes = self.read()?.into_owned();
            return Ok(Self::Memory(bytes));
        }
        Ok(self)
    }
}

/// Content of a leaf part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Text with CRLF line endings.
    Text {
        /// The text itself.
        content: String,
        /// Wire rendering mode.
        mode: TextEncoding,
    },
    /// Opaque binary content.
    Binary(BodySource),
    /// An embedded RFC 822 message, written verbatim.
    Message(BodySource),
}

/// A part that carries content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    content_type: ContentType,
    encoding: TransferEncoding,
    headers: Headers,
    body: Body,
}

impl Leaf {
    /// Creates a text leaf, picking the transfer encoding from the content.
    #[must_use]
    pub fn text(content: impl Into<String>, content_type: ContentType, mode: TextEncoding) -> Self {
        let content = content.into();
        let encoding = TransferEncoding::for_text(&content, mode);
        Self {
            content_type,
            encoding,
            headers: Headers::new(),
            body: Body::Text { content, mode },
        }
    }

    /// Creates a binary leaf with an explicit transfer encoding.
    #[must_use]
    pub fn binary(source: BodySource, content_type: ContentType, encoding: TransferEncoding) -> Self {
        Self {
            content_type,
            encoding,
            headers: Headers::new(),
            body: Body::Binary(source),
        }
    }

    /// Creates an embedded message leaf.
    ///
    /// In-memory ASCII content is declared 7bit; anything else 8bit.
    #[must_use]
    pub fn message(source: BodySource, content_type: ContentType) -> Self {
        let encoding = match &source {
            BodySource::Memory(bytes) if is_seven_bit_clean(bytes) => TransferEncoding::SevenBit,
            _ => TransferEncoding::EightBit,
        };
        Self {
            content_type,
            encoding,
            headers: Headers::new(),
            body: Body::Message(source),
        }
    }

    /// Adds an extra header (beyond Content-Type and Content-Transfer-Encoding).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Sets the Content-Disposition header.
    #[must_use]
    pub fn with_disposition(mut self, disposition: &ContentDisposition) -> Self {
        self.headers.set("Content-Disposition", disposition.to_string());
        self
    }

    /// Returns the content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the declared transfer encoding.
    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the text content of a text leaf.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            Body::Text { content, .. } => Some(content),
            Body::Binary(_) | Body::Message(_) => None,
        }
    }

    /// Returns the unencoded content bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if external content cannot be read.
    pub fn content(&self) -> Result<Cow<'_, [u8]>> {
        match &self.body {
            Body::Text { content, .. } => Ok(Cow::Borrowed(content.as_bytes())),
            Body::Binary(source) | Body::Message(source) => source.read(),
        }
    }

    fn encoded_body(&self) -> Result<Vec<u8>> {
        let sign_safe = matches!(
            self.body,
            Body::Text {
                mode: TextEncoding::SignSafe,
                ..
            }
        );
        let content = self.content()?;
        let encoded = match self.encoding {
            TransferEncoding::Base64 => encode_base64_wrapped(&content).into_bytes(),
            TransferEncoding::QuotedPrintable => {
                encode_quoted_printable_bytes(&content, sign_safe).into_bytes()
            }
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                content.into_owned()
            }
        };
        Ok(encoded)
    }

    fn materialize(mut self) -> Result<Self> {
        self.body = match self.body {
            Body::Binary(source) => Body::Binary(source.materialize()?),
            Body::Message(source) => Body::Message(source.materialize()?),
            text @ Body::Text { .. } => text,
        };
        Ok(self)
    }

    fn into_seven_bit(self, mode: TextEncoding) -> Result<Self> {
        let mut leaf = self.materialize()?;
        match leaf.body {
            Body::Text { content, .. } => {
                let encoding = TransferEncoding::for_text(&content, mode);
                leaf.encoding = encoding;
                leaf.body = Body::Text { content, mode };
            }
            Body::Binary(ref source) => {
                let needs_base64 = match leaf.encoding {
                    TransferEncoding::Base64 | TransferEncoding::QuotedPrintable => false,
                    TransferEncoding::SevenBit => !is_seven_bit_clean(&source.read()?),
                    TransferEncoding::EightBit | TransferEncoding::Binary => true,
                };
                if needs_base64 {
                    leaf.encoding = TransferEncoding::Base64;
                }
            }
            Body::Message(BodySource::Memory(bytes)) => {
                leaf.body = Body::Message(BodySource::Memory(downgrade_message(bytes)?));
                leaf.encoding = TransferEncoding::SevenBit;
            }
            Body::Message(BodySource::File(_)) => {
                // materialize() already loaded every file.
                return Err(Error::SevenBitDowngrade(
                    "embedded message was not loaded".to_string(),
                ));
            }
        }
        Ok(leaf)
    }
}

/// Rewrites an 8-bit embedded message so its body is quoted-printable.
///
/// Only single-part messages with ASCII headers can be rewritten.
fn downgrade_message(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if is_seven_bit_clean(&bytes) {
        return Ok(bytes);
    }

    let (head, body) = split_message(&bytes).ok_or_else(|| {
        Error::SevenBitDowngrade("embedded message has no header separator".to_string())
    })?;
    if !head.is_ascii() {
        return Err(Error::SevenBitDowngrade(
            "embedded message has 8-bit header data".to_string(),
        ));
    }
    let head = String::from_utf8_lossy(head);

    let mut headers = Headers::parse(&head)?;
    let content_type = headers
        .get("Content-Type")
        .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;
    if content_type.is_multipart() || content_type.is_message() {
        return Err(Error::SevenBitDowngrade(format!(
            "embedded {} carries 8-bit data",
            content_type.mime_type()
        )));
    }

    tracing::debug!(
        content_type = %content_type.mime_type(),
        "Re-encoding embedded message body as quoted-printable"
    );
    headers.set("Content-Transfer-Encoding", "quoted-printable");

    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 4);
    headers.write_to(&mut out)?;
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(encode_quoted_printable_bytes(body, false).as_bytes());
    Ok(out)
}

/// Splits raw message bytes at the first empty line.
fn split_message(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(pos) = bytes.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((&bytes[..pos + 2], &bytes[pos + 4..]));
    }
    bytes
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (&bytes[..=pos], &bytes[pos + 2..]))
}

/// A container part with ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    content_type: ContentType,
    headers: Headers,
    children: Vec<MimePart>,
}

impl Multipart {
    /// Creates a container with a freshly generated boundary.
    #[must_use]
    pub fn new(sub_type: impl Into<String>, children: Vec<MimePart>) -> Self {
        Self::with_boundary(sub_type, generate_boundary(), children)
    }

    /// Creates a container with a caller-chosen boundary.
    #[must_use]
    pub fn with_boundary(
        sub_type: impl Into<String>,
        boundary: impl Into<String>,
        children: Vec<MimePart>,
    ) -> Self {
        Self {
            content_type: ContentType::multipart(sub_type, boundary),
            headers: Headers::new(),
            children,
        }
    }

    /// Adds a Content-Type parameter (e.g. `protocol`, `micalg`).
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.content_type = self.content_type.with_parameter(key, value);
        self
    }

    /// Returns the multipart subtype.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.content_type.sub_type
    }

    /// Returns the boundary.
    #[must_use]
    pub fn boundary(&self) -> &str {
        self.content_type.boundary().unwrap_or_default()
    }

    /// Returns the content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the children in order.
    #[must_use]
    pub fn children(&self) -> &[MimePart] {
        &self.children
    }

    fn write_body<W: Write>(&self, out: &mut W) -> Result<()> {
        let boundary = self.boundary();
        for child in &self.children {
            write!(out, "--{boundary}\r\n")?;
            child.write_to(out)?;
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{boundary}--\r\n")?;
        Ok(())
    }
}

/// A node in a MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimePart {
    /// Content-bearing part.
    Leaf(Leaf),
    /// Container part.
    Multipart(Multipart),
}

impl MimePart {
    /// Returns the content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        match self {
            Self::Leaf(leaf) => &leaf.content_type,
            Self::Multipart(multipart) => &multipart.content_type,
        }
    }

    /// Returns the part's extra headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        match self {
            Self::Leaf(leaf) => &leaf.headers,
            Self::Multipart(multipart) => &multipart.headers,
        }
    }

    /// Checks if this is a container.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }

    /// Returns the multipart subtype, if this is a container.
    #[must_use]
    pub fn multipart_subtype(&self) -> Option<&str> {
        self.as_multipart().map(Multipart::sub_type)
    }

    /// Returns the children (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[MimePart] {
        match self {
            Self::Leaf(_) => &[],
            Self::Multipart(multipart) => &multipart.children,
        }
    }

    /// Returns the leaf, if this is one.
    #[must_use]
    pub const fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Multipart(_) => None,
        }
    }

    /// Returns the container, if this is one.
    #[must_use]
    pub const fn as_multipart(&self) -> Option<&Multipart> {
        match self {
            Self::Leaf(_) => None,
            Self::Multipart(multipart) => Some(multipart),
        }
    }

    /// Collects all leaves depth-first, in document order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Leaf> {
        match self {
            Self::Leaf(leaf) => vec![leaf],
            Self::Multipart(multipart) => multipart
                .children
                .iter()
                .flat_map(Self::leaves)
                .collect(),
        }
    }

    /// Writes the part's own header block (without the terminating empty line).
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn write_headers<W: Write>(&self, out: &mut W) -> Result<()> {
        let mut own = Headers::new();
        own.add("Content-Type", self.content_type().to_string());
        if let Self::Leaf(leaf) = self {
            own.add("Content-Transfer-Encoding", leaf.encoding.to_string());
        }
        own.write_to(out)?;
        self.headers().write_to(out)
    }

    /// Writes the encoded body.
    ///
    /// # Errors
    ///
    /// Returns an error if external content cannot be read or the writer fails.
    pub fn write_body<W: Write>(&self, out: &mut W) -> Result<()> {
        match self {
            Self::Leaf(leaf) => {
                out.write_all(&leaf.encoded_body()?)?;
                Ok(())
            }
            Self::Multipart(multipart) => multipart.write_body(out),
        }
    }

    /// Writes headers, the empty separator line and the body.
    ///
    /// # Errors
    ///
    /// Returns an error if external content cannot be read or the writer fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        self.write_headers(out)?;
        out.write_all(b"\r\n")?;
        self.write_body(out)
    }

    /// Serializes the part into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns an error if external content cannot be read.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Loads every file-backed body into memory.
    ///
    /// After this, serialization is a pure function of the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read.
    pub fn materialize(self) -> Result<Self> {
        match self {
            Self::Leaf(leaf) => Ok(Self::Leaf(leaf.materialize()?)),
            Self::Multipart(mut multipart) => {
                multipart.children = multipart
                    .children
                    .into_iter()
                    .map(Self::materialize)
                    .collect::<Result<_>>()?;
                Ok(Self::Multipart(multipart))
            }
        }
    }

    /// Re-encodes the tree for a 7-bit transport.
    ///
    /// File bodies are loaded, text is re-rendered in `mode`, 8-bit binary
    /// content becomes base64 and 8-bit embedded messages get a
    /// quoted-printable body.
    ///
    /// # Errors
    ///
    /// Returns an error if content cannot be read or an embedded message
    /// cannot be made 7-bit clean.
    pub fn into_seven_bit(self, mode: TextEncoding) -> Result<Self> {
        match self {
            Self::Leaf(leaf) => Ok(Self::Leaf(leaf.into_seven_bit(mode)?)),
            Self::Multipart(mut multipart) => {
                multipart.children = multipart
                    .children
                    .into_iter()
                    .map(|child| child.into_seven_bit(mode))
                    .collect::<Result<_>>()?;
                Ok(Self::Multipart(multipart))
            }
        }
    }
}

impl From<Leaf> for MimePart {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<Multipart> for MimePart {
    fn from(multipart: Multipart) -> Self {
        Self::Multipart(multipart)
    }
}

/// Generates a random multipart boundary.
#[must_use]
pub fn generate_boundary() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("----=_Part_{token}")
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

    fn text_leaf(content: &str) -> MimePart {
        Leaf::text(content, ContentType::text_plain(), TextEncoding::Standard).into()
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_text_encoding_choice() {
        assert_eq!(
            TransferEncoding::for_text("plain ascii", TextEncoding::Standard),
            TransferEncoding::SevenBit
        );
        assert_eq!(
            TransferEncoding::for_text("naïve", TextEncoding::Standard),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::for_text("plain ascii", TextEncoding::SignSafe),
            TransferEncoding::QuotedPrintable
        );
        let long_line = "x".repeat(1200);
        assert_eq!(
            TransferEncoding::for_text(&long_line, TextEncoding::Standard),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_leaf_serialization() {
        let part = text_leaf("Hello,\r\nWorld");
        let bytes = part.to_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 7bit\r\n\
             \r\n\
             Hello,\r\nWorld"
        );
    }

    #[test]
    fn test_multipart_serialization() {
        let part: MimePart = Multipart::with_boundary(
            "mixed",
            "XYZ",
            vec![text_leaf("one"), text_leaf("two")],
        )
        .into();
        let text = String::from_utf8(part.to_bytes().unwrap()).unwrap();
        assert!(text.starts_with("Content-Type: multipart/mixed; boundary=XYZ\r\n\r\n--XYZ\r\n"));
        assert!(text.contains("\r\n\r\none\r\n--XYZ\r\n"));
        assert!(text.ends_with("\r\n\r\ntwo\r\n--XYZ--\r\n"));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let part: MimePart = Multipart::new(
            "alternative",
            vec![
                Leaf::text("<p>hi</p>", ContentType::text_html(), TextEncoding::Standard).into(),
                text_leaf("hi"),
            ],
        )
        .into();
        assert_eq!(part.to_bytes().unwrap(), part.to_bytes().unwrap());
    }

    #[test]
    fn test_binary_leaf_base64() {
        let leaf = Leaf::binary(
            BodySource::Memory(vec![0, 159, 146, 150]),
            ContentType::new("application", "octet-stream"),
            TransferEncoding::Base64,
        );
        let bytes = MimePart::from(leaf).to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(text.ends_with("\r\n\r\nAJ+Slg=="));
    }

    #[test]
    fn test_missing_file_body_fails() {
        let leaf = Leaf::binary(
            BodySource::File(PathBuf::from("/nonexistent/mailforge/attachment.bin")),
            ContentType::new("application", "octet-stream"),
            TransferEncoding::Base64,
        );
        let err = MimePart::from(leaf).to_bytes().unwrap_err();
        assert!(matches!(err, Error::BodyAccess { .. }));
    }

    #[test]
    fn test_into_seven_bit_sign_safe_text() {
        let part = text_leaf("From me\r\nbye ").into_seven_bit(TextEncoding::SignSafe).unwrap();
        let leaf = part.as_leaf().unwrap();
        assert_eq!(leaf.encoding(), TransferEncoding::QuotedPrintable);
        let text = String::from_utf8(part.to_bytes().unwrap()).unwrap();
        assert!(text.ends_with("\r\n\r\n=46rom me\r\nbye=20"));
    }

    #[test]
    fn test_into_seven_bit_binary() {
        let leaf = Leaf::binary(
            BodySource::Memory(vec![0xff, 0xfe]),
            ContentType::new("application", "octet-stream"),
            TransferEncoding::Binary,
        );
        let part = MimePart::from(leaf).into_seven_bit(TextEncoding::Standard).unwrap();
        assert_eq!(part.as_leaf().unwrap().encoding(), TransferEncoding::Base64);
    }

    #[test]
    fn test_into_seven_bit_embedded_message() {
        let raw = "Subject: hi\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nnaïve\r\n";
        let leaf = Leaf::message(
            BodySource::Memory(raw.as_bytes().to_vec()),
            ContentType::new("message", "rfc822"),
        );
        assert_eq!(leaf.encoding(), TransferEncoding::EightBit);

        let part = MimePart::from(leaf).into_seven_bit(TextEncoding::Standard).unwrap();
        let leaf = part.as_leaf().unwrap();
        assert_eq!(leaf.encoding(), TransferEncoding::SevenBit);
        let content = leaf.content().unwrap();
        let content = std::str::from_utf8(&content).unwrap();
        assert!(content.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(content.contains("na=C3=AFve"));
        assert!(content.is_ascii());
    }

    #[test]
    fn test_into_seven_bit_rejects_8bit_multipart_message() {
        let raw = "Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\nnaïve\r\n--b--\r\n";
        let leaf = Leaf::message(
            BodySource::Memory(raw.as_bytes().to_vec()),
            ContentType::new("message", "rfc822"),
        );
        let err = MimePart::from(leaf)
            .into_seven_bit(TextEncoding::Standard)
            .unwrap_err();
        assert!(matches!(err, Error::SevenBitDowngrade(_)));
    }

    #[test]
    fn test_leaves_document_order() {
        let inner: MimePart = Multipart::new("alternative", vec![text_leaf("a"), text_leaf("b")]).into();
        let outer: MimePart = Multipart::new("mixed", vec![inner, text_leaf("c")]).into();
        let texts: Vec<&str> = outer
            .leaves()
            .into_iter()
            .filter_map(Leaf::text_content)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_generate_boundary_unique() {
        let a = generate_boundary();
        let b = generate_boundary();
        assert_ne!(a, b);
        assert!(a.len() <= 70);
    }
}
