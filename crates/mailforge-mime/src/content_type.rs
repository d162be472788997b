//! MIME content type and content disposition handling.

use crate::error::{Error, Result};
use std::fmt;

/// Ordered `key=value` parameters of a structured MIME header.
///
/// Order is preserved so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Creates an empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets a parameter, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().to_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Gets a parameter value (case-insensitive key).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn parse_into(&mut self, raw: std::str::Split<'_, char>) {
        for param in raw {
            let param = param.trim();
            if let Some((key, value)) = param.split_once('=') {
                let value = value.trim().trim_matches('"');
                self.set(key.trim(), value);
            }
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.0 {
            // RFC 2231 extended values are never quoted.
            let extended = key.ends_with('*');
            let needs_quotes = !extended
                && (value.is_empty()
                    || value.contains(|c: char| {
                        c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)
                    }));
            if needs_quotes {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {key}=\"{escaped}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }
        Ok(())
    }
}

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Parameters,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into().to_lowercase(),
            sub_type: sub_type.into().to_lowercase(),
            parameters: Parameters::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart content type with the given subtype and boundary.
    #[must_use]
    pub fn multipart(sub_type: impl Into<String>, boundary: impl Into<String>) -> Self {
        Self::new("multipart", sub_type).with_parameter("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.set(key, value);
        self
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset")
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks if this is an embedded message (`message/*`).
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("message")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// # Errors
    ///
    /// Returns an error if the format is invalid.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        // Parse type/subtype
        let type_str = parts
            .next()
            .ok_or_else(|| Error::InvalidContentType("Empty content type".to_string()))?
            .trim();

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {type_str}")))?;
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!(
                "Malformed type/subtype: {type_str}"
            )));
        }

        let mut content_type = Self::new(main_type, sub_type);
        content_type.parameters.parse_into(parts);

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}{}", self.parameters)
    }
}

/// `Content-Disposition` header value (RFC 2183).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type ("attachment" or "inline").
    pub kind: String,
    /// Parameters (filename, size, ...).
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Creates an `attachment` disposition.
    #[must_use]
    pub fn attachment() -> Self {
        Self {
            kind: "attachment".to_string(),
            parameters: Parameters::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.set(key, value);
        self
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key)
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.parameters)
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

    #[test]
    fn test_new_lowercases_types() {
        let ct = ContentType::new("Application", "PGP-Signature");
        assert_eq!(ct.mime_type(), "application/pgp-signature");
        assert!(ct.parameters.is_empty());
        assert!(!ct.is_multipart());
    }

    #[test]
    fn test_text_constructors_carry_charset() {
        assert_eq!(ContentType::text_plain().to_string(), "text/plain; charset=utf-8");
        assert_eq!(ContentType::text_html().charset(), Some("utf-8"));
        assert!(ContentType::text_html().is_text());
    }

    #[test]
    fn test_multipart_constructors() {
        let mixed = ContentType::multipart("mixed", "outer");
        let alternative = ContentType::multipart("alternative", "inner");
        assert_eq!(mixed.mime_type(), "multipart/mixed");
        assert_eq!(alternative.boundary(), Some("inner"));
        assert!(alternative.is_multipart());
    }

    #[test]
    fn test_message_detection() {
        assert!(ContentType::parse("message/rfc822").unwrap().is_message());
        assert!(!ContentType::parse("application/octet-stream").unwrap().is_message());
    }

    #[test]
    fn test_parse_attachment_type_with_name() {
        let ct = ContentType::parse("Application/PDF; Name=\"report q3.pdf\"").unwrap();
        assert_eq!(ct.mime_type(), "application/pdf");
        assert_eq!(ct.parameter("name"), Some("report q3.pdf"));
    }

    #[test]
    fn test_parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/signed; boundary=\"----=_Part_abc\"; micalg=pgp-sha512").unwrap();
        assert_eq!(ct.sub_type, "signed");
        assert_eq!(ct.boundary(), Some("----=_Part_abc"));
        assert_eq!(ct.parameter("micalg"), Some("pgp-sha512"));
    }

    #[test]
    fn test_content_type_parse_rejects_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn test_display_preserves_parameter_order() {
        let ct = ContentType::multipart("signed", "b1")
            .with_parameter("protocol", "application/pgp-signature")
            .with_parameter("micalg", "pgp-sha256");
        assert_eq!(
            ct.to_string(),
            "multipart/signed; boundary=b1; protocol=\"application/pgp-signature\"; micalg=pgp-sha256"
        );
    }

    #[test]
    fn test_with_parameter_replaces_in_place() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("charset", "iso-8859-1")
            .with_parameter("format", "flowed")
            .with_parameter("charset", "utf-8");

        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.parameter("format"), Some("flowed"));
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8; format=flowed");
    }

    #[test]
    fn test_extended_parameter_not_quoted() {
        let disposition = ContentDisposition::attachment()
            .with_parameter("filename*", "utf-8''r%C3%A9sum%C3%A9.pdf")
            .with_parameter("size", "42");
        assert_eq!(disposition.parameter("SIZE"), Some("42"));
        assert_eq!(
            disposition.to_string(),
            "attachment; filename*=utf-8''r%C3%A9sum%C3%A9.pdf; size=42"
        );
    }

    #[test]
    fn test_quoted_value_escapes_quotes() {
        let disposition = ContentDisposition::attachment().with_parameter("filename", "a \"b\".txt");
        assert_eq!(disposition.to_string(), "attachment; filename=\"a \\\"b\\\".txt\"");
    }
}
