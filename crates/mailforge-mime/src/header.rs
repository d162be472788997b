//! MIME header handling.

use crate::encoding::encode_rfc2047;
use crate::error::{Error, Result};
use std::fmt;
use std::io::Write;

/// Soft limit for a folded header line, excluding CRLF.
const FOLD_WIDTH: usize = 78;

/// Ordered collection of email headers.
///
/// Insertion order and the caller's spelling of header names are kept, and
/// lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The header keeps the position of its first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.headers[index] = (name.clone(), value);
                let mut i = 0;
                self.headers.retain(|(n, _)| {
                    let keep = i <= index || !n.eq_ignore_ascii_case(&name);
                    i += 1;
                    keep
                });
            }
            None => self.headers.push((name, value)),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns the number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no header fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Parses headers from raw text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    /// Continuation: line
    /// ```
    ///
    /// Parsing stops at the first empty line.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is neither a field nor a continuation.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            current = Some((name.trim().to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }

    /// Encodes a header value using RFC 2047 if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode_value(value: &str) -> Result<String> {
        encode_rfc2047(value, "utf-8")
    }

    /// Writes all headers, folded, each terminated by CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        for (name, value) in &self.headers {
            out.write_all(fold(name, value).as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        Ok(())
    }
}

/// Folds `Name: value` at whitespace so lines stay within 78 columns.
///
/// Values without a suitable break point are left long.
#[must_use]
pub fn fold(name: &str, value: &str) -> String {
    let mut out = format!("{name}:");
    let mut line_len = out.len();

    for (i, word) in value.split(' ').enumerate() {
        let sep_len = 1;
        if i > 0 && !word.is_empty() && line_len + sep_len + word.len() > FOLD_WIDTH {
            out.push_str("\r\n");
            line_len = 0;
        }
        out.push(' ');
        out.push_str(word);
        line_len += sep_len + word.len();
    }

    out
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            write!(f, "{}\r\n", fold(name, value))?;
        }
        Ok(())
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
    fn test_lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        assert!(headers.is_empty());
        headers.add("Message-ID", "<abc@example.com>");
        assert_eq!(headers.get("message-id"), Some("<abc@example.com>"));
        assert_eq!(headers.iter().next(), Some(("Message-ID", "<abc@example.com>")));
    }

    #[test]
    fn test_set_keeps_first_position() {
        let mut headers = Headers::new();
        headers.add("Reply-To", "one@example.com");
        headers.add("Subject", "Hi");
        headers.add("reply-to", "two@example.com");
        assert_eq!(headers.get_all("Reply-To"), vec!["one@example.com", "two@example.com"]);

        headers.set("Reply-To", "team@example.com");
        assert_eq!(headers.get_all("Reply-To"), vec!["team@example.com"]);
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Reply-To", "Subject"]);
    }

    #[test]
    fn test_remove_all_occurrences() {
        let mut headers = Headers::new();
        headers.add("Return-Receipt-To", "a@example.com");
        headers.add("RETURN-RECEIPT-TO", "b@example.com");
        assert!(headers.contains("return-receipt-to"));

        headers.remove("Return-Receipt-To");
        assert!(!headers.contains("Return-Receipt-To"));
        assert_eq!(headers.len(), 0);
    }

    #[test]
    fn test_parse_embedded_message_head() {
        let text = concat!(
            "Subject: Forwarded\r\n",
            "Content-Type: text/plain;\r\n",
            "\tcharset=iso-8859-1\r\n",
            "Content-Transfer-Encoding: 8bit\r\n",
            "\r\n",
            "X-Not: a header\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=iso-8859-1"));
        assert_eq!(headers.get("content-transfer-encoding"), Some("8bit"));
        assert!(!headers.contains("X-Not"));
    }

    #[test]
    fn test_encode_value_only_when_needed() {
        let encoded = Headers::encode_value("Grüße aus Köln").unwrap();
        assert_eq!(encoded, "=?utf-8?B?R3LDvMOfZSBhdXMgS8O2bG4=?=");
        assert_eq!(Headers::encode_value("Plain subject").unwrap(), "Plain subject");
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("not a header line\r\n").is_err());
    }

    #[test]
    fn test_display_keeps_insertion_order() {
        let mut headers = Headers::new();
        headers.add("MIME-Version", "1.0");
        headers.add("Date", "Mon, 1 Jan 2024 00:00:00 +0000");

        assert_eq!(
            headers.to_string(),
            "MIME-Version: 1.0\r\nDate: Mon, 1 Jan 2024 00:00:00 +0000\r\n"
        );
    }

    #[test]
    fn test_fold_long_value() {
        let value = (0..30).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let folded = fold("X-Long", &value);
        for line in folded.split("\r\n") {
            assert!(line.len() <= 78, "{line}");
        }
        assert!(folded.contains("\r\n "));
        let unfolded = folded.replace("\r\n", "");
        assert_eq!(unfolded, format!("X-Long: {value}"));
    }

    #[test]
    fn test_fold_short_value_untouched() {
        assert_eq!(fold("Subject", "Hello"), "Subject: Hello");
    }
}
