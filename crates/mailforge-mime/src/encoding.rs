//! MIME transfer and header encodings.
//!
//! Supports Base64, Quoted-Printable (with an RFC 3156 sign-safe mode),
//! RFC 2047 encoded words and RFC 2231 extended parameters.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Maximum line length for Quoted-Printable and Base64 bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded word.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Upper-case hex digits for `=XX` escapes.
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Longest parameter value emitted on one line before RFC 2231 continuations kick in.
const MAX_PARAMETER_LENGTH: usize = 60;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-separated lines of 76 characters.
///
/// The result carries no trailing line break.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        // Base64 output is pure ASCII.
        result.extend(chunk.iter().map(|&b| b as char));
    }

    result
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// CRLF and bare LF are treated as hard line breaks and emitted as CRLF.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    encode_quoted_printable_bytes(text.as_bytes(), false)
}

/// Encodes bytes using Quoted-Printable encoding.
///
/// With `sign_safe` set, a line beginning with `From ` has its `F` encoded
/// (RFC 3156 section 3) so that mail transports cannot mangle it into
/// `>From `. Trailing whitespace is always encoded.
#[must_use]
pub fn encode_quoted_printable_bytes(data: &[u8], sign_safe: bool) -> String {
    let mut result = String::with_capacity(data.len() + data.len() / 8);
    let mut lines = split_lines(data).peekable();

    while let Some(line) = lines.next() {
        encode_qp_line(line, sign_safe, &mut result);
        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

/// Splits on CRLF or bare LF, dropping the terminators.
fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

fn encode_qp_line(line: &[u8], sign_safe: bool, out: &mut String) {
    let mut column = 0;

    for (i, &byte) in line.iter().enumerate() {
        let at_line_end = i + 1 == line.len();
        let from_line = sign_safe && column == 0 && line[i..].starts_with(b"From ");

        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => !from_line,
            b' ' | b'\t' => !at_line_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Keep room for the soft break marker.
        if column + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            column = 0;
            if sign_safe && line[i..].starts_with(b"From ") {
                out.push_str("=46");
                column = 3;
                continue;
            }
        }

        if literal {
            out.push(byte as char);
        } else {
            out.push('=');
            out.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
            out.push(char::from(HEX_DIGITS[usize::from(byte & 0x0F)]));
        }
        column += width;
    }
}

/// Returns true if the value can appear in a header without RFC 2047 encoding.
#[must_use]
pub fn is_header_safe(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_graphic() || c == ' ') && !text.contains("=?")
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?B?encoded-text?=`. Long values are split into several
/// encoded words separated by a space, never splitting a character.
///
/// # Arguments
///
/// * `text` - Text to encode
/// * `charset` - Character set (e.g., "utf-8")
///
/// # Errors
///
/// Returns an error if the charset name cannot fit in an encoded word.
pub fn encode_rfc2047(text: &str, charset: &str) -> Result<String> {
    // Only encode if necessary
    if is_header_safe(text) {
        return Ok(text.to_string());
    }

    let overhead = charset.len() + "=??B??=".len();
    if overhead + 4 > MAX_ENCODED_WORD_LENGTH {
        return Err(Error::InvalidEncoding(format!(
            "Charset name too long for an encoded word: {charset}"
        )));
    }
    // Raw bytes per word: base64 expands 3 -> 4.
    let budget = (MAX_ENCODED_WORD_LENGTH - overhead) / 4 * 3;

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        if chunk.len() + c.len_utf8() > budget {
            words.push(encoded_word(&chunk, charset));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk, charset));
    }

    Ok(words.join(" "))
}

fn encoded_word(chunk: &str, charset: &str) -> String {
    let encoded = encode_base64(chunk.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

/// Encodes a MIME parameter per RFC 2231 when required.
///
/// Returns the `(name, value)` pairs to emit. Short printable ASCII values
/// come back unchanged under the plain name. Other values are percent
/// encoded as `name*=utf-8''...`, and split into `name*0*`, `name*1*`, ...
/// continuations when the encoded form is too long for one line.
#[must_use]
pub fn encode_rfc2231_parameter(name: &str, value: &str) -> Vec<(String, String)> {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_graphic() || c == ' ')
        && !value.contains('"')
        && !value.contains('\\');
    if plain && value.len() <= MAX_PARAMETER_LENGTH {
        return vec![(name.to_string(), value.to_string())];
    }

    let prefix = "utf-8''";
    let atoms = percent_encode_attr(value);
    let encoded_len: usize = atoms.iter().map(String::len).sum();
    if prefix.len() + encoded_len <= MAX_PARAMETER_LENGTH {
        return vec![(format!("{name}*"), format!("{prefix}{}", atoms.concat()))];
    }

    // Sections break between atoms so a %XX triplet is never split.
    let mut sections = Vec::new();
    let mut current = String::from(prefix);
    for atom in atoms {
        if current.len() + atom.len() > MAX_PARAMETER_LENGTH && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(&atom);
    }
    if !current.is_empty() {
        sections.push(current);
    }

    sections
        .into_iter()
        .enumerate()
        .map(|(i, section)| (format!("{name}*{i}*"), section))
        .collect()
}

/// Percent-encodes everything outside the RFC 2231 `attribute-char` set,
/// one atom per input byte.
fn percent_encode_attr(value: &str) -> Vec<String> {
    value
        .bytes()
        .map(|byte| {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                (byte as char).to_string()
            } else {
                format!("%{byte:02X}")
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_base64(data: &str) -> Vec<u8> {
        let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(cleaned).unwrap()
    }

    fn decode_quoted_printable(text: &str) -> String {
        let bytes = text.replace("=\r\n", "").into_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'=' {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).unwrap()
    }

    /// Decodes space-separated `=?utf-8?B?...?=` words.
    fn decode_b_words(text: &str) -> String {
        if !text.contains("=?") {
            return text.to_string();
        }
        let bytes: Vec<u8> = text
            .split(' ')
            .flat_map(|word| {
                let inner = word.strip_prefix("=?utf-8?B?").unwrap().strip_suffix("?=").unwrap();
                decode_base64(inner)
            })
            .collect();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_wrapped_line_length() {
        let data = vec![0xAB_u8; 200];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76);
        }
        assert!(!encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(&encoded), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        let text = "Hello, World!";
        let encoded = encode_quoted_printable(text);
        assert_eq!(encoded, "Hello, World!");

        let encoded = encode_quoted_printable("Héllo, Wørld!");
        assert_eq!(encoded, "H=C3=A9llo, W=C3=B8rld!");
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_hard_line_breaks() {
        let encoded = encode_quoted_printable("one\r\ntwo\nthree");
        assert_eq!(encoded, "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        let encoded = encode_quoted_printable("trailing \r\nnext\t");
        assert_eq!(encoded, "trailing=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_sign_safe_from() {
        let text = "From here on\r\nnot From here";
        assert_eq!(encode_quoted_printable(text), text);

        let encoded = encode_quoted_printable_bytes(text.as_bytes(), true);
        assert_eq!(encoded, "=46rom here on\r\nnot From here");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let text = "a".repeat(200);
        let encoded = encode_quoted_printable(&text);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert_eq!(decode_quoted_printable(&encoded), text);
    }

    #[test]
    fn test_rfc2047_encode() {
        let text = "Hello";
        let encoded = encode_rfc2047(text, "utf-8").unwrap();
        assert_eq!(encoded, "Hello"); // No encoding needed

        let text = "Héllo";
        let encoded = encode_rfc2047(text, "utf-8").unwrap();
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_rfc2047_long_value_splits_words() {
        let text = "Ünïcødé ".repeat(12);
        let encoded = encode_rfc2047(&text, "utf-8").unwrap();
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= 75);
        }
        assert_eq!(decode_b_words(&encoded), text);
    }

    #[test]
    fn test_rfc2231_plain_value() {
        let params = encode_rfc2231_parameter("filename", "report.pdf");
        assert_eq!(params, vec![("filename".to_string(), "report.pdf".to_string())]);
    }

    #[test]
    fn test_rfc2231_non_ascii_value() {
        let params = encode_rfc2231_parameter("filename", "résumé.pdf");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].0, "filename*");
        assert_eq!(params[0].1, "utf-8''r%C3%A9sum%C3%A9.pdf");
    }

    #[test]
    fn test_rfc2231_continuations() {
        let name = format!("{}.txt", "ß".repeat(40));
        let params = encode_rfc2231_parameter("filename", &name);
        assert!(params.len() > 1);
        for (i, (key, value)) in params.iter().enumerate() {
            assert_eq!(key, &format!("filename*{i}*"));
            assert!(value.len() <= 60);
            // No dangling percent triplets.
            let tail = value.rsplit('%').next().unwrap();
            if value.contains('%') {
                assert!(tail.len() >= 2);
            }
        }
        assert!(params[0].1.starts_with("utf-8''"));
    }

    proptest! {
        #[test]
        fn prop_quoted_printable_round_trip(text in "[ -~\u{e0}-\u{ff}]{0,300}") {
            let encoded = encode_quoted_printable(&text);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= 76);
            }
            prop_assert_eq!(decode_quoted_printable(&encoded), text);
        }

        #[test]
        fn prop_sign_safe_never_emits_from_line(text in "(From |[a-z ]{0,10}\r\n){0,20}") {
            let encoded = encode_quoted_printable_bytes(text.as_bytes(), true);
            for line in encoded.split("\r\n") {
                prop_assert!(!line.starts_with("From "));
                prop_assert!(!line.ends_with(' '));
            }
        }

        #[test]
        fn prop_rfc2047_round_trip(text in "\\PC{0,80}") {
            let encoded = encode_rfc2047(&text, "utf-8").unwrap();
            prop_assert!(encoded.is_ascii());
            if encoded.contains("=?") {
                prop_assert_eq!(decode_b_words(&encoded), text);
            }
        }
    }
}
