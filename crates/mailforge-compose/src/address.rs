//! Email address types.

use crate::error::{Error, Result};
use mailforge_mime::encoding::{encode_rfc2047, is_header_safe};

/// Characters that force a display name into a quoted string (RFC 5322 specials).
const SPECIALS: &[char] = &[
    '(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"',
];

/// Email address (`local@domain`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>' || c == ',')
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {addr}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!(
                "Address must contain @: {addr}"
            )));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        Ok(())
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: Address,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            address: Address::new(address)?,
        })
    }

    /// Creates a new mailbox with a display name and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: Some(name.into()),
            address: Address::new(address)?,
        })
    }

    /// Parses `addr`, `Name <addr>` or `"Quoted Name" <addr>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input is malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidAddress("Mailbox cannot be empty".into()));
        }

        let Some(open) = input.rfind('<') else {
            return Self::new(input);
        };
        let addr = input[open + 1..]
            .strip_suffix('>')
            .ok_or_else(|| Error::InvalidAddress(format!("Unterminated angle address: {input}")))?;

        let name = unquote(input[..open].trim());
        let address = Address::new(addr.trim())?;
        Ok(Self {
            name: (!name.is_empty()).then_some(name),
            address,
        })
    }

    /// Renders the mailbox for an address header.
    ///
    /// Non-ASCII display names are RFC 2047 encoded; names containing
    /// specials are quoted.
    ///
    /// # Errors
    ///
    /// Returns an error if the display name cannot be encoded.
    pub fn to_header_value(&self) -> Result<String> {
        let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) else {
            return Ok(self.address.to_string());
        };

        let rendered = if !is_header_safe(name) {
            encode_rfc2047(name, "utf-8")?
        } else if name.contains(SPECIALS) {
            format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            name.to_string()
        };
        Ok(format!("{rendered} <{}>", self.address))
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Parses a comma-separated mailbox list.
///
/// Commas inside quoted names or angle brackets do not split. Empty entries
/// are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if any entry is malformed.
pub fn parse_mailbox_list(input: &str) -> Result<Vec<Mailbox>> {
    let mut mailboxes = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                escaped = true;
                current.push(c);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(c);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(c);
            }
            ',' if !in_quotes && !in_angle => {
                push_entry(&mut mailboxes, &current)?;
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(Error::InvalidAddress(format!(
            "Unterminated quoted name: {input}"
        )));
    }
    push_entry(&mut mailboxes, &current)?;
    Ok(mailboxes)
}

/// Renders a mailbox list for an address header.
///
/// # Errors
///
/// Returns an error if a display name cannot be encoded.
pub fn format_mailbox_list(mailboxes: &[Mailbox]) -> Result<String> {
    let rendered = mailboxes
        .iter()
        .map(Mailbox::to_header_value)
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join(", "))
}

fn push_entry(mailboxes: &mut Vec<Mailbox>, entry: &str) -> Result<()> {
    if !entry.trim().is_empty() {
        mailboxes.push(Mailbox::parse(entry)?);
    }
    Ok(())
}

fn unquote(name: &str) -> String {
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or_else(
            || name.to_string(),
            |inner| inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        )
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.local_part(), "user");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("us er@example.com").is_err());
    }

    #[test]
    fn test_mailbox_with_name() {
        let mailbox = Mailbox::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("John Doe"));
        assert_eq!(mailbox.address.as_str(), "john@example.com");
    }

    #[test]
    fn test_parse_forms() {
        let bare = Mailbox::parse("  alice@example.com ").unwrap();
        assert!(bare.name.is_none());

        let named = Mailbox::parse("Alice Smith <alice@example.com>").unwrap();
        assert_eq!(named.name.as_deref(), Some("Alice Smith"));
        assert_eq!(named.address.as_str(), "alice@example.com");

        let quoted = Mailbox::parse(r#""Smith, Alice" <alice@example.com>"#).unwrap();
        assert_eq!(quoted.name.as_deref(), Some("Smith, Alice"));

        let angle_only = Mailbox::parse("<bob@example.com>").unwrap();
        assert!(angle_only.name.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Mailbox::parse("").is_err());
        assert!(Mailbox::parse("Alice <alice@example.com").is_err());
        assert!(Mailbox::parse("Alice <not-an-address>").is_err());
    }

    #[test]
    fn test_parse_mailbox_list() {
        let list = parse_mailbox_list(
            r#"alice@example.com, "Doe, Bob" <bob@example.com>,, Carol <carol@example.com>"#,
        )
        .unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1].name.as_deref(), Some("Doe, Bob"));
        assert_eq!(list[2].address.as_str(), "carol@example.com");

        assert!(parse_mailbox_list("").unwrap().is_empty());
        assert!(parse_mailbox_list(r#""open <a@b.c>"#).is_err());
    }

    #[test]
    fn test_header_value_rendering() {
        let plain = Mailbox::with_name("Alice", "alice@example.com").unwrap();
        assert_eq!(plain.to_header_value().unwrap(), "Alice <alice@example.com>");

        let special = Mailbox::with_name("Smith, Alice", "alice@example.com").unwrap();
        assert_eq!(
            special.to_header_value().unwrap(),
            "\"Smith, Alice\" <alice@example.com>"
        );

        let unicode = Mailbox::with_name("Zoë", "zoe@example.com").unwrap();
        let value = unicode.to_header_value().unwrap();
        assert!(value.starts_with("=?utf-8?B?"));
        assert!(value.ends_with("?= <zoe@example.com>"));

        let bare = Mailbox::new("bob@example.com").unwrap();
        assert_eq!(bare.to_header_value().unwrap(), "bob@example.com");
    }

    #[test]
    fn test_control_characters_in_name_are_encoded() {
        let mailbox = Mailbox::with_name("Alice\r\nBcc: eve@example.com", "alice@example.com").unwrap();
        let value = mailbox.to_header_value().unwrap();
        assert!(!value.contains(['\r', '\n']));
        assert!(value.starts_with("=?utf-8?B?"));
    }

    #[test]
    fn test_format_mailbox_list() {
        let list = vec![
            Mailbox::new("a@example.com").unwrap(),
            Mailbox::with_name("B", "b@example.com").unwrap(),
        ];
        assert_eq!(
            format_mailbox_list(&list).unwrap(),
            "a@example.com, B <b@example.com>"
        );
    }

    #[test]
    fn test_address_serde() {
        let addr = Address::new("user@example.com").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"user@example.com\"");
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
