//! Sender identity.

use crate::address::{Mailbox, parse_mailbox_list};
use crate::error::{Error, Result};

/// The identity a message is sent as.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    /// Display name.
    pub name: String,
    /// Sender email address.
    pub email: String,
    /// Optional Reply-To address list, parsed when the message is built.
    pub reply_to: Option<String>,
    /// Signature text appended to new messages.
    pub signature: Option<String>,
    /// Whether the signature is appended at all.
    pub signature_use: bool,
    /// Label shown to the user when choosing an identity.
    pub description: Option<String>,
}

impl Identity {
    /// Creates an identity without signature or Reply-To.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Sets the Reply-To address list.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the signature and enables it.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self.signature_use = true;
        self
    }

    /// Returns the sender mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] if the email is empty and
    /// [`Error::InvalidAddress`] if it is malformed.
    pub fn mailbox(&self) -> Result<Mailbox> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(Error::MissingField("identity email"));
        }
        if self.name.trim().is_empty() {
            Mailbox::new(email)
        } else {
            Mailbox::with_name(self.name.trim(), email)
        }
    }

    /// Returns the parsed Reply-To list, empty when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the list is malformed.
    pub fn reply_to_mailboxes(&self) -> Result<Vec<Mailbox>> {
        self.reply_to
            .as_deref()
            .map_or_else(|| Ok(Vec::new()), parse_mailbox_list)
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
    fn test_mailbox() {
        let identity = Identity::new("Alice", "alice@example.com");
        let mailbox = identity.mailbox().unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Alice"));
        assert_eq!(mailbox.address.as_str(), "alice@example.com");

        let nameless = Identity::new("", "alice@example.com");
        assert!(nameless.mailbox().unwrap().name.is_none());
    }

    #[test]
    fn test_mailbox_requires_email() {
        let identity = Identity::new("Alice", "  ");
        assert!(matches!(
            identity.mailbox(),
            Err(Error::MissingField("identity email"))
        ));

        let bad = Identity::new("Alice", "not-an-address");
        assert!(matches!(bad.mailbox(), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn test_reply_to() {
        let identity = Identity::new("Alice", "alice@example.com");
        assert!(identity.reply_to_mailboxes().unwrap().is_empty());

        let identity = identity.with_reply_to("Team <team@example.com>, help@example.com");
        let list = identity.reply_to_mailboxes().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Team"));

        let broken = Identity::new("Alice", "alice@example.com").with_reply_to("nope");
        assert!(broken.reply_to_mailboxes().is_err());
    }

    #[test]
    fn test_with_signature_enables_use() {
        let identity = Identity::new("Alice", "alice@example.com").with_signature("-- \r\nAlice");
        assert!(identity.signature_use);
        assert_eq!(identity.signature.as_deref(), Some("-- \r\nAlice"));
    }
}
