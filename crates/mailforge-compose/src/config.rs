//! Builder configuration.

use crate::error::Result;
use mailforge_mime::TextEncoding;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Default name of the draft metadata header.
pub const DEFAULT_DRAFT_HEADER: &str = "X-Mailforge-Identity";

/// One-way switch that forces sign-safe text encoding.
///
/// Clones share the same state. Once engaged, every subsequent build using
/// a config that shares this latch renders text sign-safe, so a retry after
/// a failed signing attempt produces bytes the provider can sign.
#[derive(Debug, Clone, Default)]
pub struct SignSafeLatch(Arc<AtomicBool>);

impl SignSafeLatch {
    /// Creates a disengaged latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engages the latch. Returns true if this call flipped it.
    pub fn engage(&self) -> bool {
        let flipped = !self.0.swap(true, Ordering::SeqCst);
        if flipped {
            info!("Sign-safe text encoding engaged");
        }
        flipped
    }

    /// Returns true once the latch has been engaged.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns the text encoding builds should use right now.
    #[must_use]
    pub fn text_encoding(&self) -> TextEncoding {
        if self.is_engaged() {
            TextEncoding::SignSafe
        } else {
            TextEncoding::Standard
        }
    }
}

/// Message builder configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Render the `Date` header in UTC instead of local time.
    pub hide_time_zone: bool,
    /// Leave out the `User-Agent` header.
    pub hide_user_agent: bool,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Name of the header that carries draft metadata.
    pub draft_header: String,
    /// Sign-safe latch shared by every clone of this config.
    #[serde(skip)]
    pub sign_safe: SignSafeLatch,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            hide_time_zone: false,
            hide_user_agent: false,
            user_agent: format!("mailforge/{}", env!("CARGO_PKG_VERSION")),
            draft_header: DEFAULT_DRAFT_HEADER.to_string(),
            sign_safe: SignSafeLatch::new(),
        }
    }
}

impl ComposeConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Sets whether the time zone is hidden.
    #[must_use]
    pub const fn hide_time_zone(mut self, hide: bool) -> Self {
        self.hide_time_zone = hide;
        self
    }

    /// Sets whether the `User-Agent` header is left out.
    #[must_use]
    pub const fn hide_user_agent(mut self, hide: bool) -> Self {
        self.hide_user_agent = hide;
        self
    }

    /// Sets the `User-Agent` value.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
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
    fn test_latch_is_one_way() {
        let latch = SignSafeLatch::new();
        assert!(!latch.is_engaged());
        assert_eq!(latch.text_encoding(), TextEncoding::Standard);

        assert!(latch.engage());
        assert!(!latch.engage());
        assert!(latch.is_engaged());
        assert_eq!(latch.text_encoding(), TextEncoding::SignSafe);
    }

    #[test]
    fn test_cloned_config_shares_latch() {
        let config = ComposeConfig::new();
        let clone = config.clone();
        clone.sign_safe.engage();
        assert!(config.sign_safe.is_engaged());

        let fresh = ComposeConfig::new();
        assert!(!fresh.sign_safe.is_engaged());
    }

    #[test]
    fn test_defaults() {
        let config = ComposeConfig::default();
        assert!(!config.hide_time_zone);
        assert!(!config.hide_user_agent);
        assert!(config.user_agent.starts_with("mailforge/"));
        assert_eq!(config.draft_header, DEFAULT_DRAFT_HEADER);
    }

    #[test]
    fn test_from_json_partial() {
        let config = ComposeConfig::from_json(r#"{"hide_time_zone": true}"#).unwrap();
        assert!(config.hide_time_zone);
        assert_eq!(config.draft_header, DEFAULT_DRAFT_HEADER);
        assert!(!config.sign_safe.is_engaged());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(ComposeConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "mailforge-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"hide_user_agent": true, "draft_header": "X-Draft"}"#).unwrap();
        let config = ComposeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(config.hide_user_agent);
        assert_eq!(config.draft_header, "X-Draft");
        assert!(matches!(
            ComposeConfig::load(&path),
            Err(crate::error::Error::Io(_))
        ));
    }

    #[test]
    fn test_fluent_setters() {
        let config = ComposeConfig::new()
            .hide_user_agent(true)
            .user_agent("Custom/1.0");
        assert!(config.hide_user_agent);
        assert_eq!(config.user_agent, "Custom/1.0");
    }
}
