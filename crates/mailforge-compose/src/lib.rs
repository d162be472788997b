//! # mailforge-compose
//!
//! Assembles outgoing email messages and drafts.
//!
//! ## Features
//!
//! - **Text bodies**: Reply above or below the quote, signature placement, HTML with plain fallback
//! - **Attachments**: RFC 2047/2231 file names, lazy file content, embedded messages
//! - **Drafts**: Editor state stored in a metadata header
//! - **PGP/MIME**: Detached signatures and encryption through a pluggable provider (RFC 3156)
//!
//! ## Quick Start
//!
//! ### Building a Message
//!
//! ```ignore
//! use mailforge_compose::{ComposeConfig, Identity, Mailbox, MessageBuilder, MessageSpec};
//!
//! let spec = MessageSpec::builder(Identity::new("Alice", "alice@example.com"))
//!     .to(Mailbox::parse("Bob <bob@example.com>")?)
//!     .subject("Lunch?")
//!     .text("Are you free at noon?")
//!     .build();
//!
//! let message = MessageBuilder::new(ComposeConfig::default()).build(&spec).await?;
//! let bytes = message.to_bytes()?;
//! ```
//!
//! ### Signing
//!
//! ```ignore
//! use mailforge_compose::{ComposeConfig, CryptoRequest, MessageBuilder};
//!
//! // `provider` implements `CryptoProvider`
//! let builder = MessageBuilder::with_crypto(ComposeConfig::default(), provider);
//! let spec = spec_builder.sign(CryptoRequest::detached_sign()).build();
//! let signed = builder.build(&spec).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod attachment;
pub mod builder;
pub mod config;
pub mod draft;
pub mod error;
pub mod identity;
pub mod pgp;
pub mod spec;
pub mod text;

pub use address::{Address, Mailbox, format_mailbox_list, parse_mailbox_list};
pub use builder::MessageBuilder;
pub use config::{ComposeConfig, SignSafeLatch};
pub use draft::DraftMetadata;
pub use error::{Error, Result};
pub use identity::Identity;
pub use pgp::{
    CryptoError, CryptoOperation, CryptoProvider, CryptoRequest, CryptoResult, CryptoStatus,
    NoCrypto, PgpMime,
};
pub use spec::{
    AttachmentDescriptor, DraftState, LoadingState, MessageFormat, MessageReference, MessageSpec,
    MessageSpecBuilder, QuoteStyle, QuotedHtml, QuotedTextMode, QuotingPolicy,
};
pub use text::TextContent;

pub use mailforge_mime;
