//! # mailforge-mime
//!
//! MIME building blocks for outgoing email.
//!
//! ## Features
//!
//! - **Part trees**: Leaf and multipart nodes with boundaries fixed at construction
//! - **Deterministic serialization**: The same tree always yields the same bytes
//! - **Encoding**: Base64, Quoted-Printable (with sign-safe mode), RFC 2047, RFC 2231
//! - **Content types**: Ordered parameters, content disposition
//! - **7-bit transport**: Re-encode a tree so nothing relies on 8-bit transport
//!
//! ## Quick Start
//!
//! ### Building a Part Tree
//!
//! ```ignore
//! use mailforge_mime::{ContentType, Leaf, Multipart, TextEncoding};
//!
//! let html = Leaf::text("<p>Hello</p>", ContentType::text_html(), TextEncoding::Standard);
//! let plain = Leaf::text("Hello", ContentType::text_plain(), TextEncoding::Standard);
//! let body = Multipart::new("alternative", vec![html.into(), plain.into()]);
//!
//! let bytes = mailforge_mime::MimePart::from(body).to_bytes()?;
//! ```
//!
//! ### Attachments
//!
//! ```ignore
//! use mailforge_mime::{BodySource, ContentDisposition, ContentType, Leaf, TransferEncoding};
//!
//! let pdf = Leaf::binary(
//!     BodySource::File("report.pdf".into()),
//!     ContentType::new("application", "pdf").with_parameter("name", "report.pdf"),
//!     TransferEncoding::Base64,
//! )
//! .with_disposition(&ContentDisposition::attachment().with_parameter("filename", "report.pdf"));
//! ```
//!
//! ### Encoding
//!
//! ```ignore
//! use mailforge_mime::encoding::{encode_quoted_printable_bytes, encode_rfc2047};
//!
//! // Sign-safe quoted-printable escapes "From " at line start
//! let encoded = encode_quoted_printable_bytes(b"From me", true);
//! assert_eq!(encoded, "=46rom me");
//!
//! let word = encode_rfc2047("Héllo", "utf-8")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;
mod part;

pub mod encoding;

pub use content_type::{ContentDisposition, ContentType, Parameters};
pub use error::{Error, Result};
pub use header::{Headers, fold};
pub use message::{EncryptionType, Message};
pub use part::{
    Body, BodySource, Leaf, MimePart, Multipart, TextEncoding, TransferEncoding,
    generate_boundary,
};
