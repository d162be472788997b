//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid MIME header.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// External body content could not be read.
    #[error("Failed to read body content from {path}: {source}")]
    BodyAccess {
        /// Location of the external content.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Serialization sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A part cannot be made safe for 7-bit transport.
    #[error("Cannot downgrade to 7-bit transport: {0}")]
    SevenBitDowngrade(String),
}
