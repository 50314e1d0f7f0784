//! Errors for PAK container parsing and extraction.

use thiserror::Error;

/// Errors raised while opening or reading a PAK archive.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary layout error from the shared reader.
    #[error("{0}")]
    Common(#[from] pak_reader_common::Error),

    /// Footer magic didn't match.
    #[error("invalid PAK magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    /// A format detail the reader can't make sense of (unknown
    /// version, unresolvable compression method index, etc).
    #[error("unsupported PAK format: {0}")]
    UnsupportedFormat(String),

    /// Structurally invalid data (bad entry count, residual bytes,
    /// truncated buffers).
    #[error("corrupt PAK data: {0}")]
    Corrupt(String),

    /// AES-ECB decryption failed, or no key was available.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A compression decoder failed for a whole-payload or
    /// per-block decode.
    #[error("decompression failed: {0}")]
    Compression(String),

    /// No entry at the requested path.
    #[error("entry not found: {0}")]
    EntryNotFound(String),
}

/// Result type alias using the PAK crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
