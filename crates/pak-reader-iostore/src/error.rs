//! Errors for IoStore container parsing and extraction.

use thiserror::Error;

/// Errors raised while opening or reading an IoStore `.utoc`/`.ucas`
/// pair.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary layout error from the shared reader.
    #[error("{0}")]
    Common(#[from] pak_reader_common::Error),

    /// TOC magic didn't match.
    #[error("invalid IoStore TOC magic")]
    InvalidMagic,

    /// The header's declared size didn't match what this reader expects.
    #[error("unexpected TOC header size: expected {expected}, got {actual}")]
    InvalidHeaderSize { expected: u32, actual: u32 },

    /// A format detail this reader can't make sense of.
    #[error("unsupported IoStore format: {0}")]
    UnsupportedFormat(String),

    /// Structurally invalid data.
    #[error("corrupt IoStore data: {0}")]
    Corrupt(String),

    /// AES-ECB decryption failed, or no key was available.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A compression decoder failed for a block decode.
    #[error("decompression failed: {0}")]
    Compression(String),

    /// No chunk at the requested path or id.
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),
}

/// Result type alias using the IoStore crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
