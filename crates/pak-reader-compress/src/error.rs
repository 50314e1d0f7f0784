//! Errors for the decompression registry.

use thiserror::Error;

/// Errors raised while decoding a compressed block or buffer.
#[derive(Debug, Error)]
pub enum Error {
    /// A method with no registered decoder, or an unimplemented
    /// built-in (`oodle` unless a plug-in has been registered).
    #[error("unsupported compression method: {method}")]
    Unsupported {
        /// The method name that was requested.
        method: String,
    },

    /// The underlying decoder failed.
    #[error("decompression failed for method {method}: {reason}")]
    Failed {
        /// The method name in use.
        method: String,
        /// The underlying error, as text.
        reason: String,
    },

    /// The decoder produced a different number of bytes than expected.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// The size the caller asked for.
        expected: usize,
        /// The size the decoder actually produced.
        actual: usize,
    },
}

/// Result type alias using the compression registry's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
