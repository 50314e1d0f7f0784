//! Errors for the key registry.

use thiserror::Error;

/// Errors raised by [`crate::KeyRegistry`].
#[derive(Debug, Error)]
pub enum Error {
    /// A key of the wrong length was registered. AES accepts 16, 24, or
    /// 32-byte keys (AES-128/192/256); anything else is rejected at
    /// registration time rather than failing later at decrypt time.
    #[error("invalid key length: expected 16, 24, or 32 bytes, got {0}")]
    InvalidKey(usize),
}

/// Result type alias using the key registry's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
