//! Errors for the virtual file system.

use thiserror::Error;

/// Errors raised by [`crate::Vfs`] and the archive handles it mounts.
///
/// Unlike the container-level error types, this one is [`Clone`]: a
/// single failed load is reported to every waiter on the same
/// in-flight request, which means the same error value is
/// delivered more than once.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A mounted archive's `has`/`get`/`info`/`list` call failed.
    /// The underlying container error's `Display` text is preserved;
    /// the concrete type is erased so this error stays `Clone`.
    #[error("archive error: {0}")]
    Archive(String),

    /// The archive backing this mount has been closed.
    #[error("archive is closed")]
    Closed,

    /// The caller's future was dropped before the load completed. The
    /// load itself (if already running) is unaffected and still
    /// populates the cache for other callers.
    #[error("load was cancelled")]
    Cancelled,

    /// The blocking extraction task panicked.
    #[error("background load task failed: {0}")]
    Join(String),
}

/// Result type alias using the VFS crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<pak_reader_pak::Error> for Error {
    fn from(e: pak_reader_pak::Error) -> Self {
        Error::Archive(e.to_string())
    }
}

impl From<pak_reader_iostore::Error> for Error {
    fn from(e: pak_reader_iostore::Error) -> Self {
        Error::Archive(e.to_string())
    }
}
