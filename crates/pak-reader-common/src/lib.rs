//! Common utilities shared by the pak-reader crates.
//!
//! This crate provides the foundational pieces used by the container
//! readers and the virtual file system built on top of them:
//!
//! - [`BinaryReader`] - zero-copy binary reading from byte slices
//! - [`Error`] / [`Result`] - the shared error taxonomy

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience.
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Render a 16-byte key/container identifier as a canonical, upper-case,
/// hyphenated GUID string (`XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`), using
/// standard UUID group ordering (not CIG's custom byte layout).
pub fn format_key_id(bytes: &[u8; 16]) -> String {
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

/// A logical file's path, uncompressed size, and whether it is stored
/// compressed, as reported by a container's `info`/`list` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Canonical, case-preserved display path.
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Whether the entry is stored under a non-identity compression method.
    pub compressed: bool,
    /// Whether the entry's payload is AES encrypted.
    pub encrypted: bool,
}

/// Parse a canonical hyphenated GUID string back into 16 raw bytes.
pub fn parse_key_id(s: &str) -> Result<[u8; 16]> {
    let clean: String = s.chars().filter(|c| *c != '-').collect();
    if clean.len() != 32 {
        return Err(Error::ExpectedValue {
            expected: "32 hex characters (with optional hyphens)".to_string(),
            actual: format!("{} characters", s.len()),
        });
    }
    let mut bytes = [0u8; 16];
    for (i, b) in bytes.iter_mut().enumerate() {
        let hex = &clean[i * 2..i * 2 + 2];
        *b = u8::from_str_radix(hex, 16).map_err(|_| Error::ExpectedValue {
            expected: "hex digits".to_string(),
            actual: hex.to_string(),
        })?;
    }
    Ok(bytes)
}
