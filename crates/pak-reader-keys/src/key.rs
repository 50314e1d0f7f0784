//! The [`AesKey`] value type.

use crate::{Error, Result};

/// An AES key of a length AES itself accepts: 16 (AES-128), 24
/// (AES-192), or 32 (AES-256) bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey(Vec<u8>);

impl AesKey {
    /// Build a key from raw bytes, rejecting any length other than
    /// 16, 24, or 32 bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(bytes)),
            n => Err(Error::InvalidKey(n)),
        }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The key length in bytes (16, 24, or 32).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Keys are never empty (the shortest accepted length is 16).
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AesKey({} bytes, redacted)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_lengths() {
        assert!(AesKey::new(vec![0u8; 16]).is_ok());
        assert!(AesKey::new(vec![0u8; 24]).is_ok());
        assert!(AesKey::new(vec![0u8; 32]).is_ok());
    }

    #[test]
    fn rejects_invalid_lengths() {
        assert!(AesKey::new(vec![0u8; 15]).is_err());
        assert!(AesKey::new(vec![0u8; 20]).is_err());
        assert!(AesKey::new(vec![]).is_err());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = AesKey::new(vec![0xAAu8; 16]).unwrap();
        assert!(!format!("{:?}", key).contains("AA"));
    }
}
