//! The [`Decoder`] trait and built-in implementations.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder};

use crate::{Error, Result};

/// A single compression method's decode step.
///
/// Implementations receive the full compressed buffer for one block
/// (or one whole unsplit payload) and the uncompressed size the
/// caller expects, so they can preallocate and validate the result.
pub trait Decoder: Send + Sync {
    /// Decode `input`, returning exactly `expected_size` bytes on
    /// success.
    fn decode(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>>;
}

/// The identity decoder for `method = none`: the input is already
/// uncompressed and is returned as-is.
pub struct NoneDecoder;

impl Decoder for NoneDecoder {
    fn decode(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        if input.len() != expected_size {
            return Err(Error::SizeMismatch {
                expected: expected_size,
                actual: input.len(),
            });
        }
        Ok(input.to_vec())
    }
}

/// Raw DEFLATE, not zlib-wrapped, matching how PAK containers store
/// their `zlib`-named method.
pub struct ZlibDecoder;

impl Decoder for ZlibDecoder {
    fn decode(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(input);
        let mut out = Vec::with_capacity(expected_size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Failed {
                method: "zlib".to_string(),
                reason: e.to_string(),
            })?;
        if out.len() != expected_size {
            return Err(Error::SizeMismatch {
                expected: expected_size,
                actual: out.len(),
            });
        }
        Ok(out)
    }
}

/// Gzip-wrapped DEFLATE.
pub struct GzipDecoder;

impl Decoder for GzipDecoder {
    fn decode(&self, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(input);
        let mut out = Vec::with_capacity(expected_size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Failed {
                method: "gzip".to_string(),
                reason: e.to_string(),
            })?;
        if out.len() != expected_size {
            return Err(Error::SizeMismatch {
                expected: expected_size,
                actual: out.len(),
            });
        }
        Ok(out)
    }
}

/// Always fails; occupies the `oodle` slot until a plug-in decoder is
/// registered in its place.
pub struct UnsupportedDecoder {
    pub(crate) method: String,
}

impl Decoder for UnsupportedDecoder {
    fn decode(&self, _input: &[u8], _expected_size: usize) -> Result<Vec<u8>> {
        Err(Error::Unsupported {
            method: self.method.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_roundtrips_matching_size() {
        let data = b"hello world";
        let out = NoneDecoder.decode(data, data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn none_rejects_size_mismatch() {
        let data = b"hello world";
        assert!(NoneDecoder.decode(data, 3).is_err());
    }

    #[test]
    fn zlib_roundtrip() {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"the quick brown fox jumps over the lazy dog";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = ZlibDecoder.decode(&compressed, original.len()).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn gzip_roundtrip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let original = b"the quick brown fox jumps over the lazy dog";
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = GzipDecoder.decode(&compressed, original.len()).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn oodle_is_unsupported_until_registered() {
        let decoder = UnsupportedDecoder {
            method: "oodle".to_string(),
        };
        let err = decoder.decode(&[], 0).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
