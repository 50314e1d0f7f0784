//! Per-file metadata inside a PAK index.

use pak_reader_common::BinaryReader;

use crate::{Error, Result};

/// A contiguous compressed/uncompressed span pair within an entry's
/// payload. Spans are relative to the entry's data start, sorted, and
/// tile the payload exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionBlock {
    /// Start offset of this block's compressed bytes.
    pub compressed_start: u64,
    /// End offset (exclusive) of this block's compressed bytes.
    pub compressed_end: u64,
    /// Start offset of this block's decompressed bytes.
    pub uncompressed_start: u64,
    /// End offset (exclusive) of this block's decompressed bytes.
    pub uncompressed_end: u64,
}

/// A single file's metadata inside a PAK index.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Canonical display path, case preserved.
    pub path: String,
    /// Absolute byte offset of the entry's payload within the archive.
    pub offset: u64,
    /// Size of the stored (possibly compressed, possibly encrypted) payload.
    pub stored_size: u64,
    /// Size of the payload once decompressed.
    pub uncompressed_size: u64,
    /// Name of the compression method (`none`, `zlib`, `gzip`, or a
    /// plug-in-registered name).
    pub compression_method: String,
    /// Whether the payload is AES-ECB encrypted.
    pub encrypted: bool,
    /// Advisory SHA1 of the uncompressed payload.
    pub sha1: [u8; 20],
    /// Per-block compressed/uncompressed spans; empty when
    /// `compression_method == "none"`.
    pub blocks: Vec<CompressionBlock>,
    /// The compression block size used when splitting the payload,
    /// in bytes.
    pub compression_block_size: u32,
}

const LEGACY_METHOD_MAP: [&str; 4] = ["none", "zlib", "gzip", "oodle"];

fn resolve_legacy_method(index: u32) -> Result<String> {
    match index {
        0 => Ok("none".to_string()),
        1 | 2 => Ok(LEGACY_METHOD_MAP[index as usize].to_string()),
        8 => Ok("oodle".to_string()),
        n => Err(Error::UnsupportedFormat(format!(
            "unknown legacy compression method index {n}"
        ))),
    }
}

fn resolve_table_method(index: u32, table: &[String]) -> Result<String> {
    if index == 0 {
        return Ok("none".to_string());
    }
    table
        .get((index - 1) as usize)
        .cloned()
        .ok_or_else(|| Error::UnsupportedFormat(format!("compression table index {index} out of range")))
}

impl Entry {
    /// Read one index record. `version` selects the field set;
    /// records at version < 3 carry only offset/sizes/method, with no
    /// block list, no per-entry encrypted flag, and no block size.
    /// `compression_table` is the footer's method-name table, used
    /// only for version >= 8.
    pub fn read(reader: &mut BinaryReader, path: String, version: u8, compression_table: &[String]) -> Result<Self> {
        let offset = reader.read_u64()?;
        let stored_size = reader.read_u64()?;
        let uncompressed_size = reader.read_u64()?;

        let method_index = reader.read_u32()?;
        let compression_method = if version >= 8 {
            resolve_table_method(method_index, compression_table)?
        } else {
            resolve_legacy_method(method_index)?
        };

        let mut sha1 = [0u8; 20];
        reader.read_bytes(20)?.iter().enumerate().for_each(|(i, b)| sha1[i] = *b);

        let (blocks, compression_block_size, encrypted) = if version >= 3 {
            let block_count = reader.read_u32()?;
            let mut blocks = Vec::with_capacity(block_count as usize);
            for _ in 0..block_count {
                let compressed_start = reader.read_u64()?;
                let compressed_end = reader.read_u64()?;
                blocks.push((compressed_start, compressed_end));
            }
            let compression_block_size = reader.read_u32()?;
            let encrypted = reader.read_u8()? != 0;

            let blocks = blocks
                .into_iter()
                .scan(0u64, |uncompressed_cursor, (compressed_start, compressed_end)| {
                    let span = compressed_end.saturating_sub(compressed_start);
                    let uncompressed_start = *uncompressed_cursor;
                    let uncompressed_end = if compression_block_size == 0 {
                        uncompressed_start + span
                    } else {
                        (uncompressed_start + compression_block_size as u64).min(uncompressed_size)
                    };
                    *uncompressed_cursor = uncompressed_end;
                    Some(CompressionBlock {
                        compressed_start,
                        compressed_end,
                        uncompressed_start,
                        uncompressed_end,
                    })
                })
                .collect();

            (blocks, compression_block_size, encrypted)
        } else {
            (Vec::new(), 0u32, false)
        };

        let blocks = if compression_method == "none" { Vec::new() } else { blocks };

        Ok(Self {
            path,
            offset,
            stored_size,
            uncompressed_size,
            compression_method,
            encrypted,
            sha1,
            blocks,
            compression_block_size,
        })
    }

    /// The lower-cased lookup key for this entry's path.
    pub fn lookup_key(&self) -> String {
        self.path.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_entry_bytes(
        offset: u64,
        stored: u64,
        uncompressed: u64,
        method_index: u32,
        blocks: &[(u64, u64)],
        block_size: u32,
        encrypted: bool,
        version: u8,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&stored.to_le_bytes());
        out.extend_from_slice(&uncompressed.to_le_bytes());
        out.extend_from_slice(&method_index.to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);
        if version >= 3 {
            out.extend_from_slice(&(blocks.len() as u32).to_le_bytes());
            for (s, e) in blocks {
                out.extend_from_slice(&s.to_le_bytes());
                out.extend_from_slice(&e.to_le_bytes());
            }
            out.extend_from_slice(&block_size.to_le_bytes());
            out.push(encrypted as u8);
        }
        out
    }

    #[test]
    fn reads_v1_record_with_no_blocks() {
        let bytes = write_entry_bytes(0, 5, 5, 0, &[], 0, false, 1);
        let mut reader = BinaryReader::new(&bytes);
        let entry = Entry::read(&mut reader, "a.txt".to_string(), 1, &[]).unwrap();
        assert_eq!(entry.compression_method, "none");
        assert!(entry.blocks.is_empty());
        assert!(!entry.encrypted);
    }

    #[test]
    fn reads_v3_record_with_blocks_and_legacy_method() {
        let bytes = write_entry_bytes(100, 50, 200, 1, &[(100, 150)], 200, true, 3);
        let mut reader = BinaryReader::new(&bytes);
        let entry = Entry::read(&mut reader, "b.bin".to_string(), 3, &[]).unwrap();
        assert_eq!(entry.compression_method, "zlib");
        assert!(entry.encrypted);
        assert_eq!(entry.blocks.len(), 1);
        assert_eq!(entry.blocks[0].compressed_start, 100);
        assert_eq!(entry.blocks[0].compressed_end, 150);
    }

    #[test]
    fn v8_method_resolves_via_table() {
        let table = vec!["zlib".to_string(), "oodle".to_string()];
        let bytes = write_entry_bytes(0, 10, 10, 2, &[], 0, false, 8);
        let mut reader = BinaryReader::new(&bytes);
        let entry = Entry::read(&mut reader, "c.dat".to_string(), 8, &table).unwrap();
        assert_eq!(entry.compression_method, "oodle");
    }

    #[test]
    fn lookup_key_is_lowercased() {
        let bytes = write_entry_bytes(0, 5, 5, 0, &[], 0, false, 1);
        let mut reader = BinaryReader::new(&bytes);
        let entry = Entry::read(&mut reader, "Data/Objects/Test.CGF".to_string(), 1, &[]).unwrap();
        assert_eq!(entry.lookup_key(), "data/objects/test.cgf");
    }
}
