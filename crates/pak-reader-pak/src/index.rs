//! The PAK index: mount point plus the flat entry table.

use std::collections::HashMap;

use pak_reader_common::BinaryReader;

use crate::entry::Entry;
use crate::{Error, Result};

/// The parsed index body.
pub struct Index {
    pub mount_point: String,
    /// Lower-cased path -> entry, for `O(1)` lookup.
    pub entries: HashMap<String, Entry>,
}

impl Index {
    /// Parse an index buffer (already decrypted, if it was encrypted).
    pub fn parse(buf: &[u8], version: u8, compression_table: &[String]) -> Result<Self> {
        let mut reader = BinaryReader::new(buf);
        let mount_point = reader.read_length_prefixed_string()?;
        let count = reader.read_u32()?;

        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let path = reader.read_length_prefixed_string()?;
            let entry = Entry::read(&mut reader, path, version, compression_table)?;
            entries.insert(entry.lookup_key(), entry);
        }

        if entries.len() != count as usize {
            return Err(Error::Corrupt(format!(
                "index declared {count} entries but {} unique paths were parsed (duplicate path?)",
                entries.len()
            )));
        }

        if !reader.is_empty() {
            return Err(Error::Corrupt(format!(
                "{} residual bytes after parsing the declared entry count",
                reader.remaining()
            )));
        }

        Ok(Self { mount_point, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_length_prefixed(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }

    fn write_entry(out: &mut Vec<u8>, path: &str, offset: u64, size: u64) {
        write_length_prefixed(out, path);
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // method=none
        out.extend_from_slice(&[0u8; 20]);
    }

    #[test]
    fn parses_mount_point_and_entries() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, "../../../Game/");
        buf.extend_from_slice(&2u32.to_le_bytes());
        write_entry(&mut buf, "a.txt", 0, 5);
        write_entry(&mut buf, "B.BIN", 100, 10);

        let index = Index::parse(&buf, 1, &[]).unwrap();
        assert_eq!(index.mount_point, "../../../Game/");
        assert_eq!(index.entries.len(), 2);
        assert!(index.entries.contains_key("a.txt"));
        assert!(index.entries.contains_key("b.bin"));
        assert_eq!(index.entries["b.bin"].path, "B.BIN");
    }

    #[test]
    fn residual_bytes_fail_as_corrupt() {
        let mut buf = Vec::new();
        write_length_prefixed(&mut buf, "/");
        buf.extend_from_slice(&1u32.to_le_bytes());
        write_entry(&mut buf, "a.txt", 0, 5);
        buf.extend_from_slice(&[0xFFu8; 4]);

        let err = Index::parse(&buf, 1, &[]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
