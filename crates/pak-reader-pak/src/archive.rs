//! The PAK archive reader: footer, index, and entry extraction.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use pak_reader_common::format_key_id;
use pak_reader_compress::Registry as CompressRegistry;
use pak_reader_keys::KeyRegistry;

use crate::entry::Entry;
use crate::footer::Footer;
use crate::index::Index;
use crate::{crypto, Error, Result};

/// A path, size, and flag summary returned by [`PakArchive::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub path: String,
    pub size: u64,
    pub compressed: bool,
    pub encrypted: bool,
}

impl From<EntryStat> for pak_reader_common::EntryInfo {
    fn from(stat: EntryStat) -> Self {
        pak_reader_common::EntryInfo {
            path: stat.path,
            size: stat.size,
            compressed: stat.compressed,
            encrypted: stat.encrypted,
        }
    }
}

/// An opened, memory-mapped PAK archive.
pub struct PakArchive {
    mmap: Mmap,
    mount_point: String,
    entries: std::collections::HashMap<String, Entry>,
    version: u8,
    key_guid: [u8; 16],
}

impl PakArchive {
    /// Open a PAK archive, mapping it into memory and parsing its
    /// footer and index. If the footer declares `encrypted_index`,
    /// the key bound to the footer's key GUID must already be
    /// registered in `keys`.
    pub fn open<P: AsRef<Path>>(path: P, keys: &KeyRegistry) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };

        let footer = Footer::read(&mmap)?;

        let index_start = footer.index_offset as usize;
        let index_end = index_start + footer.index_size as usize;
        if index_end > mmap.len() {
            return Err(Error::Corrupt("index range runs past end of file".to_string()));
        }
        let raw_index = &mmap[index_start..index_end];

        let index_bytes = if footer.encrypted_index {
            let guid = format_key_id(&footer.key_guid);
            let key = keys
                .get(&guid)
                .ok_or_else(|| Error::Decryption("no key".to_string()))?;
            crypto::decrypt(raw_index, key.as_bytes())?
        } else {
            raw_index.to_vec()
        };

        let index = Index::parse(&index_bytes, footer.version, &footer.compression_methods)?;

        Ok(Self {
            mmap,
            mount_point: index.mount_point,
            entries: index.entries,
            version: footer.version,
            key_guid: footer.key_guid,
        })
    }

    /// Open a PAK archive without knowing its version ahead of time.
    ///
    /// The footer's fixed-size core sits at the very end of the file
    /// regardless of version, so version detection falls out of
    /// [`Footer::read`] directly; this is a thin, API-parity wrapper
    /// for callers migrating from version-specific tooling.
    pub fn open_any<P: AsRef<Path>>(path: P, keys: &KeyRegistry) -> Result<Self> {
        Self::open(path, keys)
    }

    /// The PAK version (1..=9).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The mount point string stored in the index.
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// The archive's encryption key GUID, canonical hyphenated form.
    pub fn key_guid(&self) -> String {
        format_key_id(&self.key_guid)
    }

    /// Number of entries in the index.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether an entry exists at `path` (case-insensitive).
    pub fn has(&self, path: &str) -> bool {
        self.entries.contains_key(&path.to_lowercase())
    }

    /// List entries whose path matches a glob pattern (e.g. `*.bin`,
    /// `Data/**/*.cgf`). An invalid pattern yields an empty list.
    pub fn list(&self, pattern: &str) -> Vec<EntryStat> {
        let Ok(glob) = glob::Pattern::new(pattern) else {
            return Vec::new();
        };
        let mut matches: Vec<EntryStat> = self
            .entries
            .values()
            .filter(|e| glob.matches(&e.lookup_key()) || glob.matches(&e.path))
            .map(|e| EntryStat {
                path: e.path.clone(),
                size: e.uncompressed_size,
                compressed: e.compression_method != "none",
                encrypted: e.encrypted,
            })
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path));
        matches
    }

    /// Entry metadata for `path` without decoding its payload.
    pub fn info(&self, path: &str) -> Option<pak_reader_common::EntryInfo> {
        let entry = self.entries.get(&path.to_lowercase())?;
        Some(pak_reader_common::EntryInfo {
            path: entry.path.clone(),
            size: entry.uncompressed_size,
            compressed: entry.compression_method != "none",
            encrypted: entry.encrypted,
        })
    }

    /// Resolve `path` to its decrypted, decompressed bytes. Returns
    /// `Ok(None)` if no entry exists at that path; any other failure
    /// (missing key, decode error) propagates as `Err`.
    pub fn get(&self, path: &str, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.entries.get(&path.to_lowercase()) else {
            return Ok(None);
        };
        self.extract(entry, keys, compress).map(Some)
    }

    fn extract(&self, entry: &Entry, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Vec<u8>> {
        let start = entry.offset as usize;
        let end = start + entry.stored_size as usize;
        if end > self.mmap.len() {
            return Err(Error::Corrupt(format!(
                "entry {} payload runs past end of file",
                entry.path
            )));
        }
        let raw = &self.mmap[start..end];

        let plain = if entry.encrypted {
            if entry.stored_size % 16 != 0 {
                return Err(Error::Decryption(format!(
                    "entry {} stored size {} is not a multiple of 16",
                    entry.path, entry.stored_size
                )));
            }
            let guid = format_key_id(&self.key_guid);
            let key = keys
                .get(&guid)
                .ok_or_else(|| Error::Decryption("no key".to_string()))?;
            crypto::decrypt(raw, key.as_bytes())?
        } else {
            raw.to_vec()
        };

        if entry.blocks.is_empty() {
            if entry.compression_method == "none" {
                if plain.len() != entry.uncompressed_size as usize {
                    return Err(Error::Compression(format!(
                        "entry {}: stored size {} does not match uncompressed size {}",
                        entry.path,
                        plain.len(),
                        entry.uncompressed_size
                    )));
                }
                return Ok(plain);
            }
            let decoded = compress
                .decode(&entry.compression_method, &plain, entry.uncompressed_size as usize)
                .map_err(|e| Error::Compression(e.to_string()))?;
            return Ok(decoded);
        }

        let mut output = vec![0u8; entry.uncompressed_size as usize];
        for (k, block) in entry.blocks.iter().enumerate() {
            let compressed = &plain[block.compressed_start as usize..block.compressed_end as usize];
            let expected = (block.uncompressed_end - block.uncompressed_start) as usize;
            let decoded = compress
                .decode(&entry.compression_method, compressed, expected)
                .map_err(|e| Error::Compression(format!("block {k} of {}: {e}", entry.path)))?;
            output[block.uncompressed_start as usize..block.uncompressed_end as usize].copy_from_slice(&decoded);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("version", &self.version)
            .field("mount_point", &self.mount_point)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_length_prefixed(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }

    fn write_v1_entry(out: &mut Vec<u8>, path: &str, offset: u64, data: &[u8]) {
        write_length_prefixed(out, path);
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);
    }

    fn build_plain_pak(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut file = Vec::new();
        let mut offsets = Vec::new();
        for (_, data) in entries {
            offsets.push(file.len() as u64);
            file.extend_from_slice(data);
        }

        let index_offset = file.len() as u64;
        let mut index = Vec::new();
        write_length_prefixed(&mut index, "../../../Game/");
        index.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for ((path, data), offset) in entries.iter().zip(&offsets) {
            write_v1_entry(&mut index, path, *offset, data);
        }
        let index_size = index.len() as u64;
        file.extend_from_slice(&index);

        // footer
        file.extend_from_slice(&[0u8; 16]); // guid
        file.push(0); // encrypted_index = false
        file.extend_from_slice(&footer_magic_bytes());
        file.extend_from_slice(&1u32.to_le_bytes()); // version
        file.extend_from_slice(&index_offset.to_le_bytes());
        file.extend_from_slice(&index_size.to_le_bytes());
        file.extend_from_slice(&[0u8; 20]); // sha1

        file
    }

    fn footer_magic_bytes() -> [u8; 4] {
        crate::footer::MAGIC.to_le_bytes()
    }

    fn write_temp_pak(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn opens_plain_unencrypted_pak_and_reads_entries() {
        let bytes = build_plain_pak(&[("a.txt", b"hello"), ("b.bin", &[0u8; 16])]);
        let file = write_temp_pak(&bytes);

        let keys = KeyRegistry::new();
        let compress = CompressRegistry::new();
        let archive = PakArchive::open(file.path(), &keys).unwrap();

        assert_eq!(archive.version(), 1);
        assert_eq!(archive.entry_count(), 2);
        assert!(archive.has("A.TXT"));

        let data = archive.get("a.txt", &keys, &compress).unwrap().unwrap();
        assert_eq!(data, b"hello");

        let missing = archive.get("missing", &keys, &compress).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn list_matches_glob_pattern() {
        let bytes = build_plain_pak(&[("a.txt", b"hello"), ("b.bin", &[0u8; 16])]);
        let file = write_temp_pak(&bytes);
        let keys = KeyRegistry::new();
        let archive = PakArchive::open(file.path(), &keys).unwrap();

        let matches = archive.list("*.bin");
        assert_eq!(
            matches,
            vec![EntryStat {
                path: "b.bin".to_string(),
                size: 16,
                compressed: false,
                encrypted: false,
            }]
        );
    }
}
