//! The IoStore archive reader: `.utoc`/`.ucas` pair, chunk lookup, and
//! block-table-driven extraction.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use pak_reader_compress::Registry as CompressRegistry;
use pak_reader_keys::KeyRegistry;

use crate::chunk_id::ChunkId;
use crate::toc::{ContainerFlags, Toc};
use crate::{crypto, Error, Result};

const ENCRYPTION_ALIGN: u64 = 16;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

/// A path and chunk id pair returned by [`IoStoreArchive::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkStat {
    pub path: String,
    pub chunk_index: u32,
}

/// An opened, memory-mapped IoStore container (`.utoc` metadata plus
/// its sibling `.ucas` chunk store).
pub struct IoStoreArchive {
    toc: Toc,
    cas: Mmap,
    key_guid: [u8; 16],
}

impl IoStoreArchive {
    /// Open a `.utoc`/`.ucas` pair. `toc_path` must point at the
    /// `.utoc` file; the `.ucas` sibling is located by replacing the
    /// extension.
    pub fn open<P: AsRef<Path>>(toc_path: P, keys: &KeyRegistry) -> Result<Self> {
        let toc_path = toc_path.as_ref();
        let toc_bytes = std::fs::read(toc_path)?;
        let toc = Toc::parse(&toc_bytes, keys)?;

        let cas_path = sibling_with_extension(toc_path, "ucas");
        let cas_file = File::open(&cas_path)?;
        let cas = unsafe { Mmap::map(&cas_file)? };

        let key_guid = toc.header.encryption_key_guid;
        Ok(Self { toc, cas, key_guid })
    }

    /// The container's encryption key GUID, canonical hyphenated form.
    pub fn key_guid(&self) -> String {
        pak_reader_common::format_key_id(&self.key_guid)
    }

    /// Number of chunks in this container.
    pub fn chunk_count(&self) -> usize {
        self.toc.chunk_ids.len()
    }

    /// Whether a logical path is present in the directory index.
    pub fn has(&self, path: &str) -> bool {
        self.resolve_path(path).is_some()
    }

    /// List chunks under the directory index whose path matches a
    /// glob pattern. Returns an empty list when no directory index is
    /// present (the container carries only chunk ids, not paths).
    pub fn list_chunks(&self, pattern: &str) -> Vec<ChunkStat> {
        let Some(dir) = &self.toc.directory_index else {
            return Vec::new();
        };
        let Ok(glob) = glob::Pattern::new(pattern) else {
            return Vec::new();
        };
        let mut matches: Vec<ChunkStat> = dir
            .iter()
            .filter(|(path, _)| glob.matches(&path.to_lowercase()) || glob.matches(path))
            .map(|(path, idx)| ChunkStat {
                path: path.clone(),
                chunk_index: *idx,
            })
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path));
        matches
    }

    /// Like [`Self::list_chunks`], but returns full entry metadata
    /// (size, compression and encryption flags) matching the
    /// container-agnostic capability set other archive readers expose.
    pub fn list(&self, pattern: &str) -> Vec<pak_reader_common::EntryInfo> {
        self.list_chunks(pattern)
            .into_iter()
            .filter_map(|stat| self.info(&stat.path))
            .collect()
    }

    /// Entry metadata for `path` without decoding its payload.
    pub fn info(&self, path: &str) -> Option<pak_reader_common::EntryInfo> {
        let chunk_index = self.resolve_path(path)?;
        let (_, length) = *self.toc.chunk_offsets.get(chunk_index as usize)?;
        let encrypted = self.toc.header.container_flags.contains(ContainerFlags::ENCRYPTED);
        let compressed = self.toc.header.container_flags.contains(ContainerFlags::COMPRESSED);
        Some(pak_reader_common::EntryInfo {
            path: path.to_string(),
            size: length,
            compressed,
            encrypted,
        })
    }

    fn resolve_path(&self, path: &str) -> Option<u32> {
        let dir = self.toc.directory_index.as_ref()?;
        let needle = path.to_lowercase();
        dir.iter()
            .find(|(p, _)| p.to_lowercase() == needle)
            .map(|(_, idx)| *idx)
    }

    /// Resolve a logical path to its decoded bytes via the directory
    /// index. Returns `Ok(None)` if the path isn't present.
    pub fn get(&self, path: &str, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Option<Vec<u8>>> {
        let Some(chunk_index) = self.resolve_path(path) else {
            return Ok(None);
        };
        self.get_by_chunk_index(chunk_index, keys, compress).map(Some)
    }

    /// Resolve a chunk by its raw [`ChunkId`] (bypassing the
    /// directory index).
    pub fn get_by_chunk_id(&self, id: &ChunkId, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Vec<u8>> {
        let (offset, length) = self
            .toc
            .find_chunk(id)
            .ok_or_else(|| Error::ChunkNotFound(format!("{:?}", id.0)))?;
        self.extract(offset, length, keys, compress)
    }

    fn get_by_chunk_index(&self, chunk_index: u32, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Vec<u8>> {
        let (offset, length) = *self
            .toc
            .chunk_offsets
            .get(chunk_index as usize)
            .ok_or_else(|| Error::ChunkNotFound(format!("index {chunk_index}")))?;
        self.extract(offset, length, keys, compress)
    }

    /// Extract the `[offset, offset+length)` uncompressed span,
    /// partitioning it across the shared compressed-block table: each
    /// covered block is read from `.ucas`, decrypted if the container
    /// is encrypted, decompressed via `compress`, then sliced into
    /// the output buffer.
    fn extract(&self, offset: u64, length: u64, keys: &KeyRegistry, compress: &CompressRegistry) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let block_size = self.toc.header.compression_block_size as u64;
        if block_size == 0 {
            return Err(Error::Corrupt("compression_block_size is zero".to_string()));
        }

        let first_block = (offset / block_size) as usize;
        let last_block_end = align_up(offset + length, block_size);
        let last_block = (last_block_end / block_size).saturating_sub(1) as usize;

        let encrypted = self.toc.header.container_flags.contains(ContainerFlags::ENCRYPTED);
        let key = if encrypted {
            let guid = pak_reader_common::format_key_id(&self.key_guid);
            Some(
                keys.get(&guid)
                    .ok_or_else(|| Error::Decryption("no key for container".to_string()))?,
            )
        } else {
            None
        };

        let mut output = Vec::with_capacity(length as usize);
        let mut remaining = length;
        let mut offset_in_block = offset % block_size;

        for block_index in first_block..=last_block {
            let block = self.toc.compression_blocks.get(block_index).ok_or_else(|| {
                Error::Corrupt(format!("compressed block index {block_index} out of range"))
            })?;

            let read_size = align_up(block.compressed_size as u64, ENCRYPTION_ALIGN) as usize;
            let start = block.offset as usize;
            let end = start + read_size;
            if end > self.cas.len() {
                return Err(Error::Corrupt(format!(
                    "compressed block {block_index} runs past end of .ucas"
                )));
            }
            let raw = &self.cas[start..end];

            let plain = if let Some(key) = &key {
                crypto::decrypt(raw, key.as_bytes()).map_err(Error::Decryption)?
            } else {
                raw[..block.compressed_size as usize].to_vec()
            };

            let method = self.toc.method_name(block.compression_method_index)?;
            let decompressed = if method == "none" {
                plain
            } else {
                compress
                    .decode(&method, &plain[..block.compressed_size as usize], block.uncompressed_size as usize)
                    .map_err(|e| Error::Compression(format!("block {block_index}: {e}")))?
            };

            let take = remaining.min(block_size - offset_in_block) as usize;
            let start_in_block = offset_in_block as usize;
            output.extend_from_slice(&decompressed[start_in_block..start_in_block + take]);

            offset_in_block = 0;
            remaining -= take as u64;
            if remaining == 0 {
                break;
            }
        }

        if output.len() as u64 != length {
            return Err(Error::Corrupt(format!(
                "extracted {} bytes, expected {length}",
                output.len()
            )));
        }

        Ok(output)
    }
}

impl std::fmt::Debug for IoStoreArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoStoreArchive")
            .field("chunks", &self.toc.chunk_ids.len())
            .field("key_guid", &self.key_guid())
            .finish()
    }
}

fn sibling_with_extension(toc_path: &Path, ext: &str) -> PathBuf {
    toc_path.with_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    fn write_u64(out: &mut Vec<u8>, v: u64) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    /// Build a minimal `.utoc` buffer with one chunk, one compressed
    /// block (method=none), and a directory index pointing at it.
    fn build_toc(chunk_len: u32, block_size: u32, dir_name: &str) -> Vec<u8> {
        let mut dir = Vec::new();
        write_u32(&mut dir, 1); // entry count
        dir.extend_from_slice(&(dir_name.len() as i32).to_le_bytes());
        dir.extend_from_slice(dir_name.as_bytes());
        dir.push(0);
        write_u32(&mut dir, 0); // chunk index

        let mut out = Vec::new();
        out.extend_from_slice(&crate::toc::TOC_MAGIC);
        out.push(1); // version
        out.extend_from_slice(&[0u8; 3]);
        write_u32(&mut out, crate::toc::HEADER_SIZE);
        write_u32(&mut out, 1); // entry_count
        write_u32(&mut out, 1); // compressed_block_entry_count
        write_u32(&mut out, 12); // compressed_block_entry_size
        write_u32(&mut out, 0); // compression_method_name_count
        write_u32(&mut out, 0); // compression_method_name_length
        write_u32(&mut out, block_size); // compression_block_size
        write_u32(&mut out, dir.len() as u32); // directory_index_size
        write_u32(&mut out, 1); // partition_count
        write_u64(&mut out, 0); // container_id
        out.extend_from_slice(&[0u8; 16]); // key guid
        out.push(crate::toc::ContainerFlags::INDEXED.bits());
        out.extend_from_slice(&[0u8; 3]);
        write_u32(&mut out, 0); // perfect hash seeds
        write_u64(&mut out, u64::MAX); // partition size
        write_u32(&mut out, 0); // chunks without perfect hash
        out.extend_from_slice(&[0u8; 44]);

        // chunk id table
        out.extend_from_slice(&[0xAAu8; 12]);
        // offset/length table: offset=0, length=chunk_len
        out.extend_from_slice(&[0, 0, 0, 0, 0]);
        let len_bytes = (chunk_len as u64).to_be_bytes();
        out.extend_from_slice(&len_bytes[3..]);
        // compressed block: offset=0, compressed_size=chunk_len, uncompressed_size=chunk_len, method=0
        let mut block = vec![0u8; 12];
        block[0..5].copy_from_slice(&0u64.to_le_bytes()[0..5]);
        block[4..8].copy_from_slice(&(chunk_len << 8).to_le_bytes());
        block[8..12].copy_from_slice(&chunk_len.to_le_bytes());
        out.extend_from_slice(&block);

        out.extend_from_slice(&dir);
        out
    }

    #[test]
    fn extracts_single_uncompressed_block_via_directory_index() {
        let data = b"hello world, this is iostore chunk data";
        let toc_bytes = build_toc(data.len() as u32, 1 << 16, "/Game/A.uasset");

        let dir = tempfile::tempdir().unwrap();
        let toc_path = dir.path().join("pkg.utoc");
        let cas_path = dir.path().join("pkg.ucas");
        std::fs::write(&toc_path, &toc_bytes).unwrap();
        let mut cas_file = std::fs::File::create(&cas_path).unwrap();
        cas_file.write_all(data).unwrap();

        let keys = KeyRegistry::new();
        let compress = CompressRegistry::new();
        let archive = IoStoreArchive::open(&toc_path, &keys).unwrap();

        assert!(archive.has("/Game/A.uasset"));
        let out = archive.get("/Game/A.uasset", &keys, &compress).unwrap().unwrap();
        assert_eq!(out, data);

        let missing = archive.get("/Game/Missing.uasset", &keys, &compress).unwrap();
        assert!(missing.is_none());
    }
}
