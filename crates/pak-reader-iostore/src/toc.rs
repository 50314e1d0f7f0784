//! The `.utoc` table of contents: header, chunk tables, and the
//! optional directory index.

use std::collections::HashMap;

use pak_reader_common::BinaryReader;

use crate::chunk_id::ChunkId;
use crate::{Error, Result};

pub const TOC_MAGIC: [u8; 16] = *b"-==--==--==--==-";
pub const HEADER_SIZE: u32 = 144;

bitflags::bitflags! {
    /// Per-container capability bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContainerFlags: u8 {
        const COMPRESSED = 1 << 0;
        const ENCRYPTED = 1 << 1;
        const SIGNED = 1 << 2;
        const INDEXED = 1 << 3;
    }
}

/// The fixed-size `.utoc` header, immediately following the 16-byte
/// magic.
#[derive(Debug, Clone)]
pub struct TocHeader {
    pub version: u8,
    pub header_size: u32,
    pub entry_count: u32,
    pub compressed_block_entry_count: u32,
    pub compressed_block_entry_size: u32,
    pub compression_method_name_count: u32,
    pub compression_method_name_length: u32,
    pub compression_block_size: u32,
    pub directory_index_size: u32,
    pub partition_count: u32,
    pub container_id: u64,
    pub encryption_key_guid: [u8; 16],
    pub container_flags: ContainerFlags,
    pub chunk_perfect_hash_seeds_count: u32,
    pub partition_size: u64,
    pub chunks_without_perfect_hash_count: u32,
}

impl TocHeader {
    fn read(reader: &mut BinaryReader) -> Result<Self> {
        let mut magic = [0u8; 16];
        magic.copy_from_slice(reader.read_bytes(16)?);
        if magic != TOC_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = reader.read_u8()?;
        reader.advance(3); // reserved

        let header_size = reader.read_u32()?;
        if header_size != HEADER_SIZE {
            return Err(Error::InvalidHeaderSize {
                expected: HEADER_SIZE,
                actual: header_size,
            });
        }

        let entry_count = reader.read_u32()?;
        let compressed_block_entry_count = reader.read_u32()?;
        let compressed_block_entry_size = reader.read_u32()?;
        let compression_method_name_count = reader.read_u32()?;
        let compression_method_name_length = reader.read_u32()?;
        let compression_block_size = reader.read_u32()?;
        let directory_index_size = reader.read_u32()?;
        let partition_count = reader.read_u32()?;
        let container_id = reader.read_u64()?;

        let mut encryption_key_guid = [0u8; 16];
        encryption_key_guid.copy_from_slice(reader.read_bytes(16)?);

        let container_flags = ContainerFlags::from_bits_truncate(reader.read_u8()?);
        reader.advance(3); // reserved

        let chunk_perfect_hash_seeds_count = reader.read_u32()?;
        let partition_size = reader.read_u64()?;
        let chunks_without_perfect_hash_count = reader.read_u32()?;
        reader.advance(44); // reserved

        Ok(Self {
            version,
            header_size,
            entry_count,
            compressed_block_entry_count,
            compressed_block_entry_size,
            compression_method_name_count,
            compression_method_name_length,
            compression_block_size,
            directory_index_size,
            partition_count,
            container_id,
            encryption_key_guid,
            container_flags,
            chunk_perfect_hash_seeds_count,
            partition_size,
            chunks_without_perfect_hash_count,
        })
    }
}

/// One entry in the compressed-block table: a span inside `.ucas`
/// plus the method used to decompress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedBlock {
    pub offset: u64,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub compression_method_index: u8,
}

/// The fully parsed `.utoc` resource.
pub struct Toc {
    pub header: TocHeader,
    pub chunk_ids: Vec<ChunkId>,
    pub chunk_offsets: Vec<(u64, u64)>,
    pub compression_blocks: Vec<CompressedBlock>,
    pub compression_methods: Vec<String>,
    pub directory_index: Option<HashMap<String, u32>>,
    hash_index: rustc_hash::FxHashMap<u64, Vec<usize>>,
}

impl Toc {
    /// Parse a full `.utoc` buffer.
    pub fn parse(data: &[u8], keys: &pak_reader_keys::KeyRegistry) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let header = TocHeader::read(&mut reader)?;

        let mut chunk_ids = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            let mut bytes = [0u8; 12];
            bytes.copy_from_slice(reader.read_bytes(12)?);
            chunk_ids.push(ChunkId::from_bytes(bytes));
        }

        let mut chunk_offsets = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            chunk_offsets.push(read_offset_and_length(&mut reader)?);
        }

        let mut compression_blocks = Vec::with_capacity(header.compressed_block_entry_count as usize);
        for _ in 0..header.compressed_block_entry_count {
            compression_blocks.push(read_compressed_block(&mut reader)?);
        }

        let mut compression_methods = Vec::with_capacity(header.compression_method_name_count as usize);
        for _ in 0..header.compression_method_name_count {
            let raw = reader.read_bytes(header.compression_method_name_length as usize)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            compression_methods.push(String::from_utf8_lossy(&raw[..end]).into_owned());
        }

        let directory_index = if header.container_flags.contains(ContainerFlags::INDEXED)
            && header.directory_index_size > 0
        {
            let raw = reader.read_bytes(header.directory_index_size as usize)?;
            let bytes = if header.container_flags.contains(ContainerFlags::ENCRYPTED) {
                let guid = pak_reader_common::format_key_id(&header.encryption_key_guid);
                let key = keys
                    .get(&guid)
                    .ok_or_else(|| Error::Decryption("no key for directory index".to_string()))?;
                decrypt_directory_index(raw, key.as_bytes())?
            } else {
                raw.to_vec()
            };
            Some(parse_directory_index(&bytes)?)
        } else {
            None
        };

        let mut hash_index: rustc_hash::FxHashMap<u64, Vec<usize>> = rustc_hash::FxHashMap::default();
        for (i, id) in chunk_ids.iter().enumerate() {
            hash_index.entry(id.hash()).or_default().push(i);
        }

        Ok(Self {
            header,
            chunk_ids,
            chunk_offsets,
            compression_blocks,
            compression_methods,
            directory_index,
            hash_index,
        })
    }

    /// Look up a chunk's `(offset, length)` span by its id. Candidates
    /// sharing the id's hash are disambiguated by full equality.
    pub fn find_chunk(&self, id: &ChunkId) -> Option<(u64, u64)> {
        let candidates = self.hash_index.get(&id.hash())?;
        let i = *candidates.iter().find(|&&i| self.chunk_ids[i] == *id)?;
        Some(self.chunk_offsets[i])
    }

    /// Resolve the method name for a compressed block's method index
    /// (0 = none, otherwise a 1-based index into `compression_methods`).
    pub fn method_name(&self, index: u8) -> Result<String> {
        if index == 0 {
            return Ok("none".to_string());
        }
        self.compression_methods
            .get((index - 1) as usize)
            .cloned()
            .ok_or_else(|| Error::UnsupportedFormat(format!("compression method index {index} out of range")))
    }
}

fn read_offset_and_length(reader: &mut BinaryReader) -> Result<(u64, u64)> {
    let raw = reader.read_bytes(10)?;
    let offset = (raw[4] as u64)
        | ((raw[3] as u64) << 8)
        | ((raw[2] as u64) << 16)
        | ((raw[1] as u64) << 24)
        | ((raw[0] as u64) << 32);
    let length = (raw[9] as u64)
        | ((raw[8] as u64) << 8)
        | ((raw[7] as u64) << 16)
        | ((raw[6] as u64) << 24)
        | ((raw[5] as u64) << 32);
    Ok((offset, length))
}

const BLOCK_OFFSET_MASK: u64 = (1u64 << 40) - 1;
const BLOCK_SIZE_MASK: u32 = (1u32 << 24) - 1;

fn read_compressed_block(reader: &mut BinaryReader) -> Result<CompressedBlock> {
    let raw = reader.read_bytes(12)?;
    let offset = u64::from_le_bytes(raw[0..8].try_into().unwrap()) & BLOCK_OFFSET_MASK;
    let compressed_size = (u32::from_le_bytes(raw[4..8].try_into().unwrap()) >> 8) & BLOCK_SIZE_MASK;
    let uncompressed_size = u32::from_le_bytes(raw[8..12].try_into().unwrap()) & BLOCK_SIZE_MASK;
    let compression_method_index = raw[11];
    Ok(CompressedBlock {
        offset,
        compressed_size,
        uncompressed_size,
        compression_method_index,
    })
}

fn decrypt_directory_index(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    crate::crypto::decrypt(data, key).map_err(|e| Error::Decryption(e.to_string()))
}

fn parse_directory_index(data: &[u8]) -> Result<HashMap<String, u32>> {
    let mut reader = BinaryReader::new(data);
    let count = reader.read_u32()?;
    let mut map = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let path = reader.read_length_prefixed_string().map_err(Error::Common)?;
        let chunk_index = reader.read_u32()?;
        map.insert(path, chunk_index);
    }
    Ok(map)
}
