//! PAK trailing footer: magic, version, index location, and the
//! version-gated fields that precede it.

use pak_reader_common::BinaryReader;

use crate::{Error, Result};

pub const MAGIC: u32 = 0x5A6F12E1;
const CORE_SIZE: u64 = 44;
const COMPRESSION_SLOT_COUNT: usize = 5;
const COMPRESSION_SLOT_NAME_LEN: usize = 32;

/// The trailing metadata block of a PAK file.
///
/// Read in two passes: the 44-byte core (magic, version, index
/// offset/size, index SHA1) always sits at the very end of the file,
/// regardless of version; the GUID, encrypted-index flag, and
/// version-gated extensions (compression method table for v>=8,
/// frozen-index flag for v>=9) sit immediately before it.
#[derive(Debug, Clone)]
pub struct Footer {
    pub key_guid: [u8; 16],
    pub encrypted_index: bool,
    pub version: u8,
    pub index_offset: u64,
    pub index_size: u64,
    pub index_sha1: [u8; 20],
    pub frozen_index: bool,
    /// Method names for table indices 1..=5 (index 0 always means
    /// `none` and is never stored here). Empty for version < 8.
    pub compression_methods: Vec<String>,
}

impl Footer {
    /// Read the footer from the tail of `data`, the full mapped/buffered
    /// archive contents.
    pub fn read(data: &[u8]) -> Result<Self> {
        let len = data.len() as u64;
        if len < CORE_SIZE {
            return Err(Error::Corrupt("file too small to contain a PAK footer".to_string()));
        }

        let core_offset = (len - CORE_SIZE) as usize;
        let mut core_reader = BinaryReader::new(&data[core_offset..]);
        let magic = core_reader.read_u32()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = core_reader.read_u32()?;
        if version == 0 || version > 9 {
            return Err(Error::UnsupportedFormat(format!("unsupported PAK version {version}")));
        }
        let version = version as u8;
        let index_offset = core_reader.read_u64()?;
        let index_size = core_reader.read_u64()?;
        let mut index_sha1 = [0u8; 20];
        index_sha1.copy_from_slice(core_reader.read_bytes(20)?);

        let prefix_len = 16
            + 1
            + if version >= 8 {
                COMPRESSION_SLOT_COUNT * COMPRESSION_SLOT_NAME_LEN
            } else {
                0
            }
            + if version >= 9 { 1 } else { 0 };

        if core_offset < prefix_len {
            return Err(Error::Corrupt("footer prefix runs before start of file".to_string()));
        }
        let prefix_offset = core_offset - prefix_len;
        let mut prefix_reader = BinaryReader::new(&data[prefix_offset..core_offset]);

        let mut key_guid = [0u8; 16];
        key_guid.copy_from_slice(prefix_reader.read_bytes(16)?);
        let encrypted_index = prefix_reader.read_u8()? != 0;

        let compression_methods = if version >= 8 {
            (0..COMPRESSION_SLOT_COUNT)
                .map(|_| {
                    let raw = prefix_reader.read_bytes(COMPRESSION_SLOT_NAME_LEN)?;
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect()
        } else {
            Vec::new()
        };

        let frozen_index = if version >= 9 { prefix_reader.read_u8()? != 0 } else { false };

        Ok(Self {
            key_guid,
            encrypted_index,
            version,
            index_offset,
            index_size,
            index_sha1,
            frozen_index,
            compression_methods,
        })
    }
}
