//! The 12-byte `ChunkId`: an opaque hash plus an index and type tag.

/// Identifies one chunk in an IoStore container.
///
/// 12 bytes: an 8-byte seeded hash, a 2-byte index, a 1-byte pad, and
/// a 1-byte chunk type tag. The hash itself is opaque to this reader;
/// only the type tag is interpreted (to tell asset chunks apart from
/// bulk data, shader code, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 12]);

impl ChunkId {
    /// Read a `ChunkId` from 12 raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// The seeded hash portion (first 8 bytes), used for table lookups.
    pub fn hash(&self) -> u64 {
        u64::from_le_bytes(self.0[0..8].try_into().unwrap())
    }

    /// The chunk index (bytes 8..10), disambiguating chunks sharing a hash.
    pub fn index(&self) -> u16 {
        u16::from_le_bytes(self.0[8..10].try_into().unwrap())
    }

    /// The chunk type tag, the last byte.
    pub fn chunk_type(&self) -> u8 {
        self.0[11]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hash_index_and_type() {
        let mut bytes = [0u8; 12];
        bytes[0..8].copy_from_slice(&0x0102030405060708u64.to_le_bytes());
        bytes[8..10].copy_from_slice(&7u16.to_le_bytes());
        bytes[11] = 3;

        let id = ChunkId::from_bytes(bytes);
        assert_eq!(id.hash(), 0x0102030405060708);
        assert_eq!(id.index(), 7);
        assert_eq!(id.chunk_type(), 3);
    }
}
