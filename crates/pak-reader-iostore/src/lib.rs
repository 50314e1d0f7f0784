//! IoStore `.utoc`/`.ucas` container reader for Unreal Engine game
//! asset chunks.
//!
//! The IoStore format splits storage into a metadata sidecar (`.utoc`:
//! chunk ids, offsets, the compressed-block table, and an optional
//! directory index mapping logical paths to chunks) and a flat byte
//! store (`.ucas`) addressed by those offsets. Chunks may span several
//! independently compressed/encrypted blocks drawn from a single
//! container-wide block table.
//!
//! ```no_run
//! use pak_reader_keys::KeyRegistry;
//! use pak_reader_compress::Registry as CompressRegistry;
//! use pak_reader_iostore::IoStoreArchive;
//!
//! let keys = KeyRegistry::new();
//! let compress = CompressRegistry::new();
//! let archive = IoStoreArchive::open("Game.utoc", &keys)?;
//! let data = archive.get("/Game/A.uasset", &keys, &compress)?;
//! # Ok::<(), pak_reader_iostore::Error>(())
//! ```

mod archive;
mod chunk_id;
mod crypto;
mod error;
mod toc;

pub use archive::{ChunkStat, IoStoreArchive};
pub use chunk_id::ChunkId;
pub use error::{Error, Result};
pub use toc::{CompressedBlock, ContainerFlags, Toc, TocHeader};
