//! PAK archive reader for Unreal Engine game asset containers.
//!
//! The PAK format packages game assets into a single file: a flat
//! byte region of entry payloads followed by an index (mount point,
//! per-file records) and a small trailing footer that locates it.
//! Entries may be individually AES-ECB encrypted and/or split into
//! independently compressed blocks.
//!
//! ```no_run
//! use pak_reader_keys::KeyRegistry;
//! use pak_reader_compress::Registry as CompressRegistry;
//! use pak_reader_pak::PakArchive;
//!
//! let keys = KeyRegistry::new();
//! let compress = CompressRegistry::new();
//! let archive = PakArchive::open("Game.pak", &keys)?;
//! let data = archive.get("Data/Objects/test.cgf", &keys, &compress)?;
//! # Ok::<(), pak_reader_pak::Error>(())
//! ```

mod archive;
mod crypto;
mod entry;
mod error;
mod footer;
mod index;

pub use archive::{EntryStat, PakArchive};
pub use entry::{CompressionBlock, Entry};
pub use error::{Error, Result};
pub use footer::Footer;
