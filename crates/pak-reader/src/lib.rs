//! pak-reader - Unreal Engine game file extraction and virtual file
//! system library.
//!
//! This crate provides a unified interface to the pak-reader library
//! ecosystem for reading Unreal Engine `.pak` archives and
//! `.utoc`/`.ucas` IoStore containers, and for compositing several of
//! them behind a single read-only virtual file system.
//!
//! # Crates
//!
//! - [`pak_reader_common`] - Binary reading primitives and shared types
//! - [`pak_reader_keys`] - AES key registry for encrypted containers
//! - [`pak_reader_compress`] - Compression method registry (zlib, gzip, ...)
//! - [`pak_reader_pak`] - `.pak` archive reading
//! - [`pak_reader_iostore`] - `.utoc`/`.ucas` IoStore container reading
//! - [`pak_reader_vfs`] - Mounted, cached, async virtual file system
//!
//! # Example
//!
//! ```no_run
//! use pak_reader::prelude::*;
//!
//! let keys = std::sync::Arc::new(KeyRegistry::new());
//! let compress = std::sync::Arc::new(CompressRegistry::new());
//! let vfs = Vfs::new(VfsConfig::default(), keys, compress);
//! vfs.mount_pak("Game.pak", "", LoadPriority::Normal)?;
//!
//! if let Some(data) = vfs.get_sync("Content/Data.uasset")? {
//!     println!("read {} bytes", data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use pak_reader_common as common;
pub use pak_reader_compress as compress;
pub use pak_reader_iostore as iostore;
pub use pak_reader_keys as keys;
pub use pak_reader_pak as pak;
pub use pak_reader_vfs as vfs;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use pak_reader_common::{EntryInfo, Error as CommonError};
    pub use pak_reader_compress::Registry as CompressRegistry;
    pub use pak_reader_iostore::IoStoreArchive;
    pub use pak_reader_keys::KeyRegistry;
    pub use pak_reader_pak::PakArchive;
    pub use pak_reader_vfs::{LoadPriority, Vfs, VfsConfig};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
