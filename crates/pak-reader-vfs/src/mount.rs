//! Mount-list entries: path normalization and the capability-set
//! wrapper that lets the VFS treat a PAK and an IoStore container the
//! same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pak_reader_common::EntryInfo;
use pak_reader_compress::Registry as CompressRegistry;
use pak_reader_iostore::IoStoreArchive;
use pak_reader_keys::KeyRegistry;
use pak_reader_pak::PakArchive;

use crate::error::{Error, Result};
use crate::priority::LoadPriority;

/// Normalize a virtual path the way the VFS keys its mounts and cache
/// by: forward slashes, duplicate separators collapsed, ASCII
/// lower-cased, no leading or trailing slash. `.`/`..` segments are
/// left alone (archives don't nest directories that deeply in
/// practice, so this only strips incidental formatting differences).
pub fn normalize_path(path: &str) -> String {
    let lowered = path.replace('\\', "/").to_ascii_lowercase();
    let mut collapsed = String::with_capacity(lowered.len());
    let mut last_was_slash = false;
    for c in lowered.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(c);
    }
    collapsed.trim_start_matches('/').trim_end_matches('/').to_string()
}

/// The concrete archive format backing a [`ArchiveHandle`].
pub enum ArchiveKind {
    Pak(PakArchive),
    IoStore(IoStoreArchive),
}

/// A mounted archive plus the key/compression registries it was
/// opened with, wrapped so the VFS can call `has`/`info`/`list`/`get`
/// without matching on the concrete container type at every call site:
/// a tagged variant with a shared capability set in place of a trait
/// object.
pub struct ArchiveHandle {
    kind: ArchiveKind,
    keys: Arc<KeyRegistry>,
    compress: Arc<CompressRegistry>,
    closed: AtomicBool,
}

impl ArchiveHandle {
    pub fn pak(archive: PakArchive, keys: Arc<KeyRegistry>, compress: Arc<CompressRegistry>) -> Self {
        Self {
            kind: ArchiveKind::Pak(archive),
            keys,
            compress,
            closed: AtomicBool::new(false),
        }
    }

    pub fn iostore(archive: IoStoreArchive, keys: Arc<KeyRegistry>, compress: Arc<CompressRegistry>) -> Self {
        Self {
            kind: ArchiveKind::IoStore(archive),
            keys,
            compress,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Mark this handle closed. Idempotent; a later call is a no-op.
    /// In-flight loads already holding a clone of the underlying mmap
    /// run to completion.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn has(&self, path: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        match &self.kind {
            ArchiveKind::Pak(a) => a.has(path),
            ArchiveKind::IoStore(a) => a.has(path),
        }
    }

    pub fn info(&self, path: &str) -> Result<Option<EntryInfo>> {
        self.check_open()?;
        Ok(match &self.kind {
            ArchiveKind::Pak(a) => a.info(path),
            ArchiveKind::IoStore(a) => a.info(path),
        })
    }

    pub fn list(&self, pattern: &str) -> Result<Vec<EntryInfo>> {
        self.check_open()?;
        Ok(match &self.kind {
            ArchiveKind::Pak(a) => a.list(pattern).into_iter().map(Into::into).collect(),
            ArchiveKind::IoStore(a) => a.list(pattern),
        })
    }

    /// Extract and decode `path`'s full contents. This is the
    /// potentially slow, blocking call the load queue offloads to a
    /// worker thread for `get_async`.
    pub fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        match &self.kind {
            ArchiveKind::Pak(a) => Ok(a.get(path, &self.keys, &self.compress)?),
            ArchiveKind::IoStore(a) => Ok(a.get(path, &self.keys, &self.compress)?),
        }
    }
}

/// A single mounted archive at a given priority, with the virtual
/// path prefix callers address it through.
pub struct Mount {
    pub id: u64,
    pub prefix: String,
    pub priority: LoadPriority,
    pub archive: Arc<ArchiveHandle>,
}

impl Mount {
    /// Whether `path` (already normalized) falls under this mount's
    /// prefix, and if so, the suffix to look up inside the archive.
    pub fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        strip_prefix(&self.prefix, path)
    }
}

fn strip_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    path.strip_prefix(prefix).map(|rest| rest.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_strips_slashes_and_backslashes() {
        assert_eq!(normalize_path("/foo/bar/"), "foo/bar");
        assert_eq!(normalize_path("foo\\bar"), "foo/bar");
        assert_eq!(normalize_path("foo/bar"), "foo/bar");
    }

    #[test]
    fn normalize_path_lowercases_and_collapses_duplicate_separators() {
        assert_eq!(normalize_path("/Game/Foo"), "game/foo");
        assert_eq!(normalize_path("/game//foo"), "game/foo");
        assert_eq!(normalize_path("Game\\\\Foo//Bar"), "game/foo/bar");
    }

    #[test]
    fn strip_prefix_with_empty_prefix_returns_whole_path() {
        assert_eq!(strip_prefix("", "a/b.txt"), Some("a/b.txt"));
    }

    #[test]
    fn strip_prefix_rejects_paths_outside_mount() {
        assert_eq!(strip_prefix("data", "data/a.txt"), Some("a.txt"));
        assert_eq!(strip_prefix("data", "other/a.txt"), None);
    }
}
