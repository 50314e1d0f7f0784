//! The virtual file system: a priority-ordered list of mounted
//! archives behind one cache and one async load queue.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::RwLock;
use pak_reader_common::EntryInfo;
use pak_reader_compress::Registry as CompressRegistry;
use pak_reader_iostore::IoStoreArchive;
use pak_reader_keys::KeyRegistry;
use pak_reader_pak::PakArchive;

use crate::cache::{Cache, CacheConfig, CacheStats};
use crate::error::{Error, Result};
use crate::mount::{normalize_path, ArchiveHandle, Mount};
use crate::priority::LoadPriority;
use crate::preload::PreloadPattern;
use crate::queue::LoadQueue;

/// [`Vfs`] construction knobs.
#[derive(Debug, Clone)]
pub struct VfsConfig {
    pub cache: CacheConfig,
    /// Maximum number of extractions running concurrently through
    /// [`Vfs::get_async`].
    pub max_concurrent_loads: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_concurrent_loads: 4,
        }
    }
}

/// A snapshot combining cache counters with mount and queue occupancy.
#[derive(Debug, Clone, Copy)]
pub struct VfsStats {
    pub cache: CacheStats,
    pub mount_count: usize,
}

/// A read-only virtual file system composited from any number of
/// mounted PAK/IoStore archives, highest priority first.
///
/// Construct via [`Vfs::new`]; the returned value is already an
/// `Arc<Vfs>` because [`Vfs::get_async`] spawns a detached background
/// task that needs to outlive the calling future: cancellation is
/// drop-based, not explicit.
pub struct Vfs {
    mounts: RwLock<Vec<Arc<Mount>>>,
    cache: Cache,
    queue: LoadQueue,
    keys: Arc<KeyRegistry>,
    compress: Arc<CompressRegistry>,
    preload_patterns: RwLock<Vec<PreloadPattern>>,
    next_mount_id: AtomicU64,
    self_ref: Weak<Vfs>,
}

impl Vfs {
    /// Build an empty VFS sharing a single key registry and
    /// compression registry across every archive it goes on to mount.
    pub fn new(config: VfsConfig, keys: Arc<KeyRegistry>, compress: Arc<CompressRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Vfs {
            mounts: RwLock::new(Vec::new()),
            cache: Cache::new(config.cache),
            queue: LoadQueue::new(config.max_concurrent_loads),
            keys,
            compress,
            preload_patterns: RwLock::new(Vec::new()),
            next_mount_id: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    fn alloc_mount_id(&self) -> u64 {
        self.next_mount_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Mount a PAK archive at `path` under virtual path prefix
    /// `mount_prefix`, at the given load priority. Higher-priority
    /// mounts shadow lower-priority ones that contain the same path.
    pub fn mount_pak<P: AsRef<Path>>(
        &self,
        path: P,
        mount_prefix: &str,
        priority: LoadPriority,
    ) -> Result<u64> {
        let archive = PakArchive::open_any(path, &self.keys)?;
        let handle = Arc::new(ArchiveHandle::pak(archive, self.keys.clone(), self.compress.clone()));
        Ok(self.push_mount(mount_prefix, priority, handle))
    }

    /// Mount an IoStore `.utoc`/`.ucas` pair at `toc_path` under
    /// virtual path prefix `mount_prefix`.
    pub fn mount_iostore<P: AsRef<Path>>(
        &self,
        toc_path: P,
        mount_prefix: &str,
        priority: LoadPriority,
    ) -> Result<u64> {
        let archive = IoStoreArchive::open(toc_path, &self.keys)?;
        let handle = Arc::new(ArchiveHandle::iostore(archive, self.keys.clone(), self.compress.clone()));
        Ok(self.push_mount(mount_prefix, priority, handle))
    }

    fn push_mount(&self, mount_prefix: &str, priority: LoadPriority, archive: Arc<ArchiveHandle>) -> u64 {
        let id = self.alloc_mount_id();
        let mount = Arc::new(Mount {
            id,
            prefix: normalize_path(mount_prefix),
            priority,
            archive,
        });
        let mut mounts = self.mounts.write();
        mounts.push(mount);
        mounts.sort_by(|a, b| b.priority.cmp(&a.priority));
        id
    }

    /// Unmount the archive with the given id, closing it and dropping
    /// every cache entry under its path prefix. A no-op if the id is
    /// unknown (already unmounted).
    pub fn unmount(&self, mount_id: u64) {
        let removed = {
            let mut mounts = self.mounts.write();
            let index = mounts.iter().position(|m| m.id == mount_id);
            index.map(|i| mounts.remove(i))
        };
        if let Some(mount) = removed {
            mount.archive.close();
            self.cache.remove_prefix(&mount.prefix);
        }
    }

    fn mounts_snapshot(&self) -> Vec<Arc<Mount>> {
        self.mounts.read().clone()
    }

    /// Find the highest-priority mount containing `path`, and the
    /// path to look up inside its archive.
    fn resolve(&self, path: &str) -> Option<(Arc<Mount>, String)> {
        let normalized = normalize_path(path);
        for mount in self.mounts_snapshot() {
            if let Some(rest) = mount.strip_prefix(&normalized) {
                if mount.archive.has(rest) {
                    return Some((mount, rest.to_string()));
                }
            }
        }
        None
    }

    /// Whether any mount contains `path`.
    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Metadata for `path` from the highest-priority mount that has
    /// it, without reading its contents.
    pub fn info(&self, path: &str) -> Result<Option<EntryInfo>> {
        match self.resolve(path) {
            Some((mount, rest)) => mount.archive.info(&rest),
            None => Ok(None),
        }
    }

    /// List every entry across every mount whose path matches `glob`,
    /// highest priority mount first, without deduplicating shadowed
    /// entries (callers wanting the resolved view should follow up
    /// with [`Vfs::exists`]/[`Vfs::info`] per path).
    pub fn list(&self, pattern: &str) -> Result<Vec<EntryInfo>> {
        let mut out = Vec::new();
        for mount in self.mounts_snapshot() {
            out.extend(mount.archive.list(pattern)?);
        }
        Ok(out)
    }

    /// Synchronously read and decode `path`'s full contents, checking
    /// the cache first and populating it on a miss. Blocks the calling
    /// thread for the duration of any extraction.
    pub fn get_sync(&self, path: &str) -> Result<Option<Bytes>> {
        let normalized = normalize_path(path);
        if let Some(cached) = self.cache.get(&normalized) {
            return Ok(Some(cached));
        }

        let Some((mount, rest)) = self.resolve(path) else {
            return Ok(None);
        };
        let Some(data) = mount.archive.get(&rest)? else {
            return Ok(None);
        };

        let bytes = Bytes::from(data);
        self.cache.insert(normalized.clone(), bytes.clone(), mount.priority);
        self.maybe_trigger_preload(&normalized);
        Ok(Some(bytes))
    }

    /// Asynchronously read and decode `path`'s full contents.
    ///
    /// Concurrent callers for the same path share one extraction
    /// (in-flight deduplication); the actual load runs in a
    /// detached background task so that dropping this call's future
    /// (cancellation) never orphans other waiters on the same path —
    /// only this caller's own wait is abandoned.
    pub async fn get_async(&self, path: &str, priority: LoadPriority) -> Result<Option<Bytes>> {
        let normalized = normalize_path(path);
        if let Some(cached) = self.cache.get(&normalized) {
            return Ok(Some(cached));
        }

        let Some((mount, rest)) = self.resolve(path) else {
            return Ok(None);
        };

        let (rx, ticket) = self.queue.register(&normalized, priority);
        if let Some(ticket) = ticket {
            let archive = mount.archive.clone();
            let vfs = self.self_ref.upgrade();
            let cache_key = normalized.clone();
            let mount_priority = mount.priority;
            tokio::spawn(async move {
                // Extraction runs inside `run`'s load future so the
                // semaphore permit and scheduling order actually gate
                // the blocking work, not just the result fan-out.
                ticket
                    .run(async move {
                        let result: Result<Option<Vec<u8>>> = match tokio::task::spawn_blocking(move || archive.get(&rest)).await {
                            Ok(inner) => inner,
                            Err(e) => Err(Error::Join(e.to_string())),
                        };

                        let loaded = match result {
                            Ok(Some(data)) => Ok(Arc::new(data)),
                            Ok(None) => Ok(Arc::new(Vec::new())),
                            Err(e) => Err(e),
                        };

                        if let (Ok(data), Some(vfs)) = (&loaded, &vfs) {
                            vfs.cache.insert(cache_key.clone(), Bytes::from(data.as_ref().clone()), mount_priority);
                            vfs.maybe_trigger_preload(&cache_key);
                        }

                        loaded
                    })
                    .await;
            });
        }

        match rx.await {
            Ok(Ok(data)) => Ok(Some(Bytes::from(data.as_ref().clone()))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Register a preload pattern: future `get_sync`/`get_async` hits
    /// whose path contains any of `pattern.triggers` queue every
    /// mounted file matching `pattern.patterns` (capped at
    /// `pattern.max_files`) as background loads at `pattern.priority`.
    pub fn register_preload_pattern(&self, pattern: PreloadPattern) {
        self.preload_patterns.write().push(pattern);
    }

    /// Scan registered preload patterns against a successfully-loaded
    /// path; each one whose trigger matches lists every mounted file
    /// matching its glob selectors, caps the result at `max_files`, and
    /// enqueues the survivors as a background batch. Never
    /// blocks the caller: listing and enqueuing both happen inside a
    /// detached task.
    fn maybe_trigger_preload(&self, path: &str) {
        let fired: Vec<_> = self
            .preload_patterns
            .read()
            .iter()
            .filter(|p| p.matches_trigger(path))
            .cloned()
            .collect();
        if fired.is_empty() {
            return;
        }
        let Some(vfs) = self.self_ref.upgrade() else { return };
        tokio::spawn(async move {
            for pattern in fired {
                let mut targets = Vec::new();
                for mount in vfs.mounts_snapshot() {
                    for glob_pattern in &pattern.patterns {
                        if let Ok(entries) = mount.archive.list(glob_pattern) {
                            targets.extend(entries.into_iter().map(|e| e.path));
                        }
                    }
                    if targets.len() >= pattern.max_files {
                        break;
                    }
                }
                targets.truncate(pattern.max_files);

                for target in targets {
                    let vfs = vfs.clone();
                    let priority = pattern.priority;
                    tokio::spawn(async move {
                        let _ = vfs.get_async(&target, priority).await;
                    });
                }
            }
        });
    }

    /// A snapshot of cache and mount statistics.
    pub fn stats(&self) -> VfsStats {
        VfsStats {
            cache: self.cache.stats(),
            mount_count: self.mounts.read().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_length_prefixed(buf: &mut Vec<u8>, s: &str) {
        let bytes = s.as_bytes();
        buf.extend_from_slice(&((bytes.len() as i32) + 1).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf.push(0);
    }

    fn footer_magic_bytes() -> [u8; 4] {
        0x5A6F12E1u32.to_le_bytes()
    }

    /// Builds a minimal, unencrypted, uncompressed version-1 PAK
    /// containing a single entry, mirroring pak-reader-pak's own test
    /// fixture builder.
    fn build_plain_pak(entry_path: &str, contents: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let data_offset = 0u64;
        buf.extend_from_slice(contents);

        let mut index = Vec::new();
        write_length_prefixed(&mut index, "../../../");
        index.extend_from_slice(&1u32.to_le_bytes());

        let mut entry = Vec::new();
        write_length_prefixed(&mut entry, entry_path);
        entry.extend_from_slice(&data_offset.to_le_bytes());
        entry.extend_from_slice(&(contents.len() as u64).to_le_bytes());
        entry.extend_from_slice(&(contents.len() as u64).to_le_bytes());
        entry.extend_from_slice(&0u32.to_le_bytes());
        let mut hash = [0u8; 20];
        hash[0] = 1;
        entry.extend_from_slice(&hash);
        index.extend_from_slice(&entry);

        let index_offset = buf.len() as u64;
        let index_size = index.len() as u64;
        buf.extend_from_slice(&index);

        let mut footer = Vec::new();
        footer.extend_from_slice(&footer_magic_bytes());
        footer.extend_from_slice(&1u32.to_le_bytes());
        footer.extend_from_slice(&index_offset.to_le_bytes());
        footer.extend_from_slice(&index_size.to_le_bytes());
        footer.extend_from_slice(&[0u8; 20]);
        buf.extend_from_slice(&footer);
        buf
    }

    /// Builds a PAK with several entries at increasing offsets,
    /// for tests that need more than one file per archive.
    fn build_multi_entry_pak(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut offsets = Vec::new();
        for (_, data) in entries {
            offsets.push(buf.len() as u64);
            buf.extend_from_slice(data);
        }

        let mut index = Vec::new();
        write_length_prefixed(&mut index, "../../../");
        index.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for ((path, data), offset) in entries.iter().zip(&offsets) {
            write_length_prefixed(&mut index, path);
            index.extend_from_slice(&offset.to_le_bytes());
            index.extend_from_slice(&(data.len() as u64).to_le_bytes());
            index.extend_from_slice(&(data.len() as u64).to_le_bytes());
            index.extend_from_slice(&0u32.to_le_bytes());
            index.extend_from_slice(&[0u8; 20]);
        }

        let index_offset = buf.len() as u64;
        let index_size = index.len() as u64;
        buf.extend_from_slice(&index);

        buf.extend_from_slice(&footer_magic_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&index_offset.to_le_bytes());
        buf.extend_from_slice(&index_size.to_le_bytes());
        buf.extend_from_slice(&[0u8; 20]);
        buf
    }

    fn write_temp_pak(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".pak").tempfile().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn mount_and_get_sync_round_trips_an_entry() {
        let pak = build_plain_pak("hello.txt", b"hello world");
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();

        assert!(vfs.exists("hello.txt"));
        let data = vfs.get_sync("hello.txt").unwrap().unwrap();
        assert_eq!(&data[..], b"hello world");
    }

    #[test]
    fn get_sync_is_cached_on_second_call() {
        let pak = build_plain_pak("hello.txt", b"hello world");
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();

        vfs.get_sync("hello.txt").unwrap();
        assert_eq!(vfs.stats().cache.hits, 0);
        vfs.get_sync("hello.txt").unwrap();
        assert_eq!(vfs.stats().cache.hits, 1);
    }

    #[test]
    fn unmount_removes_visibility_and_cache_entries() {
        let pak = build_plain_pak("hello.txt", b"hello world");
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        let id = vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();
        vfs.get_sync("hello.txt").unwrap();

        vfs.unmount(id);
        assert!(!vfs.exists("hello.txt"));
        assert_eq!(vfs.stats().cache.entry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_async_round_trips_an_entry() {
        let pak = build_plain_pak("hello.txt", b"hello world");
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();

        let data = vfs.get_async("hello.txt", LoadPriority::Normal).await.unwrap().unwrap();
        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_get_async_for_same_path_shares_one_load() {
        let pak = build_plain_pak("hello.txt", b"hello world");
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();

        let a = vfs.clone();
        let b = vfs.clone();
        let (r1, r2) = tokio::join!(
            a.get_async("hello.txt", LoadPriority::Normal),
            b.get_async("hello.txt", LoadPriority::Normal),
        );
        assert_eq!(&r1.unwrap().unwrap()[..], b"hello world");
        assert_eq!(&r2.unwrap().unwrap()[..], b"hello world");
    }

    #[test]
    fn higher_priority_mount_shadows_lower_priority_mount() {
        let low_pak = build_plain_pak("shared.txt", b"low priority contents");
        let high_pak = build_plain_pak("shared.txt", b"high priority contents");
        let low_file = write_temp_pak(&low_pak);
        let high_file = write_temp_pak(&high_pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(low_file.path(), "", LoadPriority::Low).unwrap();
        vfs.mount_pak(high_file.path(), "", LoadPriority::Critical).unwrap();

        let data = vfs.get_sync("shared.txt").unwrap().unwrap();
        assert_eq!(&data[..], b"high priority contents");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn preload_pattern_fires_and_warms_matching_entries() {
        let pak = build_multi_entry_pak(&[
            ("maps/level01/main.umap", b"map data"),
            ("maps/level01/a.uasset", b"asset a"),
            ("maps/level01/b.uasset", b"asset b"),
            ("maps/level01/readme.txt", b"not preloaded"),
        ]);
        let file = write_temp_pak(&pak);

        let vfs = Vfs::new(VfsConfig::default(), Arc::new(KeyRegistry::new()), Arc::new(CompressRegistry::new()));
        vfs.mount_pak(file.path(), "", LoadPriority::Normal).unwrap();
        vfs.register_preload_pattern(PreloadPattern::simple("level01", "maps/level01/*.uasset", LoadPriority::Low, 10));

        vfs.get_sync("maps/level01/main.umap").unwrap();

        for _ in 0..50 {
            if vfs.stats().cache.entry_count >= 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(vfs.exists("maps/level01/a.uasset"));
        assert!(vfs.exists("maps/level01/b.uasset"));
        assert_eq!(vfs.stats().cache.entry_count, 3);
    }
}
