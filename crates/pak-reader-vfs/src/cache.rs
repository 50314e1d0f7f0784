//! The decoded-buffer cache: size- and entry-capped, evicted by a
//! priority-boosted recency score.

use std::time::Instant;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

use crate::priority::LoadPriority;

/// [`Cache`] sizing and policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Total cached byte budget.
    pub max_size: u64,
    /// Maximum number of cached entries, independent of their size.
    pub max_entries: usize,
    /// When `false`, eviction ignores the priority boost and falls
    /// back to pure least-recently-used order.
    pub enable_lru: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 256 * 1024 * 1024,
            max_entries: 1000,
            enable_lru: true,
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    data: Bytes,
    size: u64,
    last_access: i64,
    access_count: u64,
    priority: LoadPriority,
}

/// A snapshot of the cache's hit/miss counters and current occupancy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_size: u64,
    pub entry_count: usize,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    total_size: u64,
    hits: u64,
    misses: u64,
}

/// A size- and entry-capped store of decoded entry bytes.
///
/// Eviction picks the entry with the lowest score, where
/// `score = last_access_secs + priority_boost_hours * 3600`: a
/// higher-priority entry's score is pushed forward in time, so it
/// survives passes that would otherwise evict it for being the least
/// recently touched.
pub struct Cache {
    config: CacheConfig,
    inner: Mutex<Inner>,
    epoch: Instant,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                total_size: 0,
                hits: 0,
                misses: 0,
            }),
            epoch: Instant::now(),
        }
    }

    fn now_secs(&self) -> i64 {
        self.epoch.elapsed().as_secs() as i64
    }

    /// Fetch cached bytes for `path`, bumping its recency and access
    /// count. Does not initiate I/O on a miss.
    pub fn get(&self, path: &str) -> Option<Bytes> {
        let now = self.now_secs();
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(path) {
            entry.last_access = now;
            entry.access_count += 1;
            let data = entry.data.clone();
            inner.hits += 1;
            return Some(data);
        }
        inner.misses += 1;
        None
    }

    /// Whether `path` is currently cached, without affecting stats or
    /// recency.
    pub fn contains(&self, path: &str) -> bool {
        self.inner.lock().entries.contains(path)
    }

    /// Admit `data` under `path` at `priority`, evicting lower-scored
    /// entries first if needed to stay within the configured caps. An
    /// entry larger than `max_size` on its own is never cached.
    pub fn insert(&self, path: String, data: Bytes, priority: LoadPriority) {
        let size = data.len() as u64;
        if size > self.config.max_size {
            tracing::warn!(path = %path, size, "entry exceeds max_cache_size, not caching");
            return;
        }

        let now = self.now_secs();
        let mut inner = self.inner.lock();
        self.evict_to_fit(&mut inner, size);

        let entry = CacheEntry {
            data,
            size,
            last_access: now,
            access_count: 0,
            priority,
        };
        if let Some(old) = inner.entries.put(path, entry) {
            inner.total_size -= old.size;
        }
        inner.total_size += size;
    }

    fn evict_to_fit(&self, inner: &mut Inner, incoming: u64) {
        loop {
            let over_budget = inner.total_size + incoming > self.config.max_size;
            let over_count = inner.entries.len() >= self.config.max_entries;
            if inner.entries.is_empty() || !(over_budget || over_count) {
                break;
            }

            let victim = inner
                .entries
                .iter()
                .map(|(path, entry)| (path.clone(), self.score(entry)))
                .min_by_key(|(_, score)| *score)
                .map(|(path, _)| path);

            let Some(victim) = victim else { break };
            if let Some(removed) = inner.entries.pop(&victim) {
                inner.total_size -= removed.size;
            }
        }
    }

    fn score(&self, entry: &CacheEntry) -> i64 {
        if self.config.enable_lru {
            entry.last_access + entry.priority.boost_units() * 3600
        } else {
            entry.last_access
        }
    }

    /// Drop every cached entry whose key starts with `prefix`, used
    /// when a mount is unmounted.
    pub fn remove_prefix(&self, prefix: &str) {
        let mut inner = self.inner.lock();
        let victims: Vec<String> = inner
            .entries
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect();
        for path in victims {
            if let Some(entry) = inner.entries.pop(&path) {
                inner.total_size -= entry.size;
            }
        }
    }

    /// A snapshot of the cache's counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            total_size: inner.total_size,
            entry_count: inner.entries.len(),
        }
    }
}
