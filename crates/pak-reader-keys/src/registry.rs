//! [`KeyRegistry`]: directly-registered keys plus a chain of providers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{AesKey, Error, KeyProvider, Result};

fn canonicalize(guid: &str) -> String {
    guid.to_uppercase()
}

/// Lookup counters exposed by [`KeyRegistry::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Lookups answered from the direct map or the memoization cache.
    pub cache_hits: u64,
    /// Lookups that had to walk the provider chain.
    pub cache_misses: u64,
    /// Lookups that found no key anywhere (also memoized).
    pub not_found: u64,
}

/// Resolves AES keys by GUID.
///
/// Lookup order: directly-registered keys first, then each
/// [`KeyProvider`] in registration order. The result, whether a key or
/// a miss, is memoized so a repeated lookup for the same GUID never
/// re-walks the chain.
pub struct KeyRegistry {
    direct: RwLock<HashMap<String, AesKey>>,
    providers: Vec<Box<dyn KeyProvider>>,
    cache: RwLock<HashMap<String, Option<AesKey>>>,
    stats: RwLock<RegistryStats>,
}

impl KeyRegistry {
    /// An empty registry with no providers.
    pub fn new() -> Self {
        Self {
            direct: RwLock::new(HashMap::new()),
            providers: Vec::new(),
            cache: RwLock::new(HashMap::new()),
            stats: RwLock::new(RegistryStats::default()),
        }
    }

    /// Append a provider to the lookup chain. Providers are consulted
    /// in the order they're added, after the direct map.
    pub fn with_provider(mut self, provider: impl KeyProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Register a key directly under a GUID, rejecting invalid key
    /// lengths. Overwrites any existing direct entry for the same GUID
    /// and invalidates its cached result.
    pub fn add(&self, guid: &str, key_bytes: impl Into<Vec<u8>>) -> Result<()> {
        let key = AesKey::new(key_bytes)?;
        let guid = canonicalize(guid);
        self.direct.write().insert(guid.clone(), key);
        self.cache.write().remove(&guid);
        Ok(())
    }

    /// Convenience for `add` followed by populating the cache with the
    /// same key, so the very next `get` is a cache hit rather than a
    /// direct-map lookup.
    pub fn submit(&self, guid: &str, key_bytes: impl Into<Vec<u8>>) -> Result<()> {
        let key = AesKey::new(key_bytes)?;
        let guid = canonicalize(guid);
        self.direct.write().insert(guid.clone(), key.clone());
        self.cache.write().insert(guid, Some(key));
        Ok(())
    }

    /// Resolve the key for a GUID, checking the cache, then the direct
    /// map, then the provider chain in order. Memoizes the outcome
    /// (including a miss) before returning.
    pub fn get(&self, guid: &str) -> Option<AesKey> {
        let guid = canonicalize(guid);

        if let Some(cached) = self.cache.read().get(&guid) {
            let mut stats = self.stats.write();
            match cached {
                Some(_) => stats.cache_hits += 1,
                None => stats.not_found += 1,
            }
            return cached.clone();
        }

        if let Some(key) = self.direct.read().get(&guid).cloned() {
            self.cache.write().insert(guid, Some(key.clone()));
            self.stats.write().cache_hits += 1;
            return Some(key);
        }

        self.stats.write().cache_misses += 1;
        let found = self.providers.iter().find_map(|p| p.lookup(&guid));
        if found.is_none() {
            self.stats.write().not_found += 1;
        }
        self.cache.write().insert(guid, found.clone());
        found
    }

    /// Drop all memoized lookups. Directly-registered keys and
    /// providers are unaffected; the next `get` for any GUID re-walks
    /// the chain.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// A snapshot of the lookup counters.
    pub fn stats(&self) -> RegistryStats {
        *self.stats.read()
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticKeyProvider;

    const GUID: &str = "abcd1234-0000-0000-0000-000000000000";

    #[test]
    fn add_then_get_is_case_insensitive() {
        let reg = KeyRegistry::new();
        reg.add(GUID, vec![0u8; 16]).unwrap();
        assert!(reg.get("ABCD1234-0000-0000-0000-000000000000").is_some());
    }

    #[test]
    fn add_rejects_bad_key_length() {
        let reg = KeyRegistry::new();
        assert!(reg.add(GUID, vec![0u8; 10]).is_err());
    }

    #[test]
    fn unknown_guid_falls_through_to_provider() {
        let key = AesKey::new(vec![1u8; 32]).unwrap();
        let provider = StaticKeyProvider::new("p", [(GUID.to_string(), key)]);
        let reg = KeyRegistry::new().with_provider(provider);
        assert!(reg.get(GUID).is_some());
    }

    #[test]
    fn misses_are_memoized() {
        let reg = KeyRegistry::new();
        assert!(reg.get("ffffffff-0000-0000-0000-000000000000").is_none());
        let stats = reg.stats();
        assert_eq!(stats.not_found, 1);
        assert!(reg.get("ffffffff-0000-0000-0000-000000000000").is_none());
        let stats = reg.stats();
        assert_eq!(stats.not_found, 2);
        assert_eq!(stats.cache_misses, 1, "second lookup should hit cache, not re-walk chain");
    }

    #[test]
    fn submit_populates_cache_directly() {
        let reg = KeyRegistry::new();
        reg.submit(GUID, vec![0u8; 16]).unwrap();
        assert!(reg.get(GUID).is_some());
        assert_eq!(reg.stats().cache_misses, 0);
    }

    #[test]
    fn clear_cache_forces_rewalk() {
        let reg = KeyRegistry::new();
        reg.get(GUID);
        assert_eq!(reg.stats().cache_misses, 1);
        reg.clear_cache();
        reg.get(GUID);
        assert_eq!(reg.stats().cache_misses, 2);
    }
}
