//! External key providers, chained behind the directly-registered keys.

use crate::AesKey;

/// A source of keys consulted by [`crate::KeyRegistry`] when a directly
/// registered key isn't found. Providers are tried in registration
/// order; the capability-set shape here (a trait object) follows the
/// same pattern as the per-method compression [`Decoder`][crate-note]
/// rather than an inheritance hierarchy.
///
/// [crate-note]: https://docs.rs/pak-reader-compress
pub trait KeyProvider: Send + Sync {
    /// Look up a key by its canonical hyphenated GUID string.
    fn lookup(&self, guid: &str) -> Option<AesKey>;

    /// A short name for diagnostics.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// A provider backed by a static, pre-populated map. Useful for wiring
/// up a key file loaded once at startup.
pub struct StaticKeyProvider {
    name: String,
    keys: std::collections::HashMap<String, AesKey>,
}

impl StaticKeyProvider {
    /// Build a provider from an iterator of `(guid, key)` pairs. GUIDs
    /// are canonicalized to upper-case for case-insensitive lookup.
    pub fn new(name: impl Into<String>, entries: impl IntoIterator<Item = (String, AesKey)>) -> Self {
        let keys = entries
            .into_iter()
            .map(|(guid, key)| (guid.to_uppercase(), key))
            .collect();
        Self {
            name: name.into(),
            keys,
        }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn lookup(&self, guid: &str) -> Option<AesKey> {
        self.keys.get(&guid.to_uppercase()).cloned()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
