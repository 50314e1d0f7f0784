//! AES key registry.
//!
//! Archives resolve the AES key to use for decryption by a GUID (or, for
//! containers that don't carry a real GUID, any string identifier).
//! [`KeyRegistry`] holds a set of directly-registered keys plus an
//! ordered chain of external [`KeyProvider`]s, and memoises both hits
//! and misses so repeated lookups for an unknown key don't re-walk the
//! chain.

mod error;
mod key;
mod provider;
mod registry;

pub use error::{Error, Result};
pub use key::AesKey;
pub use provider::KeyProvider;
pub use registry::{KeyRegistry, RegistryStats};
