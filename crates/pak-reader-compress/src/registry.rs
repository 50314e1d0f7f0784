//! The process-wide method-name → [`Decoder`] registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::decoder::{GzipDecoder, NoneDecoder, UnsupportedDecoder, ZlibDecoder};
use crate::{Decoder, Error, Result};

fn canonicalize(method: &str) -> String {
    method.to_lowercase()
}

/// A mapping from compression method name to [`Decoder`].
///
/// Matching is case-insensitive. Built-ins (`none`, `zlib`, `gzip`)
/// are present from [`Registry::new`]; `oodle` starts out registered
/// to an [`UnsupportedDecoder`] and can be overridden with a plug-in
/// via [`Registry::register`].
pub struct Registry {
    decoders: RwLock<HashMap<String, Arc<dyn Decoder>>>,
}

impl Registry {
    /// A registry with the built-in decoders already registered.
    pub fn new() -> Self {
        let mut decoders: HashMap<String, Arc<dyn Decoder>> = HashMap::new();
        decoders.insert("none".to_string(), Arc::new(NoneDecoder));
        decoders.insert("zlib".to_string(), Arc::new(ZlibDecoder));
        decoders.insert("gzip".to_string(), Arc::new(GzipDecoder));
        decoders.insert(
            "oodle".to_string(),
            Arc::new(UnsupportedDecoder {
                method: "oodle".to_string(),
            }),
        );
        Self {
            decoders: RwLock::new(decoders),
        }
    }

    /// Register (or replace) the decoder for a method name.
    pub fn register(&self, method: impl Into<String>, decoder: impl Decoder + 'static) {
        self.decoders
            .write()
            .insert(canonicalize(&method.into()), Arc::new(decoder));
    }

    /// Decode `input` using the decoder registered for `method`,
    /// expecting the result to be exactly `expected_size` bytes.
    pub fn decode(&self, method: &str, input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let method = canonicalize(method);
        let decoder = self.decoders.read().get(&method).cloned().ok_or_else(|| Error::Unsupported {
            method: method.clone(),
        })?;
        decoder.decode(input, expected_size)
    }

    /// The method names currently registered, for diagnostics.
    pub fn supported_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.decoders.read().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<u8>);

    impl Decoder for Fixed {
        fn decode(&self, _input: &[u8], _expected_size: usize) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn built_ins_are_present() {
        let reg = Registry::new();
        let methods = reg.supported_methods();
        assert!(methods.contains(&"none".to_string()));
        assert!(methods.contains(&"zlib".to_string()));
        assert!(methods.contains(&"gzip".to_string()));
        assert!(methods.contains(&"oodle".to_string()));
    }

    #[test]
    fn method_matching_is_case_insensitive() {
        let reg = Registry::new();
        let out = reg.decode("NONE", b"hi", 2).unwrap();
        assert_eq!(out, b"hi");
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let reg = Registry::new();
        let err = reg.decode("lz4", b"", 0).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn oodle_fails_until_plugin_registered() {
        let reg = Registry::new();
        assert!(reg.decode("oodle", b"x", 1).is_err());
        reg.register("oodle", Fixed(vec![1, 2, 3]));
        assert_eq!(reg.decode("oodle", b"x", 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn register_can_override_a_builtin() {
        let reg = Registry::new();
        reg.register("none", Fixed(vec![9, 9]));
        assert_eq!(reg.decode("none", b"anything", 2).unwrap(), vec![9, 9]);
    }
}
