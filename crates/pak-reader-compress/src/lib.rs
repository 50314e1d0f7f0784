//! Pluggable decompression, keyed by method name.
//!
//! [`Registry`] maps a method name (`none`, `zlib`, `gzip`, or any
//! plug-in-registered name such as `oodle`) to a [`Decoder`].
//! Matching is case-insensitive and registration is additive, so a
//! caller can register an `oodle` implementation without needing a
//! cargo feature flag.

mod decoder;
mod error;
mod registry;

pub use decoder::{Decoder, GzipDecoder, NoneDecoder, UnsupportedDecoder, ZlibDecoder};
pub use error::{Error, Result};
pub use registry::Registry;
