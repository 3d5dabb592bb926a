//! Cache layer for rolegate
//!
//! This crate provides:
//! - `CacheEnvelope`, a TTL and freshness wrapper for any `Cacheable` payload
//! - Transparent gzip/zstd compression with checksummed frames
//! - `KeyValueBackend` with in-memory and filesystem implementations
//! - Structured `CacheError`s carrying recovery hints

pub mod backend;
pub mod compression;
pub mod config;
pub mod envelope;
pub mod errors;

pub use backend::{validate_key, FileBackend, KeyTtl, KeyValueBackend, MemoryBackend};
pub use config::{CacheConfig, CacheConfigBuilder, Codec, CompressionConfig};
pub use envelope::{CacheEnvelope, CacheStatus, Cacheable, EnvelopeInfo};
pub use errors::{CacheError, RecoveryHint, Result, SerializationOp, StoreType};
