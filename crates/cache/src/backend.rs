//! Key-value backends with per-entry expiry
//!
//! A backend only moves opaque bytes. Encoding, compression and the meaning
//! of keys belong to the layers above.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::errors::{CacheError, Result, StoreType};
use async_trait::async_trait;
use std::time::Duration;

/// Longest key a backend accepts
pub const MAX_KEY_LEN: usize = 512;

/// Expiry state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// No such key, or it already expired
    Missing,
    /// Present without expiry
    Persistent,
    /// Present, expiring after the given duration
    Expires(Duration),
}

impl KeyTtl {
    /// Remaining duration, if the key exists and expires
    pub fn remaining(self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(d) => Some(d),
            _ => None,
        }
    }

    pub fn exists(self) -> bool {
        !matches!(self, KeyTtl::Missing)
    }
}

/// Byte-level storage with optional TTL per key
#[async_trait]
pub trait KeyValueBackend: Send + Sync + std::fmt::Debug {
    /// Kind of store, used in error reporting
    fn store_type(&self) -> StoreType;

    /// Read the value stored at `key`; expired entries read as absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` at `key`, replacing any previous value
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove several keys, returning how many live entries were removed
    async fn delete_many(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.ttl(key).await?.exists())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;
}

/// Reject keys no backend can store safely
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::invalid_key(key, "key cannot be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CacheError::invalid_key(
            key,
            format!("key longer than {MAX_KEY_LEN} bytes"),
        ));
    }
    if key.contains(['\0', '\r', '\n']) {
        return Err(CacheError::invalid_key(key, "key contains control characters"));
    }
    Ok(())
}
