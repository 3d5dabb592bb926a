//! In-process backend

use super::{validate_key, KeyTtl, KeyValueBackend};
use crate::envelope::to_chrono;
use crate::errors::{Result, StoreType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rolegate_core::{SharedClock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Concurrent in-memory backend. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<DashMap<String, MemoryEntry>>,
    clock: SharedClock,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(SystemClock::shared())
    }
}

impl MemoryBackend {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn live<R>(&self, key: &str, f: impl FnOnce(&MemoryEntry) -> R) -> Option<R> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(f(&entry));
            }
        } else {
            return None;
        }

        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            trace!(key, "evicted expired entry");
        }
        None
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    fn store_type(&self) -> StoreType {
        StoreType::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.live(key, |entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let expires_at = ttl.map(|ttl| self.clock.now() + to_chrono(ttl));
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        validate_key(key)?;
        let now = self.clock.now();
        Ok(self
            .live(key, |entry| match entry.expires_at {
                None => KeyTtl::Persistent,
                Some(at) => KeyTtl::Expires((at - now).to_std().unwrap_or(Duration::ZERO)),
            })
            .unwrap_or(KeyTtl::Missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rolegate_core::ManualClock;

    fn backend() -> (MemoryBackend, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        (MemoryBackend::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (backend, _) = backend();
        backend.set("a", b"one".to_vec(), None).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(backend.ttl("a").await.unwrap(), KeyTtl::Persistent);

        assert!(backend.delete("a").await.unwrap());
        assert!(!backend.delete("a").await.unwrap());
        assert_eq!(backend.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_follows_clock() {
        let (backend, clock) = backend();
        backend
            .set("a", b"one".to_vec(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(
            backend.ttl("a").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(10))
        );

        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(backend.get("a").await.unwrap(), None);
        assert_eq!(backend.ttl("a").await.unwrap(), KeyTtl::Missing);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_counts_live_entries() {
        let (backend, clock) = backend();
        backend.set("a", vec![1], None).await.unwrap();
        backend
            .set("b", vec![2], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(5));

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(backend.delete_many(&keys).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (backend, clock) = backend();
        backend
            .set("a", vec![1], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        backend.set("b", vec![2], None).await.unwrap();
        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let (backend, _) = backend();
        assert!(backend.get("").await.is_err());
        assert!(backend.set("a\r\n", vec![], None).await.is_err());
    }
}
