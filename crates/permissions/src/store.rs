//! Persistence port for permission records

use crate::record::PermissionRecord;
use async_trait::async_trait;
use rolegate_cache::{CacheConfig, CacheEnvelope, CacheError, KeyValueBackend, Result};
use rolegate_core::{SharedClock, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Whole-record persistence
///
/// `put` always replaces the stored record. There is no field merge and no
/// version check at this layer.
#[async_trait]
pub trait PermissionStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, user_id: UserId) -> Result<Option<CacheEnvelope<PermissionRecord>>>;

    /// Store `record`, expiring after `ttl` (never when `None`)
    async fn put(
        &self,
        user_id: UserId,
        record: &PermissionRecord,
        ttl: Option<Duration>,
    ) -> Result<()>;

    async fn delete(&self, user_id: UserId) -> Result<bool>;

    async fn delete_many(&self, user_ids: &[UserId]) -> Result<usize> {
        let mut removed = 0;
        for &user_id in user_ids {
            if self.delete(user_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, user_id: UserId) -> Result<bool> {
        Ok(self.get(user_id).await?.is_some())
    }

    /// Remaining lifetime, `None` when absent or persistent
    async fn get_ttl(&self, user_id: UserId) -> Result<Option<Duration>>;
}

/// `PermissionStore` over any key-value backend
#[derive(Debug, Clone)]
pub struct CachePermissionStore {
    backend: Arc<dyn KeyValueBackend>,
    config: CacheConfig,
    clock: SharedClock,
}

impl CachePermissionStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            backend,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Backend key for `user_id`
    pub fn key(&self, user_id: UserId) -> String {
        format!("{}{}", self.config.key_prefix, user_id)
    }
}

#[async_trait]
impl PermissionStore for CachePermissionStore {
    async fn get(&self, user_id: UserId) -> Result<Option<CacheEnvelope<PermissionRecord>>> {
        let key = self.key(user_id);
        let Some(bytes) = self.backend.get(&key).await? else {
            trace!(%key, "cache miss");
            return Ok(None);
        };

        let envelope = CacheEnvelope::<PermissionRecord>::from_bytes(&key, &bytes)?;
        if envelope.payload.user_id != user_id {
            return Err(CacheError::corruption(
                key,
                format!("record belongs to user {}", envelope.payload.user_id),
            ));
        }
        if envelope.is_expired(self.clock.now()) {
            debug!(%key, "dropping record past its envelope expiry");
            self.backend.delete(&key).await?;
            return Ok(None);
        }

        trace!(%key, version = envelope.payload.version, "cache hit");
        Ok(Some(envelope))
    }

    async fn put(
        &self,
        user_id: UserId,
        record: &PermissionRecord,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = self.key(user_id);
        let envelope = CacheEnvelope::new(record.clone(), ttl, self.clock.now());
        let bytes = envelope.to_bytes(&self.config.compression)?;
        self.backend.set(&key, bytes, ttl).await?;
        trace!(%key, version = record.version, ?ttl, "stored record");
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool> {
        self.backend.delete(&self.key(user_id)).await
    }

    async fn delete_many(&self, user_ids: &[UserId]) -> Result<usize> {
        let keys: Vec<String> = user_ids.iter().map(|&id| self.key(id)).collect();
        self.backend.delete_many(&keys).await
    }

    async fn exists(&self, user_id: UserId) -> Result<bool> {
        self.backend.exists(&self.key(user_id)).await
    }

    async fn get_ttl(&self, user_id: UserId) -> Result<Option<Duration>> {
        Ok(self.backend.ttl(&self.key(user_id)).await?.remaining())
    }
}
