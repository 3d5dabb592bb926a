//! Shared fixtures for permission service integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rolegate_cache::{CacheError, KeyTtl, KeyValueBackend, MemoryBackend, StoreType};
use rolegate_core::{ManualClock, Role, UserId};
use rolegate_permissions::{PermissionService, PermissionServiceConfig, StaticRoleLookup};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const VIEWER: u64 = 1;
pub const ANALYST: u64 = 2;
pub const ADMIN: u64 = 3;
pub const RESEARCHER: u64 = 4;
pub const CONTRACTOR: u64 = 5;
pub const UNKNOWN: u64 = 99;

pub fn user(id: u64) -> UserId {
    UserId::new(id).unwrap()
}

pub fn role(name: &str) -> Role {
    Role::new(name).unwrap()
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Memory backend that can be switched into a failing state
#[derive(Debug, Clone)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<AtomicBool>,
}

impl FlakyBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn check(&self) -> rolegate_cache::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::store_unavailable(
                StoreType::Custom("flaky".to_string()),
                "connection refused",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueBackend for FlakyBackend {
    fn store_type(&self) -> StoreType {
        StoreType::Custom("flaky".to_string())
    }

    async fn get(&self, key: &str) -> rolegate_cache::Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> rolegate_cache::Result<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> rolegate_cache::Result<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn ttl(&self, key: &str) -> rolegate_cache::Result<KeyTtl> {
        self.check()?;
        self.inner.ttl(key).await
    }
}

pub struct Harness {
    pub service: PermissionService,
    pub clock: Arc<ManualClock>,
    pub backend: FlakyBackend,
    pub directory: StaticRoleLookup,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PermissionServiceConfig::default())
    }

    pub fn with_config(config: PermissionServiceConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let backend = FlakyBackend::new(MemoryBackend::new(clock.clone()));
        let directory = StaticRoleLookup::new()
            .with_user(user(VIEWER), role("viewer"))
            .with_user(user(ANALYST), role("analyst"))
            .with_user(user(ADMIN), role("admin"))
            .with_user(user(RESEARCHER), role("researcher"))
            .with_user(user(CONTRACTOR), role("contractor"));

        let service = PermissionService::builder()
            .with_backend(Arc::new(backend.clone()))
            .with_role_lookup(Arc::new(directory.clone()))
            .with_config(config)
            .with_clock(clock.clone())
            .build()
            .unwrap();

        Self {
            service,
            clock,
            backend,
            directory,
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }
}
