//! The permission service
//!
//! Every operation reads `now` from the injected clock once and uses it for
//! the whole call. Mutations are read-modify-write with last-write-wins
//! semantics; `update_checked` is the compare-and-set variant.

mod admin;
mod builder;
mod check;
mod update;

pub use builder::PermissionServiceBuilder;

use crate::catalog::PermissionCatalog;
use crate::config::{FailurePolicy, PermissionServiceConfig};
use crate::delta::ChangeSummary;
use crate::errors::{PermissionError, Result};
use crate::lookup::RoleLookup;
use crate::record::PermissionRecord;
use crate::resolver::{self, GrantSource};
use crate::roles::{RoleDefaults, TemplateRegistry};
use crate::store::PermissionStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rolegate_cache::CacheEnvelope;
use rolegate_core::{Role, SharedClock, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves, mutates and audits per-user permission records
#[derive(Debug, Clone)]
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    roles: Arc<dyn RoleLookup>,
    defaults: Arc<RoleDefaults>,
    templates: Arc<TemplateRegistry>,
    catalog: Arc<PermissionCatalog>,
    config: PermissionServiceConfig,
    clock: SharedClock,
    /// Last record read or written per user; only kept under the stale-cache policy
    last_known: Arc<DashMap<UserId, StaleEntry>>,
}

/// A record remembered for the stale-cache policy, with its cache expiry
#[derive(Debug, Clone)]
pub(crate) struct StaleEntry {
    pub(crate) record: PermissionRecord,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

/// Answer to a single permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub user_id: UserId,
    pub permission: String,
    pub has_permission: bool,
    /// Bucket the permission came from, for reporting only
    pub granted_by: Option<GrantSource>,
    /// Stored entry that matched, possibly a wildcard
    pub matched: Option<String>,
    pub is_temporary: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub(crate) fn evaluate(record: &PermissionRecord, permission: &str, now: DateTime<Utc>) -> Self {
        let has_permission = resolver::evaluate(record, permission, now);
        let grant = resolver::grant_source(record, permission, now);
        Self {
            user_id: record.user_id,
            permission: permission.to_string(),
            has_permission,
            granted_by: grant.as_ref().map(|g| g.source),
            matched: grant.as_ref().map(|g| g.matched.clone()),
            is_temporary: grant
                .as_ref()
                .is_some_and(|g| g.source == GrantSource::Temporary),
            expires_at: grant.and_then(|g| g.expires_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkMode {
    /// At least one permission must be granted
    #[default]
    Any,
    /// Every permission must be granted
    All,
}

/// Answer to a bulk check; every permission is evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDecision {
    pub user_id: UserId,
    pub mode: BulkMode,
    pub overall: bool,
    pub results: Vec<Decision>,
    pub granted_count: usize,
    pub total_count: usize,
}

/// Result of `update` and `update_checked`
#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
    pub record: PermissionRecord,
    pub changes: ChangeSummary,
    /// Rejected entries; the rest of the batch was still applied
    #[serde(serialize_with = "errors_as_strings")]
    pub errors: Vec<PermissionError>,
    /// Whether the record was written
    pub persisted: bool,
}

/// Result of `apply_template`
#[derive(Debug, Serialize)]
pub struct TemplateOutcome {
    pub record: PermissionRecord,
    pub template: String,
    pub merged: bool,
    /// Entries added to the direct bucket (merge) or whether it changed (replace)
    pub granted_changes: usize,
    #[serde(serialize_with = "errors_as_strings")]
    pub errors: Vec<PermissionError>,
    pub persisted: bool,
}

fn errors_as_strings<S: serde::Serializer>(
    errors: &[PermissionError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

/// A record read for an operation, with expired grants already collected
pub(crate) struct Loaded {
    pub(crate) record: PermissionRecord,
    /// Remaining lifetime of the stored envelope
    pub(crate) ttl: Option<Duration>,
    /// Temporary grants removed by the collection pass
    pub(crate) expired: Vec<String>,
    /// Version as read from the store, before any change
    pub(crate) stored_version: u64,
}

impl PermissionService {
    pub fn builder() -> PermissionServiceBuilder {
        PermissionServiceBuilder::new()
    }

    pub fn config(&self) -> &PermissionServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn role_defaults(&self) -> &RoleDefaults {
        &self.defaults
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn remember(&self, record: &PermissionRecord, expires_at: Option<DateTime<Utc>>) {
        if self.config.failure_policy != FailurePolicy::StaleCache {
            return;
        }
        self.last_known.insert(
            record.user_id,
            StaleEntry {
                record: record.clone(),
                expires_at,
            },
        );
    }

    /// Remembered record for `user_id`, unless its cache entry has expired
    fn stale_record(&self, user_id: UserId, now: DateTime<Utc>) -> Option<PermissionRecord> {
        let entry = self.last_known.get(&user_id)?;
        if entry.expires_at.is_some_and(|at| now >= at) {
            drop(entry);
            self.last_known.remove(&user_id);
            return None;
        }
        Some(entry.record.clone())
    }

    fn forget(&self, user_id: UserId) {
        self.last_known.remove(&user_id);
    }

    fn validate(&self, raw: &str) -> std::result::Result<rolegate_core::PermissionName, String> {
        self.catalog.validate(raw, self.config.strict_catalog)
    }

    /// Read the stored envelope
    async fn fetch(
        &self,
        user_id: UserId,
        operation: &'static str,
    ) -> Result<Option<CacheEnvelope<PermissionRecord>>> {
        match self.store.get(user_id).await {
            Ok(Some(envelope)) => {
                debug!(user_id = %user_id, version = envelope.payload.version, "permission cache hit");
                self.remember(&envelope.payload, envelope.expires_at);
                Ok(Some(envelope))
            }
            Ok(None) => {
                debug!(user_id = %user_id, "permission cache miss");
                Ok(None)
            }
            Err(source) => {
                warn!(user_id = %user_id, operation, error = %source, "permission store read failed");
                Err(PermissionError::from_cache(user_id, operation, source))
            }
        }
    }

    /// Write `record`, replacing whatever is stored
    async fn persist(
        &self,
        record: &PermissionRecord,
        ttl: Option<Duration>,
        operation: &'static str,
    ) -> Result<()> {
        let user_id = record.user_id;
        if let Err(source) = self.store.put(user_id, record, ttl).await {
            warn!(user_id = %user_id, operation, error = %source, "permission store write failed");
            return Err(PermissionError::from_cache(user_id, operation, source));
        }
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| self.now().checked_add_signed(ttl));
        self.remember(record, expires_at);
        Ok(())
    }

    async fn resolve_role(&self, user_id: UserId, operation: &'static str) -> Result<Role> {
        match self.roles.role_of(user_id).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => {
                warn!(user_id = %user_id, operation, "user has no role");
                Err(PermissionError::NotFound { user_id, operation })
            }
            Err(source) => {
                warn!(user_id = %user_id, operation, error = %source, "role lookup failed");
                Err(PermissionError::RoleLookup {
                    user_id,
                    operation,
                    source,
                })
            }
        }
    }

    /// Version 1 record seeded from the role defaults, not yet persisted
    fn fresh(&self, user_id: UserId, role: &Role, now: DateTime<Utc>) -> PermissionRecord {
        PermissionRecord::new(user_id, self.defaults.for_role(role), now)
    }

    /// Build a record from role defaults and persist it at version 1
    async fn build(
        &self,
        user_id: UserId,
        role: &Role,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<PermissionRecord> {
        let record = self.fresh(user_id, role, now);
        self.persist(&record, self.config.default_ttl, operation)
            .await?;
        info!(user_id = %user_id, role = %role, "materialized permission record");
        Ok(record)
    }

    /// Read the stored record and collect its expired grants, without writing
    async fn load_existing(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<Option<Loaded>> {
        let Some(envelope) = self.fetch(user_id, operation).await? else {
            return Ok(None);
        };
        let ttl = envelope.remaining_ttl(now);
        let mut record = envelope.into_payload();
        let stored_version = record.version;
        let expired = resolver::gc(&mut record, now);
        if !expired.is_empty() {
            debug!(user_id = %user_id, count = expired.len(), "collected expired temporary grants");
        }
        Ok(Some(Loaded {
            record,
            ttl,
            expired,
            stored_version,
        }))
    }

    /// Like [`load_existing`](Self::load_existing), building from role defaults on a miss
    async fn load(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<Loaded> {
        if let Some(loaded) = self.load_existing(user_id, now, operation).await? {
            return Ok(loaded);
        }
        let role = self.resolve_role(user_id, operation).await?;
        let record = self.build(user_id, &role, now, operation).await?;
        Ok(Loaded {
            stored_version: record.version,
            record,
            ttl: self.config.default_ttl,
            expired: Vec::new(),
        })
    }

    /// Persist a collection pass, keeping the remaining TTL. No write when nothing expired.
    async fn write_back(
        &self,
        loaded: &mut Loaded,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<()> {
        if loaded.expired.is_empty() {
            return Ok(());
        }
        loaded.record.bump(now);
        self.persist(&loaded.record, loaded.ttl, operation).await?;
        debug!(
            user_id = %loaded.record.user_id,
            version = loaded.record.version,
            "wrote back collected record"
        );
        Ok(())
    }

    /// Persist a mutation with the default TTL when anything changed
    ///
    /// Bumps the version once per call, covering both the collection pass and
    /// the caller's changes.
    async fn commit(
        &self,
        loaded: &mut Loaded,
        changed: bool,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<bool> {
        if !changed && loaded.expired.is_empty() {
            return Ok(false);
        }
        loaded.record.bump(now);
        self.persist(&loaded.record, self.config.default_ttl, operation)
            .await?;
        Ok(true)
    }
}
