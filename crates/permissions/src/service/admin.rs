use super::PermissionService;
use crate::audit::AuditReport;
use crate::errors::{PermissionError, Result};
use crate::record::PermissionRecord;
use rolegate_core::UserId;
use std::collections::BTreeMap;
use tracing::{info, warn};

impl PermissionService {
    /// Audit the cached record; `None` when nothing is cached
    ///
    /// Expired temporary grants are collected and written back first.
    pub async fn audit(&self, user_id: UserId) -> Result<Option<AuditReport>> {
        let now = self.now();
        let Some(mut loaded) = self.load_existing(user_id, now, "audit").await? else {
            return Ok(None);
        };
        self.write_back(&mut loaded, now, "audit").await?;

        let report = AuditReport::build(
            &loaded.record,
            loaded.expired,
            now,
            self.config.long_temporary_grant_days,
        );
        info!(
            user_id = %user_id,
            conflicts = report.conflicts.len(),
            risks = report.security_risks.len(),
            "audited permissions"
        );
        Ok(Some(report))
    }

    /// Drop the cached record. Every override it held is lost.
    pub async fn invalidate(&self, user_id: UserId) -> Result<bool> {
        self.forget(user_id);
        let removed = self.store.delete(user_id).await.map_err(|source| {
            warn!(user_id = %user_id, error = %source, "failed to invalidate permissions");
            PermissionError::from_cache(user_id, "invalidate", source)
        })?;
        info!(user_id = %user_id, removed, "invalidated permissions");
        Ok(removed)
    }

    /// Drop several cached records, returning how many existed
    pub async fn invalidate_many(&self, user_ids: &[UserId]) -> Result<usize> {
        let Some(&first) = user_ids.first() else {
            return Ok(0);
        };
        for &user_id in user_ids {
            self.forget(user_id);
        }
        let removed = self.store.delete_many(user_ids).await.map_err(|source| {
            warn!(users = user_ids.len(), error = %source, "failed to invalidate permissions");
            PermissionError::from_cache(first, "invalidate_many", source)
        })?;
        info!(users = user_ids.len(), removed, "invalidated permissions");
        Ok(removed)
    }

    /// Invalidate, then rebuild from role defaults
    pub async fn refresh(&self, user_id: UserId) -> Result<PermissionRecord> {
        self.invalidate(user_id).await?;
        let now = self.now();
        let loaded = self.load(user_id, now, "refresh").await?;
        Ok(loaded.record)
    }

    /// Wildcard families of the catalog and the permissions they cover
    pub fn permission_hierarchy(&self) -> &BTreeMap<String, Vec<String>> {
        self.catalog.hierarchy()
    }

    /// Human readable description of `permission`
    pub fn describe(&self, permission: &str) -> String {
        self.catalog.describe(permission.trim())
    }
}
