use super::{BulkDecision, BulkMode, Decision, PermissionService};
use crate::config::FailurePolicy;
use crate::errors::{PermissionError, Result};
use crate::record::PermissionRecord;
use crate::resolver;
use rolegate_cache::EnvelopeInfo;
use rolegate_core::UserId;
use std::collections::BTreeSet;
use tracing::{debug, warn};

impl PermissionService {
    /// Decide whether `user_id` holds `permission`
    ///
    /// Builds the record from role defaults on a cache miss. Expired
    /// temporary grants are collected and written back with the remaining TTL.
    pub async fn check(&self, user_id: UserId, permission: &str) -> Result<Decision> {
        let now = self.now();
        let mut loaded = self.load(user_id, now, "check").await?;
        self.write_back(&mut loaded, now, "check").await?;

        let decision = Decision::evaluate(&loaded.record, permission.trim(), now);
        debug!(
            user_id = %user_id,
            permission = %decision.permission,
            granted = decision.has_permission,
            granted_by = ?decision.granted_by,
            "permission check"
        );
        Ok(decision)
    }

    /// Check several permissions at once; every one is evaluated
    ///
    /// `Any` over an empty list is false, `All` over an empty list is true.
    pub async fn bulk_check<S: AsRef<str>>(
        &self,
        user_id: UserId,
        permissions: &[S],
        mode: BulkMode,
    ) -> Result<BulkDecision> {
        let now = self.now();
        let mut loaded = self.load(user_id, now, "bulk_check").await?;
        self.write_back(&mut loaded, now, "bulk_check").await?;

        let trimmed: Vec<&str> = permissions.iter().map(|p| p.as_ref().trim()).collect();
        let results: Vec<Decision> = trimmed
            .iter()
            .map(|p| Decision::evaluate(&loaded.record, p, now))
            .collect();
        let granted_count = results.iter().filter(|d| d.has_permission).count();
        let overall = match mode {
            BulkMode::Any => resolver::bulk_has_any(&mut loaded.record, &trimmed, now),
            BulkMode::All => resolver::bulk_has_all(&mut loaded.record, &trimmed, now),
        };

        debug!(user_id = %user_id, ?mode, overall, granted_count, total = results.len(), "bulk permission check");
        Ok(BulkDecision {
            user_id,
            mode,
            overall,
            total_count: results.len(),
            granted_count,
            results,
        })
    }

    /// Boolean gate that never errors
    ///
    /// Store failures follow the configured failure policy. Any other failure,
    /// such as an unknown user, denies.
    pub async fn is_allowed(&self, user_id: UserId, permission: &str) -> bool {
        let err = match self.check(user_id, permission).await {
            Ok(decision) => return decision.has_permission,
            Err(err) => err,
        };

        if !err.is_store_failure() {
            warn!(user_id = %user_id, permission, error = %err, "denying after failed check");
            return false;
        }

        match self.config.failure_policy {
            FailurePolicy::FailClosed => {
                warn!(user_id = %user_id, permission, error = %err, "store failure, failing closed");
                false
            }
            FailurePolicy::StaleCache => match self.stale_record(user_id, self.now()) {
                Some(record) => {
                    let granted = resolver::evaluate(&record, permission.trim(), self.now());
                    warn!(
                        user_id = %user_id,
                        permission,
                        version = record.version,
                        granted,
                        error = %err,
                        "store failure, answering from stale record"
                    );
                    granted
                }
                None => {
                    warn!(user_id = %user_id, permission, error = %err, "store failure and no stale record");
                    false
                }
            },
        }
    }

    /// Effective permissions of the cached record; empty when nothing is cached
    pub async fn effective_permissions(&self, user_id: UserId) -> Result<BTreeSet<String>> {
        let now = self.now();
        Ok(self
            .fetch(user_id, "effective_permissions")
            .await?
            .map(|envelope| resolver::effective_permissions(&envelope.payload, now))
            .unwrap_or_default())
    }

    /// Snapshot of the record, built from role defaults on a miss
    pub async fn permissions(&self, user_id: UserId) -> Result<PermissionRecord> {
        let now = self.now();
        let mut loaded = self.load(user_id, now, "permissions").await?;
        self.write_back(&mut loaded, now, "permissions").await?;
        Ok(loaded.record)
    }

    /// Envelope metadata of the cached record
    pub async fn cache_info(&self, user_id: UserId) -> Result<Option<EnvelopeInfo>> {
        let now = self.now();
        let Some(envelope) = self.fetch(user_id, "cache_info").await? else {
            return Ok(None);
        };
        envelope
            .info(now)
            .map(Some)
            .map_err(|source| PermissionError::from_cache(user_id, "cache_info", source))
    }
}
