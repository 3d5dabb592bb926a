use super::{Loaded, PermissionService, TemplateOutcome, UpdateOutcome};
use crate::delta::PermissionDelta;
use crate::errors::{PermissionError, Result};
use crate::record::PermissionRecord;
use chrono::{DateTime, Utc};
use rolegate_core::{Role, UserId};
use std::collections::BTreeSet;
use tracing::{info, warn};

impl PermissionService {
    /// Apply `delta` to the user's record
    ///
    /// Builds the record from role defaults on a miss. Malformed entries are
    /// collected into the outcome and the rest of the batch still applies.
    /// A call that changes anything bumps the version by one and re-persists
    /// with the default TTL; a call that changes nothing writes nothing.
    pub async fn update(&self, user_id: UserId, delta: &PermissionDelta) -> Result<UpdateOutcome> {
        let now = self.now();
        let loaded = self.load(user_id, now, "update").await?;
        self.apply_delta(loaded, delta, now, "update").await
    }

    /// [`update`](Self::update) guarded by the stored version
    ///
    /// Fails with `VersionConflict` when no record is stored or its version is
    /// not `expected_version`. The check and the write are not atomic with
    /// respect to writers that bypass this method.
    pub async fn update_checked(
        &self,
        user_id: UserId,
        delta: &PermissionDelta,
        expected_version: u64,
    ) -> Result<UpdateOutcome> {
        let now = self.now();
        let operation = "update_checked";
        let loaded = self.load_existing(user_id, now, operation).await?;

        let actual = loaded.as_ref().map(|l| l.stored_version);
        let loaded = match loaded {
            Some(loaded) if loaded.stored_version == expected_version => loaded,
            _ => {
                warn!(user_id = %user_id, expected_version, ?actual, "version conflict");
                return Err(PermissionError::VersionConflict {
                    user_id,
                    operation,
                    expected: expected_version,
                    actual,
                });
            }
        };
        self.apply_delta(loaded, delta, now, operation).await
    }

    async fn apply_delta(
        &self,
        mut loaded: Loaded,
        delta: &PermissionDelta,
        now: DateTime<Utc>,
        operation: &'static str,
    ) -> Result<UpdateOutcome> {
        let (changes, errors) =
            delta.apply(&mut loaded.record, now, operation, |raw| self.validate(raw));
        let persisted = self
            .commit(&mut loaded, !changes.is_empty(), now, operation)
            .await?;

        if persisted {
            info!(
                user_id = %loaded.record.user_id,
                version = loaded.record.version,
                changes = changes.total(),
                rejected = errors.len(),
                operation,
                "updated permissions"
            );
        }
        Ok(UpdateOutcome {
            record: loaded.record,
            changes,
            errors,
            persisted,
        })
    }

    /// Apply a named template to the direct bucket
    ///
    /// `merge` unions the template into `granted`; otherwise `granted` is
    /// replaced by it. Other buckets are untouched. An unknown template fails
    /// before anything is read.
    pub async fn apply_template(
        &self,
        user_id: UserId,
        template: &str,
        merge: bool,
    ) -> Result<TemplateOutcome> {
        let operation = "apply_template";
        let Some(entries) = self.templates.get(template) else {
            warn!(user_id = %user_id, template, "unknown permission template");
            return Err(PermissionError::UnknownTemplate {
                user_id,
                operation,
                template: template.to_string(),
            });
        };

        let mut errors = Vec::new();
        let mut permissions = BTreeSet::new();
        for raw in entries {
            match self.validate(raw) {
                Ok(permission) => {
                    permissions.insert(permission.to_string());
                }
                Err(reason) => {
                    warn!(user_id = %user_id, template, permission = %raw, %reason, "skipping template entry");
                    errors.push(PermissionError::invalid_permission(
                        user_id, operation, raw, reason,
                    ));
                }
            }
        }

        let now = self.now();
        let apply = |record: &mut PermissionRecord| {
            if merge {
                record.merge_granted(permissions)
            } else {
                usize::from(record.replace_granted(permissions))
            }
        };

        // A new record carries the template from its first write, at version 1
        let Some(mut loaded) = self.load_existing(user_id, now, operation).await? else {
            let role = self.resolve_role(user_id, operation).await?;
            let mut record = self.fresh(user_id, &role, now);
            let granted_changes = apply(&mut record);
            self.persist(&record, self.config.default_ttl, operation)
                .await?;
            info!(
                user_id = %user_id,
                role = %role,
                template,
                merge,
                granted_changes,
                "created permission record from template"
            );
            return Ok(TemplateOutcome {
                record,
                template: template.to_string(),
                merged: merge,
                granted_changes,
                errors,
                persisted: true,
            });
        };

        let granted_changes = apply(&mut loaded.record);
        let persisted = self
            .commit(&mut loaded, granted_changes > 0, now, operation)
            .await?;

        info!(
            user_id = %user_id,
            template,
            merge,
            version = loaded.record.version,
            granted_changes,
            "applied permission template"
        );
        Ok(TemplateOutcome {
            record: loaded.record,
            template: template.to_string(),
            merged: merge,
            granted_changes,
            errors,
            persisted,
        })
    }

    /// Re-derive the role bucket from `role`
    ///
    /// Direct, custom, denied and temporary entries are kept. Creates the
    /// record when none is stored.
    pub async fn sync_role(&self, user_id: UserId, role: &Role) -> Result<PermissionRecord> {
        let now = self.now();
        let operation = "sync_role";

        let Some(mut loaded) = self.load_existing(user_id, now, operation).await? else {
            let record = self.build(user_id, role, now, operation).await?;
            info!(user_id = %user_id, role = %role, "synced role on new record");
            return Ok(record);
        };

        let changed = loaded.record.replace_role_granted(self.defaults.for_role(role));
        self.commit(&mut loaded, changed, now, operation).await?;
        info!(
            user_id = %user_id,
            role = %role,
            changed,
            version = loaded.record.version,
            "synced role permissions"
        );
        Ok(loaded.record)
    }
}
