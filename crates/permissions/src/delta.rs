//! Explicit mutation requests
use crate::errors::PermissionError;
use crate::record::PermissionRecord;
use chrono::{DateTime, Utc};
use rolegate_core::{PermissionName, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A batch of changes to one user's permissions
///
/// Applied in a fixed order: `add_temporary`, `remove_temporary`, `add`,
/// `remove`, `deny`, `allow`. Adding and denying the same permission in one
/// call leaves it denied; allowing it as well leaves it granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionDelta {
    /// Added to the custom bucket
    pub add: Vec<String>,
    /// Removed from the custom and direct buckets
    pub remove: Vec<String>,
    pub add_temporary: BTreeMap<String, DateTime<Utc>>,
    pub remove_temporary: Vec<String>,
    pub deny: Vec<String>,
    pub allow: Vec<String>,
}

/// How many entries of each kind actually changed the record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub removed: usize,
    pub temporary_added: usize,
    pub temporary_removed: usize,
    pub denied: usize,
    pub allowed: usize,
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.added
            + self.removed
            + self.temporary_added
            + self.temporary_removed
            + self.denied
            + self.allowed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl PermissionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, permission: impl Into<String>) -> Self {
        self.add.push(permission.into());
        self
    }

    pub fn remove(mut self, permission: impl Into<String>) -> Self {
        self.remove.push(permission.into());
        self
    }

    pub fn add_temporary(mut self, permission: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        self.add_temporary.insert(permission.into(), expires_at);
        self
    }

    pub fn remove_temporary(mut self, permission: impl Into<String>) -> Self {
        self.remove_temporary.push(permission.into());
        self
    }

    pub fn deny(mut self, permission: impl Into<String>) -> Self {
        self.deny.push(permission.into());
        self
    }

    pub fn allow(mut self, permission: impl Into<String>) -> Self {
        self.allow.push(permission.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty()
            && self.remove.is_empty()
            && self.add_temporary.is_empty()
            && self.remove_temporary.is_empty()
            && self.deny.is_empty()
            && self.allow.is_empty()
    }

    /// Apply the delta to `record`
    ///
    /// Entries of `add` and `add_temporary` go through `validate`; rejected
    /// ones are collected and the rest of the batch still applies. Temporary
    /// grants that would already be expired at `now` are rejected as well.
    /// Does not bump the version.
    pub fn apply<V>(
        &self,
        record: &mut PermissionRecord,
        now: DateTime<Utc>,
        operation: &'static str,
        validate: V,
    ) -> (ChangeSummary, Vec<PermissionError>)
    where
        V: Fn(&str) -> Result<PermissionName, String>,
    {
        let user_id = record.user_id;
        let mut summary = ChangeSummary::default();
        let mut errors = Vec::new();

        let accept = |raw: &str, errors: &mut Vec<PermissionError>| match validate(raw) {
            Ok(permission) => Some(permission),
            Err(reason) => {
                warn!(user_id = %user_id, permission = raw, %reason, "rejected permission");
                errors.push(PermissionError::invalid_permission(
                    user_id, operation, raw, reason,
                ));
                None
            }
        };

        for (raw, &expires_at) in &self.add_temporary {
            let Some(permission) = accept(raw.as_str(), &mut errors) else {
                continue;
            };
            if expires_at <= now {
                errors.push(expired_grant(user_id, operation, raw, expires_at));
                continue;
            }
            if record.add_temporary(&permission, expires_at) {
                summary.temporary_added += 1;
            }
        }

        for permission in trimmed(&self.remove_temporary) {
            if record.remove_temporary(permission) {
                summary.temporary_removed += 1;
            }
        }

        for raw in &self.add {
            if let Some(permission) = accept(raw.as_str(), &mut errors) {
                if record.add_custom(&permission) {
                    summary.added += 1;
                }
            }
        }

        for permission in trimmed(&self.remove) {
            if record.remove(permission) {
                summary.removed += 1;
            }
        }

        for permission in trimmed(&self.deny) {
            if record.deny(permission) {
                summary.denied += 1;
            }
        }

        for permission in trimmed(&self.allow) {
            if record.allow(permission) {
                summary.allowed += 1;
            }
        }

        (summary, errors)
    }
}

fn trimmed(entries: &[String]) -> impl Iterator<Item = &str> {
    entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty())
}

fn expired_grant(
    user_id: UserId,
    operation: &'static str,
    raw: &str,
    expires_at: DateTime<Utc>,
) -> PermissionError {
    PermissionError::invalid_permission(
        user_id,
        operation,
        raw,
        format!("temporary grant already expired at {}", expires_at.to_rfc3339()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    fn record() -> PermissionRecord {
        PermissionRecord::new(
            UserId::new(5).unwrap(),
            ["user.profile".to_string()],
            now(),
        )
    }

    fn lenient(raw: &str) -> Result<PermissionName, String> {
        PermissionName::new(raw).map_err(|e| e.to_string())
    }

    #[test]
    fn test_add_then_deny_leaves_denied() {
        let mut r = record();
        let delta = PermissionDelta::new().add("x.read").deny("x.read");
        let (summary, errors) = delta.apply(&mut r, now(), "update", lenient);
        assert!(errors.is_empty());
        assert_eq!(summary.added, 1);
        assert_eq!(summary.denied, 1);
        assert!(r.custom.contains("x.read"));
        assert!(r.denied.contains("x.read"));
    }

    #[test]
    fn test_allow_runs_last() {
        let mut r = record();
        let delta = PermissionDelta::new()
            .add("x.read")
            .deny("x.read")
            .allow("x.read");
        delta.apply(&mut r, now(), "update", lenient);
        assert!(r.custom.contains("x.read"));
        assert!(!r.denied.contains("x.read"));
    }

    #[test]
    fn test_remove_temporary_runs_after_add_temporary() {
        let mut r = record();
        let delta = PermissionDelta::new()
            .add_temporary("search.advanced", now() + Duration::hours(1))
            .remove_temporary("search.advanced");
        let (summary, _) = delta.apply(&mut r, now(), "update", lenient);
        assert!(r.temporary.is_empty());
        assert_eq!(summary.temporary_added, 1);
        assert_eq!(summary.temporary_removed, 1);
    }

    #[test]
    fn test_malformed_entries_are_collected() {
        let mut r = record();
        let delta = PermissionDelta::new()
            .add("bad perm")
            .add("good.one")
            .add_temporary("", now() + Duration::hours(1))
            .add_temporary("late.grant", now() - Duration::seconds(1));
        let (summary, errors) = delta.apply(&mut r, now(), "update", lenient);

        assert_eq!(summary.added, 1);
        assert_eq!(summary.temporary_added, 0);
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| matches!(e, PermissionError::InvalidPermissionFormat { .. })));
        assert!(r.custom.contains("good.one"));
    }

    #[test]
    fn test_noop_delta_reports_no_changes() {
        let mut r = record();
        let delta = PermissionDelta::new().remove("never.granted").allow("never.denied");
        let (summary, errors) = delta.apply(&mut r, now(), "update", lenient);
        assert!(summary.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_delta_deserializes_with_missing_lists() {
        let delta: PermissionDelta = serde_json::from_str(r#"{"deny": ["a.b"]}"#).unwrap();
        assert_eq!(delta.deny, vec!["a.b".to_string()]);
        assert!(delta.add.is_empty());
    }
}
