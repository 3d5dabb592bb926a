//! Permission audit reports
use crate::record::PermissionRecord;
use crate::resolver::{self, GrantSource};
use chrono::{DateTime, Duration, Utc};
use rolegate_core::{UserId, WILDCARD_ALL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A permission that is both granted and denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub permission: String,
    /// Grant buckets holding the permission
    pub sources: Vec<GrantSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecurityRisk {
    /// `*` sits in a grant bucket
    WildcardGrant { sources: Vec<GrantSource> },
    /// A temporary grant outlives the long-grant threshold
    LongTemporaryGrant {
        permission: String,
        expires_at: DateTime<Utc>,
    },
}

impl fmt::Display for SecurityRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityRisk::WildcardGrant { .. } => write!(f, "User has wildcard permissions (*)"),
            SecurityRisk::LongTemporaryGrant {
                permission,
                expires_at,
            } => write!(
                f,
                "Long-term temporary permission '{permission}' expires at {}",
                expires_at.to_rfc3339()
            ),
        }
    }
}

/// Result of auditing one user's record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub user_id: UserId,
    pub total_permissions: usize,
    pub effective_permissions: BTreeSet<String>,
    /// Temporary grants removed by this audit's collection pass
    pub expired_permissions: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub security_risks: Vec<SecurityRisk>,
    pub recommendations: Vec<String>,
}

impl AuditReport {
    /// Build a report for an already collected record
    ///
    /// `expired` lists what the collection pass removed.
    pub fn build(
        record: &PermissionRecord,
        expired: Vec<String>,
        now: DateTime<Utc>,
        long_grant_days: i64,
    ) -> Self {
        let effective_permissions = resolver::effective_permissions(record, now);
        let conflicts = conflicts(record, now);

        let mut security_risks = Vec::new();
        let wildcard_sources = sources_of(record, WILDCARD_ALL, now);
        let has_wildcard = !wildcard_sources.is_empty() && !record.denied.contains(WILDCARD_ALL);
        if has_wildcard {
            security_risks.push(SecurityRisk::WildcardGrant {
                sources: wildcard_sources,
            });
        }

        let horizon = now + Duration::days(long_grant_days);
        security_risks.extend(
            record
                .temporary
                .iter()
                .filter(|&(_, &expires_at)| expires_at > horizon)
                .map(|(permission, &expires_at)| SecurityRisk::LongTemporaryGrant {
                    permission: permission.clone(),
                    expires_at,
                }),
        );

        let mut recommendations = Vec::new();
        if has_wildcard {
            recommendations
                .push("Remove wildcard permissions and grant specific permissions".to_string());
        }
        if !expired.is_empty() {
            recommendations.push("Clean up expired temporary permissions".to_string());
        }
        if !conflicts.is_empty() {
            recommendations.push("Resolve permission conflicts".to_string());
        }
        if security_risks
            .iter()
            .any(|r| matches!(r, SecurityRisk::LongTemporaryGrant { .. }))
        {
            recommendations.push("Shorten long-term temporary permissions".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Permission configuration looks good".to_string());
        }

        Self {
            user_id: record.user_id,
            total_permissions: effective_permissions.len(),
            effective_permissions,
            expired_permissions: expired,
            conflicts,
            security_risks,
            recommendations,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.security_risks.is_empty()
    }
}

fn sources_of(record: &PermissionRecord, permission: &str, now: DateTime<Utc>) -> Vec<GrantSource> {
    let mut sources = Vec::new();
    if record.granted.contains(permission) {
        sources.push(GrantSource::Direct);
    }
    if record.role_granted.contains(permission) {
        sources.push(GrantSource::Role);
    }
    if record.custom.contains(permission) {
        sources.push(GrantSource::Custom);
    }
    if record
        .temporary
        .get(permission)
        .is_some_and(|&expires_at| expires_at > now)
    {
        sources.push(GrantSource::Temporary);
    }
    sources
}

fn conflicts(record: &PermissionRecord, now: DateTime<Utc>) -> Vec<Conflict> {
    record
        .denied
        .iter()
        .filter_map(|permission| {
            let sources = sources_of(record, permission, now);
            (!sources.is_empty()).then(|| Conflict {
                permission: permission.clone(),
                sources,
            })
        })
        .collect()
}
