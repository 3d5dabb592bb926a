//! Permission decisions over a single record
//!
//! Everything here is synchronous and free of I/O. Precedence:
//!
//! 1. expired temporary grants are dropped
//! 2. `denied` wins over everything, wildcards included
//! 3. `*` in any standing bucket grants everything else
//! 4. a verbatim entry in a standing bucket or a live temporary grant
//! 5. a wildcard entry in a standing bucket matching the permission

use crate::glob;
use crate::record::PermissionRecord;
use chrono::{DateTime, Utc};
use rolegate_core::WILDCARD_ALL;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Bucket a permission was granted from, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    Direct,
    Role,
    Custom,
    Temporary,
}

impl fmt::Display for GrantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GrantSource::Direct => "direct",
            GrantSource::Role => "role",
            GrantSource::Custom => "custom",
            GrantSource::Temporary => "temporary",
        };
        f.write_str(s)
    }
}

/// Where a granted permission came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub source: GrantSource,
    /// The stored entry that matched, possibly a wildcard
    pub matched: String,
    /// Expiry, for temporary grants
    pub expires_at: Option<DateTime<Utc>>,
}

/// Drop temporary grants whose expiry is at or before `now`
///
/// Returns the removed permissions in order. Running it twice with the same
/// `now` removes nothing the second time.
pub fn gc(record: &mut PermissionRecord, now: DateTime<Utc>) -> Vec<String> {
    let expired: Vec<String> = record
        .temporary
        .iter()
        .filter(|&(_, &expires_at)| expires_at <= now)
        .map(|(permission, _)| permission.clone())
        .collect();
    for permission in &expired {
        record.temporary.remove(permission);
    }
    expired
}

fn standing(record: &PermissionRecord) -> impl Iterator<Item = &String> {
    record
        .granted
        .iter()
        .chain(record.role_granted.iter())
        .chain(record.custom.iter())
}

fn live_temporary(
    record: &PermissionRecord,
    permission: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    record
        .temporary
        .get(permission)
        .copied()
        .filter(|&expires_at| expires_at > now)
}

/// Decide `permission` without mutating the record
///
/// Expired temporary grants are treated as absent, so the answer matches
/// what [`has_permission`] returns after its collection pass.
pub fn evaluate(record: &PermissionRecord, permission: &str, now: DateTime<Utc>) -> bool {
    if record.denied.contains(permission) {
        return false;
    }
    if standing(record).any(|entry| entry == WILDCARD_ALL) {
        return true;
    }
    if standing(record).any(|entry| entry == permission)
        || live_temporary(record, permission, now).is_some()
    {
        return true;
    }
    standing(record)
        .filter(|entry| glob::is_pattern(entry))
        .any(|entry| glob::matches(entry, permission))
}

/// Collect expired grants, then decide `permission`
pub fn has_permission(record: &mut PermissionRecord, permission: &str, now: DateTime<Utc>) -> bool {
    gc(record, now);
    evaluate(record, permission, now)
}

/// True when at least one permission is granted. Collects once up front.
pub fn bulk_has_any<S: AsRef<str>>(
    record: &mut PermissionRecord,
    permissions: &[S],
    now: DateTime<Utc>,
) -> bool {
    gc(record, now);
    permissions
        .iter()
        .any(|p| evaluate(record, p.as_ref(), now))
}

/// True when every permission is granted. Collects once up front.
pub fn bulk_has_all<S: AsRef<str>>(
    record: &mut PermissionRecord,
    permissions: &[S],
    now: DateTime<Utc>,
) -> bool {
    gc(record, now);
    permissions
        .iter()
        .all(|p| evaluate(record, p.as_ref(), now))
}

/// Every standing and live temporary entry not explicitly denied
///
/// Wildcards are returned as stored. Use [`evaluate`] for membership tests.
pub fn effective_permissions(record: &PermissionRecord, now: DateTime<Utc>) -> BTreeSet<String> {
    standing(record)
        .chain(
            record
                .temporary
                .iter()
                .filter(|&(_, &expires_at)| expires_at > now)
                .map(|(permission, _)| permission),
        )
        .filter(|permission| !record.denied.contains(*permission))
        .cloned()
        .collect()
}

/// Which bucket grants `permission`, with precedence direct > role > custom > temporary
///
/// Verbatim entries are preferred over wildcard matches. Returns `None` when
/// the permission is not granted at all.
pub fn grant_source(
    record: &PermissionRecord,
    permission: &str,
    now: DateTime<Utc>,
) -> Option<Grant> {
    if !evaluate(record, permission, now) {
        return None;
    }

    let buckets = [
        (GrantSource::Direct, &record.granted),
        (GrantSource::Role, &record.role_granted),
        (GrantSource::Custom, &record.custom),
    ];

    for (source, bucket) in buckets {
        if bucket.contains(permission) {
            return Some(Grant {
                source,
                matched: permission.to_string(),
                expires_at: None,
            });
        }
    }

    if let Some(expires_at) = live_temporary(record, permission, now) {
        return Some(Grant {
            source: GrantSource::Temporary,
            matched: permission.to_string(),
            expires_at: Some(expires_at),
        });
    }

    for (source, bucket) in buckets {
        if let Some(entry) = bucket
            .iter()
            .find(|entry| glob::is_pattern(entry) && glob::matches(entry, permission))
        {
            return Some(Grant {
                source,
                matched: entry.clone(),
                expires_at: None,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rolegate_core::UserId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn record(role: &[&str]) -> PermissionRecord {
        PermissionRecord::new(
            UserId::new(3).unwrap(),
            role.iter().map(|p| p.to_string()),
            now(),
        )
    }

    #[test]
    fn test_deny_beats_full_wildcard() {
        let mut r = record(&["*"]);
        r.deny("admin.system");
        assert!(!has_permission(&mut r, "admin.system", now()));
        assert!(has_permission(&mut r, "admin.users", now()));
    }

    #[test]
    fn test_deny_beats_pattern() {
        let mut r = record(&["trademark.*"]);
        r.deny("trademark.delete");
        assert!(has_permission(&mut r, "trademark.read", now()));
        assert!(!has_permission(&mut r, "trademark.delete", now()));
    }

    #[test]
    fn test_temporary_grant_lifetime() {
        let mut r = record(&[]);
        let expiry = now() + Duration::minutes(10);
        r.add_temporary("search.advanced", expiry);

        assert!(has_permission(&mut r, "search.advanced", expiry - Duration::seconds(1)));
        assert!(r.temporary.contains_key("search.advanced"));

        assert!(!has_permission(&mut r, "search.advanced", expiry));
        assert!(!r.temporary.contains_key("search.advanced"));
    }

    #[test]
    fn test_gc_is_idempotent() {
        let mut r = record(&[]);
        r.add_temporary("a.one", now() - Duration::seconds(1));
        r.add_temporary("a.two", now());
        r.add_temporary("a.three", now() + Duration::seconds(1));

        assert_eq!(gc(&mut r, now()), vec!["a.one".to_string(), "a.two".to_string()]);
        assert!(gc(&mut r, now()).is_empty());
        assert_eq!(r.temporary.len(), 1);
    }

    #[test]
    fn test_temporary_wildcards_are_not_expanded() {
        let mut r = record(&[]);
        r.add_temporary("search.*", now() + Duration::hours(1));
        assert!(!has_permission(&mut r, "search.basic", now()));
        assert!(has_permission(&mut r, "search.*", now()));
    }

    #[test]
    fn test_bulk_checks() {
        let mut r = record(&["search.basic"]);
        let asked = ["search.basic", "search.advanced"];
        assert!(bulk_has_any(&mut r, &asked, now()));
        assert!(!bulk_has_all(&mut r, &asked, now()));

        let empty: [&str; 0] = [];
        assert!(!bulk_has_any(&mut r, &empty, now()));
        assert!(bulk_has_all(&mut r, &empty, now()));
    }

    #[test]
    fn test_effective_permissions() {
        let mut r = record(&["trademark.read", "search.*"]);
        r.add_custom("report.export");
        r.deny("trademark.read");
        r.add_temporary("analysis.read", now() + Duration::hours(1));
        r.add_temporary("analysis.create", now() - Duration::hours(1));

        let effective = effective_permissions(&r, now());
        let expected: BTreeSet<String> = ["search.*", "report.export", "analysis.read"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(effective, expected);
    }

    #[test]
    fn test_grant_source_precedence() {
        let mut r = record(&["trademark.read", "search.*"]);
        r.granted.insert("trademark.read".to_string());
        r.add_custom("search.basic");
        r.add_temporary("analysis.read", now() + Duration::hours(1));

        let grant = grant_source(&r, "trademark.read", now()).unwrap();
        assert_eq!(grant.source, GrantSource::Direct);

        // Verbatim custom entry beats a role wildcard
        let grant = grant_source(&r, "search.basic", now()).unwrap();
        assert_eq!(grant.source, GrantSource::Custom);

        let grant = grant_source(&r, "search.advanced", now()).unwrap();
        assert_eq!(grant.source, GrantSource::Role);
        assert_eq!(grant.matched, "search.*");

        let grant = grant_source(&r, "analysis.read", now()).unwrap();
        assert_eq!(grant.source, GrantSource::Temporary);
        assert_eq!(grant.expires_at, Some(now() + Duration::hours(1)));

        assert!(grant_source(&r, "admin.users", now()).is_none());
    }

    fn buckets() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{1,6}(\\.[a-z*]{1,6}){0,2}", 0..6)
    }

    proptest! {
        #[test]
        fn prop_denied_is_never_granted(
            granted in buckets(),
            custom in buckets(),
            permission in "[a-z]{1,6}\\.[a-z]{1,6}",
        ) {
            let mut r = record(&["*"]);
            r.granted.extend(granted);
            r.custom.extend(custom);
            r.add_temporary(&permission, now() + Duration::hours(1));
            r.deny(&permission);
            prop_assert!(!has_permission(&mut r, &permission, now()));
            prop_assert!(grant_source(&r, &permission, now()).is_none());
        }

        #[test]
        fn prop_full_wildcard_grants_everything_not_denied(
            denied in buckets(),
            permission in "[ -~]{0,24}",
        ) {
            let mut r = record(&[]);
            r.custom.insert("*".to_string());
            r.denied.extend(denied);
            let expected = !r.denied.contains(&permission);
            prop_assert_eq!(has_permission(&mut r, &permission, now()), expected);
        }
    }
}
