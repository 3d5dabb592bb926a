//! Per-user permission state

use chrono::{DateTime, Utc};
use rolegate_cache::Cacheable;
use rolegate_core::{UserId, PERMISSIONS_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The layered permission state of one user
///
/// Buckets are ordered collections so that encoding is deterministic. Unknown
/// fields are ignored when decoding; `user_id` and `version` are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub user_id: UserId,
    /// Directly assigned permissions
    #[serde(default)]
    pub granted: BTreeSet<String>,
    /// Permissions derived from the user's role
    #[serde(default)]
    pub role_granted: BTreeSet<String>,
    /// Individually assigned permissions
    #[serde(default)]
    pub custom: BTreeSet<String>,
    /// Explicit blocks, overriding every grant
    #[serde(default)]
    pub denied: BTreeSet<String>,
    /// Time-bounded grants and their expiry
    #[serde(default)]
    pub temporary: BTreeMap<String, DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionRecord {
    /// A fresh record at version 1 holding only role-derived permissions
    pub fn new(
        user_id: UserId,
        role_granted: impl IntoIterator<Item = String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            granted: BTreeSet::new(),
            role_granted: role_granted.into_iter().collect(),
            custom: BTreeSet::new(),
            denied: BTreeSet::new(),
            temporary: BTreeMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Cache key for `user_id`
    pub fn key_for(user_id: UserId) -> String {
        format!("{PERMISSIONS_KEY_PREFIX}{user_id}")
    }

    /// Record one logical mutation
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }

    pub fn add_custom(&mut self, permission: &str) -> bool {
        self.custom.insert(permission.to_string())
    }

    /// Remove from the custom and direct buckets. Role-derived entries stay.
    pub fn remove(&mut self, permission: &str) -> bool {
        let custom = self.custom.remove(permission);
        let granted = self.granted.remove(permission);
        custom || granted
    }

    pub fn add_temporary(&mut self, permission: &str, expires_at: DateTime<Utc>) -> bool {
        self.temporary
            .insert(permission.to_string(), expires_at)
            .map_or(true, |previous| previous != expires_at)
    }

    pub fn remove_temporary(&mut self, permission: &str) -> bool {
        self.temporary.remove(permission).is_some()
    }

    pub fn deny(&mut self, permission: &str) -> bool {
        self.denied.insert(permission.to_string())
    }

    pub fn allow(&mut self, permission: &str) -> bool {
        self.denied.remove(permission)
    }

    /// Union `permissions` into the direct bucket, returning how many were new
    pub fn merge_granted(&mut self, permissions: impl IntoIterator<Item = String>) -> usize {
        permissions
            .into_iter()
            .filter(|p| self.granted.insert(p.clone()))
            .count()
    }

    /// Replace the direct bucket wholesale
    pub fn replace_granted(&mut self, permissions: BTreeSet<String>) -> bool {
        if self.granted == permissions {
            return false;
        }
        self.granted = permissions;
        true
    }

    /// Replace the role-derived bucket wholesale
    pub fn replace_role_granted(&mut self, permissions: BTreeSet<String>) -> bool {
        if self.role_granted == permissions {
            return false;
        }
        self.role_granted = permissions;
        true
    }
}

impl Cacheable for PermissionRecord {
    fn cache_key(&self) -> String {
        Self::key_for(self.user_id)
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
