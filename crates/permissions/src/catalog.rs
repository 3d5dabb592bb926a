//! Known permissions and their descriptions

use rolegate_core::{PermissionName, WILDCARD_ALL};
use std::collections::BTreeMap;

const ENTRIES: &[(&str, &str)] = &[
    ("*", "All permissions"),
    ("trademark.read", "View trademarks"),
    ("trademark.create", "Register trademarks"),
    ("trademark.update", "Edit trademarks"),
    ("trademark.delete", "Delete trademarks"),
    ("trademark.*", "All trademark permissions"),
    ("search.basic", "Basic search"),
    ("search.advanced", "Advanced search"),
    ("search.*", "All search permissions"),
    ("analysis.read", "View analyses"),
    ("analysis.create", "Create analyses"),
    ("analysis.*", "All analysis permissions"),
    ("user.profile", "Manage own profile"),
    ("admin.users", "Manage users"),
    ("admin.system", "Manage the system"),
];

const HIERARCHY: &[(&str, &[&str])] = &[
    ("*", &["All permissions"]),
    (
        "trademark.*",
        &[
            "trademark.read",
            "trademark.create",
            "trademark.update",
            "trademark.delete",
        ],
    ),
    ("search.*", &["search.basic", "search.advanced"]),
    ("analysis.*", &["analysis.read", "analysis.create"]),
    ("admin.*", &["admin.users", "admin.system"]),
];

/// The static catalog of permissions the system knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCatalog {
    descriptions: BTreeMap<String, String>,
    hierarchy: BTreeMap<String, Vec<String>>,
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self {
            descriptions: ENTRIES
                .iter()
                .map(|(p, d)| (p.to_string(), d.to_string()))
                .collect(),
            hierarchy: HIERARCHY
                .iter()
                .map(|(family, members)| {
                    (
                        family.to_string(),
                        members.iter().map(|m| m.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl PermissionCatalog {
    pub fn contains(&self, permission: &str) -> bool {
        self.descriptions.contains_key(permission)
    }

    /// Human readable description; unknown permissions describe themselves
    pub fn describe(&self, permission: &str) -> String {
        self.descriptions
            .get(permission)
            .cloned()
            .unwrap_or_else(|| permission.to_string())
    }

    /// Wildcard families and the permissions they cover
    pub fn hierarchy(&self) -> &BTreeMap<String, Vec<String>> {
        &self.hierarchy
    }

    pub fn descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    /// Validate a permission string for storage
    ///
    /// Every permission must be well formed. With `strict`, it must also be
    /// listed in the catalog.
    pub fn validate(&self, raw: &str, strict: bool) -> Result<PermissionName, String> {
        let permission = PermissionName::new(raw).map_err(|e| e.to_string())?;
        if strict && permission.as_str() != WILDCARD_ALL && !self.contains(&permission) {
            return Err(format!("'{permission}' is not a known permission"));
        }
        Ok(permission)
    }
}
