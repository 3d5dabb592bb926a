//! Role defaults and permission templates

use rolegate_core::{PermissionName, Role, FALLBACK_ROLE_PERMISSION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const RESEARCHER: &[&str] = &[
    "trademark.read",
    "trademark.create",
    "trademark.update",
    "search.basic",
    "search.advanced",
    "analysis.read",
    "analysis.create",
    "user.profile",
];

const ANALYST: &[&str] = &[
    "trademark.read",
    "search.basic",
    "search.advanced",
    "analysis.read",
    "user.profile",
];

const VIEWER: &[&str] = &["trademark.read", "search.basic", "user.profile"];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|p| p.to_string()).collect()
}

/// Base permissions for each role
///
/// Roles missing from the table receive the fallback list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoleDefaultsFile", into = "RoleDefaultsFile")]
pub struct RoleDefaults {
    roles: BTreeMap<Role, BTreeSet<PermissionName>>,
    fallback: BTreeSet<PermissionName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleDefaultsFile {
    roles: BTreeMap<String, Vec<PermissionName>>,
    #[serde(default = "default_fallback")]
    fallback: Vec<PermissionName>,
}

fn default_fallback() -> Vec<PermissionName> {
    PermissionName::new(FALLBACK_ROLE_PERMISSION)
        .map(|p| vec![p])
        .unwrap_or_default()
}

impl TryFrom<RoleDefaultsFile> for RoleDefaults {
    type Error = rolegate_core::Error;

    fn try_from(file: RoleDefaultsFile) -> rolegate_core::Result<Self> {
        let mut roles = BTreeMap::new();
        for (name, permissions) in file.roles {
            roles.insert(Role::new(name)?, permissions.into_iter().collect());
        }
        Ok(Self {
            roles,
            fallback: file.fallback.into_iter().collect(),
        })
    }
}

impl From<RoleDefaults> for RoleDefaultsFile {
    fn from(defaults: RoleDefaults) -> Self {
        Self {
            roles: defaults
                .roles
                .into_iter()
                .map(|(role, permissions)| (role.as_str().to_string(), permissions.into_iter().collect()))
                .collect(),
            fallback: defaults.fallback.into_iter().collect(),
        }
    }
}

impl Default for RoleDefaults {
    fn default() -> Self {
        let table: [(&str, Vec<String>); 5] = [
            ("admin", vec!["*".to_string()]),
            ("researcher", owned(RESEARCHER)),
            ("analyst", owned(ANALYST)),
            ("viewer", owned(VIEWER)),
            ("guest", vec![FALLBACK_ROLE_PERMISSION.to_string()]),
        ];

        let roles = table
            .into_iter()
            .filter_map(|(role, permissions)| {
                let role = Role::new(role).ok()?;
                let permissions = permissions
                    .into_iter()
                    .filter_map(|p| PermissionName::new(p).ok())
                    .collect();
                Some((role, permissions))
            })
            .collect();

        Self {
            roles,
            fallback: default_fallback().into_iter().collect(),
        }
    }
}

impl RoleDefaults {
    /// An empty table with the given fallback
    pub fn new(fallback: impl IntoIterator<Item = PermissionName>) -> Self {
        Self {
            roles: BTreeMap::new(),
            fallback: fallback.into_iter().collect(),
        }
    }

    /// Set the permissions of `role`, replacing any previous entry
    pub fn with_role(
        mut self,
        role: Role,
        permissions: impl IntoIterator<Item = PermissionName>,
    ) -> Self {
        self.roles.insert(role, permissions.into_iter().collect());
        self
    }

    /// Base permissions for `role`, or the fallback for unknown roles
    pub fn for_role(&self, role: &Role) -> BTreeSet<String> {
        self.roles
            .get(role)
            .unwrap_or(&self.fallback)
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }
}

/// Named permission lists that can be applied to a user's direct bucket
///
/// Entries are kept as written so that malformed ones can be reported when a
/// template is applied instead of failing the whole table on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Vec<String>>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert("admin".to_string(), vec!["*".to_string()]);
        templates.insert("researcher".to_string(), owned(RESEARCHER));
        templates.insert("analyst".to_string(), owned(ANALYST));
        templates.insert("viewer".to_string(), owned(VIEWER));
        templates.insert(
            "trademark_admin".to_string(),
            owned(&["trademark.*", "search.*", "analysis.*", "user.profile"]),
        );
        templates.insert(
            "search_expert".to_string(),
            owned(&["trademark.read", "search.*", "analysis.read", "user.profile"]),
        );
        templates.insert(
            "report_manager".to_string(),
            owned(&["trademark.read", "search.basic", "analysis.*", "user.profile"]),
        );
        Self { templates }
    }
}

impl TemplateRegistry {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn with_template(
        mut self,
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.templates.insert(
            name.into(),
            permissions.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Entries of `name`, as written
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.templates.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role {
        Role::new(name).unwrap()
    }

    #[test]
    fn test_builtin_roles() {
        let defaults = RoleDefaults::default();
        let viewer = defaults.for_role(&role("VIEWER"));
        assert_eq!(
            viewer,
            ["search.basic", "trademark.read", "user.profile"]
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<_>>()
        );
        assert!(defaults.for_role(&role("admin")).contains("*"));
        assert!(defaults.for_role(&role("analyst")).contains("trademark.read"));
    }

    #[test]
    fn test_unknown_role_gets_fallback() {
        let defaults = RoleDefaults::default();
        let unknown = defaults.for_role(&role("contractor"));
        assert_eq!(unknown.len(), 1);
        assert!(unknown.contains("user.profile"));
    }

    #[test]
    fn test_role_defaults_from_json_normalizes_roles() {
        let json = r#"{"roles": {"Auditor": ["audit.read", "report.*"]}, "fallback": []}"#;
        let defaults: RoleDefaults = serde_json::from_str(json).unwrap();
        assert!(defaults.contains(&role("auditor")));
        assert!(defaults.for_role(&role("auditor")).contains("report.*"));
        assert!(defaults.for_role(&role("viewer")).is_empty());
    }

    #[test]
    fn test_role_defaults_reject_bad_permissions() {
        let json = r#"{"roles": {"viewer": ["not valid"]}}"#;
        assert!(serde_json::from_str::<RoleDefaults>(json).is_err());
    }

    #[test]
    fn test_builtin_templates() {
        let templates = TemplateRegistry::default();
        let names: Vec<_> = templates.names().collect();
        assert_eq!(
            names,
            vec![
                "admin",
                "analyst",
                "report_manager",
                "researcher",
                "search_expert",
                "trademark_admin",
                "viewer"
            ]
        );
        assert_eq!(templates.get("admin"), Some(&["*".to_string()][..]));
        assert!(templates.get("superuser").is_none());
    }
}
