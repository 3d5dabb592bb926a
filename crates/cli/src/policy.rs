//! Policy file: role defaults, templates and the user directory
use anyhow::{Context, Result};
use rolegate_core::{Role, UserId};
use rolegate_permissions::{RoleDefaults, StaticRoleLookup, TemplateRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Everything the CLI needs besides the store
///
/// Missing sections fall back to the built-in role defaults and templates and
/// an empty user directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PolicyFile {
    pub roles: Option<RoleDefaults>,
    pub templates: Option<TemplateRegistry>,
    pub users: BTreeMap<UserId, Role>,
}

impl PolicyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid policy file {}", path.display()))
    }

    pub fn role_defaults(&self) -> RoleDefaults {
        self.roles.clone().unwrap_or_default()
    }

    pub fn templates(&self) -> TemplateRegistry {
        self.templates.clone().unwrap_or_default()
    }

    pub fn directory(&self) -> StaticRoleLookup {
        self.users
            .iter()
            .map(|(user_id, role)| (*user_id, role.clone()))
            .collect()
    }
}
