//! Newtype wrappers for enhanced type safety

use crate::constants::WILDCARD_ALL;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::Deref;
use std::str::FromStr;

/// A user identifier. Zero is reserved and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct UserId(u64);

impl UserId {
    /// Create a new UserId with validation
    pub fn new(id: u64) -> Result<Self> {
        if id == 0 {
            return Err(Error::validation("user_id", "0", "must be at least 1"));
        }
        Ok(Self(id))
    }

    /// Get the raw identifier
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::validation("user_id", s, e.to_string()))?;
        Self::new(raw)
    }
}

impl TryFrom<u64> for UserId {
    type Error = Error;

    fn try_from(id: u64) -> Result<Self> {
        Self::new(id)
    }
}

impl From<UserId> for u64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// A role name, normalized to lowercase
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// Create a new Role with validation
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("role", name.clone(), "role cannot be empty"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::validation(
                "role",
                name.clone(),
                "role must contain only alphanumeric characters, underscores and hyphens",
            ));
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

impl Deref for Role {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A well-formed permission string such as `trademark.read`, `search.*` or `*`
///
/// Allowed characters are alphanumerics, `.`, `_` and the `*` wildcard. Apart
/// from the bare `*`, at least one alphanumeric character is required.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionName(String);

impl PermissionName {
    /// Create a new PermissionName with validation. Surrounding whitespace is trimmed.
    pub fn new(permission: impl Into<String>) -> Result<Self> {
        let raw = permission.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(Error::validation(
                "permission",
                raw.clone(),
                "permission cannot be empty",
            ));
        }

        if trimmed == WILDCARD_ALL {
            return Ok(Self(trimmed.to_string()));
        }

        if !trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_' || c == '*')
        {
            return Err(Error::validation(
                "permission",
                raw.clone(),
                "permission may only contain alphanumerics, '.', '_' and '*'",
            ));
        }

        if !trimmed.chars().any(char::is_alphanumeric) {
            return Err(Error::validation(
                "permission",
                raw.clone(),
                "permission must name at least one resource or action",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Whether this permission contains a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.0.contains('*')
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for PermissionName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for PermissionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for PermissionName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<PermissionName> for String {
    fn from(p: PermissionName) -> Self {
        p.0
    }
}
