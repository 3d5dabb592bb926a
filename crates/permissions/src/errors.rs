//! Errors raised by the permission engine
//!
//! A denied permission is never an error; it is a `Decision` with
//! `has_permission == false`. Every variant carries the user and the operation
//! it happened in.

use rolegate_cache::CacheError;
use rolegate_core::UserId;

/// Result type alias for permission operations
pub type Result<T> = std::result::Result<T, PermissionError>;

/// Error type for permission operations
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// The role directory has no such user
    #[error("user {user_id} not found during {operation}")]
    NotFound {
        user_id: UserId,
        operation: &'static str,
    },

    /// A permission string was rejected; collected per item, never fatal
    #[error("invalid permission '{value}' for user {user_id} during {operation}: {reason}")]
    InvalidPermissionFormat {
        user_id: UserId,
        operation: &'static str,
        value: String,
        reason: String,
    },

    /// The backing store could not be reached
    #[error("permission store unavailable for user {user_id} during {operation}: {source}")]
    StoreUnavailable {
        user_id: UserId,
        operation: &'static str,
        #[source]
        source: CacheError,
    },

    #[error("unknown permission template '{template}' for user {user_id} during {operation}")]
    UnknownTemplate {
        user_id: UserId,
        operation: &'static str,
        template: String,
    },

    /// A stored record could not be decoded
    #[error("corrupt permission record for user {user_id} during {operation}: {source}")]
    Corruption {
        user_id: UserId,
        operation: &'static str,
        #[source]
        source: CacheError,
    },

    /// The role directory itself failed
    #[error("role lookup failed for user {user_id} during {operation}: {source}")]
    RoleLookup {
        user_id: UserId,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// The stored version differs from the one the caller expected
    #[error(
        "version conflict for user {user_id} during {operation}: expected {expected}, found {}",
        found_version(.actual)
    )]
    VersionConflict {
        user_id: UserId,
        operation: &'static str,
        expected: u64,
        actual: Option<u64>,
    },
}

fn found_version(actual: &Option<u64>) -> String {
    actual.map_or_else(|| "no record".to_string(), |v| v.to_string())
}

impl PermissionError {
    /// Classify a cache failure as corruption or unavailability
    #[must_use]
    pub fn from_cache(user_id: UserId, operation: &'static str, source: CacheError) -> Self {
        if source.is_corruption() {
            PermissionError::Corruption {
                user_id,
                operation,
                source,
            }
        } else {
            PermissionError::StoreUnavailable {
                user_id,
                operation,
                source,
            }
        }
    }

    /// Create an invalid permission error
    #[must_use]
    pub fn invalid_permission(
        user_id: UserId,
        operation: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PermissionError::InvalidPermissionFormat {
            user_id,
            operation,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::NotFound { user_id, .. }
            | Self::InvalidPermissionFormat { user_id, .. }
            | Self::StoreUnavailable { user_id, .. }
            | Self::UnknownTemplate { user_id, .. }
            | Self::Corruption { user_id, .. }
            | Self::RoleLookup { user_id, .. }
            | Self::VersionConflict { user_id, .. } => *user_id,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation, .. }
            | Self::InvalidPermissionFormat { operation, .. }
            | Self::StoreUnavailable { operation, .. }
            | Self::UnknownTemplate { operation, .. }
            | Self::Corruption { operation, .. }
            | Self::RoleLookup { operation, .. }
            | Self::VersionConflict { operation, .. } => operation,
        }
    }

    /// Whether the failure came from the store rather than from the request
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::Corruption { .. }
        )
    }
}
