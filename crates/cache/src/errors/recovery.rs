//! Recovery utilities for cache errors

use super::types::{CacheError, RecoveryHint};

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::Corruption { recovery_hint, .. }
            | Self::Compression { recovery_hint, .. }
            | Self::InvalidKey { recovery_hint, .. }
            | Self::StoreUnavailable { recovery_hint, .. }
            | Self::Configuration { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::Retry { .. })
    }

    /// Check if this error indicates data corruption
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corruption { .. } | Self::Serialization { .. } | Self::Compression { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreType;

    #[test]
    fn test_store_unavailable_is_transient() {
        let err = CacheError::store_unavailable(StoreType::Memory, "connection reset");
        assert!(err.is_transient());
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_corruption_is_not_transient() {
        let err = CacheError::corruption("user:permissions:1", "bad magic");
        assert!(!err.is_transient());
        assert!(err.is_corruption());
        assert_eq!(err.recovery_hint(), &RecoveryHint::ClearAndRetry);
    }
}
