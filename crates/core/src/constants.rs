/// Constants used throughout the rolegate codebase
// Cache key namespace for per-user permission records
pub const PERMISSIONS_KEY_PREFIX: &str = "user:permissions:";

// Default lifetime of a cached permission record (1 hour)
pub const DEFAULT_PERMISSIONS_TTL_SECS: u64 = 3600;

// Payloads at or above this size are compressed when compression is enabled
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

// Envelope staleness defaults
pub const DEFAULT_FRESH_MAX_AGE_SECS: u64 = 300;
pub const DEFAULT_STALE_MAX_AGE_SECS: u64 = 3600;
pub const DEFAULT_EXPIRING_SOON_SECS: u64 = 300;

// Temporary grants expiring further out than this are flagged by audits
pub const LONG_TEMPORARY_GRANT_DAYS: i64 = 30;

// The all-permissions wildcard
pub const WILDCARD_ALL: &str = "*";

// Permission every role falls back to when it has no configured defaults
pub const FALLBACK_ROLE_PERMISSION: &str = "user.profile";

// Environment variable names
pub const ROLEGATE_PERMISSIONS_TTL_VAR: &str = "ROLEGATE_PERMISSIONS_TTL";
pub const ROLEGATE_FAILURE_POLICY_VAR: &str = "ROLEGATE_FAILURE_POLICY";
pub const ROLEGATE_COMPRESSION_VAR: &str = "ROLEGATE_COMPRESSION";
pub const ROLEGATE_COMPRESSION_THRESHOLD_VAR: &str = "ROLEGATE_COMPRESSION_THRESHOLD";
pub const ROLEGATE_STRICT_CATALOG_VAR: &str = "ROLEGATE_STRICT_CATALOG";
pub const ROLEGATE_CONFIG_VAR: &str = "ROLEGATE_CONFIG";
