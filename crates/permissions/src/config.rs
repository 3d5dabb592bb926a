//! Permission service configuration with precedence and validation
use rolegate_cache::{CacheConfig, CacheConfigBuilder, Codec, CompressionConfig};
use rolegate_core::{
    Error, Result, DEFAULT_PERMISSIONS_TTL_SECS, LONG_TEMPORARY_GRANT_DAYS,
    ROLEGATE_COMPRESSION_THRESHOLD_VAR, ROLEGATE_COMPRESSION_VAR, ROLEGATE_CONFIG_VAR,
    ROLEGATE_FAILURE_POLICY_VAR, ROLEGATE_PERMISSIONS_TTL_VAR, ROLEGATE_STRICT_CATALOG_VAR,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// What `is_allowed` does when the store cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Store failure means no permission
    #[default]
    FailClosed,
    /// Evaluate against the last record this service saw for the user
    StaleCache,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailClosed => write!(f, "fail_closed"),
            FailurePolicy::StaleCache => write!(f, "stale_cache"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail_closed" | "closed" => Ok(FailurePolicy::FailClosed),
            "stale_cache" | "stale" => Ok(FailurePolicy::StaleCache),
            _ => Err(Error::validation(
                "failure_policy",
                s,
                "expected 'fail_closed' or 'stale_cache'",
            )),
        }
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Command line argument
    CommandLine,
}

/// Settings of a `PermissionService`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionServiceConfig {
    /// TTL for persisted records; `None` keeps them until invalidated
    pub default_ttl: Option<Duration>,
    /// Temporary grants expiring further out are flagged by audits
    pub long_temporary_grant_days: i64,
    pub failure_policy: FailurePolicy,
    /// Reject added permissions that are not in the catalog
    pub strict_catalog: bool,
    pub compression: CompressionConfig,
    /// Where the last applied layer came from
    pub source: ConfigSource,
}

impl Default for PermissionServiceConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(DEFAULT_PERMISSIONS_TTL_SECS)),
            long_temporary_grant_days: LONG_TEMPORARY_GRANT_DAYS,
            failure_policy: FailurePolicy::default(),
            strict_catalog: false,
            compression: CompressionConfig::default(),
            source: ConfigSource::Default,
        }
    }
}

impl PermissionServiceConfig {
    /// Store configuration derived from these settings
    pub fn cache_config(&self) -> rolegate_cache::Result<CacheConfig> {
        CacheConfigBuilder::new()
            .with_default_ttl(self.default_ttl)
            .with_compression(self.compression)
            .build()
    }

    /// Check the settings are internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.long_temporary_grant_days < 0 {
            return Err(Error::validation(
                "long_temporary_grant_days",
                self.long_temporary_grant_days.to_string(),
                "must not be negative",
            ));
        }
        if self.default_ttl == Some(Duration::ZERO) {
            return Err(Error::validation(
                "default_ttl",
                "0",
                "use no TTL instead of a zero TTL",
            ));
        }
        self.compression
            .validate()
            .map_err(|e| Error::configuration(e.to_string()))
    }
}

/// File layer: every field optional so it only overrides what it names
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    default_ttl_secs: Option<u64>,
    long_temporary_grant_days: Option<i64>,
    failure_policy: Option<FailurePolicy>,
    strict_catalog: Option<bool>,
    compression: Option<CompressionConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRoot {
    #[serde(default)]
    permissions: FileSettings,
}

/// Configuration loader that handles precedence
pub struct PermissionConfigLoader;

impl PermissionConfigLoader {
    /// Load defaults, then the config file, then environment variables
    pub fn load() -> Result<PermissionServiceConfig> {
        let path = Self::config_file_path()?;
        Self::load_with_file(&path)
    }

    /// Same as [`load`](Self::load) with an explicit config file path
    pub fn load_with_file(path: &Path) -> Result<PermissionServiceConfig> {
        let mut config = PermissionServiceConfig::default();

        if let Some(settings) = Self::load_from_config_file(path)? {
            Self::merge(&mut config, settings);
            config.source = ConfigSource::ConfigFile(path.to_path_buf());
        }

        if let Some(var) = Self::apply_env(&mut config)? {
            config.source = ConfigSource::EnvironmentVariable(var);
        }

        config.validate()?;
        debug!(source = ?config.source, policy = %config.failure_policy, "loaded permission config");
        Ok(config)
    }

    /// Apply command line arguments (highest precedence)
    pub fn apply_cli_args(
        mut config: PermissionServiceConfig,
        failure_policy: Option<FailurePolicy>,
        strict_catalog: Option<bool>,
    ) -> Result<PermissionServiceConfig> {
        if failure_policy.is_none() && strict_catalog.is_none() {
            return Ok(config);
        }
        if let Some(policy) = failure_policy {
            config.failure_policy = policy;
        }
        if let Some(strict) = strict_catalog {
            config.strict_catalog = strict;
        }
        config.source = ConfigSource::CommandLine;
        Ok(config)
    }

    /// `$ROLEGATE_CONFIG`, else `<config dir>/rolegate/config.json`
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(ROLEGATE_CONFIG_VAR) {
            return Ok(PathBuf::from(path));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::configuration("could not determine config directory"))?;
        Ok(config_dir.join("rolegate").join("config.json"))
    }

    fn load_from_config_file(path: &Path) -> Result<Option<FileSettings>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;
        let root: FileRoot = serde_json::from_str(&content).map_err(|e| {
            Error::json(format!("invalid config file {}", path.display()), e)
        })?;
        Ok(Some(root.permissions))
    }

    fn merge(config: &mut PermissionServiceConfig, settings: FileSettings) {
        if let Some(secs) = settings.default_ttl_secs {
            config.default_ttl = ttl_from_secs(secs);
        }
        if let Some(days) = settings.long_temporary_grant_days {
            config.long_temporary_grant_days = days;
        }
        if let Some(policy) = settings.failure_policy {
            config.failure_policy = policy;
        }
        if let Some(strict) = settings.strict_catalog {
            config.strict_catalog = strict;
        }
        if let Some(compression) = settings.compression {
            config.compression = compression;
        }
    }

    /// Returns the last variable applied, if any
    fn apply_env(config: &mut PermissionServiceConfig) -> Result<Option<String>> {
        let mut applied = None;

        if let Ok(raw) = std::env::var(ROLEGATE_PERMISSIONS_TTL_VAR) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                Error::validation("ROLEGATE_PERMISSIONS_TTL", raw.clone(), e.to_string())
            })?;
            config.default_ttl = ttl_from_secs(secs);
            applied = Some(ROLEGATE_PERMISSIONS_TTL_VAR);
        }

        if let Ok(raw) = std::env::var(ROLEGATE_FAILURE_POLICY_VAR) {
            config.failure_policy = raw.parse()?;
            applied = Some(ROLEGATE_FAILURE_POLICY_VAR);
        }

        // "off" disables compression; a codec name enables it with that codec
        if let Ok(raw) = std::env::var(ROLEGATE_COMPRESSION_VAR) {
            match raw.trim().to_lowercase().as_str() {
                "off" | "false" | "none" => config.compression.enabled = false,
                other => {
                    let codec = other.parse::<Codec>().map_err(|e| {
                        Error::validation("ROLEGATE_COMPRESSION", raw.clone(), e.to_string())
                    })?;
                    let min_size = config.compression.min_size;
                    config.compression = CompressionConfig {
                        min_size,
                        ..CompressionConfig::enabled(codec)
                    };
                }
            }
            applied = Some(ROLEGATE_COMPRESSION_VAR);
        }

        if let Ok(raw) = std::env::var(ROLEGATE_COMPRESSION_THRESHOLD_VAR) {
            config.compression.min_size = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                Error::validation("ROLEGATE_COMPRESSION_THRESHOLD", raw.clone(), e.to_string())
            })?;
            applied = Some(ROLEGATE_COMPRESSION_THRESHOLD_VAR);
        }

        if let Ok(raw) = std::env::var(ROLEGATE_STRICT_CATALOG_VAR) {
            config.strict_catalog = parse_flag(&raw);
            applied = Some(ROLEGATE_STRICT_CATALOG_VAR);
        }

        Ok(applied.map(str::to_string))
    }
}

/// Zero seconds means no expiry
fn ttl_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ALL_VARS: &[&str] = &[
        ROLEGATE_PERMISSIONS_TTL_VAR,
        ROLEGATE_FAILURE_POLICY_VAR,
        ROLEGATE_COMPRESSION_VAR,
        ROLEGATE_COMPRESSION_THRESHOLD_VAR,
        ROLEGATE_STRICT_CATALOG_VAR,
        ROLEGATE_CONFIG_VAR,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!(
            "stale-cache".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::StaleCache
        );
        assert_eq!(
            "FAIL_CLOSED".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::FailClosed
        );
        assert!("open".parse::<FailurePolicy>().is_err());
    }

    #[test]
    #[serial]
    fn test_defaults_without_file_or_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let config = PermissionConfigLoader::load_with_file(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, PermissionServiceConfig::default());
        assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.long_temporary_grant_days, 30);
    }

    #[test]
    #[serial]
    fn test_file_then_env_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"permissions": {"default_ttl_secs": 60, "failure_policy": "stale_cache", "strict_catalog": true}}"#,
        )
        .unwrap();

        let config = PermissionConfigLoader::load_with_file(&path).unwrap();
        assert_eq!(config.default_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.failure_policy, FailurePolicy::StaleCache);
        assert!(config.strict_catalog);
        assert_eq!(config.source, ConfigSource::ConfigFile(path.clone()));

        std::env::set_var(ROLEGATE_PERMISSIONS_TTL_VAR, "120");
        std::env::set_var(ROLEGATE_COMPRESSION_VAR, "zstd");
        let config = PermissionConfigLoader::load_with_file(&path).unwrap();
        assert_eq!(config.default_ttl, Some(Duration::from_secs(120)));
        assert!(config.compression.enabled);
        assert_eq!(config.compression.codec, Codec::Zstd);
        assert_eq!(config.failure_policy, FailurePolicy::StaleCache);
        assert_eq!(
            config.source,
            ConfigSource::EnvironmentVariable(ROLEGATE_COMPRESSION_VAR.to_string())
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_rejected() {
        clear_env();
        std::env::set_var(ROLEGATE_PERMISSIONS_TTL_VAR, "soon");
        let dir = TempDir::new().unwrap();
        let result = PermissionConfigLoader::load_with_file(&dir.path().join("none.json"));
        assert!(matches!(result, Err(Error::Validation { .. })));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_ttl_means_persistent() {
        clear_env();
        std::env::set_var(ROLEGATE_PERMISSIONS_TTL_VAR, "0");
        let dir = TempDir::new().unwrap();
        let config = PermissionConfigLoader::load_with_file(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.default_ttl, None);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_path_from_env() {
        clear_env();
        std::env::set_var(ROLEGATE_CONFIG_VAR, "/etc/rolegate.json");
        assert_eq!(
            PermissionConfigLoader::config_file_path().unwrap(),
            PathBuf::from("/etc/rolegate.json")
        );
        clear_env();
    }

    #[test]
    fn test_cli_args_win() {
        let config = PermissionConfigLoader::apply_cli_args(
            PermissionServiceConfig::default(),
            Some(FailurePolicy::StaleCache),
            None,
        )
        .unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::StaleCache);
        assert_eq!(config.source, ConfigSource::CommandLine);
    }

    #[test]
    fn test_cache_config_carries_settings() {
        let config = PermissionServiceConfig {
            default_ttl: Some(Duration::from_secs(10)),
            compression: CompressionConfig::enabled(Codec::Gzip),
            ..Default::default()
        };
        let cache = config.cache_config().unwrap();
        assert_eq!(cache.default_ttl, Some(Duration::from_secs(10)));
        assert!(cache.compression.enabled);
    }
}
