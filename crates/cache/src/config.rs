//! Cache configuration
use crate::errors::{CacheError, RecoveryHint, Result};
use rolegate_core::{
    DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_PERMISSIONS_TTL_SECS, PERMISSIONS_KEY_PREFIX,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default gzip level (6 = zlib default)
pub const DEFAULT_GZIP_LEVEL: i32 = 6;

/// Default zstd level (3 = fast with good compression)
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Compression codec used for payloads above the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Gzip,
    Zstd,
}

impl Codec {
    pub(crate) const fn tag(self) -> u8 {
        match self {
            Codec::Gzip => 1,
            Codec::Zstd => 2,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Codec::Gzip),
            2 => Some(Codec::Zstd),
            _ => None,
        }
    }

    /// Default level for this codec
    pub const fn default_level(self) -> i32 {
        match self {
            Codec::Gzip => DEFAULT_GZIP_LEVEL,
            Codec::Zstd => DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Gzip => write!(f, "gzip"),
            Codec::Zstd => write!(f, "zstd"),
        }
    }
}

impl FromStr for Codec {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Codec::Gzip),
            "zstd" | "zst" => Ok(Codec::Zstd),
            other => Err(CacheError::Configuration {
                message: format!("unknown compression codec '{other}'"),
                recovery_hint: RecoveryHint::UpdateConfiguration,
            }),
        }
    }
}

/// Compression configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Whether compression is enabled
    pub enabled: bool,
    /// Codec to compress with
    pub codec: Codec,
    /// Codec level (0-9 for gzip, 1-22 for zstd)
    pub level: i32,
    /// Minimum payload size in bytes before compression is applied
    pub min_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            codec: Codec::Gzip,
            level: DEFAULT_GZIP_LEVEL,
            min_size: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl CompressionConfig {
    /// Compression turned on with the given codec and its default level
    pub fn enabled(codec: Codec) -> Self {
        Self {
            enabled: true,
            codec,
            level: codec.default_level(),
            ..Self::default()
        }
    }

    /// Whether a payload of `len` bytes should be compressed
    pub fn should_compress(&self, len: usize) -> bool {
        self.enabled && len >= self.min_size
    }

    /// Validate the level against the codec's supported range
    pub fn validate(&self) -> Result<()> {
        let range = match self.codec {
            Codec::Gzip => 0..=9,
            Codec::Zstd => 1..=22,
        };
        if !range.contains(&self.level) {
            return Err(CacheError::Configuration {
                message: format!(
                    "compression level {} out of range {:?} for {}",
                    self.level, range, self.codec
                ),
                recovery_hint: RecoveryHint::UpdateConfiguration,
            });
        }
        Ok(())
    }
}

/// Base configuration for cache stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one
    pub default_ttl: Option<Duration>,
    /// Payload compression settings
    pub compression: CompressionConfig,
    /// Prefix prepended to every key written by a store
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(DEFAULT_PERMISSIONS_TTL_SECS)),
            compression: CompressionConfig::default(),
            key_prefix: PERMISSIONS_KEY_PREFIX.to_string(),
        }
    }
}

/// Builder for creating cache configurations
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Set compression settings
    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the compression threshold in bytes
    pub fn with_compression_threshold(mut self, min_size: usize) -> Self {
        self.config.compression.min_size = min_size;
        self
    }

    /// Set the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CacheConfig> {
        self.config.compression.validate()?;
        Ok(self.config)
    }
}
