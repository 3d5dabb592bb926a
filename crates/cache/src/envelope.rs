//! TTL and freshness wrapper for cached payloads

use crate::compression;
use crate::config::{Codec, CompressionConfig};
use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use chrono::{DateTime, Utc};
use rolegate_core::{
    DEFAULT_EXPIRING_SOON_SECS, DEFAULT_FRESH_MAX_AGE_SECS, DEFAULT_PERMISSIONS_TTL_SECS,
    DEFAULT_STALE_MAX_AGE_SECS,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Upper bound for any TTL arithmetic, roughly one hundred years
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// A payload that can live inside a [`CacheEnvelope`]
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Key under which the payload is stored
    fn cache_key(&self) -> String;

    /// TTL applied when the caller does not pick one
    fn default_ttl() -> Option<Duration> {
        Some(Duration::from_secs(DEFAULT_PERMISSIONS_TTL_SECS))
    }

    fn version(&self) -> u64;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Refresh `updated_at` without any other change
    fn touch(&mut self, now: DateTime<Utc>);
}

/// Lifecycle classification of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Expired,
    ExpiringSoon,
    Fresh,
    Stale,
    Active,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheStatus::Expired => "expired",
            CacheStatus::ExpiringSoon => "expiring_soon",
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Active => "active",
        };
        f.write_str(s)
    }
}

/// A cached payload together with its expiry
///
/// On the wire the payload's fields and `expires_at` share one JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Cacheable")]
pub struct CacheEnvelope<T> {
    #[serde(flatten)]
    pub payload: T,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Summary of an envelope's lifecycle, suitable for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeInfo {
    pub key: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub age_seconds: i64,
    pub remaining_ttl_seconds: Option<u64>,
    pub ttl_used_fraction: Option<f64>,
    pub size_bytes: usize,
    pub status: CacheStatus,
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    let secs = duration.as_secs().min(MAX_TTL_SECS);
    chrono::Duration::seconds(secs as i64)
        + chrono::Duration::nanoseconds(i64::from(duration.subsec_nanos()))
}

impl<T: Cacheable> CacheEnvelope<T> {
    /// Wrap `payload`, expiring `ttl` after `now` (never when `ttl` is `None`)
    pub fn new(payload: T, ttl: Option<Duration>, now: DateTime<Utc>) -> Self {
        Self {
            payload,
            expires_at: ttl.map(|ttl| now + to_chrono(ttl)),
        }
    }

    /// Wrap `payload` with its type's default TTL
    pub fn with_default_ttl(payload: T, now: DateTime<Utc>) -> Self {
        Self::new(payload, T::default_ttl(), now)
    }

    pub fn cache_key(&self) -> String {
        self.payload.cache_key()
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Expire `ttl` after `now`. The payload is left untouched.
    pub fn set_ttl(&mut self, ttl: Duration, now: DateTime<Utc>) {
        self.expires_at = Some(now + to_chrono(ttl));
    }

    /// Push the expiry back by `extra`; an entry without expiry gets one from `now`
    pub fn extend_ttl(&mut self, extra: Duration, now: DateTime<Utc>) {
        let base = self.expires_at.unwrap_or(now);
        self.expires_at = Some(base + to_chrono(extra));
    }

    /// Make the entry persistent
    pub fn clear_ttl(&mut self) {
        self.expires_at = None;
    }

    /// Time left before expiry, saturating at zero. `None` for persistent entries.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Refresh the payload's `updated_at`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.payload.touch(now);
    }

    /// Time since the payload was created
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.payload.created_at()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Option<Duration>) -> bool {
        let max_age = max_age.unwrap_or(Duration::from_secs(DEFAULT_FRESH_MAX_AGE_SECS));
        self.age(now) <= to_chrono(max_age)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Option<Duration>) -> bool {
        let max_age = max_age.unwrap_or(Duration::from_secs(DEFAULT_STALE_MAX_AGE_SECS));
        self.age(now) > to_chrono(max_age)
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>, threshold: Option<Duration>) -> bool {
        let threshold = threshold.unwrap_or(Duration::from_secs(DEFAULT_EXPIRING_SOON_SECS));
        self.remaining_ttl(now)
            .is_some_and(|remaining| remaining <= threshold)
    }

    /// Share of the total lifetime already used, in `0.0..=1.0`
    pub fn ttl_used_fraction(&self, now: DateTime<Utc>) -> Option<f64> {
        let expires_at = self.expires_at?;
        let total = (expires_at - self.payload.created_at()).num_milliseconds();
        if total <= 0 {
            return Some(0.0);
        }
        let remaining = (expires_at - now).num_milliseconds().max(0);
        let used = 1.0 - remaining as f64 / total as f64;
        Some(used.clamp(0.0, 1.0))
    }

    pub fn status(&self, now: DateTime<Utc>) -> CacheStatus {
        if self.is_expired(now) {
            CacheStatus::Expired
        } else if self.is_expiring_soon(now, None) {
            CacheStatus::ExpiringSoon
        } else if self.is_fresh(now, None) {
            CacheStatus::Fresh
        } else if self.is_stale(now, None) {
            CacheStatus::Stale
        } else {
            CacheStatus::Active
        }
    }

    /// Plain JSON encoding
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CacheError::Serialization {
            key: self.cache_key(),
            operation: SerializationOp::Encode,
            source: Box::new(e),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Payload cannot be represented as JSON".to_string(),
            },
        })
    }

    /// JSON encoding, compressed when `compression` calls for it
    pub fn to_bytes(&self, compression: &CompressionConfig) -> Result<Vec<u8>> {
        let json = self.to_json()?;
        Ok(compression::encode(&json, compression)?.into_owned())
    }

    /// Decode bytes written by [`to_bytes`](Self::to_bytes), compressed or not
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self> {
        let plain = compression::decode(key, bytes)?;
        serde_json::from_slice(&plain).map_err(|e| CacheError::Corruption {
            key: key.to_string(),
            reason: format!("undecodable payload: {e}"),
            recovery_hint: RecoveryHint::ClearAndRetry,
        })
    }

    /// Size of the plain JSON encoding
    pub fn size_bytes(&self) -> Result<usize> {
        Ok(self.to_json()?.len())
    }

    /// Size after forcing compression with `codec`
    pub fn compressed_size_bytes(&self, codec: Codec) -> Result<usize> {
        let json = self.to_json()?;
        compression::compressed_len(&json, codec)
    }

    /// `1 - compressed / plain`, zero for an empty encoding
    pub fn compression_ratio(&self, codec: Codec) -> Result<f64> {
        let original = self.size_bytes()?;
        if original == 0 {
            return Ok(0.0);
        }
        let compressed = self.compressed_size_bytes(codec)?;
        Ok(1.0 - compressed as f64 / original as f64)
    }

    pub fn info(&self, now: DateTime<Utc>) -> Result<EnvelopeInfo> {
        Ok(EnvelopeInfo {
            key: self.cache_key(),
            version: self.payload.version(),
            created_at: self.payload.created_at(),
            updated_at: self.payload.updated_at(),
            expires_at: self.expires_at,
            age_seconds: self.age(now).num_seconds(),
            remaining_ttl_seconds: self.remaining_ttl(now).map(|d| d.as_secs()),
            ttl_used_fraction: self.ttl_used_fraction(now),
            size_bytes: self.size_bytes()?,
            status: self.status(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u64,
        tags: BTreeSet<String>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl Cacheable for Note {
        fn cache_key(&self) -> String {
            format!("note:{}", self.id)
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

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn note(tags: usize) -> Note {
        Note {
            id: 1,
            tags: (0..tags).map(|i| format!("tag.number.{i}")).collect(),
            version: 1,
            created_at: start(),
            updated_at: start(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let env = CacheEnvelope::new(note(1), Some(Duration::from_secs(60)), start());
        assert!(!env.is_expired(start() + chrono::Duration::seconds(59)));
        assert!(env.is_expired(start() + chrono::Duration::seconds(60)));
        assert_eq!(
            env.remaining_ttl(start() + chrono::Duration::seconds(20)),
            Some(Duration::from_secs(40))
        );
        assert_eq!(
            env.remaining_ttl(start() + chrono::Duration::seconds(90)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_touch_only_moves_updated_at() {
        let mut env = CacheEnvelope::new(note(1), Some(Duration::from_secs(60)), start());
        let expires_at = env.expires_at;
        let later = start() + chrono::Duration::seconds(30);

        env.touch(later);
        assert_eq!(env.payload.updated_at(), later);
        assert_eq!(env.payload.created_at(), start());
        assert_eq!(env.payload.version(), 1);
        assert_eq!(env.expires_at, expires_at);
    }

    #[test]
    fn test_ttl_management() {
        let mut env = CacheEnvelope::new(note(1), None, start());
        assert_eq!(env.remaining_ttl(start()), None);
        assert!(!env.is_expired(start() + chrono::Duration::days(10_000)));

        env.set_ttl(Duration::from_secs(100), start());
        env.extend_ttl(Duration::from_secs(50), start());
        assert_eq!(env.remaining_ttl(start()), Some(Duration::from_secs(150)));

        env.clear_ttl();
        assert!(env.expires_at.is_none());
    }

    #[test]
    fn test_set_ttl_leaves_payload_alone() {
        let mut env = CacheEnvelope::new(note(1), None, start());
        let before = env.payload.clone();
        env.set_ttl(Duration::from_secs(10), start() + chrono::Duration::hours(1));
        assert_eq!(env.payload, before);
    }

    #[test]
    fn test_status_classification() {
        let env = CacheEnvelope::new(note(1), Some(Duration::from_secs(7200)), start());
        assert_eq!(env.status(start()), CacheStatus::Fresh);
        assert_eq!(
            env.status(start() + chrono::Duration::minutes(30)),
            CacheStatus::Active
        );
        assert_eq!(
            env.status(start() + chrono::Duration::minutes(90)),
            CacheStatus::Stale
        );
        assert_eq!(
            env.status(start() + chrono::Duration::minutes(116)),
            CacheStatus::ExpiringSoon
        );
        assert_eq!(
            env.status(start() + chrono::Duration::hours(2)),
            CacheStatus::Expired
        );

        let persistent = CacheEnvelope::new(note(1), None, start());
        assert_eq!(
            persistent.status(start() + chrono::Duration::hours(2)),
            CacheStatus::Stale
        );
    }

    #[test]
    fn test_ttl_used_fraction() {
        let env = CacheEnvelope::new(note(1), Some(Duration::from_secs(100)), start());
        let used = env
            .ttl_used_fraction(start() + chrono::Duration::seconds(25))
            .unwrap();
        assert!((used - 0.25).abs() < 1e-9);
        assert_eq!(
            env.ttl_used_fraction(start() + chrono::Duration::seconds(500)),
            Some(1.0)
        );
    }

    #[test]
    fn test_serialization_is_byte_stable() {
        let env = CacheEnvelope::new(note(5), Some(Duration::from_secs(3600)), start());
        let first = env.to_json().unwrap();
        let decoded = CacheEnvelope::<Note>::from_bytes("note:1", &first).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.to_json().unwrap(), first);
    }

    #[test]
    fn test_compressed_roundtrip() {
        let env = CacheEnvelope::new(note(200), Some(Duration::from_secs(3600)), start());
        let config = CompressionConfig::enabled(Codec::Zstd);
        let bytes = env.to_bytes(&config).unwrap();
        assert!(compression::is_framed(&bytes));
        assert!(bytes.len() < env.size_bytes().unwrap());

        let decoded = CacheEnvelope::<Note>::from_bytes("note:1", &bytes).unwrap();
        assert_eq!(decoded, env);
        assert!(env.compression_ratio(Codec::Gzip).unwrap() > 0.5);
    }

    #[test]
    fn test_garbage_is_corruption() {
        let err = CacheEnvelope::<Note>::from_bytes("note:1", b"{not json").unwrap_err();
        assert!(err.is_corruption());
    }
}
