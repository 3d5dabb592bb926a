//! Directory-backed backend
//!
//! Each key lives in its own file under `objects/<shard>/<sha256>`, where the
//! shard is the first byte of the digest. A file starts with a 12 byte header:
//! the `RGKV` magic followed by the expiry in Unix milliseconds (i64, LE;
//! `i64::MIN` for no expiry).

use super::{validate_key, KeyTtl, KeyValueBackend};
use crate::envelope::to_chrono;
use crate::errors::{CacheError, Result, StoreType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolegate_core::{SharedClock, SystemClock};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};
use uuid::Uuid;

const ENTRY_MAGIC: [u8; 4] = *b"RGKV";
const HEADER_LEN: usize = ENTRY_MAGIC.len() + 8;
const NO_EXPIRY: i64 = i64::MIN;

/// Filesystem backend rooted at a cache directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
    clock: SharedClock,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// Backend under the user's cache directory (`~/.cache/rolegate` on Linux)
    pub fn in_user_cache_dir() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| CacheError::Configuration {
            message: "could not determine the user cache directory".to_string(),
            recovery_hint: crate::errors::RecoveryHint::UpdateConfiguration,
        })?;
        Ok(Self::new(base.join("rolegate"), SystemClock::shared()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.root.join("objects").join(&hash[..2]).join(hash)
    }

    async fn read_entry(&self, key: &str) -> Result<Option<(Option<DateTime<Utc>>, Vec<u8>)>> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, "read entry", e)),
        };

        let (expires_at, value) = decode_entry(key, bytes)?;
        if expires_at.is_some_and(|at| self.clock.now() >= at) {
            trace!(key, "removing expired entry");
            remove_if_present(&path).await?;
            return Ok(None);
        }
        Ok(Some((expires_at, value)))
    }
}

fn encode_entry(expires_at: Option<DateTime<Utc>>, value: &[u8]) -> Vec<u8> {
    let millis = expires_at.map_or(NO_EXPIRY, |at| at.timestamp_millis());
    let mut out = Vec::with_capacity(HEADER_LEN + value.len());
    out.extend_from_slice(&ENTRY_MAGIC);
    out.extend_from_slice(&millis.to_le_bytes());
    out.extend_from_slice(value);
    out
}

fn decode_entry(key: &str, mut bytes: Vec<u8>) -> Result<(Option<DateTime<Utc>>, Vec<u8>)> {
    if bytes.len() < HEADER_LEN || bytes[..ENTRY_MAGIC.len()] != ENTRY_MAGIC {
        return Err(CacheError::corruption(key, "missing entry header"));
    }

    let mut millis = [0u8; 8];
    millis.copy_from_slice(&bytes[ENTRY_MAGIC.len()..HEADER_LEN]);
    let millis = i64::from_le_bytes(millis);

    let expires_at = if millis == NO_EXPIRY {
        None
    } else {
        Some(
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| CacheError::corruption(key, "expiry out of range"))?,
        )
    };

    let value = bytes.split_off(HEADER_LEN);
    Ok((expires_at, value))
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, "remove entry", e)),
    }
}

/// Write `content` to `path` through a temporary file in the same directory
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| CacheError::Configuration {
        message: format!("entry path {} has no parent directory", path.display()),
        recovery_hint: crate::errors::RecoveryHint::UpdateConfiguration,
    })?;

    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| CacheError::io(parent, "create shard directory", e))?;

    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| CacheError::io(&temp_path, "create temporary file", e))?;
        file.write_all(content)
            .await
            .map_err(|e| CacheError::io(&temp_path, "write temporary file", e))?;
        file.sync_all()
            .await
            .map_err(|e| CacheError::io(&temp_path, "sync temporary file", e))
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(CacheError::io(path, "atomic rename", e));
    }
    Ok(())
}

#[async_trait]
impl KeyValueBackend for FileBackend {
    fn store_type(&self) -> StoreType {
        StoreType::FileSystem
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.read_entry(key).await?.map(|(_, value)| value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let expires_at = ttl.map(|ttl| self.clock.now() + to_chrono(ttl));
        let path = self.entry_path(key);
        write_atomic(&path, &encode_entry(expires_at, &value)).await?;
        debug!(key, path = %path.display(), bytes = value.len(), "wrote cache entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(CacheError::io(path, "read entry", e)),
        };

        // An undecodable entry counts as live so clearing it is reported
        let live = match decode_entry(key, bytes) {
            Ok((expires_at, _)) => !expires_at.is_some_and(|at| self.clock.now() >= at),
            Err(e) => {
                warn!(key, error = %e, "removing undecodable entry");
                true
            }
        };
        let removed = remove_if_present(&path).await?;
        Ok(live && removed)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        validate_key(key)?;
        let now = self.clock.now();
        Ok(match self.read_entry(key).await? {
            None => KeyTtl::Missing,
            Some((None, _)) => KeyTtl::Persistent,
            Some((Some(at), _)) => KeyTtl::Expires((at - now).to_std().unwrap_or(Duration::ZERO)),
        })
    }
}
