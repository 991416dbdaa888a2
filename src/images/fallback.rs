//! Secondary image cache.
//!
//! A flat, non-transactional key-value namespace with a fixed byte quota. The
//! file-backed implementation keeps one file per key, named by the hex-encoded
//! blake3 digest of the key so names stay a fixed length.

use crate::error::CacheError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flat key-value cache for encoded images
#[async_trait]
pub trait FallbackCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Directory-backed fallback cache with a total size quota
#[derive(Debug)]
pub struct FileFallbackCache {
    dir: PathBuf,
    capacity_bytes: u64,
    write_lock: tokio::sync::Mutex<()>,
}

fn join_error(e: tokio::task::JoinError) -> CacheError {
    CacheError::Io(std::io::Error::new(
        ErrorKind::Other,
        format!("Cache task failed: {}", e),
    ))
}

const STAGING_EXTENSION: &str = "tmp";

fn is_staging(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == STAGING_EXTENSION)
}

/// Total size of the committed files under `dir`. Staging files left by an
/// interrupted write are not counted.
fn usage_of(dir: &Path) -> Result<u64, CacheError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut total = 0;
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            CacheError::Io(std::io::Error::new(ErrorKind::Other, e.to_string()))
        })?;
        if entry.file_type().is_file() && !is_staging(entry.path()) {
            total += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(total)
}

impl FileFallbackCache {
    pub fn new(dir: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            capacity_bytes,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(blake3::hash(key.as_bytes()).as_bytes()))
    }

    /// Bytes currently held
    pub async fn usage_bytes(&self) -> Result<u64, CacheError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || usage_of(&dir))
            .await
            .map_err(join_error)?
    }
}

#[async_trait]
impl FallbackCache for FileFallbackCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.dir.clone();
        let path = self.path_for(key);
        let capacity = self.capacity_bytes;
        let value = value.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            std::fs::create_dir_all(&dir)?;
            let replaced = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let used = usage_of(&dir)?.saturating_sub(replaced);
            let needed = value.len() as u64;
            if used + needed > capacity {
                return Err(CacheError::QuotaExceeded {
                    needed,
                    available: capacity.saturating_sub(used),
                });
            }
            let staging = path.with_extension(STAGING_EXTENSION);
            std::fs::write(&staging, value.as_bytes())?;
            std::fs::rename(&staging, &path)?;
            Ok(())
        })
        .await
        .map_err(join_error)??;

        debug!(key, "Stored value in fallback cache");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}
