//! Workspace scan result cache.
//!
//! Results are persisted per workspace as a JSON [`CacheRecord`] carrying a
//! schema version and a timestamp. A record older than the TTL or written by
//! a different schema version is treated exactly like a missing entry; no
//! migration is attempted.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::results::ScanResults;

/// Validity window of a cached record.
pub const MILLIS_IN_WEEK: i64 = 7 * 24 * 60 * 60 * 1000;

/// Errors from the cache layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persisted envelope of one workspace's scan results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub data: Option<ScanResults>,
    /// Unix epoch milliseconds at store time.
    pub timestamp: i64,
    pub version: u32,
}

impl CacheRecord {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(data: ScanResults, now: DateTime<Utc>) -> Self {
        Self {
            data: Some(data),
            timestamp: now.timestamp_millis(),
            version: Self::CURRENT_VERSION,
        }
    }

    /// A record is valid iff it has a payload, is at most one week old, and
    /// was written by the current schema version. Exactly one week old is
    /// still valid.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.data.is_some()
            && now.timestamp_millis() - self.timestamp <= MILLIS_IN_WEEK
            && self.version == Self::CURRENT_VERSION
    }
}

/// Key-value persistence seam for cache records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn put(&self, key: &str, value: String) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// File-backed store: one JSON file per key under a base directory.
pub struct FileCacheStore {
    directory: PathBuf,
}

impl FileCacheStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.directory.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.entry_path(key);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read_to_string(&path).await?))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(self.entry_path(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// Versioned, TTL-bounded cache of per-workspace scan results.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
}

impl ResultCache {
    const KEY_PREFIX: &'static str = "scanforge.issues.";

    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    fn key(workspace: &str) -> String {
        format!("{}{}", Self::KEY_PREFIX, workspace)
    }

    /// Persist the results of a finished workspace scan, replacing any
    /// previous record wholesale.
    #[instrument(skip(self, results))]
    pub async fn store(&self, workspace: &str, results: &ScanResults) -> Result<(), CacheError> {
        let record = CacheRecord::new(results.clone(), Utc::now());
        let raw = serde_json::to_string(&record)?;
        self.store.put(&Self::key(workspace), raw).await
    }

    /// Load the cached results for a workspace.
    ///
    /// Applies the validity check internally: callers never observe a stale,
    /// corrupt, or wrong-version record.
    #[instrument(skip(self))]
    pub async fn load(&self, workspace: &str) -> Result<Option<ScanResults>, CacheError> {
        let Some(raw) = self.store.get(&Self::key(workspace)).await? else {
            return Ok(None);
        };
        let record: CacheRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                debug!(workspace, error = %err, "Discarding unreadable cache record");
                return Ok(None);
            }
        };
        if !record.is_valid(Utc::now()) {
            debug!(workspace, "Discarding invalid cache record");
            return Ok(None);
        }
        Ok(record.data)
    }

    pub async fn remove(&self, workspace: &str) -> Result<(), CacheError> {
        self.store.remove(&Self::key(workspace)).await
    }

    /// Whether this workspace has ever been scanned, regardless of record
    /// validity. Tracked per workspace, not process-wide.
    pub async fn is_first_scan(&self, workspace: &str) -> Result<bool, CacheError> {
        Ok(self.store.get(&Self::key(workspace)).await?.is_none())
    }
}
