//! Watermark persistence: the single timestamp bounding "what changed since
//! the last successful run".

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Durable store for the last successful run time.
///
/// `read` errors are expected on first run (or after corruption) and must be
/// treated by callers as "no watermark", never as fatal.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn read(&self) -> Result<DateTime<Utc>>;
    async fn write(&self, timestamp: DateTime<Utc>) -> Result<()>;
}

/// File-backed store: one RFC3339 line at a fixed path.
///
/// The mutex serializes access within this process only; concurrent processes
/// writing the same file are not coordinated.
pub struct FileWatermarkStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn read(&self) -> Result<DateTime<Utc>> {
        let _guard = self.lock.lock().await;
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read watermark file {}", self.path.display()))?;
        let parsed = DateTime::parse_from_rfc3339(raw.trim())
            .with_context(|| format!("watermark file {} is not RFC3339", self.path.display()))?;
        Ok(parsed.with_timezone(&Utc))
    }

    async fn write(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let encoded = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        tokio::fs::write(&self.path, encoded)
            .await
            .with_context(|| format!("failed to write watermark file {}", self.path.display()))
    }
}
