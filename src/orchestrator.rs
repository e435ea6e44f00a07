//! One backup cycle: read watermark, fetch changed blocks, fan-out persist,
//! then advance the watermark. The watermark only moves after a fully
//! successful cycle, so a failed run is naturally re-attempted by the next
//! scheduled invocation over the same (or an overlapping) window.

use crate::fetcher::PageFetcher;
use crate::persister::Persister;
use crate::watermark::WatermarkStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub partition: String,
}

pub struct Orchestrator {
    fetcher: PageFetcher,
    persister: Persister,
    watermark: Arc<dyn WatermarkStore>,
    lookback: Duration,
}

impl Orchestrator {
    pub fn new(
        fetcher: PageFetcher,
        persister: Persister,
        watermark: Arc<dyn WatermarkStore>,
        lookback: StdDuration,
    ) -> Self {
        Self {
            fetcher,
            persister,
            watermark,
            lookback: Duration::seconds(lookback.as_secs().min(i64::MAX as u64) as i64),
        }
    }

    /// Executes one backup cycle. Aborting at any stage leaves the watermark
    /// untouched; items are delivered at least once, never at most once.
    pub async fn execute_once(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let last_run = match self.watermark.read().await {
            Ok(timestamp) => timestamp,
            Err(err) => {
                let fallback = Utc::now() - self.lookback;
                tracing::warn!(
                    error = %err,
                    fallback = %fallback,
                    "unable to determine last run time; using default lookback"
                );
                fallback
            }
        };

        tracing::info!(last_run = %last_run, "fetching updated content blocks");
        let blocks = self
            .fetcher
            .fetch_updated(last_run, cancel)
            .await
            .context("failed to fetch content blocks")?;

        let partition = partition_label(Utc::now());
        let fetched = blocks.len();
        tracing::info!(blocks = fetched, partition = %partition, "saving content blocks");
        self.persister
            .persist_batch(blocks, &partition)
            .await
            .context("failed to save content blocks")?;

        self.watermark
            .write(Utc::now())
            .await
            .context("failed to update last run time")?;

        Ok(RunSummary { fetched, partition })
    }
}

/// Partition labels are derived from the run date, one per calendar day.
pub fn partition_label(now: DateTime<Utc>) -> String {
    format!("backup_{}", now.format("%Y%m%d"))
}
