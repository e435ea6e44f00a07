//! Fan-out persistence stage: one task per content block, full fan-in before
//! reporting, and an aggregate error that keeps every per-block failure
//! instead of discarding all but the first.

use crate::fetcher::FanoutPolicy;
use crate::model::ContentBlock;
use crate::runtime::telemetry::Telemetry;
use crate::storage::Storage;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One block that could not be persisted.
#[derive(Debug)]
pub struct SaveFailure {
    pub block_id: u64,
    pub source: anyhow::Error,
}

/// Aggregate outcome of a failed batch save.
///
/// Displays the first failure as the representative cause; `failures()`
/// exposes the full set for callers that want complete diagnostics.
#[derive(Debug)]
pub struct BatchSaveError {
    attempted: usize,
    failures: Vec<SaveFailure>,
}

impl BatchSaveError {
    fn new(attempted: usize, failures: Vec<SaveFailure>) -> Self {
        debug_assert!(!failures.is_empty(), "aggregate requires at least one failure");
        Self {
            attempted,
            failures,
        }
    }

    pub fn first(&self) -> &SaveFailure {
        &self.failures[0]
    }

    pub fn failures(&self) -> &[SaveFailure] {
        &self.failures
    }

    pub fn attempted(&self) -> usize {
        self.attempted
    }
}

impl fmt::Display for BatchSaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.first();
        write!(
            f,
            "failed to save content block {}: {:#}",
            first.block_id, first.source
        )?;
        if self.failures.len() > 1 {
            write!(f, " ({} more blocks failed)", self.failures.len() - 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchSaveError {}

/// Saves each block of a batch independently under one partition label.
pub struct Persister {
    storage: Arc<dyn Storage>,
    policy: FanoutPolicy,
    telemetry: Arc<Telemetry>,
}

impl Persister {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            policy: FanoutPolicy::CollectAll,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    pub fn with_policy(mut self, policy: FanoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Persists every block concurrently, each as its own single-block call to
    /// the storage backend. Waits for full fan-in, then reports the aggregate.
    ///
    /// Under the default `CollectAll` policy one block's failure never
    /// prevents an attempt on any sibling; an empty batch is a success.
    pub async fn persist_batch(
        &self,
        blocks: Vec<ContentBlock>,
        partition: &str,
    ) -> Result<(), BatchSaveError> {
        let attempted = blocks.len();
        if attempted == 0 {
            return Ok(());
        }

        let (failure_tx, mut failure_rx) = mpsc::channel::<SaveFailure>(attempted);
        let abort = CancellationToken::new();

        let mut tasks = Vec::with_capacity(attempted);
        for block in blocks {
            let storage = Arc::clone(&self.storage);
            let telemetry = Arc::clone(&self.telemetry);
            let failures = failure_tx.clone();
            let abort = abort.clone();
            let policy = self.policy;
            let partition = partition.to_string();

            tasks.push(tokio::spawn(async move {
                if policy == FanoutPolicy::FailFast && abort.is_cancelled() {
                    return;
                }
                let block_id = block.id;
                match storage.save_blocks(&[block], &partition).await {
                    Ok(()) => telemetry.record_saved_blocks(1),
                    Err(source) => {
                        telemetry.record_save_error();
                        tracing::error!(
                            block_id,
                            partition = %partition,
                            error = %source,
                            "failed to save content block"
                        );
                        let _ = failures.send(SaveFailure { block_id, source }).await;
                        if policy == FanoutPolicy::FailFast {
                            abort.cancel();
                        }
                    }
                }
            }));
        }
        drop(failure_tx);

        join_all(tasks).await;

        let mut collected = Vec::new();
        while let Some(failure) = failure_rx.recv().await {
            collected.push(failure);
        }

        if collected.is_empty() {
            Ok(())
        } else {
            Err(BatchSaveError::new(attempted, collected))
        }
    }
}
