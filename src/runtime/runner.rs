use crate::orchestrator::{Orchestrator, RunSummary};
use crate::runtime::telemetry::Telemetry;
use crate::scheduler::CronExpr;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Drives backup cycles on a cron schedule and handles OS signals for
/// graceful shutdowns.
///
/// A failed cycle is logged and the runner keeps going: the watermark was not
/// advanced, so the next fire re-scans the same window.
pub struct Runner {
    orchestrator: Orchestrator,
    schedule: CronExpr,
    shutdown: CancellationToken,
    telemetry: Arc<Telemetry>,
}

impl Runner {
    /// Creates a new runner and wires a root [`CancellationToken`] that
    /// propagates into every backup cycle.
    pub fn new(orchestrator: Orchestrator, schedule: CronExpr) -> Self {
        Self::with_cancellation_token(orchestrator, schedule, CancellationToken::new())
    }

    pub fn with_cancellation_token(
        orchestrator: Orchestrator,
        schedule: CronExpr,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            schedule,
            shutdown,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Returns a clone of the root shutdown token so external callers can
    /// integrate with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Executes a single backup cycle immediately and records its outcome.
    pub async fn run_once(&self) -> Result<RunSummary> {
        tracing::info!("starting backup cycle");
        let result = self
            .orchestrator
            .execute_once(self.shutdown.child_token())
            .await;

        match &result {
            Ok(summary) => {
                self.telemetry.record_completed_run();
                tracing::info!(
                    fetched = summary.fetched,
                    partition = %summary.partition,
                    "backup cycle completed"
                );
            }
            Err(err) => {
                self.telemetry.record_failed_run();
                tracing::error!(error = ?err, "backup cycle failed");
            }
        }

        let snapshot = self.telemetry.snapshot();
        tracing::info!(
            fetched_blocks = snapshot.fetched_blocks,
            saved_blocks = snapshot.saved_blocks,
            api_errors = snapshot.api_errors,
            save_errors = snapshot.save_errors,
            completed_runs = snapshot.completed_runs,
            failed_runs = snapshot.failed_runs,
            "runtime telemetry snapshot"
        );

        result
    }

    /// Runs scheduled cycles until Ctrl-C (SIGINT) is received or the
    /// shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&self) -> Result<()> {
        tracing::info!(schedule = %self.schedule, "runner started");

        loop {
            let now = Utc::now();
            let next_fire = self.schedule.next_after(now)?;
            let wait = (next_fire - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next_run = %next_fire, "waiting for next scheduled backup");

            tokio::select! {
                _ = signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received; shutting down runner");
                    self.shutdown.cancel();
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("runner shutdown token cancelled");
                }
                _ = tokio::time::sleep(wait) => {
                    // Failures do not stop the schedule; the run is
                    // re-attempted at the next fire over the same window.
                    let _ = self.run_once().await;
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        tracing::info!("runner stopped");
        Ok(())
    }
}
