use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back
/// to `info`. Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Lightweight rolling counters collected across backup cycles.
#[derive(Default, Debug)]
pub struct Telemetry {
    fetched_blocks: AtomicU64,
    api_errors: AtomicU64,
    saved_blocks: AtomicU64,
    save_errors: AtomicU64,
    completed_runs: AtomicU64,
    failed_runs: AtomicU64,
}

impl Telemetry {
    pub fn record_fetched_blocks(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.fetched_blocks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_api_error(&self) {
        self.api_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_saved_blocks(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.saved_blocks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_save_error(&self) {
        self.save_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed_run(&self) {
        self.completed_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_run(&self) {
        self.failed_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            fetched_blocks: self.fetched_blocks.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
            saved_blocks: self.saved_blocks.load(Ordering::Relaxed),
            save_errors: self.save_errors.load(Ordering::Relaxed),
            completed_runs: self.completed_runs.load(Ordering::Relaxed),
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TelemetrySnapshot {
    pub fetched_blocks: u64,
    pub api_errors: u64,
    pub saved_blocks: u64,
    pub save_errors: u64,
    pub completed_runs: u64,
    pub failed_runs: u64,
}
