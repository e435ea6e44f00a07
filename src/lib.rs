pub mod api;
pub mod fetcher;
pub mod model;
pub mod orchestrator;
pub mod persister;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod watermark;

pub use api::auth::{AuthClient, CredentialProvider};
pub use api::client::{ContentApiClient, ContentPageClient};
pub use api::error::ApiError;
pub use fetcher::{FanoutPolicy, FetchError, PageFetcher};
pub use model::{AccessToken, ContentBlock, ContentPayload};
pub use orchestrator::{Orchestrator, RunSummary};
pub use persister::{BatchSaveError, Persister, SaveFailure};
pub use runtime::config::{BackupConfig, BackupConfigBuilder};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use scheduler::CronExpr;
pub use storage::{LocalStorage, S3Config, S3Storage, Storage};
pub use watermark::{FileWatermarkStore, WatermarkStore};
