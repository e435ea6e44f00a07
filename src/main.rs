use anyhow::{Context, Result};
use contentvault::{
    init_tracing, AuthClient, BackupConfig, ContentApiClient, CronExpr, FileWatermarkStore,
    LocalStorage, Orchestrator, PageFetcher, Persister, Runner, S3Storage, Storage, Telemetry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BackupConfig::from_env().context("failed to load configuration")?;
    let telemetry = Arc::new(Telemetry::default());

    let auth = Arc::new(
        AuthClient::new(
            config.token_url(),
            config.client_id(),
            config.client_secret(),
            config.request_timeout(),
        )
        .context("failed to build auth client")?,
    );
    let client = Arc::new(
        ContentApiClient::new(config.api_url(), auth, config.request_timeout())
            .context("failed to build content client")?,
    );

    let storage: Arc<dyn Storage> = match config.s3() {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, region = %s3.region, "using S3 storage backend");
            Arc::new(S3Storage::new(s3).await)
        }
        None => {
            tracing::info!(path = %config.storage_path(), "using local storage backend");
            Arc::new(LocalStorage::new(config.storage_path()))
        }
    };
    let watermark = Arc::new(FileWatermarkStore::new(config.watermark_path()));

    let fetcher = PageFetcher::new(
        client,
        config.worker_count(),
        config.max_pages(),
        config.page_size(),
    )
    .with_telemetry(telemetry.clone());
    let persister = Persister::new(storage).with_telemetry(telemetry.clone());
    let orchestrator = Orchestrator::new(fetcher, persister, watermark, config.lookback());

    let schedule = CronExpr::parse(config.schedule()).context("failed to parse backup schedule")?;
    let runner = Runner::new(orchestrator, schedule).with_telemetry(telemetry);

    runner.run_until_ctrl_c().await
}
