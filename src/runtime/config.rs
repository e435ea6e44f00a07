use crate::scheduler::CronExpr;
use crate::storage::S3Config;
use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

const DEFAULT_WORKER_COUNT: usize = 4;
const DEFAULT_MAX_PAGES: u32 = 5;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_SCHEDULE: &str = "0 0 * * *";
const DEFAULT_WATERMARK_FILE: &str = "lastrun.txt";
const DEFAULT_LOOKBACK_HOURS: u64 = 24;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Runtime configuration for the backup pipeline.
///
/// All instances must be constructed via [`BackupConfig::builder`] or
/// [`BackupConfig::from_env`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    token_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    worker_count: usize,
    max_pages: u32,
    page_size: u32,
    schedule: String,
    watermark_path: String,
    storage_path: String,
    s3: Option<S3Config>,
    lookback: Duration,
    request_timeout: Duration,
}

impl BackupConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> BackupConfigBuilder {
        BackupConfigBuilder::default()
    }

    /// Loads the configuration from environment variables, deriving the full
    /// token and query endpoints from the configured base URLs.
    ///
    /// The S3 backend is selected whenever `S3_BUCKET` is set; otherwise the
    /// local filesystem backend under `STORAGE_PATH` is used.
    pub fn from_env() -> Result<Self> {
        let auth_base = require_env("AUTH_URL")?;
        let api_base = require_env("API_URL")?;

        let mut builder = Self::builder()
            .token_url(format!("{}/v2/token", auth_base.trim_end_matches('/')))
            .api_url(format!(
                "{}/asset/v1/content/assets",
                api_base.trim_end_matches('/')
            ))
            .client_id(require_env("CLIENT_ID")?)
            .client_secret(require_env("CLIENT_SECRET")?);

        if let Some(path) = optional_env("STORAGE_PATH") {
            builder = builder.storage_path(path);
        }
        if let Some(bucket) = optional_env("S3_BUCKET") {
            builder = builder.s3(S3Config {
                region: optional_env("S3_REGION").unwrap_or_default(),
                bucket,
                access_key_id: optional_env("S3_ACCESS_KEY").unwrap_or_default(),
                secret_access_key: optional_env("S3_SECRET_KEY").unwrap_or_default(),
                endpoint: optional_env("S3_ENDPOINT"),
            });
        }
        if let Some(schedule) = optional_env("BACKUP_SCHEDULE") {
            builder = builder.schedule(schedule);
        }
        if let Some(path) = optional_env("WATERMARK_FILE") {
            builder = builder.watermark_path(path);
        }
        if let Some(workers) = parse_env::<usize>("BACKUP_WORKERS")? {
            builder = builder.worker_count(workers);
        }
        if let Some(pages) = parse_env::<u32>("BACKUP_MAX_PAGES")? {
            builder = builder.max_pages(pages);
        }
        if let Some(size) = parse_env::<u32>("BACKUP_PAGE_SIZE")? {
            builder = builder.page_size(size);
        }
        if let Some(hours) = parse_env::<u64>("BACKUP_LOOKBACK_HOURS")? {
            builder = builder.lookback(Duration::from_secs(hours.saturating_mul(3600)));
        }
        if let Some(secs) = parse_env::<u64>("HTTP_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Full token endpoint URL (including scheme).
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Full content asset collection URL; the client appends `/query`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Number of concurrent pagination workers.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fixed upper bound on pages scanned per run.
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Cron expression driving the runner.
    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn watermark_path(&self) -> &str {
        &self.watermark_path
    }

    /// Root directory for the local storage backend.
    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    /// Object-store settings; `Some` selects the S3 backend.
    pub fn s3(&self) -> Option<&S3Config> {
        self.s3.as_ref()
    }

    /// Window substituted when no watermark can be read.
    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Per-request HTTP timeout for the auth and query endpoints.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.token_url, "token_url")?;
        validate_url(&self.api_url, "api_url")?;
        ensure_not_empty(&self.client_id, "client_id")?;
        ensure_not_empty(&self.client_secret, "client_secret")?;
        ensure_not_empty(&self.watermark_path, "watermark_path")?;

        if self.worker_count == 0 {
            bail!("worker_count must be greater than 0");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be greater than 0");
        }
        if self.page_size == 0 {
            bail!("page_size must be greater than 0");
        }
        if self.lookback.is_zero() {
            bail!("lookback must be greater than 0");
        }
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }

        CronExpr::parse(&self.schedule).context("invalid backup schedule")?;

        match &self.s3 {
            Some(s3) => {
                ensure_not_empty(&s3.bucket, "s3 bucket")?;
                ensure_not_empty(&s3.region, "s3 region")?;
                ensure_not_empty(&s3.access_key_id, "s3 access key")?;
                ensure_not_empty(&s3.secret_access_key, "s3 secret key")?;
            }
            None => ensure_not_empty(&self.storage_path, "storage_path")?,
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct BackupConfigBuilder {
    token_url: Option<String>,
    api_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    worker_count: Option<usize>,
    max_pages: Option<u32>,
    page_size: Option<u32>,
    schedule: Option<String>,
    watermark_path: Option<String>,
    storage_path: Option<String>,
    s3: Option<S3Config>,
    lookback: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl BackupConfigBuilder {
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = Some(pages);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn schedule(mut self, expr: impl Into<String>) -> Self {
        self.schedule = Some(expr.into());
        self
    }

    pub fn watermark_path(mut self, path: impl Into<String>) -> Self {
        self.watermark_path = Some(path.into());
        self
    }

    pub fn storage_path(mut self, path: impl Into<String>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn s3(mut self, s3: S3Config) -> Self {
        self.s3 = Some(s3);
        self
    }

    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<BackupConfig> {
        let config = BackupConfig {
            token_url: trimmed(self.token_url.context("token_url is required")?),
            api_url: trimmed(self.api_url.context("api_url is required")?),
            client_id: trimmed(self.client_id.context("client_id is required")?),
            client_secret: trimmed(self.client_secret.context("client_secret is required")?),
            worker_count: self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
            max_pages: self.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            schedule: self.schedule.unwrap_or_else(|| DEFAULT_SCHEDULE.to_owned()),
            watermark_path: self
                .watermark_path
                .unwrap_or_else(|| DEFAULT_WATERMARK_FILE.to_owned()),
            storage_path: self.storage_path.unwrap_or_default(),
            s3: self.s3,
            lookback: self
                .lookback
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_LOOKBACK_HOURS * 3600)),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
        };

        config.validate()?;
        Ok(config)
    }
}

fn trimmed(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}

fn require_env(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{name} is required"))?;
    if value.trim().is_empty() {
        bail!("{name} is required");
    }
    Ok(value)
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(name) {
        Some(raw) => {
            let parsed = raw
                .parse::<T>()
                .with_context(|| format!("{name} is not a valid number: {raw:?}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
