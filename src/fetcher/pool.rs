use crate::api::client::ContentPageClient;
use crate::api::error::ApiError;
use crate::fetcher::policy::FanoutPolicy;
use crate::model::ContentBlock;
use crate::runtime::telemetry::Telemetry;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum FetchError {
    /// The caller's token was cancelled before the fetch completed, with no
    /// worker having failed first.
    Cancelled,
    /// A page request failed; under fail-fast this aborted the whole fetch.
    Page { page: u32, source: ApiError },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Cancelled => write!(f, "content fetch cancelled before completion"),
            FetchError::Page { page, source } => {
                write!(f, "failed to fetch content page {page}: {source}")
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Cancelled => None,
            FetchError::Page { source, .. } => Some(source),
        }
    }
}

/// Paginates the remote collection with a bounded worker pool.
///
/// Pages are dispatched in increasing order but fetched concurrently; which
/// worker lands which page is unspecified. The returned items carry exactly
/// one ordering guarantee: ascending block id.
pub struct PageFetcher {
    client: Arc<dyn ContentPageClient>,
    worker_count: usize,
    max_pages: u32,
    page_size: u32,
    policy: FanoutPolicy,
    telemetry: Arc<Telemetry>,
}

impl PageFetcher {
    pub fn new(
        client: Arc<dyn ContentPageClient>,
        worker_count: usize,
        max_pages: u32,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            worker_count: worker_count.max(1),
            max_pages,
            page_size,
            policy: FanoutPolicy::FailFast,
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

    /// Fetches every block modified after `modified_since`, scanning at most
    /// `max_pages` pages. The page cap is a fixed policy bound, not a has-more
    /// protocol: callers that need deeper scans raise the cap.
    ///
    /// Returns all items sorted ascending by id, or the first error observed.
    /// No partial result set is ever returned.
    pub async fn fetch_updated(
        &self,
        modified_since: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<Vec<ContentBlock>, FetchError> {
        let run_token = cancel.child_token();

        let (job_tx, job_rx) = mpsc::channel::<u32>(self.worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) =
            mpsc::channel::<Vec<ContentBlock>>(self.worker_count);
        let (error_tx, mut error_rx) = mpsc::channel::<FetchError>(self.worker_count);

        // Dispatcher: pages go out in increasing order until the cap or
        // cancellation. Dropping the sender closes the channel so idle
        // workers exit.
        let dispatcher = {
            let token = run_token.clone();
            let max_pages = self.max_pages;
            tokio::spawn(async move {
                for page in 1..=max_pages {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        sent = job_tx.send(page) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let mut workers = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let jobs = Arc::clone(&job_rx);
            let client = Arc::clone(&self.client);
            let results = result_tx.clone();
            let errors = error_tx.clone();
            let token = run_token.clone();
            let telemetry = Arc::clone(&self.telemetry);
            let policy = self.policy;
            let page_size = self.page_size;

            workers.push(tokio::spawn(async move {
                loop {
                    // Cancellation is only observed between pages: a remote
                    // call already issued runs to completion or its own
                    // deadline.
                    let page = {
                        let mut rx = jobs.lock().await;
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            page = rx.recv() => match page {
                                Some(page) => page,
                                None => break,
                            },
                        }
                    };

                    tracing::debug!(worker = worker_id, page, "fetching content page");
                    match client.fetch_page(modified_since, page, page_size).await {
                        Ok(items) => {
                            telemetry.record_fetched_blocks(items.len() as u64);
                            if results.send(items).await.is_err() {
                                break;
                            }
                        }
                        Err(source) => {
                            telemetry.record_api_error();
                            tracing::error!(
                                worker = worker_id,
                                page,
                                error = %source,
                                "content page fetch failed"
                            );
                            let _ = errors.send(FetchError::Page { page, source }).await;
                            if policy == FanoutPolicy::FailFast {
                                token.cancel();
                                break;
                            }
                        }
                    }
                }
            }));
        }
        drop(result_tx);
        drop(error_tx);

        // Aggregator: drain both channels until every worker clone is
        // dropped, keeping only the first error.
        let mut items: Vec<ContentBlock> = Vec::new();
        let mut first_error: Option<FetchError> = None;
        let mut results_open = true;
        let mut errors_open = true;
        while results_open || errors_open {
            tokio::select! {
                batch = result_rx.recv(), if results_open => match batch {
                    Some(mut batch) => items.append(&mut batch),
                    None => results_open = false,
                },
                failure = error_rx.recv(), if errors_open => match failure {
                    Some(failure) => {
                        if first_error.is_none() {
                            first_error = Some(failure);
                        }
                    }
                    None => errors_open = false,
                },
            }
        }

        for worker in workers {
            let _ = worker.await;
        }
        let _ = dispatcher.await;

        if let Some(error) = first_error {
            return Err(error);
        }
        if run_token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        items.sort_by_key(|block| block.id);
        Ok(items)
    }
}
