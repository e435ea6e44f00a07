use super::policy::FanoutPolicy;
use super::pool::{FetchError, PageFetcher};
use crate::api::client::ContentPageClient;
use crate::api::error::ApiError;
use crate::model::{ContentBlock, ContentPayload};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;

fn make_block(id: u64) -> ContentBlock {
    ContentBlock {
        id,
        name: format!("block-{id}"),
        modified_date: Utc.with_ymd_and_hms(2024, 11, 21, 12, 0, 0).unwrap(),
        content: ContentPayload::Text(format!("payload-{id}")),
    }
}

fn since() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 0, 0, 0).unwrap()
}

enum PageScript {
    Items(Vec<ContentBlock>),
    ItemsAfter(Duration, Vec<ContentBlock>),
    Fail,
}

/// Scripted page client: records which pages were requested and answers each
/// page according to its script. Unscripted pages are empty.
struct ScriptedClient {
    scripts: HashMap<u32, PageScript>,
    requested: Mutex<Vec<u32>>,
}

impl ScriptedClient {
    fn new(scripts: HashMap<u32, PageScript>) -> Self {
        Self {
            scripts,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

impl ContentPageClient for ScriptedClient {
    fn fetch_page<'a>(
        &'a self,
        _modified_since: DateTime<Utc>,
        page: u32,
        _page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ContentBlock>, ApiError>> {
        Box::pin(async move {
            self.requested.lock().unwrap().push(page);
            match self.scripts.get(&page) {
                Some(PageScript::Items(items)) => Ok(items.clone()),
                Some(PageScript::ItemsAfter(delay, items)) => {
                    sleep(*delay).await;
                    Ok(items.clone())
                }
                Some(PageScript::Fail) => Err(ApiError::Status {
                    endpoint: "query",
                    status: 500,
                    body: "internal error".into(),
                }),
                None => Ok(Vec::new()),
            }
        })
    }
}

#[tokio::test]
async fn items_come_back_sorted_by_id_regardless_of_completion_order() {
    // Page 1 is the slowest so its items arrive last at the aggregator.
    let client = Arc::new(ScriptedClient::new(HashMap::from([
        (
            1,
            PageScript::ItemsAfter(Duration::from_millis(60), vec![make_block(3)]),
        ),
        (
            2,
            PageScript::ItemsAfter(Duration::from_millis(20), vec![make_block(1)]),
        ),
        (3, PageScript::Items(vec![make_block(2)])),
    ])));
    let fetcher = PageFetcher::new(client.clone(), 3, 3, 50);

    let items = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect("fetch should succeed");

    let ids: Vec<u64> = items.iter().map(|block| block.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn returns_one_item_per_page_when_all_pages_succeed() {
    let scripts: HashMap<u32, PageScript> = (1..=6)
        .map(|page| {
            (
                page,
                PageScript::Items(vec![make_block(u64::from(page) * 10)]),
            )
        })
        .collect();
    let fetcher = PageFetcher::new(Arc::new(ScriptedClient::new(scripts)), 2, 6, 50);

    let items = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect("fetch should succeed");
    assert_eq!(items.len(), 6);
}

#[tokio::test]
async fn zero_items_is_an_empty_success() {
    let fetcher = PageFetcher::new(Arc::new(ScriptedClient::new(HashMap::new())), 4, 5, 50);

    let items = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect("empty collection is not an error");
    assert!(items.is_empty());
}

#[tokio::test]
async fn more_workers_than_pages_is_legal() {
    let client = Arc::new(ScriptedClient::new(HashMap::from([
        (1, PageScript::Items(vec![make_block(1)])),
        (2, PageScript::Items(vec![make_block(2)])),
    ])));
    let fetcher = PageFetcher::new(client, 8, 2, 50);

    let items = timeout(
        Duration::from_secs(2),
        fetcher.fetch_updated(since(), CancellationToken::new()),
    )
    .await
    .expect("idle workers must exit on channel closure")
    .expect("fetch should succeed");
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn first_page_error_cancels_the_remaining_fetch() {
    let mut scripts = HashMap::from([(1, PageScript::Fail)]);
    for page in 2..=30 {
        scripts.insert(
            page,
            PageScript::ItemsAfter(Duration::from_millis(50), vec![make_block(u64::from(page))]),
        );
    }
    let client = Arc::new(ScriptedClient::new(scripts));
    let fetcher = PageFetcher::new(client.clone(), 2, 30, 50);

    let err = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect_err("failing page must abort the fetch");

    match err {
        FetchError::Page { page, .. } => assert_eq!(page, 1),
        other => panic!("expected page error, got {other}"),
    }
    assert!(
        client.requested().len() < 30,
        "fail-fast should stop dispatch before the page cap, requested {:?}",
        client.requested()
    );
}

#[tokio::test]
async fn collect_all_still_attempts_every_page() {
    let client = Arc::new(ScriptedClient::new(HashMap::from([
        (1, PageScript::Items(vec![make_block(1)])),
        (2, PageScript::Fail),
        (3, PageScript::Items(vec![make_block(3)])),
        (4, PageScript::Items(vec![make_block(4)])),
    ])));
    let fetcher =
        PageFetcher::new(client.clone(), 2, 4, 50).with_policy(FanoutPolicy::CollectAll);

    let err = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect_err("a failed page still fails the fetch");
    assert!(matches!(err, FetchError::Page { page: 2, .. }));

    let mut requested = client.requested();
    requested.sort_unstable();
    assert_eq!(requested, vec![1, 2, 3, 4], "every page should be attempted");
}

#[tokio::test]
async fn cancelling_before_any_page_yields_a_cancellation_error() {
    let client = Arc::new(ScriptedClient::new(HashMap::from([(
        1,
        PageScript::Items(vec![make_block(1)]),
    )])));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let fetcher = PageFetcher::new(client.clone(), 3, 5, 50);
    let err = fetcher
        .fetch_updated(since(), cancel)
        .await
        .expect_err("cancelled fetch must not return a result");

    assert!(matches!(err, FetchError::Cancelled), "got {err}");
    assert!(
        client.requested().is_empty(),
        "no page should be fetched after cancellation"
    );
}

#[tokio::test]
async fn single_worker_drains_all_pages() {
    let scripts: HashMap<u32, PageScript> = (1..=4)
        .map(|page| (page, PageScript::Items(vec![make_block(u64::from(page))])))
        .collect();
    let fetcher = PageFetcher::new(Arc::new(ScriptedClient::new(scripts)), 1, 4, 50);

    let items = fetcher
        .fetch_updated(since(), CancellationToken::new())
        .await
        .expect("fetch should succeed");
    let ids: Vec<u64> = items.iter().map(|block| block.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
