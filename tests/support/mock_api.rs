//! In-process mock of the content platform: an OAuth2 token endpoint plus the
//! paged asset query endpoint, backed by scripted pages.

use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct MockPlatform {
    inner: Arc<RwLock<PlatformState>>,
    token_requests: Arc<AtomicU64>,
    query_requests: Arc<AtomicU64>,
    token_lifetime_secs: Arc<AtomicU64>,
}

struct PlatformState {
    pages: HashMap<u32, Vec<Value>>,
    failing_pages: HashSet<u32>,
    issued_tokens: HashSet<String>,
    last_query_body: Option<Value>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PlatformState {
                pages: HashMap::new(),
                failing_pages: HashSet::new(),
                issued_tokens: HashSet::new(),
                last_query_body: None,
            })),
            token_requests: Arc::new(AtomicU64::new(0)),
            query_requests: Arc::new(AtomicU64::new(0)),
            token_lifetime_secs: Arc::new(AtomicU64::new(3600)),
        }
    }

    pub fn set_page(&self, page: u32, items: Vec<Value>) {
        self.inner
            .write()
            .expect("mock platform poisoned")
            .pages
            .insert(page, items);
    }

    pub fn fail_page(&self, page: u32) {
        self.inner
            .write()
            .expect("mock platform poisoned")
            .failing_pages
            .insert(page);
    }

    /// Tokens minted after this call carry the given lifetime; zero makes
    /// every token immediately expired from the client's point of view.
    pub fn set_token_lifetime_secs(&self, secs: u64) {
        self.token_lifetime_secs.store(secs, Ordering::SeqCst);
    }

    pub fn token_requests(&self) -> u64 {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn query_requests(&self) -> u64 {
        self.query_requests.load(Ordering::SeqCst)
    }

    pub fn last_query_body(&self) -> Option<Value> {
        self.inner
            .read()
            .expect("mock platform poisoned")
            .last_query_body
            .clone()
    }

    fn mint_token(&self) -> (String, u64) {
        let serial = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("mock-token-{serial}");
        self.inner
            .write()
            .expect("mock platform poisoned")
            .issued_tokens
            .insert(token.clone());
        (token, self.token_lifetime_secs.load(Ordering::SeqCst))
    }

    fn is_known_token(&self, token: &str) -> bool {
        self.inner
            .read()
            .expect("mock platform poisoned")
            .issued_tokens
            .contains(token)
    }

    fn answer_query(&self, body: Value) -> Result<Vec<Value>, ()> {
        self.query_requests.fetch_add(1, Ordering::SeqCst);
        let page = body
            .pointer("/page/page")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        let mut state = self.inner.write().expect("mock platform poisoned");
        state.last_query_body = Some(body);
        if state.failing_pages.contains(&page) {
            return Err(());
        }
        Ok(state.pages.get(&page).cloned().unwrap_or_default())
    }
}

pub struct MockApiServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockApiServer {
    pub async fn start(platform: MockPlatform) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock API listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let platform = platform.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    serve_request(platform.clone(), req)
                }))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock API server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Base URL; endpoints live at `/v2/token` and
    /// `/asset/v1/content/assets/query`.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    platform: MockPlatform,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST {
        return Ok(status_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"error": "unsupported method"}),
        ));
    }

    let path = req.uri().path().to_string();
    let bearer = bearer_token(&req);
    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Ok(status_response(
                StatusCode::BAD_REQUEST,
                json!({"error": format!("failed to read body: {err}")}),
            ));
        }
    };

    match path.as_str() {
        "/v2/token" => {
            let (token, expires_in) = platform.mint_token();
            Ok(status_response(
                StatusCode::OK,
                json!({"access_token": token, "expires_in": expires_in}),
            ))
        }
        "/asset/v1/content/assets/query" => {
            match bearer {
                Some(token) if platform.is_known_token(&token) => {}
                _ => {
                    return Ok(status_response(
                        StatusCode::UNAUTHORIZED,
                        json!({"error": "invalid or missing bearer token"}),
                    ));
                }
            }

            let payload: Value = match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(err) => {
                    return Ok(status_response(
                        StatusCode::BAD_REQUEST,
                        json!({"error": format!("invalid JSON payload: {err}")}),
                    ));
                }
            };

            match platform.answer_query(payload) {
                Ok(items) => Ok(status_response(StatusCode::OK, json!({"items": items}))),
                Err(()) => Ok(status_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "scripted page failure"}),
                )),
            }
        }
        _ => Ok(status_response(
            StatusCode::NOT_FOUND,
            json!({"error": format!("unknown path {path}")}),
        )),
    }
}

fn bearer_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

fn status_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}
