//! Content query client. Houses the `ContentPageClient` trait consumed by the
//! fetch workers and the `ContentApiClient` implementation that speaks to the
//! platform's paged asset query endpoint with a bearer credential.

use crate::api::auth::CredentialProvider;
use crate::api::error::ApiError;
use crate::model::{AccessToken, ContentBlock};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Fields requested from the query endpoint; everything the pipeline persists.
const PROJECTED_FIELDS: [&str; 4] = ["id", "name", "modifiedDate", "content"];

/// One page fetch against the remote collection. Workers hold this as a trait
/// object so tests can substitute a scripted client.
pub trait ContentPageClient: Send + Sync {
    fn fetch_page<'a>(
        &'a self,
        modified_since: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ContentBlock>, ApiError>>;
}

#[derive(Serialize)]
struct AssetQuery<'a> {
    query: PropertyFilter<'a>,
    page: PageRequest,
    fields: &'a [&'a str],
}

#[derive(Serialize)]
struct PropertyFilter<'a> {
    property: &'a str,
    #[serde(rename = "simpleOperator")]
    simple_operator: &'a str,
    value: String,
}

#[derive(Serialize)]
struct PageRequest {
    page: u32,
    #[serde(rename = "pageSize")]
    page_size: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    items: Vec<ContentBlock>,
}

pub struct ContentApiClient {
    query_url: String,
    http: reqwest::Client,
    auth: Arc<dyn CredentialProvider>,
    // Shared by all pagination workers; refreshed in place when expired.
    token: RwLock<Option<AccessToken>>,
}

impl ContentApiClient {
    pub fn new(
        api_url: impl Into<String>,
        auth: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "query",
                source,
            })?;
        Ok(Self {
            query_url: format!("{}/query", api_url.into().trim_end_matches('/')),
            http,
            auth,
            token: RwLock::new(None),
        })
    }

    /// Returns a live token, refreshing through the credential provider when
    /// the cached one is missing or expired. Double-checked under the write
    /// lock so concurrent workers trigger at most one refresh; a request
    /// already in flight with the old token runs to completion.
    pub async fn ensure_token_valid(&self) -> Result<AccessToken, ApiError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.is_expired() {
                    return Ok(token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
        }

        tracing::info!("access token missing or expired; requesting a new one");
        let fresh = self.auth.acquire().await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    async fn query_page(
        &self,
        modified_since: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ContentBlock>, ApiError> {
        let token = self.ensure_token_valid().await?;
        let body = AssetQuery {
            query: PropertyFilter {
                property: "modifiedDate",
                simple_operator: "greaterThan",
                value: modified_since.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            page: PageRequest { page, page_size },
            fields: &PROJECTED_FIELDS,
        };

        let response = self
            .http
            .post(&self.query_url)
            .bearer_auth(token.secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: "query",
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: "query",
                source,
            })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: "query",
                status: status.as_u16(),
                body,
            });
        }

        let decoded: QueryResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                endpoint: "query",
                source,
            })?;

        Ok(decoded.items)
    }
}

impl ContentPageClient for ContentApiClient {
    fn fetch_page<'a>(
        &'a self,
        modified_since: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ContentBlock>, ApiError>> {
        Box::pin(self.query_page(modified_since, page, page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn asset_query_serializes_to_wire_shape() {
        let since = Utc.with_ymd_and_hms(2024, 11, 20, 0, 0, 0).unwrap();
        let query = AssetQuery {
            query: PropertyFilter {
                property: "modifiedDate",
                simple_operator: "greaterThan",
                value: since.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            page: PageRequest {
                page: 3,
                page_size: 50,
            },
            fields: &PROJECTED_FIELDS,
        };

        let encoded = serde_json::to_value(&query).expect("query should encode");
        assert_eq!(encoded["query"]["property"], "modifiedDate");
        assert_eq!(encoded["query"]["simpleOperator"], "greaterThan");
        assert_eq!(encoded["query"]["value"], "2024-11-20T00:00:00Z");
        assert_eq!(encoded["page"]["page"], 3);
        assert_eq!(encoded["page"]["pageSize"], 50);
        assert_eq!(encoded["fields"][2], "modifiedDate");
    }

    #[test]
    fn query_url_normalizes_trailing_slash() {
        struct NoAuth;
        #[async_trait::async_trait]
        impl CredentialProvider for NoAuth {
            async fn acquire(&self) -> Result<AccessToken, ApiError> {
                Ok(AccessToken::new("unused", 3600))
            }
        }

        let client = ContentApiClient::new(
            "https://api.example.com/asset/v1/content/assets/",
            Arc::new(NoAuth),
            Duration::from_secs(5),
        )
        .expect("client should build");
        assert_eq!(
            client.query_url,
            "https://api.example.com/asset/v1/content/assets/query"
        );
    }
}
