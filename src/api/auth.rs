//! OAuth2 client-credentials flow against the platform token endpoint. The
//! rest of the pipeline only ever sees the resulting [`AccessToken`]; the wire
//! format of the token response never leaves this module.

use crate::api::error::ApiError;
use crate::model::AccessToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capability to mint a fresh bearer credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<AccessToken, ApiError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize, Default)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

pub struct AuthClient {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl AuthClient {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "token",
                source,
            })?;
        Ok(Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
        })
    }

    async fn request_token(&self) -> Result<AccessToken, ApiError> {
        let payload = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };

        let response = self
            .http
            .post(&self.token_url)
            .json(&payload)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: "token",
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: "token",
                source,
            })?;

        if !status.is_success() {
            // The auth endpoint reports failures as a structured body; fold it
            // into the status error so operators see the description.
            let detail: TokenErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let body = if detail.error.is_empty() {
                body
            } else {
                format!("{} - {}", detail.error, detail.error_description)
            };
            return Err(ApiError::Status {
                endpoint: "token",
                status: status.as_u16(),
                body,
            });
        }

        let decoded: TokenResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                endpoint: "token",
                source,
            })?;

        tracing::debug!(expires_in = decoded.expires_in, "acquired access token");
        Ok(AccessToken::new(decoded.access_token, decoded.expires_in))
    }
}

#[async_trait]
impl CredentialProvider for AuthClient {
    async fn acquire(&self) -> Result<AccessToken, ApiError> {
        self.request_token().await
    }
}
