//! Domain types shared across the pipeline: content blocks as returned by the
//! remote API and the bearer credential used to reach it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single content record from the remote content API.
///
/// The `id` is stable and doubles as the persistence key: each block is stored
/// as `{id}.json` inside its run partition. Blocks are read-only to this
/// system and never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: u64,
    pub name: String,
    #[serde(rename = "modifiedDate")]
    pub modified_date: DateTime<Utc>,
    pub content: ContentPayload,
}

/// Closed set of payload shapes the API can return for a block.
///
/// Deserialization is untagged: an object carrying a `url` key is a binary
/// reference, a bare string is inline text, anything else is kept as
/// structured JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPayload {
    BinaryRef { url: String },
    Text(String),
    Json(serde_json::Value),
}

/// Bearer credential issued by the auth endpoint.
#[derive(Debug, Clone)]
pub struct AccessToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Tokens are treated as expired slightly before their wire expiry so a
/// request issued right at the boundary still carries a live credential.
const EXPIRY_SKEW_SECS: i64 = 30;

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expires_in_secs: u64) -> Self {
        Self::with_expiry(
            access_token,
            Utc::now() + Duration::seconds(expires_in_secs.min(i64::MAX as u64) as i64),
        )
    }

    pub fn with_expiry(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }
}
