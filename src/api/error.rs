use std::fmt;

/// Failures surfaced by the auth and content endpoints.
///
/// Transport and decode failures are treated identically by the fetch stage:
/// both abort the whole fetch rather than producing a partial result set.
#[derive(Debug)]
pub enum ApiError {
    /// The endpoint could not be reached or the request did not complete.
    Transport {
        endpoint: &'static str,
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status.
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    /// The response body was not the expected JSON shape.
    Decode {
        endpoint: &'static str,
        source: serde_json::Error,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport { endpoint, source } => {
                write!(f, "request to {endpoint} endpoint failed: {source}")
            }
            ApiError::Status {
                endpoint,
                status,
                body,
            } => {
                write!(
                    f,
                    "{endpoint} endpoint returned status {status}: {}",
                    truncated(body)
                )
            }
            ApiError::Decode { endpoint, source } => {
                write!(f, "failed to decode {endpoint} response: {source}")
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport { source, .. } => Some(source),
            ApiError::Status { .. } => None,
            ApiError::Decode { source, .. } => Some(source),
        }
    }
}

const MAX_BODY_SNIPPET: usize = 512;

// Error bodies can echo entire payloads; keep log lines bounded.
fn truncated(body: &str) -> &str {
    let end = body
        .char_indices()
        .take_while(|(idx, _)| *idx < MAX_BODY_SNIPPET)
        .map(|(idx, ch)| idx + ch.len_utf8())
        .last()
        .unwrap_or(0);
    &body[..end]
}
