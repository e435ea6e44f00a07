//! HTTP client plumbing for the remote content platform: OAuth2 credential
//! acquisition, the paged content query endpoint, and the error taxonomy
//! shared by both.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{AuthClient, CredentialProvider};
pub use client::{ContentApiClient, ContentPageClient};
pub use error::ApiError;
