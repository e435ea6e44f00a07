//! Storage backends. A backend persists a set of blocks as one unit under a
//! partition label; the fan-out stage calls it once per single-block set.

pub mod local;
pub mod s3;

use crate::model::ContentBlock;
use anyhow::Result;
use async_trait::async_trait;

pub use local::LocalStorage;
pub use s3::{S3Config, S3Storage};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists `blocks` under `partition`, one `{id}.json` artifact each.
    /// Must be safe for concurrent use; the persister issues overlapping
    /// calls.
    async fn save_blocks(&self, blocks: &[ContentBlock], partition: &str) -> Result<()>;
}
