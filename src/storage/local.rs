use crate::model::ContentBlock;
use crate::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Filesystem backend: `{root}/{partition}/{id}.json`, pretty-printed so the
/// backups stay human-readable.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save_blocks(&self, blocks: &[ContentBlock], partition: &str) -> Result<()> {
        let partition_dir = self.root.join(partition);
        tokio::fs::create_dir_all(&partition_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create backup directory {}",
                    partition_dir.display()
                )
            })?;

        for block in blocks {
            let path = partition_dir.join(format!("{}.json", block.id));
            let data = serde_json::to_vec_pretty(block)
                .with_context(|| format!("failed to serialize content block {}", block.id))?;
            tokio::fs::write(&path, data)
                .await
                .with_context(|| format!("failed to write content block {} to file", block.id))?;
            tracing::debug!(block_id = block.id, path = %path.display(), "saved content block");
        }

        Ok(())
    }
}
