use crate::model::ContentBlock;
use crate::storage::Storage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

/// Connection settings for the S3 backend. `endpoint` overrides the AWS
/// endpoint for S3-compatible stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

/// Object-store backend: `{partition}/{id}.json` keys in one bucket.
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> Self {
        let creds = Credentials::new(
            cfg.access_key_id.clone(),
            cfg.secret_access_key.clone(),
            None,
            None,
            "contentvault_static",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(creds);
        if let Some(endpoint) = &cfg.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        Self {
            client: Client::from_conf(aws_sdk_s3::Config::from(&shared)),
            bucket: cfg.bucket.clone(),
        }
    }
}

fn object_key(partition: &str, block_id: u64) -> String {
    format!("{}/{block_id}.json", partition.trim_matches('/'))
}

#[async_trait]
impl Storage for S3Storage {
    async fn save_blocks(&self, blocks: &[ContentBlock], partition: &str) -> Result<()> {
        for block in blocks {
            let data = serde_json::to_vec(block)
                .with_context(|| format!("failed to serialize content block {}", block.id))?;
            let key = object_key(partition, block.id);

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type("application/json")
                .body(ByteStream::from(Bytes::from(data)))
                .send()
                .await
                .with_context(|| format!("failed to upload content block {} as {key}", block.id))?;

            tracing::debug!(block_id = block.id, key = %key, "uploaded content block");
        }

        Ok(())
    }
}
