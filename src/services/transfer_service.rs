//! Whole-object transfers between clients and the store.

use crate::{
    errors::{GatewayError, GatewayResult},
    models::{grant::TransferResult, object::ObjectStat},
    services::{
        naming::{ensure_key_safe, normalize_bucket_name},
        staging::StagingFile,
    },
    store::{ByteStream, ObjectStoreClient, StoreError},
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn ObjectStoreClient>,

    /// Base URL clients use to reach stored objects directly.
    public_url: String,
}

impl TransferService {
    pub fn new(store: Arc<dyn ObjectStoreClient>, public_url: impl Into<String>) -> Self {
        Self {
            store,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_url, bucket, key)
    }

    /// Stream a staged upload into the store under `(bucket, key)`.
    ///
    /// The staging file is released whether or not the upload succeeds.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        staged: StagingFile,
        content_type: Option<&str>,
    ) -> GatewayResult<TransferResult> {
        let result = match staged.open_stream().await {
            Ok(body) => {
                self.put(bucket, key, body, staged.size(), content_type)
                    .await
            }
            Err(err) => Err(err.into()),
        };
        staged.release().await;
        result
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: u64,
        content_type: Option<&str>,
    ) -> GatewayResult<TransferResult> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;

        let outcome = self
            .store
            .put_object(&bucket, key, body, size, content_type)
            .await?;
        info!(
            "uploaded {}/{} ({} bytes, etag {:?})",
            bucket, key, outcome.size_bytes, outcome.etag
        );

        Ok(TransferResult {
            url: self.object_url(&bucket, key),
            file_key: key.to_string(),
        })
    }

    /// Remove an object. Whether deleting an absent key is an error is up to
    /// the store: a reported not-found surfaces as `ObjectNotFound`.
    pub async fn delete(&self, bucket: &str, key: &str) -> GatewayResult<()> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;
        self.store.remove_object(&bucket, key).await?;
        info!("deleted {}/{}", bucket, key);
        Ok(())
    }

    /// Metadata probe. Not-found answers become `false`.
    pub async fn exists(&self, bucket: &str, key: &str) -> GatewayResult<bool> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;
        match self.store.stat_object(&bucket, key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NoSuchKey { .. }) | Err(StoreError::NoSuchBucket(_)) => {
                debug!("{}/{} does not exist", bucket, key);
                Ok(false)
            }
            Err(err @ StoreError::Unavailable(_)) => Err(GatewayError::StoreUnavailable(err)),
            Err(err) => Err(GatewayError::TransferFailure(err)),
        }
    }

    pub async fn stat(&self, bucket: &str, key: &str) -> GatewayResult<ObjectStat> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;
        Ok(self.store.stat_object(&bucket, key).await?)
    }

    /// Whole-object read.
    pub async fn open(&self, bucket: &str, key: &str) -> GatewayResult<ByteStream> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;
        Ok(self.store.get_object(&bucket, key).await?)
    }
}
