//! Bucket lifecycle: existence checks and idempotent creation.

use crate::{
    errors::GatewayResult,
    services::naming::normalize_bucket_name,
    store::{ObjectStoreClient, StoreError},
};
use std::sync::Arc;
use tracing::{debug, info};

/// What `ensure_bucket` found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Created,
    AlreadyExisted,
}

#[derive(Clone)]
pub struct BucketService {
    store: Arc<dyn ObjectStoreClient>,
    region: String,
}

impl BucketService {
    pub fn new(store: Arc<dyn ObjectStoreClient>, region: impl Into<String>) -> Self {
        Self {
            store,
            region: region.into(),
        }
    }

    pub async fn bucket_exists(&self, name: &str) -> GatewayResult<bool> {
        let bucket = normalize_bucket_name(name)?;
        Ok(self.store.bucket_exists(&bucket).await?)
    }

    /// Make sure `name` exists, creating it in the default region if needed.
    ///
    /// Losing a creation race to a concurrent caller is not an error.
    pub async fn ensure_bucket(&self, name: &str) -> GatewayResult<BucketStatus> {
        let bucket = normalize_bucket_name(name)?;
        if self.store.bucket_exists(&bucket).await? {
            debug!("bucket {} already exists", bucket);
            return Ok(BucketStatus::AlreadyExisted);
        }

        match self.store.make_bucket(&bucket, &self.region).await {
            Ok(()) => {
                info!("created bucket {} in {}", bucket, self.region);
                Ok(BucketStatus::Created)
            }
            Err(StoreError::BucketAlreadyExists(_)) => {
                debug!("bucket {} was created concurrently", bucket);
                Ok(BucketStatus::AlreadyExisted)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::GatewayError,
        store::{MemoryObjectStore, scripted::ScriptedStore},
    };

    #[tokio::test]
    async fn losing_the_creation_race_is_not_an_error() {
        let mut store = ScriptedStore::new();
        store.bucket_exists = || Ok(false);
        store.make_bucket = || Err(StoreError::BucketAlreadyExists("videos".into()));

        let buckets = BucketService::new(Arc::new(store), "us-east-1");
        assert_eq!(
            buckets.ensure_bucket("videos").await.unwrap(),
            BucketStatus::AlreadyExisted
        );
    }

    #[tokio::test]
    async fn creation_failures_surface() {
        let mut store = ScriptedStore::new();
        store.bucket_exists = || Ok(false);
        store.make_bucket = || Err(StoreError::unavailable("connection refused"));

        let buckets = BucketService::new(Arc::new(store), "us-east-1");
        assert!(matches!(
            buckets.ensure_bucket("videos").await,
            Err(GatewayError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn ensure_bucket_creates_once() {
        let store = MemoryObjectStore::new("http://minio.test:9000");
        let buckets = BucketService::new(Arc::new(store.clone()), "us-east-1");

        assert_eq!(
            buckets.ensure_bucket("Videos").await.unwrap(),
            BucketStatus::Created
        );
        assert_eq!(
            buckets.ensure_bucket("videos").await.unwrap(),
            BucketStatus::AlreadyExisted
        );
        assert!(buckets.bucket_exists("videos").await.unwrap());
        assert_eq!(store.object_count("videos").await, Some(0));
    }
}
