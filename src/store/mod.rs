//! Object Store Client capability.
//!
//! The gateway never owns object bytes; every durable operation goes through
//! an [`ObjectStoreClient`]. One client is built at startup and shared as an
//! `Arc<dyn ObjectStoreClient>` by every service.

pub mod memory;
pub mod s3;
#[cfg(test)]
pub(crate) mod scripted;

use crate::models::object::ObjectStat;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{io, pin::Pin, time::Duration};
use thiserror::Error;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Stream of object bytes flowing between the store and a client.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` does not exist")]
    NoSuchBucket(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NoSuchKey { bucket: String, key: String },
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("object store unreachable: {0}")]
    Unavailable(#[source] BoxError),
    #[error("object store error: {0}")]
    Backend(#[source] BoxError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn unavailable<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Unavailable(err.into())
    }

    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Backend(err.into())
    }

    pub fn no_such_key(bucket: &str, key: &str) -> Self {
        Self::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a successful `put_object`.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Operations the gateway needs from a bucket/key object store.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Create `bucket` in `region`. Stores may answer
    /// [`StoreError::BucketAlreadyExists`] when another caller won the race.
    async fn make_bucket(&self, bucket: &str, region: &str) -> StoreResult<()>;

    /// Write `size` bytes from `body` under `(bucket, key)`, overwriting any
    /// previous object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: u64,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome>;

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ByteStream>;

    /// Read `length` bytes starting at `offset`.
    async fn get_partial_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> StoreResult<ByteStream>;

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat>;

    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String>;

    async fn presigned_put_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String>;
}
