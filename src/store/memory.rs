//! In-process object store.
//!
//! Keeps buckets and objects in memory behind a `RwLock`. Used by the test
//! suite and by `--store memory` for running the gateway without an S3
//! endpoint. Semantics follow S3 where the gateway depends on them: removing
//! an absent key succeeds, creating an existing bucket reports
//! `BucketAlreadyExists`, overwrites are last-write-wins.

use super::{ByteStream, ObjectStoreClient, PutOutcome, StoreError, StoreResult};
use crate::models::object::ObjectStat;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, HashMap},
    io,
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Clone)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, BTreeMap<String, StoredBlob>>>>,

    /// Base URL embedded in presigned URLs.
    endpoint: String,
}

impl MemoryObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Number of objects currently held in `bucket`, if it exists.
    pub async fn object_count(&self, bucket: &str) -> Option<usize> {
        self.buckets.read().await.get(bucket).map(BTreeMap::len)
    }

    async fn blob(&self, bucket: &str, key: &str) -> StoreResult<StoredBlob> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::no_such_key(bucket, key))
    }

    fn presign(&self, method: &str, bucket: &str, key: &str, ttl: Duration) -> String {
        format!(
            "{}/{}/{}?X-Amz-Date={}&X-Amz-Expires={}&X-Amz-Method={}&X-Amz-Signature={}",
            self.endpoint,
            bucket,
            key,
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            ttl.as_secs(),
            method,
            uuid::Uuid::new_v4().simple()
        )
    }
}

/// Split `data` into cheap, reference-counted chunks.
fn chunked(data: Bytes) -> ByteStream {
    let mut chunks = Vec::with_capacity(data.len() / CHUNK_SIZE + 1);
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + CHUNK_SIZE).min(data.len());
        chunks.push(Ok(data.slice(offset..end)));
        offset = end;
    }
    Box::pin(stream::iter(chunks))
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str, region: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StoreError::BucketAlreadyExists(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        debug!("memory store created bucket {} in {}", bucket, region);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        size: u64,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::NoSuchBucket(bucket.to_string()));
        }

        let mut buf = BytesMut::with_capacity(size as usize);
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        if buf.len() as u64 != size {
            return Err(StoreError::backend(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("declared size {} but received {} bytes", size, buf.len()),
            )));
        }

        let data = buf.freeze();
        let etag = format!("{:x}", md5::compute(&data));
        let blob = StoredBlob {
            data,
            content_type: content_type.map(str::to_string),
            last_modified: Utc::now(),
            etag: etag.clone(),
        };

        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects.insert(key.to_string(), blob);

        Ok(PutOutcome {
            etag: Some(etag),
            size_bytes: size,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ByteStream> {
        let blob = self.blob(bucket, key).await?;
        Ok(chunked(blob.data))
    }

    async fn get_partial_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> StoreResult<ByteStream> {
        let blob = self.blob(bucket, key).await?;
        let total = blob.data.len() as u64;
        if offset >= total || length == 0 {
            return Err(StoreError::backend(format!(
                "range {}+{} not satisfiable for {} bytes",
                offset, length, total
            )));
        }
        let end = offset.saturating_add(length).min(total);
        Ok(chunked(blob.data.slice(offset as usize..end as usize)))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let blob = self.blob(bucket, key).await?;
        Ok(ObjectStat {
            size: blob.data.len() as u64,
            content_type: blob.content_type,
            last_modified: Some(blob.last_modified),
            etag: Some(blob.etag),
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        if objects.remove(key).is_none() {
            debug!("memory store: {}/{} already absent", bucket, key);
        }
        Ok(())
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String> {
        Ok(self.presign("GET", bucket, key, ttl))
    }

    async fn presigned_put_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String> {
        Ok(self.presign("PUT", bucket, key, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(data: &'static [u8]) -> ByteStream {
        Box::pin(stream::iter(vec![Ok(Bytes::from_static(data))]))
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let store = MemoryObjectStore::new("http://store");
        let err = store
            .put_object("nope", "a.txt", body(b"abc"), 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchBucket(_)));
    }

    #[tokio::test]
    async fn put_rejects_size_mismatch() {
        let store = MemoryObjectStore::new("http://store");
        store.make_bucket("media", "us-east-1").await.unwrap();
        let err = store
            .put_object("media", "a.txt", body(b"abc"), 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.object_count("media").await, Some(0));
    }

    #[tokio::test]
    async fn partial_read_returns_window() {
        let store = MemoryObjectStore::new("http://store");
        store.make_bucket("media", "us-east-1").await.unwrap();
        store
            .put_object("media", "a.bin", body(b"0123456789"), 10, None)
            .await
            .unwrap();

        let window = store.get_partial_object("media", "a.bin", 2, 4).await.unwrap();
        assert_eq!(collect(window).await, b"2345");

        let err = store.get_partial_object("media", "a.bin", 10, 1).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn second_make_bucket_reports_existing() {
        let store = MemoryObjectStore::new("http://store");
        store.make_bucket("media", "us-east-1").await.unwrap();
        let err = store.make_bucket("media", "us-east-1").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketAlreadyExists(_)));
    }
}
