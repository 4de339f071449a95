//! Store double for unit tests: each probe answers whatever the test scripts,
//! everything else fails as a backend error.

use super::{ByteStream, ObjectStoreClient, PutOutcome, StoreError, StoreResult};
use crate::models::object::ObjectStat;
use async_trait::async_trait;
use std::time::Duration;

pub(crate) struct ScriptedStore {
    pub bucket_exists: fn() -> StoreResult<bool>,
    pub make_bucket: fn() -> StoreResult<()>,
    pub stat_object: fn() -> StoreResult<ObjectStat>,
}

fn unscripted<T>() -> StoreResult<T> {
    Err(StoreError::backend("unscripted store call"))
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            bucket_exists: unscripted,
            make_bucket: unscripted,
            stat_object: unscripted,
        }
    }
}

#[async_trait]
impl ObjectStoreClient for ScriptedStore {
    async fn bucket_exists(&self, _bucket: &str) -> StoreResult<bool> {
        (self.bucket_exists)()
    }

    async fn make_bucket(&self, _bucket: &str, _region: &str) -> StoreResult<()> {
        (self.make_bucket)()
    }

    async fn put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _body: ByteStream,
        _size: u64,
        _content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        unscripted()
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> StoreResult<ByteStream> {
        unscripted()
    }

    async fn get_partial_object(
        &self,
        _bucket: &str,
        _key: &str,
        _offset: u64,
        _length: u64,
    ) -> StoreResult<ByteStream> {
        unscripted()
    }

    async fn stat_object(&self, _bucket: &str, _key: &str) -> StoreResult<ObjectStat> {
        (self.stat_object)()
    }

    async fn remove_object(&self, _bucket: &str, _key: &str) -> StoreResult<()> {
        unscripted()
    }

    async fn presigned_get_object(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl: Duration,
    ) -> StoreResult<String> {
        unscripted()
    }

    async fn presigned_put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl: Duration,
    ) -> StoreResult<String> {
        unscripted()
    }
}
