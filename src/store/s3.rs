//! S3-compatible object store client (MinIO, RustFS, AWS S3).
//!
//! Built once at startup from static credentials and shared by every request.

use super::{ByteStream, ObjectStoreClient, PutOutcome, StoreError, StoreResult};
use crate::models::object::ObjectStat;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::http::HttpResponse,
    error::{ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::ByteStream as AwsByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use chrono::DateTime;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key,
            settings.secret_key,
            None,
            None,
            "object-gateway",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region))
            .credentials_provider(credentials)
            .endpoint_url(settings.endpoint)
            .load()
            .await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                // MinIO and RustFS address buckets by path, not subdomain.
                .force_path_style(true)
                .build(),
        );

        Self { client }
    }

    fn presigning_config(ttl: Duration) -> StoreResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl).map_err(StoreError::backend)
    }
}

/// Translate an SDK failure into the store taxonomy.
///
/// Connection-level failures and 5xx answers mean the store is unavailable;
/// 404-class answers become the matching not-found variant.
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, bucket: &str, key: Option<&str>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    enum Kind {
        Unavailable,
        NoSuchBucket,
        NotFound,
        AlreadyExists,
        Other,
    }

    let kind = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => Kind::Unavailable,
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            match ctx.err().code() {
                Some("NoSuchBucket") => Kind::NoSuchBucket,
                Some("NoSuchKey") | Some("NotFound") => Kind::NotFound,
                Some("BucketAlreadyOwnedByYou") | Some("BucketAlreadyExists") => {
                    Kind::AlreadyExists
                }
                // HEAD responses carry no error body, so only the status is known.
                _ if status == 404 => Kind::NotFound,
                _ if status >= 500 => Kind::Unavailable,
                _ => Kind::Other,
            }
        }
        _ => Kind::Other,
    };

    match (kind, key) {
        (Kind::Unavailable, _) => StoreError::unavailable(err),
        (Kind::NoSuchBucket, _) | (Kind::NotFound, None) => {
            StoreError::NoSuchBucket(bucket.to_string())
        }
        (Kind::NotFound, Some(key)) => StoreError::no_such_key(bucket, key),
        (Kind::AlreadyExists, _) => StoreError::BucketAlreadyExists(bucket.to_string()),
        (Kind::Other, _) => StoreError::backend(err),
    }
}

/// Object size from a HEAD answer. A missing or negative length is a store
/// fault, not an empty object.
fn reported_size(content_length: Option<i64>, bucket: &str, key: &str) -> StoreResult<u64> {
    content_length
        .and_then(|len| u64::try_from(len).ok())
        .ok_or_else(|| {
            StoreError::backend(format!(
                "store reported no usable content length for {}/{}",
                bucket, key
            ))
        })
}

fn reader_stream(body: AwsByteStream) -> ByteStream {
    Box::pin(ReaderStream::new(body.into_async_read()))
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => match map_sdk_error(err, bucket, None) {
                StoreError::NoSuchBucket(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn make_bucket(&self, bucket: &str, region: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the implicit default and must not be sent as a constraint.
        if region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, None))?;
        debug!("created bucket {} in {}", bucket, region);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: u64,
        content_type: Option<&str>,
    ) -> StoreResult<PutOutcome> {
        let body = AwsByteStream::from_body_1_x(StreamBody::new(body.map_ok(Frame::data)));

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(body);
        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, Some(key)))?;

        Ok(PutOutcome {
            etag: result.e_tag.map(|e| e.trim_matches('"').to_string()),
            size_bytes: size,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ByteStream> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, Some(key)))?;
        Ok(reader_stream(result.body))
    }

    async fn get_partial_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> StoreResult<ByteStream> {
        if length == 0 {
            return Err(StoreError::backend("zero-length partial read"));
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, Some(key)))?;
        Ok(reader_stream(result.body))
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, Some(key)))?;

        let last_modified = result
            .last_modified
            .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()));

        Ok(ObjectStat {
            size: reported_size(result.content_length, bucket, key)?,
            content_type: result.content_type,
            last_modified,
            etag: result.e_tag.map(|e| e.trim_matches('"').to_string()),
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| map_sdk_error(err, bucket, Some(key)))?;
        Ok(())
    }

    async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|err| {
                warn!("failed to presign GET {}/{}: {}", bucket, key, err);
                map_sdk_error(err, bucket, Some(key))
            })?;
        Ok(presigned.uri().to_string())
    }

    async fn presigned_put_object(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StoreResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|err| {
                warn!("failed to presign PUT {}/{}: {}", bucket, key, err);
                map_sdk_error(err, bucket, Some(key))
            })?;
        Ok(presigned.uri().to_string())
    }
}
