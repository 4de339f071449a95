//! Presigned access grants for direct client uploads and downloads.

use crate::{
    errors::{GatewayError, GatewayResult},
    models::grant::{GrantOperation, PresignedGrant},
    services::{
        bucket_service::BucketService,
        naming::{ensure_key_safe, extension_of, normalize_bucket_name},
    },
    store::ObjectStoreClient,
};
use chrono::Utc;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::info;

/// Longest validity S3-compatible stores accept for a presigned URL.
pub const MAX_GRANT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Millisecond timestamps that never repeat within the process.
///
/// Each value is `max(now, previous + 1)`, so back-to-back calls inside the
/// same millisecond still yield distinct upload keys.
#[derive(Debug, Default)]
pub struct KeyClock {
    last: AtomicU64,
}

impl KeyClock {
    pub fn next(&self) -> u64 {
        self.next_at(Utc::now().timestamp_millis().max(0) as u64)
    }

    fn next_at(&self, now: u64) -> u64 {
        let advance = |prev: u64| now.max(prev + 1);
        match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| Some(advance(prev)))
        {
            Ok(prev) | Err(prev) => advance(prev),
        }
    }
}

/// `<millis>.<ext>` for names with a usable extension, bare `<millis>` otherwise.
pub fn synthesize_key(millis: u64, original_name: &str) -> String {
    match extension_of(original_name) {
        Some(ext) => format!("{}.{}", millis, ext),
        None => millis.to_string(),
    }
}

#[derive(Clone)]
pub struct PresignService {
    store: Arc<dyn ObjectStoreClient>,
    buckets: BucketService,
    clock: Arc<KeyClock>,
    upload_ttl: Duration,
}

impl PresignService {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        buckets: BucketService,
        upload_ttl: Duration,
    ) -> Self {
        Self {
            store,
            buckets,
            clock: Arc::new(KeyClock::default()),
            upload_ttl,
        }
    }

    /// A GET grant for an existing key, valid for `ttl`.
    pub async fn issue_download_grant(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> GatewayResult<PresignedGrant> {
        ensure_ttl(ttl)?;
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;

        let url = self.store.presigned_get_object(&bucket, key, ttl).await?;
        Ok(grant(url, key.to_string(), GrantOperation::Get, ttl))
    }

    /// A PUT grant under a freshly synthesized key derived from
    /// `original_name`'s extension. Creates the bucket if it is missing.
    pub async fn issue_upload_grant(
        &self,
        bucket: &str,
        original_name: &str,
    ) -> GatewayResult<PresignedGrant> {
        let bucket = normalize_bucket_name(bucket)?;
        self.buckets.ensure_bucket(&bucket).await?;

        let key = synthesize_key(self.clock.next(), original_name);
        let url = self
            .store
            .presigned_put_object(&bucket, &key, self.upload_ttl)
            .await?;
        info!(
            "issued upload grant {}/{} for `{}`",
            bucket, key, original_name
        );
        Ok(grant(url, key, GrantOperation::Put, self.upload_ttl))
    }
}

fn ensure_ttl(ttl: Duration) -> GatewayResult<()> {
    if ttl.is_zero() || ttl > MAX_GRANT_TTL {
        return Err(GatewayError::InvalidRequest(format!(
            "expiry must be between 1 and {} seconds",
            MAX_GRANT_TTL.as_secs()
        )));
    }
    Ok(())
}

fn grant(url: String, object_key: String, operation: GrantOperation, ttl: Duration) -> PresignedGrant {
    PresignedGrant {
        url,
        object_key,
        operation,
        expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_never_repeats_within_a_millisecond() {
        let clock = KeyClock::default();
        let a = clock.next_at(1_700_000_000_000);
        let b = clock.next_at(1_700_000_000_000);
        let c = clock.next_at(1_700_000_000_000);
        assert_eq!(a, 1_700_000_000_000);
        assert_eq!(b, a + 1);
        assert_eq!(c, a + 2);
    }

    #[test]
    fn clock_reads_wall_time_in_millis() {
        let before = Utc::now().timestamp_millis() as u64;
        let stamp = KeyClock::default().next();
        let after = Utc::now().timestamp_millis() as u64;
        assert!((before..=after).contains(&stamp));
    }

    #[test]
    fn clock_follows_wall_time_when_it_advances() {
        let clock = KeyClock::default();
        clock.next_at(1_000);
        assert_eq!(clock.next_at(5_000), 5_000);
        // A wall clock stepping backwards never produces an earlier key.
        assert_eq!(clock.next_at(4_000), 5_001);
    }

    #[test]
    fn keys_keep_the_original_extension() {
        assert_eq!(synthesize_key(42, "My Holiday.MOV"), "42.mov");
        assert_eq!(synthesize_key(42, "notes"), "42");
        assert_eq!(synthesize_key(42, "../../etc/passwd"), "42");
    }

    #[test]
    fn ttl_must_be_within_store_limits() {
        assert!(ensure_ttl(Duration::from_secs(300)).is_ok());
        assert!(ensure_ttl(Duration::ZERO).is_err());
        assert!(ensure_ttl(MAX_GRANT_TTL + Duration::from_secs(1)).is_err());
    }
}
