//! Shared handler state: one store client, one instance of every service.

use crate::{
    config::AppConfig,
    services::{
        bucket_service::BucketService, presign_service::PresignService, staging::StagingArea,
        stream_service::StreamService, transfer_service::TransferService,
    },
    store::ObjectStoreClient,
};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStoreClient>,
    pub buckets: BucketService,
    pub transfers: TransferService,
    pub streams: StreamService,
    pub grants: PresignService,
    pub staging: StagingArea,
    pub download_ttl: Duration,
}

impl AppState {
    /// Wire every service around a single store client.
    pub fn new(store: Arc<dyn ObjectStoreClient>, cfg: &AppConfig) -> Self {
        let buckets = BucketService::new(store.clone(), cfg.region.clone());
        let transfers = TransferService::new(store.clone(), cfg.public_url.clone());
        let grants = PresignService::new(store.clone(), buckets.clone(), cfg.upload_ttl);
        let streams = StreamService::new(
            store.clone(),
            transfers.clone(),
            grants.clone(),
            cfg.redirect_ttl,
        );

        Self {
            store,
            buckets,
            transfers,
            streams,
            grants,
            staging: StagingArea::new(&cfg.staging_dir),
            download_ttl: cfg.download_ttl,
        }
    }
}
