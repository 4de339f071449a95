use anyhow::{Context, Result};
use axum::Router;
use object_gateway::{
    config::{AppConfig, StoreBackend},
    routes,
    state::AppState,
    store::{MemoryObjectStore, ObjectStoreClient, S3ObjectStore, s3::S3Settings},
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting object-gateway with config: {}", cfg);

    // --- Object store client ---
    let store: Arc<dyn ObjectStoreClient> = match cfg.store {
        StoreBackend::S3 => {
            let client = S3ObjectStore::connect(S3Settings {
                endpoint: cfg.endpoint.clone(),
                region: cfg.region.clone(),
                access_key: cfg.access_key.clone(),
                secret_key: cfg.secret_key.clone(),
            })
            .await;
            tracing::info!("Using S3-compatible store at {}", cfg.endpoint);
            Arc::new(client)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; objects are lost on restart");
            Arc::new(MemoryObjectStore::new(cfg.endpoint.clone()))
        }
    };

    // --- Shared state + staging area ---
    let state = AppState::new(store, &cfg);
    state
        .staging
        .prepare()
        .await
        .with_context(|| format!("preparing staging directory {}", cfg.staging_dir))?;
    tracing::info!("Staging uploads in {}", cfg.staging_dir);

    // --- Build router ---
    let app: Router = routes::routes::routes(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
