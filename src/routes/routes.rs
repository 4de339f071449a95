//! Defines routes for the file server surface.
//!
//! ## Structure
//! - **Probes** (mounted at root)
//!   - `GET /healthz`, `GET /readyz`
//!
//! - **File server** (nested under `/fileServer`)
//!   - `GET    /getfile/{fileName}/{bucketName}/{fileType}/{token}`: category-aware read
//!   - `POST   /upload-file/{bucketName}`: multipart upload
//!   - `POST   /create-bucket/{bucketName}`: idempotent bucket creation
//!   - `GET    /bucket-exists/{bucketName}`
//!   - `GET    /file-details/{bucketName}/{fileName}`: object metadata
//!   - `GET|DELETE /delete-file/{bucketName}/{fileName}`
//!   - `GET    /check-file-exists/{bucketName}/{fileName}`
//!   - `GET    /presign-upload/{fileName}/{bucketName}`: PUT grant under a fresh key
//!   - `GET    /presign-download/{bucketName}/{fileName}?expiry=`: GET grant

use crate::{
    handlers::{
        file_handlers::{
            bucket_exists, create_bucket, delete_file, file_details, file_exists, get_file,
            presign_download, presign_upload, upload_file,
        },
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Routes under `/fileServer`. Only the upload route accepts bodies up to
/// `max_upload_bytes`; everything else keeps axum's default limit.
pub fn file_server_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/getfile/{file_name}/{bucket_name}/{file_type}/{token}",
            get(get_file),
        )
        .route(
            "/upload-file/{bucket_name}",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/create-bucket/{bucket_name}", post(create_bucket))
        .route("/bucket-exists/{bucket_name}", get(bucket_exists))
        .route("/file-details/{bucket_name}/{file_name}", get(file_details))
        .route(
            "/delete-file/{bucket_name}/{file_name}",
            get(delete_file).delete(delete_file),
        )
        .route(
            "/check-file-exists/{bucket_name}/{file_name}",
            get(file_exists),
        )
        .route(
            "/presign-upload/{file_name}/{bucket_name}",
            get(presign_upload),
        )
        .route(
            "/presign-download/{bucket_name}/{file_name}",
            get(presign_download),
        )
}

/// Build the complete application router with shared state attached.
pub fn routes(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest("/fileServer", file_server_routes(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
