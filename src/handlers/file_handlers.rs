//! HTTP handlers for the file server surface.
//! Object bodies are streamed in both directions; uploads are spooled to the
//! staging area first so the store receives an exact content length.

use crate::{
    errors::{AppError, GatewayError},
    models::{
        grant::{PresignedGrant, TransferResult},
        object::{ContentCategory, ObjectStat},
    },
    services::{
        bucket_service::BucketStatus, naming::normalize_bucket_name, staging::StagingFile,
        stream_service::ObjectDelivery,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Query accepted by `presign-download`.
#[derive(Debug, Deserialize)]
pub struct PresignDownloadQuery {
    /// Validity in seconds; the configured default when absent.
    pub expiry: Option<u64>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), format!("invalid multipart body: {}", err))
}

/// `GET /fileServer/getfile/{fileName}/{bucketName}/{fileType}/{token}`
///
/// Images stream through, video/audio honor `Range`, anything else redirects
/// to a presigned URL. The token segment is accepted but not interpreted.
pub async fn get_file(
    State(state): State<AppState>,
    Path((file_name, bucket_name, file_type, _token)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<ObjectDelivery, AppError> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let category = ContentCategory::from_declared(&file_type);
    debug!(
        "getfile {}/{} as {:?} (range: {:?})",
        bucket_name, file_name, category, range
    );

    Ok(state
        .streams
        .deliver(&bucket_name, &file_name, category, range)
        .await?)
}

/// `POST /fileServer/upload-file/{bucketName}`: multipart with a `file` part
/// and an optional `filename` text part naming the stored key.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(bucket_name): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TransferResult>, AppError> {
    // Nothing is spooled for a request that can never be stored.
    let bucket = normalize_bucket_name(&bucket_name)?;

    let mut staged: Option<(StagingFile, Option<String>, Option<String>)> = None;
    let mut filename: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let part_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);

                let mut writer = state.staging.begin().await.map_err(GatewayError::from)?;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    writer.write(&chunk).await.map_err(GatewayError::from)?;
                }
                let file = writer.finish().await.map_err(GatewayError::from)?;
                staged = Some((file, part_name, content_type));
            }
            Some("filename") => {
                filename = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!("ignoring multipart field {:?}", other),
        }
    }

    let (file, part_name, content_type) =
        staged.ok_or_else(|| AppError::bad_request("missing `file` part"))?;
    let key = filename
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .or(part_name)
        .ok_or_else(|| AppError::bad_request("missing `filename`"))?;

    let result = state
        .transfers
        .upload(&bucket, &key, file, content_type.as_deref())
        .await?;
    Ok(Json(result))
}

/// `POST /fileServer/create-bucket/{bucketName}`
pub async fn create_bucket(
    State(state): State<AppState>,
    Path(bucket_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let message = match state.buckets.ensure_bucket(&bucket_name).await? {
        BucketStatus::Created => format!("Bucket {} created successfully.", bucket_name),
        BucketStatus::AlreadyExisted => format!("Bucket {} already exists.", bucket_name),
    };
    Ok(Json(json!({ "message": message })))
}

/// `GET /fileServer/bucket-exists/{bucketName}`
pub async fn bucket_exists(
    State(state): State<AppState>,
    Path(bucket_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let exists = state.buckets.bucket_exists(&bucket_name).await?;
    Ok(Json(json!({ "exists": exists })))
}

/// `GET /fileServer/file-details/{bucketName}/{fileName}`
pub async fn file_details(
    State(state): State<AppState>,
    Path((bucket_name, file_name)): Path<(String, String)>,
) -> Result<Json<ObjectStat>, AppError> {
    Ok(Json(state.transfers.stat(&bucket_name, &file_name).await?))
}

/// `GET|DELETE /fileServer/delete-file/{bucketName}/{fileName}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path((bucket_name, file_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state.transfers.delete(&bucket_name, &file_name).await?;
    Ok(Json(json!({ "message": "File deleted successfully." })))
}

/// `GET /fileServer/check-file-exists/{bucketName}/{fileName}`
pub async fn file_exists(
    State(state): State<AppState>,
    Path((bucket_name, file_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let exists = state.transfers.exists(&bucket_name, &file_name).await?;
    Ok(Json(json!({ "exists": exists })))
}

/// `GET /fileServer/presign-upload/{fileName}/{bucketName}`
///
/// The returned `fileName` is the synthesized key the client must upload to.
pub async fn presign_upload(
    State(state): State<AppState>,
    Path((file_name, bucket_name)): Path<(String, String)>,
) -> Result<Json<PresignedGrant>, AppError> {
    Ok(Json(
        state
            .grants
            .issue_upload_grant(&bucket_name, &file_name)
            .await?,
    ))
}

/// `GET /fileServer/presign-download/{bucketName}/{fileName}?expiry=<secs>`
pub async fn presign_download(
    State(state): State<AppState>,
    Path((bucket_name, file_name)): Path<(String, String)>,
    Query(q): Query<PresignDownloadQuery>,
) -> Result<Json<PresignedGrant>, AppError> {
    let ttl = q.expiry.map(Duration::from_secs).unwrap_or(state.download_ttl);
    Ok(Json(
        state
            .grants
            .issue_download_grant(&bucket_name, &file_name, ttl)
            .await?,
    ))
}
