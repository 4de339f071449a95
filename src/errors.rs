use crate::store::StoreError;
use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Failure outcomes of gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("object store unavailable")]
    StoreUnavailable(#[source] StoreError),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("range `{header}` not satisfiable for {total_size} bytes")]
    InvalidRange { header: String, total_size: u64 },
    #[error("transfer failed")]
    TransferFailure(#[source] StoreError),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("{0}")]
    InvalidRequest(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoSuchKey { bucket, key } => Self::ObjectNotFound { bucket, key },
            StoreError::NoSuchBucket(bucket) => Self::BucketNotFound(bucket),
            err @ StoreError::Unavailable(_) => Self::StoreUnavailable(err),
            other => Self::TransferFailure(other),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::TransferFailure(StoreError::Io(err))
    }
}

/// A lightweight wrapper for handler errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub headers: HeaderMap,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, self.headers, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!("unhandled error: {:#}", err);
        AppError::internal("internal error")
    }
}

/// Backend detail is logged here and never forwarded to the client.
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::StoreUnavailable(source) => {
                error!("object store unavailable: {}", source);
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "object store unavailable")
            }
            GatewayError::TransferFailure(source) => {
                error!("transfer failed: {}", source);
                AppError::internal("transfer failed")
            }
            GatewayError::ObjectNotFound { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "object not found")
            }
            GatewayError::BucketNotFound(_) => {
                AppError::new(StatusCode::NOT_FOUND, "bucket not found")
            }
            GatewayError::InvalidRange {
                header: range,
                total_size,
            } => {
                warn!("rejecting range `{}` for {} bytes", range, total_size);
                let mut app = AppError::new(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    "requested range not satisfiable",
                );
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total_size)) {
                    app.headers.insert(header::CONTENT_RANGE, value);
                }
                app
            }
            err @ (GatewayError::InvalidBucketName { .. }
            | GatewayError::InvalidObjectKey
            | GatewayError::InvalidRequest(_)) => AppError::bad_request(err.to_string()),
        }
    }
}
