//! Object access engine: decides how a requested object is delivered and
//! frames range-aware media responses.
//!
//! Images are proxied whole, video/audio go through HTTP range handling
//! against the store's partial-read primitive, and everything else is handed
//! off to a presigned download URL so the bytes never pass through the
//! gateway.

use crate::{
    errors::{GatewayError, GatewayResult},
    models::object::ContentCategory,
    services::{
        naming::{ensure_key_safe, extension_of, normalize_bucket_name},
        presign_service::PresignService,
        transfer_service::TransferService,
    },
    store::{ByteStream, ObjectStoreClient},
};
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use std::{
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tracing::{debug, warn};

const OCTET_STREAM: &str = "application/octet-stream";

/// A satisfiable byte window, `start..=end` of an object of `total_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

impl RangeSpec {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` header for this window.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

/// Parse a single `bytes=<start>-[<end>]` range against `total_size`.
///
/// `start` is required. A missing `end` means "to the last byte" and an `end`
/// past the object is clamped to the last byte. Anything else that cannot be
/// served (other units, multiple ranges, suffix ranges, `start > end`, a
/// start at or beyond the object) is `InvalidRange`.
pub fn parse_range(header: &str, total_size: u64) -> GatewayResult<RangeSpec> {
    let invalid = || GatewayError::InvalidRange {
        header: header.to_string(),
        total_size,
    };

    let trimmed = header.trim();
    let (unit, spec) = trimmed.split_once('=').ok_or_else(invalid)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || spec.contains(',') {
        return Err(invalid());
    }

    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() {
        return Err(invalid());
    }
    let start: u64 = start.parse().map_err(|_| invalid())?;
    let requested_end: Option<u64> = if end.is_empty() {
        None
    } else {
        Some(end.parse().map_err(|_| invalid())?)
    };

    if total_size == 0 || start >= total_size {
        return Err(invalid());
    }
    let last = total_size - 1;
    let end = match requested_end {
        Some(end) if end < start => return Err(invalid()),
        Some(end) => end.min(last),
        None => last,
    };

    Ok(RangeSpec {
        start,
        end,
        total_size,
    })
}

/// `image/<ext>` for a key, normalizing the common aliases.
pub fn image_content_type(key: &str) -> String {
    match extension_of(key).as_deref() {
        Some("jpg") => "image/jpeg".into(),
        Some("svg") => "image/svg+xml".into(),
        Some("tif") => "image/tiff".into(),
        Some("ico") => "image/x-icon".into(),
        Some(ext) => format!("image/{}", ext),
        None => OCTET_STREAM.into(),
    }
}

/// How the engine decided to answer an object request.
pub enum ObjectDelivery {
    /// Whole object proxied with a known content type (images).
    Inline { content_type: String, body: ByteStream },
    /// Whole media object, no range requested.
    Full { total_size: u64, body: ByteStream },
    /// A satisfiable byte window of a media object.
    Partial { range: RangeSpec, body: ByteStream },
    /// Client should fetch directly from the store.
    Redirect { location: String },
}

impl IntoResponse for ObjectDelivery {
    fn into_response(self) -> Response {
        match self {
            ObjectDelivery::Inline { content_type, body } => {
                let mut response = Response::new(Body::from_stream(body));
                let value = HeaderValue::from_str(&content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));
                response.headers_mut().insert(header::CONTENT_TYPE, value);
                response
            }
            ObjectDelivery::Full { total_size, body } => {
                let mut response = Response::new(Body::from_stream(body));
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(total_size));
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                response
            }
            ObjectDelivery::Partial { range, body } => {
                let mut response = Response::new(Body::from_stream(body));
                *response.status_mut() = StatusCode::PARTIAL_CONTENT;
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));
                headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                if let Ok(value) = HeaderValue::from_str(&range.content_range()) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                response
            }
            ObjectDelivery::Redirect { location } => match HeaderValue::from_str(&location) {
                Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
                Err(err) => {
                    warn!("presigned url is not a valid header value: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
        }
    }
}

/// Pass-through stream that notes when the peer stops reading early.
///
/// Dropping it drops the store read, which is how a client disconnect stops
/// the transfer.
struct TrackedBody {
    inner: ByteStream,
    label: String,
    expected: Option<u64>,
    sent: u64,
    finished: bool,
}

impl TrackedBody {
    fn wrap(inner: ByteStream, label: String, expected: Option<u64>) -> ByteStream {
        Box::pin(Self {
            inner,
            label,
            expected,
            sent: 0,
            finished: false,
        })
    }
}

impl Stream for TrackedBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let poll = this.inner.as_mut().poll_next(cx);
        match &poll {
            Poll::Ready(Some(Ok(chunk))) => this.sent += chunk.len() as u64,
            Poll::Ready(Some(Err(err))) => {
                warn!("read of {} failed after {} bytes: {}", this.label, this.sent, err);
                this.finished = true;
            }
            Poll::Ready(None) => this.finished = true,
            Poll::Pending => {}
        }
        poll
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                "stream of {} closed by peer after {} of {:?} bytes",
                self.label, self.sent, self.expected
            );
        }
    }
}

#[derive(Clone)]
pub struct StreamService {
    store: Arc<dyn ObjectStoreClient>,
    transfers: TransferService,
    grants: PresignService,
    redirect_ttl: Duration,
}

impl StreamService {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        transfers: TransferService,
        grants: PresignService,
        redirect_ttl: Duration,
    ) -> Self {
        Self {
            store,
            transfers,
            grants,
            redirect_ttl,
        }
    }

    /// Decide how to deliver `(bucket, key)` for a request that declared
    /// `category`, honoring `range` for media.
    pub async fn deliver(
        &self,
        bucket: &str,
        key: &str,
        category: ContentCategory,
        range: Option<&str>,
    ) -> GatewayResult<ObjectDelivery> {
        match category {
            ContentCategory::Image => {
                let body = self.transfers.open(bucket, key).await?;
                Ok(ObjectDelivery::Inline {
                    content_type: image_content_type(key),
                    body: TrackedBody::wrap(body, format!("{}/{}", bucket, key), None),
                })
            }
            ContentCategory::Media => self.deliver_media(bucket, key, range).await,
            ContentCategory::Other => {
                let grant = self
                    .grants
                    .issue_download_grant(bucket, key, self.redirect_ttl)
                    .await?;
                debug!("redirecting {}/{} to presigned url", bucket, key);
                Ok(ObjectDelivery::Redirect {
                    location: grant.url,
                })
            }
        }
    }

    async fn deliver_media(
        &self,
        bucket: &str,
        key: &str,
        range: Option<&str>,
    ) -> GatewayResult<ObjectDelivery> {
        let bucket = normalize_bucket_name(bucket)?;
        ensure_key_safe(key)?;
        let label = format!("{}/{}", bucket, key);

        let total_size = self.store.stat_object(&bucket, key).await?.size;

        let Some(range_header) = range else {
            let body = self.store.get_object(&bucket, key).await?;
            return Ok(ObjectDelivery::Full {
                total_size,
                body: TrackedBody::wrap(body, label, Some(total_size)),
            });
        };

        let range = parse_range(range_header, total_size)?;
        debug!("serving {} {}", label, range.content_range());
        let body = self
            .store
            .get_partial_object(&bucket, key, range.start, range.len())
            .await?;
        Ok(ObjectDelivery::Partial {
            range,
            body: TrackedBody::wrap(body, label, Some(range.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn window(start: u64, end: u64, total_size: u64) -> RangeSpec {
        RangeSpec {
            start,
            end,
            total_size,
        }
    }

    #[test]
    fn parses_closed_and_open_ranges() {
        assert_eq!(parse_range("bytes=0-99", 1000).unwrap(), window(0, 99, 1000));
        assert_eq!(parse_range("bytes=500-", 1000).unwrap(), window(500, 999, 1000));
        assert_eq!(parse_range("bytes=999-999", 1000).unwrap(), window(999, 999, 1000));
        assert_eq!(parse_range(" BYTES = 10 - 20 ", 1000).unwrap(), window(10, 20, 1000));
    }

    #[test]
    fn clamps_end_past_the_object() {
        let range = parse_range("bytes=900-5000", 1000).unwrap();
        assert_eq!(range, window(900, 999, 1000));
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn rejects_unsatisfiable_ranges() {
        for header in [
            "bytes=1000-",
            "bytes=2000-3000",
            "bytes=50-10",
            "bytes=-100",
            "bytes=0-1,5-9",
            "items=0-10",
            "bytes=abc-",
            "bytes=0-x",
            "bytes=-",
            "0-10",
        ] {
            match parse_range(header, 1000) {
                Err(GatewayError::InvalidRange { total_size, .. }) => assert_eq!(total_size, 1000),
                other => panic!("{header:?} should be rejected, got {other:?}"),
            }
        }
        assert!(parse_range("bytes=0-", 0).is_err());
    }

    #[test]
    fn content_range_matches_window() {
        let range = window(0, 99, 1000);
        assert_eq!(range.content_range(), "bytes 0-99/1000");
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn image_types_follow_extension() {
        assert_eq!(image_content_type("cat.png"), "image/png");
        assert_eq!(image_content_type("cat.JPG"), "image/jpeg");
        assert_eq!(image_content_type("logo.svg"), "image/svg+xml");
        assert_eq!(image_content_type("noext"), OCTET_STREAM);
    }

    #[test]
    fn partial_delivery_is_framed_as_206() {
        let body: ByteStream = Box::pin(stream::iter(vec![Ok(Bytes::from_static(b"abc"))]));
        let response = ObjectDelivery::Partial {
            range: window(0, 2, 10),
            body,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-2/10");
        assert_eq!(headers[header::CONTENT_LENGTH], "3");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    }

    #[test]
    fn redirect_delivery_sets_location() {
        let response = ObjectDelivery::Redirect {
            location: "http://store/bucket/doc.pdf?X-Amz-Expires=3600".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://store/bucket/doc.pdf?X-Amz-Expires=3600"
        );
    }
}
