//! Represents an object (file) stored in a bucket, as seen through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata projection returned by a stat probe.
///
/// The gateway never holds object content; this is everything it learns about
/// an object without reading its bytes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStat {
    /// Size in bytes.
    pub size: u64,

    /// Content type (MIME type) recorded at upload time.
    pub content_type: Option<String>,

    /// Timestamp when the object was last written.
    pub last_modified: Option<DateTime<Utc>>,

    /// Entity tag reported by the store, without surrounding quotes.
    pub etag: Option<String>,
}

/// How a requested object should be delivered, derived once from the
/// declared content category of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    /// `image/*`: streamed through whole, no range handling.
    Image,
    /// `video/*` and `audio/*`: range-aware streaming.
    Media,
    /// Anything else: redirected to a presigned download URL.
    Other,
}

impl ContentCategory {
    /// Classify a declared category such as `video`, `audio/mpeg` or `image`.
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_lowercase();
        if declared.starts_with("image") {
            Self::Image
        } else if declared.starts_with("video") || declared.starts_with("audio") {
            Self::Media
        } else {
            Self::Other
        }
    }
}
