//! Capability tokens handed to clients: presigned grants and upload receipts.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// HTTP operation a presigned URL authorizes.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum GrantOperation {
    Get,
    Put,
}

/// A time-bounded URL issued by the store's signing mechanism.
///
/// Nothing about a grant is persisted by the gateway; validity is enforced by
/// the store when the URL is used.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PresignedGrant {
    pub url: String,

    /// Key the URL is bound to. For upload grants this is the synthesized,
    /// collision-free key the caller must reference afterwards.
    #[serde(rename = "fileName")]
    pub object_key: String,

    pub operation: GrantOperation,

    pub expires_at: DateTime<Utc>,
}

/// Result of a completed upload: where the object ended up.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    #[serde(rename = "fileUrl")]
    pub url: String,

    #[serde(rename = "fileKey")]
    pub file_key: String,
}
