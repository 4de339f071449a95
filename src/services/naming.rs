//! Bucket and key hygiene applied before any request reaches the store.

use crate::errors::{GatewayError, GatewayResult};

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Lowercase `name` and check it against S3 bucket naming rules.
///
/// Rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn normalize_bucket_name(name: &str) -> GatewayResult<String> {
    let normalized = name.trim().to_lowercase();
    let invalid = |reason: &str| GatewayError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    let len = normalized.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !normalized
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if normalized.starts_with(['.', '-']) || normalized.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if normalized.contains("..") || normalized.contains("-.") || normalized.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(&normalized) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(normalized)
}

/// Reject keys that are empty, oversized or could escape a path prefix.
pub fn ensure_key_safe(key: &str) -> GatewayResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(GatewayError::InvalidObjectKey);
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(GatewayError::InvalidObjectKey);
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(GatewayError::InvalidObjectKey);
    }
    Ok(())
}

/// Lowercased extension after the last `.`, if it is a plausible one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_names_are_lowercased() {
        assert_eq!(normalize_bucket_name(" Media-Uploads ").unwrap(), "media-uploads");
    }

    #[test]
    fn rejects_malformed_bucket_names() {
        for name in ["ab", "-media", "media.", "me..dia", "me_dia", "192.168.0.1"] {
            assert!(
                matches!(
                    normalize_bucket_name(name),
                    Err(GatewayError::InvalidBucketName { .. })
                ),
                "{name} should be rejected"
            );
        }
        assert!(normalize_bucket_name("999.1.1.1").is_ok());
    }

    #[test]
    fn rejects_unsafe_keys() {
        assert!(ensure_key_safe("clip.mp4").is_ok());
        assert!(ensure_key_safe("albums/2025/cover.png").is_ok());
        for key in ["", "/etc/passwd", "../secret", "a/../b", "a\\b", "tab\there"] {
            assert!(ensure_key_safe(key).is_err(), "{key:?} should be rejected");
        }
    }

    #[test]
    fn double_dots_inside_a_segment_are_allowed() {
        assert!(ensure_key_safe("trailer..final.mp4").is_ok());
        assert!(ensure_key_safe("clips/v2..draft/cut.mp4").is_ok());
        assert!(ensure_key_safe("clips/../cut.mp4").is_err());
    }

    #[test]
    fn extracts_extensions() {
        assert_eq!(extension_of("holiday.MP4").as_deref(), Some("mp4"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of(".png").as_deref(), Some("png"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("bad.ex t"), None);
    }
}
