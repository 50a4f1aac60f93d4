//! Types shared by container and blob operations.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::request::OperationRequest;
use azure_cognitive_core::response::{FromHeaders, HeaderReader};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub(crate) const META_PREFIX: &str = "x-ms-meta-";
pub(crate) const LEASE_ID_HEADER: &str = "x-ms-lease-id";
pub(crate) const RANGE_HEADER: &str = "x-ms-range";

/// User-defined name/value pairs, sent as `x-ms-meta-*` headers.
pub type Metadata = BTreeMap<String, String>;

/// Kind of blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobType {
    BlockBlob,
    AppendBlob,
    PageBlob,
}

impl BlobType {
    /// Returns the value of the `x-ms-blob-type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockBlob => "BlockBlob",
            Self::AppendBlob => "AppendBlob",
            Self::PageBlob => "PageBlob",
        }
    }
}

impl fmt::Display for BlobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BlockBlob" => Ok(Self::BlockBlob),
            "AppendBlob" => Ok(Self::AppendBlob),
            "PageBlob" => Ok(Self::PageBlob),
            other => Err(format!("unknown blob type '{other}'")),
        }
    }
}

// Listings carry the type as element text, so decode through a string.
impl<'de> Deserialize<'de> for BlobType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Anonymous read access level of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAccess {
    /// Blob data is readable anonymously; container data is not.
    Blob,
    /// Blobs and container listings are readable anonymously.
    Container,
}

impl PublicAccess {
    /// Returns the value of the `x-ms-blob-public-access` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Container => "container",
        }
    }
}

impl FromStr for PublicAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "container" => Ok(Self::Container),
            other => Err(format!("unknown public access level '{other}'")),
        }
    }
}

/// Headers returned by write operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ETagHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub request_id: Option<String>,
}

impl FromHeaders for ETagHeaders {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            etag: headers.optional("ETag"),
            last_modified: headers.optional("Last-Modified"),
            request_id: headers.optional("x-ms-request-id"),
        })
    }
}

/// Properties of a blob, read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobProperties {
    pub blob_type: Option<BlobType>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub content_range: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub lease_state: Option<String>,
    pub lease_status: Option<String>,
    pub metadata: Metadata,
}

impl FromHeaders for BlobProperties {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            blob_type: headers.parse("x-ms-blob-type")?,
            content_length: headers.parse("Content-Length")?,
            content_type: headers.optional("Content-Type"),
            content_range: headers.optional("Content-Range"),
            etag: headers.optional("ETag"),
            last_modified: headers.optional("Last-Modified"),
            lease_state: headers.optional("x-ms-lease-state"),
            lease_status: headers.optional("x-ms-lease-status"),
            metadata: headers.with_prefix(META_PREFIX).into_iter().collect(),
        })
    }
}

/// Properties of a container, read from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerProperties {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub public_access: Option<PublicAccess>,
    pub lease_state: Option<String>,
    pub lease_status: Option<String>,
    pub metadata: Metadata,
}

impl FromHeaders for ContainerProperties {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            etag: headers.optional("ETag"),
            last_modified: headers.optional("Last-Modified"),
            public_access: headers.parse("x-ms-blob-public-access")?,
            lease_state: headers.optional("x-ms-lease-state"),
            lease_status: headers.optional("x-ms-lease-status"),
            metadata: headers.with_prefix(META_PREFIX).into_iter().collect(),
        })
    }
}

/// Add `metadata` as `x-ms-meta-*` headers.
///
/// Names must be valid C# identifiers, as the service requires.
pub(crate) fn with_metadata(mut request: OperationRequest, metadata: &Metadata) -> ServiceResult<OperationRequest> {
    for (name, value) in metadata {
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ServiceError::InvalidArgument(format!("invalid metadata name '{name}'")));
        }
        request = request.header(format!("{META_PREFIX}{name}"), value.as_str());
    }
    Ok(request)
}

/// Check a container name: 3-63 lowercase letters, digits, and single
/// hyphens, starting and ending with a letter or digit. `$root`, `$logs`
/// and `$web` are also accepted.
pub(crate) fn validate_container_name(name: &str) -> ServiceResult<()> {
    if matches!(name, "$root" | "$logs" | "$web") {
        return Ok(());
    }

    let well_formed = (3..=63).contains(&name.len())
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");

    if well_formed {
        Ok(())
    } else {
        Err(ServiceError::InvalidArgument(format!("invalid container name '{name}'")))
    }
}

/// Check a blob name: 1-1024 characters.
pub(crate) fn validate_blob_name(name: &str) -> ServiceResult<()> {
    if name.is_empty() || name.chars().count() > 1024 {
        return Err(ServiceError::InvalidArgument(format!(
            "blob name must be 1-1024 characters, got {}",
            name.chars().count()
        )));
    }
    if name.split('/').any(|segment| matches!(segment, "." | "..")) {
        return Err(ServiceError::InvalidArgument(format!(
            "blob name '{name}' cannot contain '.' or '..' path segments"
        )));
    }
    Ok(())
}

/// Format an inclusive byte range for `x-ms-range`.
pub(crate) fn byte_range(start: u64, end_inclusive: u64) -> String {
    format!("bytes={start}-{end_inclusive}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn container_names() {
        for good in ["abc", "my-container-1", "$root", "a1b", "a".repeat(63).as_str()] {
            assert!(validate_container_name(good).is_ok(), "{good}");
        }
        for bad in ["ab", "My-Container", "-abc", "abc-", "a--b", "a_b", "a".repeat(64).as_str()] {
            assert!(validate_container_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn blob_names() {
        assert!(validate_blob_name("dir/file.txt").is_ok());
        assert!(validate_blob_name("").is_err());
        assert!(validate_blob_name(&"x".repeat(1025)).is_err());
        assert!(validate_blob_name("a//b").is_ok());
        assert!(validate_blob_name("dir/").is_ok());
        assert!(validate_blob_name("a/../b").is_err());
        assert!(validate_blob_name(".").is_err());
    }

    #[test]
    fn metadata_names_are_identifiers() {
        use azure_cognitive_core::operation::{ErrorFormat, Operation};
        static OP: Operation = Operation {
            name: "set_metadata",
            method: reqwest::Method::PUT,
            path: "/{container}",
            success: &[200],
            error_format: ErrorFormat::Xml,
        };

        let metadata = Metadata::from([("owner".to_string(), "alice".to_string())]);
        let request = with_metadata(OperationRequest::new(&OP), &metadata).expect("valid");
        assert_eq!(request.header_value("x-ms-meta-owner"), Some("alice"));

        for bad in ["1st", "has-dash", ""] {
            let metadata = Metadata::from([(bad.to_string(), "v".to_string())]);
            assert!(with_metadata(OperationRequest::new(&OP), &metadata).is_err(), "{bad}");
        }
    }

    #[test]
    fn blob_properties_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("AppendBlob"));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("etag", HeaderValue::from_static("\"0x8D\""));
        headers.insert("x-ms-meta-owner", HeaderValue::from_static("alice"));
        headers.insert("x-ms-lease-state", HeaderValue::from_static("available"));

        let props = BlobProperties::from_headers(&HeaderReader::new("get_blob_properties", &headers))
            .expect("should parse");
        assert_eq!(props.blob_type, Some(BlobType::AppendBlob));
        assert_eq!(props.content_length, Some(42));
        assert_eq!(props.etag.as_deref(), Some("\"0x8D\""));
        assert_eq!(props.metadata.get("owner").map(String::as_str), Some("alice"));
        assert_eq!(props.lease_state.as_deref(), Some("available"));
    }

    #[test]
    fn unknown_blob_type_is_deserialization_error() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-blob-type", HeaderValue::from_static("TapeBlob"));
        let err = BlobProperties::from_headers(&HeaderReader::new("get_blob_properties", &headers))
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::Deserialization { .. }));
    }

    #[test]
    fn ranges_are_inclusive() {
        assert_eq!(byte_range(0, 511), "bytes=0-511");
    }
}
