//! Page blobs: fixed-size blobs written in 512-byte pages.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::response::{FromHeaders, HeaderReader};
use bytes::Bytes;
use reqwest::Method;

use crate::blob::blob_request;
use crate::client::BlobServiceClient;
use crate::models::{byte_range, with_metadata, BlobType, ETagHeaders, Metadata, LEASE_ID_HEADER, RANGE_HEADER};

/// Page size; sizes and offsets must be multiples of it.
pub const PAGE_SIZE: u64 = 512;

/// Largest range a single page write may cover (4 MiB).
pub const MAX_PAGE_WRITE: u64 = 4 * 1024 * 1024;

static CREATE_PAGE_BLOB: Operation = Operation {
    name: "create_page_blob",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static PUT_PAGE: Operation = Operation {
    name: "put_page",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

/// Options for [`create`].
#[derive(Debug, Clone, Default)]
pub struct CreatePageBlobOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
    /// Initial sequence number, for optimistic concurrency.
    pub sequence_number: Option<u64>,
}

/// Headers returned by page writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWriteHeaders {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub sequence_number: Option<u64>,
}

impl FromHeaders for PageWriteHeaders {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            etag: headers.optional("ETag"),
            last_modified: headers.optional("Last-Modified"),
            sequence_number: headers.parse("x-ms-blob-sequence-number")?,
        })
    }
}

fn check_aligned(name: &str, value: u64) -> ServiceResult<()> {
    if value % PAGE_SIZE != 0 {
        return Err(ServiceError::InvalidArgument(format!(
            "{name} {value} is not a multiple of {PAGE_SIZE}"
        )));
    }
    Ok(())
}

/// Validate a page range and render it for `x-ms-range`.
fn page_range(offset: u64, length: u64) -> ServiceResult<String> {
    check_aligned("offset", offset)?;
    check_aligned("length", length)?;
    if length == 0 || length > MAX_PAGE_WRITE {
        return Err(ServiceError::InvalidArgument(format!(
            "length {length} is outside valid range (1..={MAX_PAGE_WRITE})"
        )));
    }
    let end = offset
        .checked_add(length - 1)
        .ok_or_else(|| ServiceError::InvalidArgument(format!("range at {offset} overflows")))?;
    Ok(byte_range(offset, end))
}

/// Create a zero-filled page blob of `size` bytes, replacing any existing blob.
///
/// # Tracing
///
/// Emits a span named `blob::create_page_blob` with field `size`.
#[tracing::instrument(name = "blob::create_page_blob", skip(client, options))]
pub async fn create(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    size: u64,
    options: &CreatePageBlobOptions,
) -> ServiceResult<ETagHeaders> {
    check_aligned("size", size)?;

    let request = blob_request(&CREATE_PAGE_BLOB, container, blob)?
        .header("x-ms-blob-type", BlobType::PageBlob.as_str())
        .header("x-ms-blob-content-length", size.to_string())
        .header_opt("x-ms-blob-sequence-number", options.sequence_number.map(|n| n.to_string()))
        .header_opt("x-ms-blob-content-type", options.content_type.as_deref());
    let request = with_metadata(request, &options.metadata)?;

    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;
    tracing::debug!("page blob created");
    Ok(response.headers)
}

/// Write `data` to the pages starting at `offset`.
///
/// Both `offset` and the length of `data` must be multiples of 512.
///
/// # Tracing
///
/// Emits a span named `blob::upload_pages` with field `offset`.
#[tracing::instrument(name = "blob::upload_pages", skip(client, data, lease_id))]
pub async fn upload_pages(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    offset: u64,
    data: impl Into<Bytes>,
    lease_id: Option<&str>,
) -> ServiceResult<PageWriteHeaders> {
    let data = data.into();
    let range = page_range(offset, data.len() as u64)?;
    tracing::debug!(range = %range, "writing pages");

    let request = blob_request(&PUT_PAGE, container, blob)?
        .query("comp", "page")
        .header("x-ms-page-write", "update")
        .header(RANGE_HEADER, range)
        .header_opt(LEASE_ID_HEADER, lease_id)
        .binary_body(data);

    let response = client
        .service()
        .send(request)
        .await?
        .headers_only::<PageWriteHeaders>()?;
    Ok(response.headers)
}

/// Zero the `length` bytes of pages starting at `offset`.
///
/// # Tracing
///
/// Emits a span named `blob::clear_pages` with fields `offset` and `length`.
#[tracing::instrument(name = "blob::clear_pages", skip(client, lease_id))]
pub async fn clear_pages(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    offset: u64,
    length: u64,
    lease_id: Option<&str>,
) -> ServiceResult<PageWriteHeaders> {
    let range = page_range(offset, length)?;
    tracing::debug!(range = %range, "clearing pages");

    let request = blob_request(&PUT_PAGE, container, blob)?
        .query("comp", "page")
        .header("x-ms-page-write", "clear")
        .header(RANGE_HEADER, range)
        .header_opt(LEASE_ID_HEADER, lease_id);

    let response = client
        .service()
        .send(request)
        .await?
        .headers_only::<PageWriteHeaders>()?;
    Ok(response.headers)
}
