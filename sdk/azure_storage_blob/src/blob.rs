//! Operations common to every blob type.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::request::OperationRequest;
use azure_cognitive_core::response::ServiceResponse;
use bytes::Bytes;
use reqwest::Method;

use crate::client::BlobServiceClient;
use crate::models::{
    byte_range, validate_blob_name, validate_container_name, with_metadata, BlobProperties, ETagHeaders, Metadata,
    LEASE_ID_HEADER, RANGE_HEADER,
};

static DOWNLOAD_BLOB: Operation = Operation {
    name: "download_blob",
    method: Method::GET,
    path: "/{container}/{blob*}",
    success: &[200, 206],
    error_format: ErrorFormat::Xml,
};

static GET_BLOB_PROPERTIES: Operation = Operation {
    name: "get_blob_properties",
    method: Method::HEAD,
    path: "/{container}/{blob*}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

static DELETE_BLOB: Operation = Operation {
    name: "delete_blob",
    method: Method::DELETE,
    path: "/{container}/{blob*}",
    success: &[202],
    error_format: ErrorFormat::Xml,
};

static SET_BLOB_METADATA: Operation = Operation {
    name: "set_blob_metadata",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

/// What to do with a blob's snapshots on delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteSnapshots {
    /// Delete the blob and all of its snapshots.
    Include,
    /// Delete only the snapshots.
    Only,
}

impl DeleteSnapshots {
    /// Returns the value of the `x-ms-delete-snapshots` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Only => "only",
        }
    }
}

/// Options for [`download`].
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Inclusive byte range `(start, end)`.
    pub range: Option<(u64, u64)>,
    pub lease_id: Option<String>,
}

/// Options for [`delete`].
#[derive(Debug, Clone, Default)]
pub struct DeleteBlobOptions {
    pub snapshots: Option<DeleteSnapshots>,
    pub lease_id: Option<String>,
}

/// Build a request addressed to one blob.
pub(crate) fn blob_request(
    operation: &'static Operation,
    container: &str,
    blob: &str,
) -> ServiceResult<OperationRequest> {
    validate_container_name(container)?;
    validate_blob_name(blob)?;
    Ok(OperationRequest::new(operation)
        .path_param("container", container)
        .path_param("blob", blob))
}

/// Download a blob, or a byte range of it.
///
/// A ranged download answers `206 Partial Content`; the returned
/// [`BlobProperties::content_range`] then describes the slice.
///
/// # Tracing
///
/// Emits a span named `blob::download` with fields `container` and `blob`.
#[tracing::instrument(name = "blob::download", skip(client, options))]
pub async fn download(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    options: &DownloadOptions,
) -> ServiceResult<ServiceResponse<Bytes, BlobProperties>> {
    let range = match options.range {
        Some((start, end)) if end < start => {
            return Err(ServiceError::InvalidArgument(format!(
                "range end {end} is before start {start}"
            )));
        }
        Some((start, end)) => Some(byte_range(start, end)),
        None => None,
    };
    tracing::debug!(range = ?range, "downloading blob");

    let request = blob_request(&DOWNLOAD_BLOB, container, blob)?
        .header_opt(RANGE_HEADER, range)
        .header_opt(LEASE_ID_HEADER, options.lease_id.as_deref());

    let response = client
        .service()
        .send(request)
        .await?
        .bytes_with_headers::<BlobProperties>()?;

    tracing::debug!(size = response.body.len(), "blob downloaded");
    Ok(response)
}

/// Read a blob's properties and metadata without its content.
#[tracing::instrument(name = "blob::get_properties", skip(client))]
pub async fn get_properties(client: &BlobServiceClient, container: &str, blob: &str) -> ServiceResult<BlobProperties> {
    let request = blob_request(&GET_BLOB_PROPERTIES, container, blob)?;
    let response = client.service().send(request).await?.headers_only::<BlobProperties>()?;
    Ok(response.headers)
}

/// Delete a blob.
///
/// # Tracing
///
/// Emits a span named `blob::delete` with fields `container` and `blob`.
#[tracing::instrument(name = "blob::delete", skip(client, options))]
pub async fn delete(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    options: &DeleteBlobOptions,
) -> ServiceResult<()> {
    tracing::debug!("deleting blob");

    let request = blob_request(&DELETE_BLOB, container, blob)?
        .header_opt("x-ms-delete-snapshots", options.snapshots.map(|s| s.as_str()))
        .header_opt(LEASE_ID_HEADER, options.lease_id.as_deref());
    client.service().send(request).await?.empty()?;

    tracing::debug!("blob deleted");
    Ok(())
}

/// Replace a blob's metadata.
#[tracing::instrument(name = "blob::set_metadata", skip(client, metadata))]
pub async fn set_metadata(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    metadata: &Metadata,
) -> ServiceResult<ETagHeaders> {
    let request = blob_request(&SET_BLOB_METADATA, container, blob)?.query("comp", "metadata");
    let request = with_metadata(request, metadata)?;
    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;
    Ok(response.headers)
}
