//! Container operations and listings.
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_storage_blob::client::BlobServiceClient;
//! use azure_storage_blob::container::{self, CreateContainerOptions, ListBlobsOptions};
//!
//! # async fn example(client: &BlobServiceClient) -> azure_cognitive_core::ServiceResult<()> {
//! container::create(client, "photos", &CreateContainerOptions::default()).await?;
//!
//! let options = ListBlobsOptions::new().prefix("2024/").delimiter("/");
//! let page = container::list_blobs(client, "photos", &options).await?;
//! for blob in &page.blobs.items {
//!     println!("{}", blob.name);
//! }
//! # Ok(())
//! # }
//! ```

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::request::OperationRequest;
use reqwest::Method;
use serde::{Deserialize, Deserializer};

use crate::client::BlobServiceClient;
use crate::models::{
    validate_container_name, with_metadata, BlobType, ContainerProperties, ETagHeaders, Metadata, PublicAccess,
};

/// Largest page size accepted by listing operations.
pub const MAX_RESULTS_LIMIT: u32 = 5000;

static CREATE_CONTAINER: Operation = Operation {
    name: "create_container",
    method: Method::PUT,
    path: "/{container}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static DELETE_CONTAINER: Operation = Operation {
    name: "delete_container",
    method: Method::DELETE,
    path: "/{container}",
    success: &[202],
    error_format: ErrorFormat::Xml,
};

static GET_CONTAINER_PROPERTIES: Operation = Operation {
    name: "get_container_properties",
    method: Method::GET,
    path: "/{container}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

static SET_CONTAINER_METADATA: Operation = Operation {
    name: "set_container_metadata",
    method: Method::PUT,
    path: "/{container}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

static LIST_BLOBS: Operation = Operation {
    name: "list_blobs",
    method: Method::GET,
    path: "/{container}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

static LIST_CONTAINERS: Operation = Operation {
    name: "list_containers",
    method: Method::GET,
    path: "/",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Options for [`create`].
#[derive(Debug, Clone, Default)]
pub struct CreateContainerOptions {
    /// Anonymous access level; private when `None`.
    pub public_access: Option<PublicAccess>,
    pub metadata: Metadata,
}

/// Datasets to include in a blob listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListBlobsInclude {
    Metadata,
    Snapshots,
    Uncommitted,
    Deleted,
}

impl ListBlobsInclude {
    /// Returns the API string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Snapshots => "snapshots",
            Self::Uncommitted => "uncommittedblobs",
            Self::Deleted => "deleted",
        }
    }
}

/// Options for [`list_blobs`].
#[derive(Debug, Clone, Default)]
pub struct ListBlobsOptions {
    prefix: Option<String>,
    delimiter: Option<String>,
    marker: Option<String>,
    max_results: Option<u32>,
    include: Vec<ListBlobsInclude>,
}

impl ListBlobsOptions {
    /// Options with every parameter unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only list blobs whose names start with `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Group names sharing a prefix up to `delimiter` into [`BlobPrefix`] entries.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Continue from the `NextMarker` of a previous page.
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Page size (1..=5000).
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Additional datasets to include.
    pub fn include(mut self, include: impl IntoIterator<Item = ListBlobsInclude>) -> Self {
        self.include = include.into_iter().collect();
        self
    }
}

/// Options for [`list_containers`].
#[derive(Debug, Clone, Default)]
pub struct ListContainersOptions {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_results: Option<u32>,
    pub include_metadata: bool,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One page of a blob listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListBlobsResult {
    #[serde(rename = "Prefix")]
    pub prefix: Option<String>,
    #[serde(rename = "Delimiter")]
    pub delimiter: Option<String>,
    #[serde(rename = "MaxResults")]
    pub max_results: Option<u32>,
    #[serde(rename = "Blobs", default)]
    pub blobs: BlobEntries,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
}

impl ListBlobsResult {
    /// The marker for the next page, or `None` on the last page.
    pub fn next_marker(&self) -> Option<&str> {
        self.next_marker.as_deref().filter(|m| !m.is_empty())
    }
}

/// The blobs and virtual directories in a listing page.
///
/// The service interleaves both kinds in name order; each keeps that order
/// here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawBlobEntries")]
pub struct BlobEntries {
    pub items: Vec<BlobItem>,
    pub prefixes: Vec<BlobPrefix>,
}

#[derive(Deserialize)]
struct RawBlobEntries {
    #[serde(rename = "#content", default)]
    entries: Vec<BlobEntry>,
}

#[derive(Deserialize)]
enum BlobEntry {
    #[serde(rename = "Blob")]
    Blob(BlobItem),
    #[serde(rename = "BlobPrefix")]
    Prefix(BlobPrefix),
}

impl From<RawBlobEntries> for BlobEntries {
    fn from(raw: RawBlobEntries) -> Self {
        let mut entries = Self::default();
        for entry in raw.entries {
            match entry {
                BlobEntry::Blob(item) => entries.items.push(item),
                BlobEntry::Prefix(prefix) => entries.prefixes.push(prefix),
            }
        }
        entries
    }
}

/// A blob in a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlobItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Snapshot")]
    pub snapshot: Option<String>,
    #[serde(rename = "Properties")]
    pub properties: BlobItemProperties,
    #[serde(rename = "Metadata", default)]
    pub metadata: Metadata,
}

/// Properties of a listed blob.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlobItemProperties {
    #[serde(rename = "Last-Modified")]
    pub last_modified: Option<String>,
    #[serde(rename = "Etag")]
    pub etag: Option<String>,
    #[serde(rename = "Content-Length")]
    pub content_length: Option<u64>,
    #[serde(rename = "Content-Type")]
    pub content_type: Option<String>,
    #[serde(rename = "BlobType")]
    pub blob_type: Option<BlobType>,
    #[serde(rename = "LeaseStatus")]
    pub lease_status: Option<String>,
    #[serde(rename = "LeaseState")]
    pub lease_state: Option<String>,
}

/// A virtual directory produced by a delimiter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlobPrefix {
    #[serde(rename = "Name")]
    pub name: String,
}

/// One page of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListContainersResult {
    #[serde(rename = "Prefix")]
    pub prefix: Option<String>,
    #[serde(rename = "MaxResults")]
    pub max_results: Option<u32>,
    #[serde(rename = "Containers", default, deserialize_with = "container_items")]
    pub containers: Vec<ContainerItem>,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
}

impl ListContainersResult {
    /// The marker for the next page, or `None` on the last page.
    pub fn next_marker(&self) -> Option<&str> {
        self.next_marker.as_deref().filter(|m| !m.is_empty())
    }
}

/// A container in a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContainerItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default)]
    pub properties: ContainerItemProperties,
    #[serde(rename = "Metadata", default)]
    pub metadata: Metadata,
}

/// Properties of a listed container.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContainerItemProperties {
    #[serde(rename = "Last-Modified")]
    pub last_modified: Option<String>,
    #[serde(rename = "Etag")]
    pub etag: Option<String>,
    #[serde(rename = "LeaseStatus")]
    pub lease_status: Option<String>,
    #[serde(rename = "LeaseState")]
    pub lease_state: Option<String>,
    #[serde(rename = "PublicAccess")]
    pub public_access: Option<String>,
}

#[derive(Deserialize)]
struct ContainerItems {
    #[serde(rename = "Container", default)]
    items: Vec<ContainerItem>,
}

fn container_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ContainerItem>, D::Error> {
    Ok(ContainerItems::deserialize(deserializer)?.items)
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

fn container_request(operation: &'static Operation, container: &str) -> ServiceResult<OperationRequest> {
    validate_container_name(container)?;
    Ok(OperationRequest::new(operation)
        .path_param("container", container)
        .query("restype", "container"))
}

fn check_max_results(max_results: Option<u32>) -> ServiceResult<()> {
    match max_results {
        Some(n) if n == 0 || n > MAX_RESULTS_LIMIT => Err(ServiceError::InvalidArgument(format!(
            "max_results {n} is outside valid range (1..={MAX_RESULTS_LIMIT})"
        ))),
        _ => Ok(()),
    }
}

/// Create a container.
///
/// # Tracing
///
/// Emits a span named `blob::create_container` with field `container`.
#[tracing::instrument(name = "blob::create_container", skip(client, options))]
pub async fn create(
    client: &BlobServiceClient,
    container: &str,
    options: &CreateContainerOptions,
) -> ServiceResult<ETagHeaders> {
    tracing::debug!("creating container");

    let request = container_request(&CREATE_CONTAINER, container)?
        .header_opt("x-ms-blob-public-access", options.public_access.map(|p| p.as_str()));
    let request = with_metadata(request, &options.metadata)?;

    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;

    tracing::debug!("container created");
    Ok(response.headers)
}

/// Mark a container for deletion.
///
/// # Tracing
///
/// Emits a span named `blob::delete_container` with field `container`.
#[tracing::instrument(name = "blob::delete_container", skip(client))]
pub async fn delete(client: &BlobServiceClient, container: &str) -> ServiceResult<()> {
    tracing::debug!("deleting container");

    let request = container_request(&DELETE_CONTAINER, container)?;
    client.service().send(request).await?.empty()?;

    tracing::debug!("container deleted");
    Ok(())
}

/// Read a container's properties and metadata.
#[tracing::instrument(name = "blob::get_container_properties", skip(client))]
pub async fn get_properties(client: &BlobServiceClient, container: &str) -> ServiceResult<ContainerProperties> {
    let request = container_request(&GET_CONTAINER_PROPERTIES, container)?;
    let response = client
        .service()
        .send(request)
        .await?
        .headers_only::<ContainerProperties>()?;
    Ok(response.headers)
}

/// Replace a container's metadata.
#[tracing::instrument(name = "blob::set_container_metadata", skip(client, metadata))]
pub async fn set_metadata(
    client: &BlobServiceClient,
    container: &str,
    metadata: &Metadata,
) -> ServiceResult<ETagHeaders> {
    let request = container_request(&SET_CONTAINER_METADATA, container)?.query("comp", "metadata");
    let request = with_metadata(request, metadata)?;
    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;
    Ok(response.headers)
}

/// List one page of blobs in a container.
///
/// # Tracing
///
/// Emits a span named `blob::list_blobs` with field `container`.
#[tracing::instrument(name = "blob::list_blobs", skip(client, options))]
pub async fn list_blobs(
    client: &BlobServiceClient,
    container: &str,
    options: &ListBlobsOptions,
) -> ServiceResult<ListBlobsResult> {
    check_max_results(options.max_results)?;
    tracing::debug!("listing blobs");

    let request = container_request(&LIST_BLOBS, container)?
        .query("comp", "list")
        .query_opt("prefix", options.prefix.as_deref())
        .query_opt("delimiter", options.delimiter.as_deref())
        .query_opt("marker", options.marker.as_deref())
        .query_opt("maxresults", options.max_results)
        .query_list("include", options.include.iter().map(ListBlobsInclude::as_str));

    let result: ListBlobsResult = client.service().send(request).await?.xml()?;

    tracing::debug!(
        blobs = result.blobs.items.len(),
        prefixes = result.blobs.prefixes.len(),
        more = result.next_marker().is_some(),
        "blobs listed"
    );
    Ok(result)
}

/// List one page of containers in the account.
///
/// # Tracing
///
/// Emits a span named `blob::list_containers`.
#[tracing::instrument(name = "blob::list_containers", skip(client, options))]
pub async fn list_containers(
    client: &BlobServiceClient,
    options: &ListContainersOptions,
) -> ServiceResult<ListContainersResult> {
    check_max_results(options.max_results)?;
    tracing::debug!("listing containers");

    let request = OperationRequest::new(&LIST_CONTAINERS)
        .query("comp", "list")
        .query_opt("prefix", options.prefix.as_deref())
        .query_opt("marker", options.marker.as_deref())
        .query_opt("maxresults", options.max_results)
        .query_opt("include", options.include_metadata.then_some("metadata"));

    let result: ListContainersResult = client.service().send(request).await?.xml()?;

    tracing::debug!(containers = result.containers.len(), "containers listed");
    Ok(result)
}
