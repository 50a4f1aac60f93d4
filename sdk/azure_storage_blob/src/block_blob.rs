//! Block blobs: single-shot upload, or staged blocks committed as a list.
//!
//! Large content is uploaded as blocks with [`stage_block`] and made visible
//! with [`commit_block_list`]. Every block id within a blob must have the
//! same length; [`BlockId::from_index`] produces such ids.
//!
//! ```rust,no_run
//! use azure_storage_blob::block_blob::{self, BlockId, UploadOptions};
//! use azure_storage_blob::client::BlobServiceClient;
//!
//! # async fn example(client: &BlobServiceClient, chunks: Vec<Vec<u8>>) -> azure_cognitive_core::ServiceResult<()> {
//! let mut ids = Vec::new();
//! for (index, chunk) in chunks.into_iter().enumerate() {
//!     let id = BlockId::from_index(index as u64);
//!     block_blob::stage_block(client, "backups", "db.bak", &id, chunk).await?;
//!     ids.push(id);
//! }
//! block_blob::commit_block_list(client, "backups", "db.bak", &ids, &UploadOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use base64::Engine as _;
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use std::fmt;

use crate::blob::blob_request;
use crate::client::BlobServiceClient;
use crate::models::{with_metadata, BlobType, ETagHeaders, Metadata, LEASE_ID_HEADER};

/// Most blocks a blob may have.
pub const MAX_BLOCKS: usize = 50_000;

/// Longest raw block id, before encoding.
pub const MAX_BLOCK_ID_LEN: usize = 64;

static UPLOAD_BLOCK_BLOB: Operation = Operation {
    name: "upload_block_blob",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static STAGE_BLOCK: Operation = Operation {
    name: "stage_block",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static COMMIT_BLOCK_LIST: Operation = Operation {
    name: "commit_block_list",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static GET_BLOCK_LIST: Operation = Operation {
    name: "get_block_list",
    method: Method::GET,
    path: "/{container}/{blob*}",
    success: &[200],
    error_format: ErrorFormat::Xml,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A block identifier, held in its base64-encoded wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId(String);

impl BlockId {
    /// Encode a raw id.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if `raw` is empty or longer
    /// than 64 bytes.
    pub fn new(raw: impl AsRef<[u8]>) -> ServiceResult<Self> {
        let raw = raw.as_ref();
        if raw.is_empty() || raw.len() > MAX_BLOCK_ID_LEN {
            return Err(ServiceError::InvalidArgument(format!(
                "block id must be 1-{MAX_BLOCK_ID_LEN} bytes, got {}",
                raw.len()
            )));
        }
        Ok(Self(base64::engine::general_purpose::STANDARD.encode(raw)))
    }

    /// A fixed-width id for the block at `index`.
    pub fn from_index(index: u64) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(format!("block-{index:020}")))
    }

    /// Wrap an id that is already base64-encoded, e.g. from [`get_block_list`].
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 form sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The raw id, if the wire form is valid base64.
    pub fn decode(&self) -> ServiceResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.0)
            .map_err(|e| ServiceError::InvalidArgument(format!("block id is not base64: {e}")))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for [`upload`] and [`commit_block_list`].
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
    pub lease_id: Option<String>,
}

/// Which blocks [`get_block_list`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockListType {
    Committed,
    Uncommitted,
    #[default]
    All,
}

impl BlockListType {
    /// Returns the API string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Uncommitted => "uncommitted",
            Self::All => "all",
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// The blocks of a blob.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlockList {
    #[serde(rename = "CommittedBlocks", default)]
    pub committed: Blocks,
    #[serde(rename = "UncommittedBlocks", default)]
    pub uncommitted: Blocks,
}

/// A list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Blocks {
    #[serde(rename = "Block", default)]
    pub blocks: Vec<Block>,
}

/// A block and its size.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Block {
    /// The base64-encoded block id.
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

impl Block {
    /// The block id.
    pub fn id(&self) -> BlockId {
        BlockId::from_encoded(self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Render the body of a Put Block List request.
fn block_list_xml(blocks: &[BlockId]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in blocks {
        // Base64 never needs escaping.
        xml.push_str("<Latest>");
        xml.push_str(id.as_str());
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

/// Upload an entire block blob in one request, replacing any existing blob.
///
/// # Tracing
///
/// Emits a span named `blob::upload` with fields `container`, `blob` and `size`.
#[tracing::instrument(
    name = "blob::upload",
    skip(client, data, options),
    fields(size = tracing::field::Empty)
)]
pub async fn upload(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    data: impl Into<Bytes>,
    options: &UploadOptions,
) -> ServiceResult<ETagHeaders> {
    let data = data.into();
    tracing::Span::current().record("size", data.len());
    tracing::debug!("uploading block blob");

    let request = blob_request(&UPLOAD_BLOCK_BLOB, container, blob)?
        .header("x-ms-blob-type", BlobType::BlockBlob.as_str())
        .header_opt("x-ms-blob-content-type", options.content_type.as_deref())
        .header_opt(LEASE_ID_HEADER, options.lease_id.as_deref())
        .binary_body(data);
    let request = with_metadata(request, &options.metadata)?;

    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;

    tracing::debug!("block blob uploaded");
    Ok(response.headers)
}

/// Upload one uncommitted block.
///
/// # Tracing
///
/// Emits a span named `blob::stage_block` with field `block_id`.
#[tracing::instrument(name = "blob::stage_block", skip(client, data), fields(block_id = %block_id))]
pub async fn stage_block(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    block_id: &BlockId,
    data: impl Into<Bytes>,
) -> ServiceResult<()> {
    let data = data.into();
    if data.is_empty() {
        return Err(ServiceError::InvalidArgument("block content must not be empty".into()));
    }
    tracing::debug!(size = data.len(), "staging block");

    let request = blob_request(&STAGE_BLOCK, container, blob)?
        .query("comp", "block")
        .query("blockid", block_id.as_str())
        .binary_body(data);
    client.service().send(request).await?.empty()?;

    tracing::debug!("block staged");
    Ok(())
}

/// Commit staged (or previously committed) blocks, in order, as the blob's content.
///
/// # Tracing
///
/// Emits a span named `blob::commit_block_list` with field `blocks`.
#[tracing::instrument(
    name = "blob::commit_block_list",
    skip(client, blocks, options),
    fields(blocks = blocks.len())
)]
pub async fn commit_block_list(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    blocks: &[BlockId],
    options: &UploadOptions,
) -> ServiceResult<ETagHeaders> {
    if blocks.len() > MAX_BLOCKS {
        return Err(ServiceError::InvalidArgument(format!(
            "a blob holds at most {MAX_BLOCKS} blocks, got {}",
            blocks.len()
        )));
    }
    tracing::debug!("committing block list");

    let request = blob_request(&COMMIT_BLOCK_LIST, container, blob)?
        .query("comp", "blocklist")
        .header_opt("x-ms-blob-content-type", options.content_type.as_deref())
        .header_opt(LEASE_ID_HEADER, options.lease_id.as_deref())
        .xml_body(block_list_xml(blocks));
    let request = with_metadata(request, &options.metadata)?;

    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;

    tracing::debug!("block list committed");
    Ok(response.headers)
}

/// List a blob's committed and/or uncommitted blocks.
#[tracing::instrument(name = "blob::get_block_list", skip(client))]
pub async fn get_block_list(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    list_type: BlockListType,
) -> ServiceResult<BlockList> {
    let request = blob_request(&GET_BLOCK_LIST, container, blob)?
        .query("comp", "blocklist")
        .query("blocklisttype", list_type.as_str());
    client.service().send(request).await?.xml()
}
