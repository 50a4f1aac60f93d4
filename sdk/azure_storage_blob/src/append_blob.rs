//! Append blobs: blobs that only grow, one block at a time.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::response::{FromHeaders, HeaderReader};
use bytes::Bytes;
use reqwest::Method;

use crate::blob::blob_request;
use crate::client::BlobServiceClient;
use crate::models::{with_metadata, BlobType, ETagHeaders, Metadata, LEASE_ID_HEADER};

static CREATE_APPEND_BLOB: Operation = Operation {
    name: "create_append_blob",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

static APPEND_BLOCK: Operation = Operation {
    name: "append_block",
    method: Method::PUT,
    path: "/{container}/{blob*}",
    success: &[201],
    error_format: ErrorFormat::Xml,
};

/// Options for [`create`].
#[derive(Debug, Clone, Default)]
pub struct CreateAppendBlobOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

/// Conditions for [`append_block`].
#[derive(Debug, Clone, Default)]
pub struct AppendBlockOptions {
    /// Fail with `412` unless the blob is exactly this long.
    pub append_position: Option<u64>,
    /// Fail with `412` if the append would grow the blob past this size.
    pub max_size: Option<u64>,
    pub lease_id: Option<String>,
}

/// Headers returned by [`append_block`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendBlockHeaders {
    pub etag: Option<String>,
    /// Offset at which the block was written.
    pub append_offset: Option<u64>,
    pub committed_block_count: Option<u32>,
}

impl FromHeaders for AppendBlockHeaders {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            etag: headers.optional("ETag"),
            append_offset: headers.parse("x-ms-blob-append-offset")?,
            committed_block_count: headers.parse("x-ms-blob-committed-block-count")?,
        })
    }
}

/// Create an empty append blob, replacing any existing blob.
///
/// # Tracing
///
/// Emits a span named `blob::create_append_blob`.
#[tracing::instrument(name = "blob::create_append_blob", skip(client, options))]
pub async fn create(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    options: &CreateAppendBlobOptions,
) -> ServiceResult<ETagHeaders> {
    let request = blob_request(&CREATE_APPEND_BLOB, container, blob)?
        .header("x-ms-blob-type", BlobType::AppendBlob.as_str())
        .header_opt("x-ms-blob-content-type", options.content_type.as_deref());
    let request = with_metadata(request, &options.metadata)?;

    let response = client.service().send(request).await?.headers_only::<ETagHeaders>()?;
    tracing::debug!("append blob created");
    Ok(response.headers)
}

/// Append a block to the end of an append blob.
///
/// # Tracing
///
/// Emits a span named `blob::append_block`.
#[tracing::instrument(name = "blob::append_block", skip(client, data, options))]
pub async fn append_block(
    client: &BlobServiceClient,
    container: &str,
    blob: &str,
    data: impl Into<Bytes>,
    options: &AppendBlockOptions,
) -> ServiceResult<AppendBlockHeaders> {
    let data = data.into();
    if data.is_empty() {
        return Err(ServiceError::InvalidArgument("append block content must not be empty".into()));
    }
    tracing::debug!(size = data.len(), "appending block");

    let request = blob_request(&APPEND_BLOCK, container, blob)?
        .query("comp", "appendblock")
        .header_opt("x-ms-blob-condition-appendpos", options.append_position.map(|p| p.to_string()))
        .header_opt("x-ms-blob-condition-maxsize", options.max_size.map(|s| s.to_string()))
        .header_opt(LEASE_ID_HEADER, options.lease_id.as_deref())
        .binary_body(data);

    let response = client
        .service()
        .send(request)
        .await?
        .headers_only::<AppendBlockHeaders>()?;

    tracing::debug!(offset = ?response.headers.append_offset, "block appended");
    Ok(response.headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_mock_client;
    use azure_cognitive_core::test_support::xml_error;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_sets_append_blob_type() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("PUT"))
            .and(path("/logs/app.log"))
            .and(header("x-ms-blob-type", "AppendBlob"))
            .and(header("x-ms-blob-content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"0x1\""))
            .expect(1)
            .mount(&server)
            .await;

        let options = CreateAppendBlobOptions {
            content_type: Some("text/plain".into()),
            ..Default::default()
        };
        let headers = create(&client, "logs", "app.log", &options).await.expect("should succeed");
        assert_eq!(headers.etag.as_deref(), Some("\"0x1\""));
    }

    #[tokio::test]
    async fn append_block_reads_offset() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("PUT"))
            .and(path("/logs/app.log"))
            .and(query_param("comp", "appendblock"))
            .and(header("x-ms-blob-condition-appendpos", "512"))
            .and(body_bytes(b"line\n".to_vec()))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-ms-blob-append-offset", "512")
                    .insert_header("x-ms-blob-committed-block-count", "3"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let options = AppendBlockOptions {
            append_position: Some(512),
            ..Default::default()
        };
        let headers = append_block(&client, "logs", "app.log", &b"line\n"[..], &options)
            .await
            .expect("should succeed");
        assert_eq!(headers.append_offset, Some(512));
        assert_eq!(headers.committed_block_count, Some(3));
    }

    #[tokio::test]
    async fn append_position_mismatch_is_precondition_failure() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("PUT"))
            .and(path("/logs/app.log"))
            .respond_with(
                ResponseTemplate::new(412)
                    .insert_header("x-ms-error-code", "AppendPositionConditionNotMet")
                    .set_body_string(xml_error(
                        "AppendPositionConditionNotMet",
                        "The append position condition specified was not met.",
                    )),
            )
            .mount(&server)
            .await;

        let options = AppendBlockOptions {
            append_position: Some(0),
            ..Default::default()
        };
        let err = append_block(&client, "logs", "app.log", "x", &options)
            .await
            .expect_err("should fail");
        assert_eq!(err.status(), Some(412));
        assert_eq!(err.service_code(), Some("AppendPositionConditionNotMet"));
    }

    #[tokio::test]
    async fn empty_append_fails_before_io() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        let err = append_block(&client, "logs", "app.log", Bytes::new(), &AppendBlockOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(0));
    }
}
