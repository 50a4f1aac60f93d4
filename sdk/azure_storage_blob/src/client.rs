//! Blob service client configuration.

use azure_cognitive_core::auth::ServiceCredential;
use azure_cognitive_core::client::ServiceClient;
use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::pipeline::RetryPolicy;
use std::time::Duration;
use url::Url;

use crate::models::{validate_blob_name, validate_container_name};
use crate::sas::SasToken;

/// Public-cloud blob endpoint template.
pub const BLOB_BASE_URL: &str = "https://{accountName}.blob.core.windows.net";

/// Host parameter holding the storage account name.
pub const ACCOUNT_PARAMETER: &str = "accountName";

/// REST API version sent as `x-ms-version`.
pub const STORAGE_VERSION: &str = "2021-08-06";

/// OAuth scope for bearer tokens.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

const VERSION_HEADER: &str = "x-ms-version";
const ACCOUNT_ENV: &str = "AZURE_STORAGE_ACCOUNT";
const SAS_ENV: &str = "AZURE_STORAGE_SAS_TOKEN";

/// Client for the Blob service of one storage account.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BlobServiceClient {
    service: ServiceClient,
}

/// Builder for [`BlobServiceClient`].
#[derive(Debug, Default)]
pub struct BlobServiceClientBuilder {
    account_name: Option<String>,
    endpoint: Option<String>,
    credential: Option<ServiceCredential>,
    sas_token: Option<SasToken>,
    client_request_id: Option<bool>,
    retry_policy: Option<RetryPolicy>,
    http_client: Option<reqwest::Client>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl BlobServiceClient {
    /// Create a new builder.
    pub fn builder() -> BlobServiceClientBuilder {
        BlobServiceClientBuilder::default()
    }

    /// The underlying dispatcher.
    pub fn service(&self) -> &ServiceClient {
        &self.service
    }

    /// The configured account name, if any.
    pub fn account_name(&self) -> Option<&str> {
        self.service.host_parameter(ACCOUNT_PARAMETER)
    }

    /// Return a copy of this client targeting another account.
    pub fn with_account_name(&self, account_name: impl Into<String>) -> Self {
        Self {
            service: self.service.with_host_parameter(ACCOUNT_PARAMETER, account_name),
        }
    }

    /// The URL of a blob, without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] for an invalid container or
    /// blob name or a missing account name.
    pub fn blob_url(&self, container: &str, blob: &str) -> ServiceResult<Url> {
        validate_container_name(container)?;
        validate_blob_name(blob)?;

        let mut url = self.service.resolve_base_url()?;
        url.path_segments_mut()
            .map_err(|()| ServiceError::invalid_endpoint("base URL cannot carry a path"))?
            .pop_if_empty()
            .push(container)
            .extend(blob.split('/'));
        Ok(url)
    }

    /// A shareable URL granting the access carried by `sas`.
    ///
    /// The token is appended as given; nothing is signed here.
    pub fn blob_url_with_sas(&self, container: &str, blob: &str, sas: &SasToken) -> ServiceResult<Url> {
        let mut url = self.blob_url(container, blob)?;
        url.set_query(Some(sas.query()));
        Ok(url)
    }
}

impl BlobServiceClientBuilder {
    /// Set the storage account name.
    ///
    /// If not set, the builder checks `AZURE_STORAGE_ACCOUNT`.
    pub fn account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Use a custom endpoint (emulator, sovereign cloud, private link).
    ///
    /// May contain an `{accountName}` token.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Authenticate with a SAS token.
    pub fn sas_token(mut self, sas_token: SasToken) -> Self {
        self.sas_token = Some(sas_token);
        self
    }

    /// Set the credential, taking precedence over a SAS token.
    ///
    /// Token providers are asked for the `https://storage.azure.com/.default` scope.
    pub fn credential(mut self, credential: ServiceCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Enable or disable the generated `x-ms-client-request-id` header.
    pub fn generate_client_request_id(mut self, enabled: bool) -> Self {
        self.client_request_id = Some(enabled);
        self
    }

    /// Set the retry policy (no retries by default).
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Build the client.
    ///
    /// Without a credential or SAS token the builder reads
    /// `AZURE_STORAGE_SAS_TOKEN`, and otherwise uses anonymous access.
    ///
    /// # Errors
    ///
    /// Returns an error if the SAS token in the environment is malformed or
    /// the endpoint is not a valid URL.
    pub fn build(self) -> ServiceResult<BlobServiceClient> {
        let credential = match (self.credential, self.sas_token) {
            (Some(credential), _) => credential,
            (None, Some(sas)) => sas.to_credential(),
            (None, None) => match env_var(SAS_ENV) {
                Some(raw) => SasToken::parse(&raw)?.to_credential(),
                None => ServiceCredential::Anonymous,
            },
        };

        let mut builder = ServiceClient::builder()
            .base_url(self.endpoint.unwrap_or_else(|| BLOB_BASE_URL.to_string()))
            .credential(credential)
            .token_scope(STORAGE_SCOPE)
            .default_header(VERSION_HEADER, STORAGE_VERSION)
            .without_accept_language();

        if let Some(account) = self.account_name.or_else(|| env_var(ACCOUNT_ENV)) {
            builder = builder.host_parameter(ACCOUNT_PARAMETER, account);
        }
        if let Some(enabled) = self.client_request_id {
            builder = builder.generate_client_request_id(enabled);
        }
        if let Some(policy) = self.retry_policy {
            builder = builder.retry_policy(policy);
        }
        if let Some(client) = self.http_client {
            builder = builder.http_client(client);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }

        Ok(BlobServiceClient {
            service: builder.build()?,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
