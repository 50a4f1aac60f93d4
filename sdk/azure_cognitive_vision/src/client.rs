//! Computer Vision client configuration.
//!
//! The service is reached either through a regional host
//! (`https://{AzureRegion}.api.cognitive.microsoft.com/vision/v2.0`) or a
//! custom resource endpoint (`{Endpoint}/vision/v2.0`). The region is a host
//! parameter resolved on every call, so a client built without one fails
//! with [`ServiceError::InvalidArgument`] before any request is sent.

use azure_cognitive_core::auth::ServiceCredential;
use azure_cognitive_core::client::ServiceClient;
use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::pipeline::RetryPolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Regional base URL template.
pub const REGIONAL_BASE_URL: &str = "https://{AzureRegion}.api.cognitive.microsoft.com/vision/v2.0";

/// Host parameter holding the region.
pub const REGION_PARAMETER: &str = "AzureRegion";

/// Path appended to a custom resource endpoint.
const VERSION_PATH: &str = "/vision/v2.0";

const ENDPOINT_ENV: &str = "AZURE_COMPUTER_VISION_ENDPOINT";
const KEY_ENV: &str = "AZURE_COMPUTER_VISION_KEY";
const REGION_ENV: &str = "AZURE_COMPUTER_VISION_REGION";

/// Azure regions hosting the Computer Vision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AzureRegion {
    WestUs,
    WestUs2,
    EastUs,
    EastUs2,
    WestCentralUs,
    SouthCentralUs,
    WestEurope,
    NorthEurope,
    SoutheastAsia,
    EastAsia,
    AustraliaEast,
    BrazilSouth,
    CanadaCentral,
    CentralIndia,
    UkSouth,
    JapanEast,
}

impl AzureRegion {
    /// Every supported region.
    pub const ALL: [AzureRegion; 16] = [
        Self::WestUs,
        Self::WestUs2,
        Self::EastUs,
        Self::EastUs2,
        Self::WestCentralUs,
        Self::SouthCentralUs,
        Self::WestEurope,
        Self::NorthEurope,
        Self::SoutheastAsia,
        Self::EastAsia,
        Self::AustraliaEast,
        Self::BrazilSouth,
        Self::CanadaCentral,
        Self::CentralIndia,
        Self::UkSouth,
        Self::JapanEast,
    ];

    /// The host label of this region.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WestUs => "westus",
            Self::WestUs2 => "westus2",
            Self::EastUs => "eastus",
            Self::EastUs2 => "eastus2",
            Self::WestCentralUs => "westcentralus",
            Self::SouthCentralUs => "southcentralus",
            Self::WestEurope => "westeurope",
            Self::NorthEurope => "northeurope",
            Self::SoutheastAsia => "southeastasia",
            Self::EastAsia => "eastasia",
            Self::AustraliaEast => "australiaeast",
            Self::BrazilSouth => "brazilsouth",
            Self::CanadaCentral => "canadacentral",
            Self::CentralIndia => "centralindia",
            Self::UkSouth => "uksouth",
            Self::JapanEast => "japaneast",
        }
    }
}

impl fmt::Display for AzureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AzureRegion {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|region| region.as_str() == wanted)
            .ok_or_else(|| ServiceError::InvalidArgument(format!("unknown Azure region '{s}'")))
    }
}

/// Client for the Computer Vision v2.0 API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ComputerVisionClient {
    service: ServiceClient,
}

/// Builder for [`ComputerVisionClient`].
#[derive(Debug, Default)]
pub struct ComputerVisionClientBuilder {
    region: Option<AzureRegion>,
    endpoint: Option<String>,
    base_url: Option<String>,
    credential: Option<ServiceCredential>,
    accept_language: Option<String>,
    client_request_id: Option<bool>,
    retry_policy: Option<RetryPolicy>,
    http_client: Option<reqwest::Client>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl ComputerVisionClient {
    /// Create a new builder.
    pub fn builder() -> ComputerVisionClientBuilder {
        ComputerVisionClientBuilder::default()
    }

    /// The underlying dispatcher.
    pub fn service(&self) -> &ServiceClient {
        &self.service
    }

    /// The configured region, if any.
    pub fn region(&self) -> Option<&str> {
        self.service.host_parameter(REGION_PARAMETER)
    }

    /// Return a copy of this client targeting `region`.
    pub fn with_region(&self, region: AzureRegion) -> Self {
        Self {
            service: self.service.with_host_parameter(REGION_PARAMETER, region.as_str()),
        }
    }

    /// Return a copy of this client sending a different `accept-language`.
    pub fn with_accept_language(&self, language: impl Into<String>) -> Self {
        Self {
            service: self.service.with_accept_language(Some(language.into())),
        }
    }
}

impl ComputerVisionClientBuilder {
    /// Use the regional host for `region`.
    ///
    /// If not set, the builder checks `AZURE_COMPUTER_VISION_REGION`.
    pub fn region(mut self, region: AzureRegion) -> Self {
        self.region = Some(region);
        self
    }

    /// Use a custom resource endpoint, e.g. `https://my-resource.cognitiveservices.azure.com`.
    ///
    /// `/vision/v2.0` is appended. If not set, the builder checks
    /// `AZURE_COMPUTER_VISION_ENDPOINT`, then falls back to the regional host.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use a raw base URL template, taking precedence over the endpoint.
    ///
    /// The template may contain an `{AzureRegion}` token.
    pub fn base_url(mut self, template: impl Into<String>) -> Self {
        self.base_url = Some(template.into());
        self
    }

    /// Set the credential.
    ///
    /// If not set, the builder reads a subscription key from
    /// `AZURE_COMPUTER_VISION_KEY`.
    pub fn credential(mut self, credential: ServiceCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the `accept-language` header (default `en-US`).
    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
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
    /// # Errors
    ///
    /// Returns an error if no credential is configured, the region variable
    /// names an unknown region, or the endpoint is not a valid URL.
    pub fn build(self) -> ServiceResult<ComputerVisionClient> {
        let base_url = match (self.base_url, self.endpoint.or_else(|| env_var(ENDPOINT_ENV))) {
            (Some(template), _) => template,
            (None, Some(endpoint)) => format!("{}{VERSION_PATH}", endpoint.trim_end_matches('/')),
            (None, None) => REGIONAL_BASE_URL.to_string(),
        };

        let region = match self.region {
            Some(region) => Some(region),
            None => env_var(REGION_ENV).map(|r| r.parse::<AzureRegion>()).transpose()?,
        };

        let credential = match self.credential {
            Some(credential) => credential,
            None => ServiceCredential::from_env(KEY_ENV)?,
        };

        let mut builder = ServiceClient::builder().base_url(base_url).credential(credential);

        if let Some(region) = region {
            builder = builder.host_parameter(REGION_PARAMETER, region.as_str());
        }
        if let Some(language) = self.accept_language {
            builder = builder.accept_language(language);
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

        Ok(ComputerVisionClient {
            service: builder.build()?,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
