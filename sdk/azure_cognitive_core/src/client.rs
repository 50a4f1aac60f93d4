//! HTTP dispatcher shared by all service clients.
//!
//! [`ServiceClient`] owns the `reqwest` client and the per-service
//! configuration: a base URL template whose `{name}` tokens are filled from
//! host parameters, the credential, and the standard headers. Service crates
//! wrap it and describe their endpoints with static
//! [`Operation`](crate::operation::Operation) descriptors.
//!
//! ```rust,no_run
//! use azure_cognitive_core::auth::ServiceCredential;
//! use azure_cognitive_core::client::ServiceClient;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServiceClient::builder()
//!     .base_url("https://{accountName}.blob.core.windows.net")
//!     .host_parameter("accountName", "myaccount")
//!     .default_header("x-ms-version", "2021-08-06")
//!     .credential(ServiceCredential::query_token("sv=2021-08-06&sig=..."))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::{ResolvedCredential, ServiceCredential};
use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::{
    is_retriable_status, new_client_request_id, RetryPolicy, ACCEPT_LANGUAGE_HEADER, CLIENT_REQUEST_ID_HEADER,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_USER_AGENT,
};
use crate::request::{OperationRequest, RequestBody, APPLICATION_XML, OCTET_STREAM};
use crate::response::ResponseEnvelope;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client as HttpClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default value of the `accept-language` header.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US";

#[derive(Debug)]
struct ClientConfig {
    base_url: String,
    host_parameters: BTreeMap<String, String>,
    credential: ServiceCredential,
    token_scope: Option<String>,
    accept_language: Option<String>,
    generate_client_request_id: bool,
    user_agent: String,
    default_headers: Vec<(String, String)>,
    retry_policy: RetryPolicy,
}

/// The shared dispatcher for one service.
///
/// The client is cheaply cloneable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: HttpClient,
    config: Arc<ClientConfig>,
}

/// Builder for constructing a [`ServiceClient`].
///
/// Use [`ServiceClient::builder()`] to create a new builder.
#[derive(Debug)]
pub struct ServiceClientBuilder {
    base_url: Option<String>,
    host_parameters: BTreeMap<String, String>,
    credential: Option<ServiceCredential>,
    token_scope: Option<String>,
    accept_language: Option<String>,
    generate_client_request_id: bool,
    user_agent: Option<String>,
    default_headers: Vec<(String, String)>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl Default for ServiceClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            host_parameters: BTreeMap::new(),
            credential: None,
            token_scope: None,
            accept_language: Some(DEFAULT_ACCEPT_LANGUAGE.to_string()),
            generate_client_request_id: true,
            user_agent: None,
            default_headers: Vec::new(),
            http_client: None,
            connect_timeout: None,
            read_timeout: None,
            retry_policy: None,
        }
    }
}

impl ServiceClient {
    /// Create a new builder for configuring a `ServiceClient`.
    pub fn builder() -> ServiceClientBuilder {
        ServiceClientBuilder::default()
    }

    /// The base URL template, with `{name}` tokens unresolved.
    pub fn base_url_template(&self) -> &str {
        &self.config.base_url
    }

    /// The value of a host parameter, if set.
    pub fn host_parameter(&self, name: &str) -> Option<&str> {
        self.config.host_parameters.get(name).map(String::as_str)
    }

    /// The `accept-language` value sent with every request, if any.
    pub fn accept_language(&self) -> Option<&str> {
        self.config.accept_language.as_deref()
    }

    /// Whether a fresh `x-ms-client-request-id` is generated per call.
    pub fn generates_client_request_id(&self) -> bool {
        self.config.generate_client_request_id
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry_policy
    }

    /// Return a copy of this client with a host parameter set.
    ///
    /// The underlying connection pool is shared with the original.
    pub fn with_host_parameter(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_config(|config| {
            config.host_parameters.insert(name.into(), value.into());
        })
    }

    /// Return a copy of this client with a different `accept-language` value.
    ///
    /// `None` stops the header from being sent.
    pub fn with_accept_language(&self, language: Option<String>) -> Self {
        self.with_config(|config| config.accept_language = language)
    }

    /// Return a copy of this client with client request id generation toggled.
    pub fn with_client_request_id(&self, enabled: bool) -> Self {
        self.with_config(|config| config.generate_client_request_id = enabled)
    }

    fn with_config(&self, update: impl FnOnce(&mut ClientConfig)) -> Self {
        let mut config = ClientConfig {
            base_url: self.config.base_url.clone(),
            host_parameters: self.config.host_parameters.clone(),
            credential: self.config.credential.clone(),
            token_scope: self.config.token_scope.clone(),
            accept_language: self.config.accept_language.clone(),
            generate_client_request_id: self.config.generate_client_request_id,
            user_agent: self.config.user_agent.clone(),
            default_headers: self.config.default_headers.clone(),
            retry_policy: self.config.retry_policy.clone(),
        };
        update(&mut config);
        Self {
            http: self.http.clone(),
            config: Arc::new(config),
        }
    }

    /// Resolve the base URL template against the host parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if a `{name}` token has no
    /// non-empty value, and [`ServiceError::InvalidEndpoint`] if the result is
    /// not a valid URL.
    pub fn resolve_base_url(&self) -> ServiceResult<Url> {
        let resolved = substitute_host_parameters(&self.config.base_url, &self.config.host_parameters)?;
        Url::parse(&resolved).map_err(|e| ServiceError::invalid_endpoint_with_source("invalid base URL", e))
    }

    /// Build the full request URL for `request`, without credentials.
    pub fn resolve_url(&self, request: &OperationRequest) -> ServiceResult<Url> {
        let mut url = self.resolve_base_url()?;
        let segments = request.operation().render_segments(request.path_params())?;

        url.path_segments_mut()
            .map_err(|()| ServiceError::invalid_endpoint("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments.iter());

        if !request.query_pairs().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in request.query_pairs() {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    /// Execute one operation call and return the raw response envelope.
    ///
    /// URL and parameter validation happen before any network I/O. The
    /// status is not classified here; use the projection methods on
    /// [`ResponseEnvelope`] to obtain the typed result or error.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built, the credential cannot be
    /// resolved, a header is invalid, or the HTTP exchange fails.
    ///
    /// # Tracing
    ///
    /// Emits a span named `cognitive::send` with field `operation`.
    #[tracing::instrument(
        name = "cognitive::send",
        skip(self, request),
        fields(operation = request.operation().name)
    )]
    pub async fn send(&self, request: OperationRequest) -> ServiceResult<ResponseEnvelope> {
        let operation = request.operation();
        let mut url = self.resolve_url(&request)?;

        let credential = self
            .config
            .credential
            .resolve(self.config.token_scope.as_deref())
            .await?;

        let (extra_headers, body) = request.into_parts();
        let mut headers = self.standard_headers()?;

        match credential {
            ResolvedCredential::Header { name, value } => {
                let mut value = header_value(name, &value)?;
                value.set_sensitive(true);
                headers.insert(header_name(name)?, value);
            }
            ResolvedCredential::Query(token) => append_query_token(&mut url, &token),
            ResolvedCredential::None => {}
        }

        for (name, value) in &extra_headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        let body = match body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => {
                set_default_content_type(&mut headers, "application/json");
                Some(Bytes::from(serde_json::to_vec(&value)?))
            }
            RequestBody::Binary(bytes) => {
                set_default_content_type(&mut headers, OCTET_STREAM);
                Some(bytes)
            }
            RequestBody::Xml(xml) => {
                set_default_content_type(&mut headers, APPLICATION_XML);
                Some(Bytes::from(xml))
            }
        };

        let policy = &self.config.retry_policy;
        let mut attempt = 0;
        loop {
            tracing::trace!(method = %operation.method, url = %redact_query(&url), attempt, "sending request");

            let mut builder = self
                .http
                .request(operation.method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            } else if operation.method == reqwest::Method::PUT || operation.method == reqwest::Method::POST {
                builder = builder.body(Bytes::new());
            }

            let response = builder.send().await.map_err(|source| ServiceError::Transport {
                operation: operation.name,
                source,
            })?;

            let status = response.status().as_u16();
            let response_headers = response.headers().clone();
            let payload = response.bytes().await.map_err(|source| ServiceError::Transport {
                operation: operation.name,
                source,
            })?;

            if !operation.is_success(status) && is_retriable_status(status) && attempt < policy.max_retries {
                let backoff = policy.backoff(attempt);
                tracing::debug!(status, attempt, backoff_ms = backoff.as_millis() as u64, "retrying after transient error");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            tracing::debug!(status, "received response");
            return Ok(ResponseEnvelope::new(operation, status, response_headers, payload));
        }
    }

    fn standard_headers(&self) -> ServiceResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("User-Agent", &self.config.user_agent)?);

        if let Some(language) = &self.config.accept_language {
            headers.insert(
                HeaderName::from_static(ACCEPT_LANGUAGE_HEADER),
                header_value(ACCEPT_LANGUAGE_HEADER, language)?,
            );
        }

        if self.config.generate_client_request_id {
            headers.insert(
                HeaderName::from_static(CLIENT_REQUEST_ID_HEADER),
                header_value(CLIENT_REQUEST_ID_HEADER, &new_client_request_id())?,
            );
        }

        for (name, value) in &self.config.default_headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }

        Ok(headers)
    }
}

impl ServiceClientBuilder {
    /// Set the base URL template.
    ///
    /// `{name}` tokens are replaced by host parameters when a call is made,
    /// for example `https://{AzureRegion}.api.cognitive.microsoft.com/vision/v2.0`.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a value for a `{name}` token in the base URL template.
    pub fn host_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.host_parameters.insert(name.into(), value.into());
        self
    }

    /// Set the credential to use for authentication.
    ///
    /// Defaults to [`ServiceCredential::Anonymous`].
    pub fn credential(mut self, credential: ServiceCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the OAuth scope requested from a token provider credential.
    pub fn token_scope(mut self, scope: impl Into<String>) -> Self {
        self.token_scope = Some(scope.into());
        self
    }

    /// Set the `accept-language` header value.
    ///
    /// Defaults to [`DEFAULT_ACCEPT_LANGUAGE`].
    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }

    /// Do not send an `accept-language` header.
    pub fn without_accept_language(mut self) -> Self {
        self.accept_language = None;
        self
    }

    /// Enable or disable the generated `x-ms-client-request-id` header.
    ///
    /// Enabled by default.
    pub fn generate_client_request_id(mut self, enabled: bool) -> Self {
        self.generate_client_request_id = enabled;
        self
    }

    /// Set the `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a header sent with every request (for example `x-ms-version`).
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) will be ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    ///
    /// Defaults to [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout.
    ///
    /// This covers the entire request/response cycle including reading the body.
    /// Defaults to [`DEFAULT_READ_TIMEOUT`].
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors.
    ///
    /// Defaults to [`RetryPolicy::none()`].
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the `ServiceClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No base URL is provided
    /// - The base URL has no unresolved tokens and is not a valid URL
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> ServiceResult<ServiceClient> {
        let base_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ServiceError::MissingConfig("base URL is required".into()))?;

        // Templates with unresolved tokens are validated per call.
        if let Ok(resolved) = substitute_host_parameters(&base_url, &self.host_parameters) {
            Url::parse(&resolved).map_err(|e| ServiceError::invalid_endpoint_with_source("invalid base URL", e))?;
        }

        let http = match self.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()
                .map_err(|source| ServiceError::Transport {
                    operation: "build_client",
                    source,
                })?,
        };

        Ok(ServiceClient {
            http,
            config: Arc::new(ClientConfig {
                base_url,
                host_parameters: self.host_parameters,
                credential: self.credential.unwrap_or(ServiceCredential::Anonymous),
                token_scope: self.token_scope,
                accept_language: self.accept_language,
                generate_client_request_id: self.generate_client_request_id,
                user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                default_headers: self.default_headers,
                retry_policy: self.retry_policy.unwrap_or_default(),
            }),
        })
    }
}

/// Replace every `{name}` token in `template` with its host parameter.
fn substitute_host_parameters(template: &str, parameters: &BTreeMap<String, String>) -> ServiceResult<String> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        resolved.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| ServiceError::invalid_endpoint(format!("unterminated host parameter in '{template}'")))?;
        let name = &after[..close];

        let value = parameters
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidArgument(format!("host parameter {name} is required")))?;

        resolved.push_str(value);
        rest = &after[close + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

fn append_query_token(url: &mut Url, token: &str) {
    if token.is_empty() {
        return;
    }
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
        _ => token.to_string(),
    };
    url.set_query(Some(&query));
}

/// Render a URL for logging with its query string removed.
fn redact_query(url: &Url) -> String {
    let mut clone = url.clone();
    if clone.query().is_some() {
        clone.set_query(Some("[query]"));
    }
    clone.to_string()
}

fn set_default_content_type(headers: &mut HeaderMap, content_type: &'static str) {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
}

fn header_name(name: &str) -> ServiceResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid header name '{name}'")))
}

fn header_value(name: &str, value: &str) -> ServiceResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ServiceError::InvalidArgument(format!("invalid value for header {name}")))
}
