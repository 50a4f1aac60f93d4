use thiserror::Error;

/// Errors that can occur when calling an Azure Cognitive REST operation.
///
/// Every call produces either its typed result or exactly one of these.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A required call parameter was missing or invalid.
    ///
    /// Raised locally before any network I/O takes place.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// The credential could not produce an authorization value.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service answered with a non-success status and a parseable error body.
    #[error("Service error ({status} {code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The service answered with a non-success status and an unrecognised body.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The HTTP exchange failed (DNS, TLS, connection reset, timeout).
    #[error("Transport error in {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// A success response did not match the expected schema.
    #[error("Failed to deserialize {operation} response: {message}")]
    Deserialization {
        operation: &'static str,
        message: String,
    },

    /// The request payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A long-running operation did not reach a terminal state in time.
    #[error("{operation} did not complete after {attempts} attempts")]
    PollTimeout {
        operation: &'static str,
        attempts: u32,
    },

    /// A blocking or callback adapter could not reach an async runtime.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ServiceError {
    /// Create an [`ServiceError::InvalidEndpoint`] carrying the URL parse failure.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an [`ServiceError::InvalidEndpoint`] without an underlying cause.
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            message: message.into(),
            source: None,
        }
    }

    /// Create an [`ServiceError::Http`] error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create an [`ServiceError::Deserialization`] error for `operation`.
    pub fn deserialization(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Deserialization {
            operation,
            message: message.to_string(),
        }
    }

    /// The HTTP status reported by the service, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the service answered with a parseable error body.
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// The service-defined error code, for [`ServiceError::Service`] errors.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
