use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// Header carrying a Cognitive Services subscription key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Supplies OAuth bearer tokens for a given scope.
///
/// Token acquisition and caching belong to the implementor; the dispatcher
/// asks for a token once per call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return an access token valid for `scope`.
    async fn get_token(&self, scope: &str) -> ServiceResult<SecretString>;
}

/// Credential types supported by the service clients.
#[derive(Clone)]
pub enum ServiceCredential {
    /// Cognitive Services subscription key, sent as `Ocp-Apim-Subscription-Key`.
    SubscriptionKey(SecretString),

    /// A fixed bearer token.
    BearerToken(SecretString),

    /// Bearer tokens obtained from a [`TokenProvider`] on every call.
    TokenProvider(Arc<dyn TokenProvider>),

    /// A pre-signed query string (for example a storage SAS token) appended
    /// to every request URL.
    QueryToken(SecretString),

    /// No authentication (public resources).
    Anonymous,
}

/// A credential resolved to the concrete value that goes on the wire.
pub(crate) enum ResolvedCredential {
    Header { name: &'static str, value: String },
    Query(String),
    None,
}

impl ServiceCredential {
    /// Create a credential from a subscription key stored in `var`.
    pub fn from_env(var: &str) -> ServiceResult<Self> {
        match std::env::var(var) {
            Ok(key) if !key.is_empty() => Ok(Self::SubscriptionKey(SecretString::from(key))),
            _ => Err(ServiceError::MissingConfig(format!(
                "credential is required. Set it via builder or the {var} env var."
            ))),
        }
    }

    /// Create a subscription key credential.
    pub fn subscription_key(key: impl Into<String>) -> Self {
        Self::SubscriptionKey(SecretString::from(key.into()))
    }

    /// Create a fixed bearer token credential.
    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self::BearerToken(SecretString::from(token.into()))
    }

    /// Create a credential backed by a [`TokenProvider`].
    pub fn token_provider(provider: impl TokenProvider + 'static) -> Self {
        Self::TokenProvider(Arc::new(provider))
    }

    /// Create a query-string credential. A leading `?` is stripped.
    pub fn query_token(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self::QueryToken(SecretString::from(token.trim_start_matches('?').to_string()))
    }

    /// Resolve the credential for a request targeting `scope`.
    pub(crate) async fn resolve(&self, scope: Option<&str>) -> ServiceResult<ResolvedCredential> {
        match self {
            Self::SubscriptionKey(key) => Ok(ResolvedCredential::Header {
                name: SUBSCRIPTION_KEY_HEADER,
                value: key.expose_secret().to_string(),
            }),
            Self::BearerToken(token) => Ok(ResolvedCredential::Header {
                name: "Authorization",
                value: format!("Bearer {}", token.expose_secret()),
            }),
            Self::TokenProvider(provider) => {
                let scope = scope.ok_or_else(|| {
                    ServiceError::Auth("token scope is not configured for this client".into())
                })?;
                let token = provider.get_token(scope).await?;
                Ok(ResolvedCredential::Header {
                    name: "Authorization",
                    value: format!("Bearer {}", token.expose_secret()),
                })
            }
            Self::QueryToken(token) => Ok(ResolvedCredential::Query(token.expose_secret().to_string())),
            Self::Anonymous => Ok(ResolvedCredential::None),
        }
    }
}

impl std::fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubscriptionKey(_) => write!(f, "ServiceCredential::SubscriptionKey(****)"),
            Self::BearerToken(_) => write!(f, "ServiceCredential::BearerToken(****)"),
            Self::TokenProvider(_) => write!(f, "ServiceCredential::TokenProvider(..)"),
            Self::QueryToken(_) => write!(f, "ServiceCredential::QueryToken(****)"),
            Self::Anonymous => write!(f, "ServiceCredential::Anonymous"),
        }
    }
}
