//! Domain-specific models (celebrities, landmarks).

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::request::OperationRequest;
use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::client::ComputerVisionClient;
use crate::models::{CelebritiesModel, ImageInput, ImageMetadata, LandmarksModel};

/// The celebrity recognition model.
pub const CELEBRITIES: &str = "celebrities";

/// The landmark recognition model.
pub const LANDMARKS: &str = "landmarks";

static LIST_MODELS: Operation = Operation {
    name: "list_models",
    method: Method::GET,
    path: "/models",
    success: &[200],
    error_format: ErrorFormat::Json,
};

static ANALYZE_IMAGE_BY_DOMAIN: Operation = Operation {
    name: "analyze_image_by_domain",
    method: Method::POST,
    path: "/models/{model}/analyze",
    success: &[200],
    error_format: ErrorFormat::Json,
};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// The result of [`list_models`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListModelsResult {
    pub models: Vec<ModelDescription>,
}

/// A domain model and the categories it applies to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelDescription {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// The result of [`analyze_image_by_domain`].
///
/// `result` holds the model-specific payload, e.g. `{"celebrities": [...]}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainModelResults {
    pub result: serde_json::Value,
    pub request_id: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

impl DomainModelResults {
    /// Decode the celebrities reported by the `celebrities` model.
    pub fn celebrities(&self) -> ServiceResult<Vec<CelebritiesModel>> {
        self.field("celebrities")
    }

    /// Decode the landmarks reported by the `landmarks` model.
    pub fn landmarks(&self) -> ServiceResult<Vec<LandmarksModel>> {
        self.field("landmarks")
    }

    fn field<T: DeserializeOwned>(&self, name: &str) -> ServiceResult<Vec<T>> {
        match self.result.get(name) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ServiceError::deserialization("analyze_image_by_domain", e)),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// List the domain-specific models supported by the service.
///
/// # Tracing
///
/// Emits a span named `vision::list_models`.
#[tracing::instrument(name = "vision::list_models", skip(client))]
pub async fn list_models(client: &ComputerVisionClient) -> ServiceResult<ListModelsResult> {
    tracing::debug!("listing domain models");

    let result: ListModelsResult = client
        .service()
        .send(OperationRequest::new(&LIST_MODELS))
        .await?
        .json()?;

    tracing::debug!(count = result.models.len(), "domain models listed");
    Ok(result)
}

async fn analyze_by_domain(
    client: &ComputerVisionClient,
    model: &str,
    image: ImageInput,
    language: Option<&str>,
) -> ServiceResult<DomainModelResults> {
    if model.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(
            "model is required for analyze_image_by_domain".into(),
        ));
    }

    let request = image
        .into_request(&ANALYZE_IMAGE_BY_DOMAIN)?
        .path_param("model", model)
        .query_opt("language", language);

    client.service().send(request).await?.json()
}

/// Recognize domain-specific content in an image URL.
///
/// # Tracing
///
/// Emits a span named `vision::analyze_image_by_domain` with field `model`.
#[tracing::instrument(name = "vision::analyze_image_by_domain", skip(client, url, language))]
pub async fn analyze_image_by_domain(
    client: &ComputerVisionClient,
    model: &str,
    url: &str,
    language: Option<&str>,
) -> ServiceResult<DomainModelResults> {
    analyze_by_domain(client, model, ImageInput::Url(url.to_string()), language).await
}

/// Recognize domain-specific content in raw image bytes.
#[tracing::instrument(name = "vision::analyze_image_by_domain_in_stream", skip(client, image, language))]
pub async fn analyze_image_by_domain_in_stream(
    client: &ComputerVisionClient,
    model: &str,
    image: impl Into<Bytes>,
    language: Option<&str>,
) -> ServiceResult<DomainModelResults> {
    analyze_by_domain(client, model, ImageInput::Stream(image.into()), language).await
}
