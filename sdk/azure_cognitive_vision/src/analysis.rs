//! Image analysis: visual features, descriptions, tags, and area of interest.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_cognitive_core::auth::ServiceCredential;
//! use azure_cognitive_vision::analysis::{self, AnalyzeImageOptions, VisualFeature};
//! use azure_cognitive_vision::client::{AzureRegion, ComputerVisionClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ComputerVisionClient::builder()
//!     .region(AzureRegion::WestEurope)
//!     .credential(ServiceCredential::subscription_key("your-key"))
//!     .build()?;
//!
//! let options = AnalyzeImageOptions::new()
//!     .visual_features([VisualFeature::Tags, VisualFeature::Description]);
//!
//! let result = analysis::analyze_image(&client, "https://example.com/image.jpg", &options).await?;
//! for tag in &result.tags {
//!     println!("{} ({:.2})", tag.name, tag.confidence);
//! }
//! # Ok(())
//! # }
//! ```

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;

use crate::client::ComputerVisionClient;
use crate::models::{
    BoundingRect, CelebritiesModel, FaceRectangle, ImageDescriptionDetails, ImageInput, ImageMetadata, ImageTag,
    LandmarksModel,
};

static ANALYZE_IMAGE: Operation = Operation {
    name: "analyze_image",
    method: Method::POST,
    path: "/analyze",
    success: &[200],
    error_format: ErrorFormat::Json,
};

static DESCRIBE_IMAGE: Operation = Operation {
    name: "describe_image",
    method: Method::POST,
    path: "/describe",
    success: &[200],
    error_format: ErrorFormat::Json,
};

static TAG_IMAGE: Operation = Operation {
    name: "tag_image",
    method: Method::POST,
    path: "/tag",
    success: &[200],
    error_format: ErrorFormat::Json,
};

static AREA_OF_INTEREST: Operation = Operation {
    name: "get_area_of_interest",
    method: Method::POST,
    path: "/areaOfInterest",
    success: &[200],
    error_format: ErrorFormat::Json,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A visual feature to return from [`analyze_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualFeature {
    ImageType,
    Faces,
    Adult,
    Categories,
    Color,
    Tags,
    Description,
    Objects,
    Brands,
}

impl VisualFeature {
    /// Returns the API string representation of this feature.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageType => "ImageType",
            Self::Faces => "Faces",
            Self::Adult => "Adult",
            Self::Categories => "Categories",
            Self::Color => "Color",
            Self::Tags => "Tags",
            Self::Description => "Description",
            Self::Objects => "Objects",
            Self::Brands => "Brands",
        }
    }
}

/// Domain-specific details to return from [`analyze_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Details {
    Celebrities,
    Landmarks,
}

impl Details {
    /// Returns the API string representation of this detail.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celebrities => "Celebrities",
            Self::Landmarks => "Landmarks",
        }
    }
}

/// Optional parameters for [`analyze_image`].
///
/// Empty lists and unset values are left out of the request so the service
/// applies its defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeImageOptions {
    visual_features: Vec<VisualFeature>,
    details: Vec<Details>,
    language: Option<String>,
}

impl AnalyzeImageOptions {
    /// Options with every parameter unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the visual features, sent in the given order.
    pub fn visual_features(mut self, features: impl IntoIterator<Item = VisualFeature>) -> Self {
        self.visual_features = features.into_iter().collect();
        self
    }

    /// Sets the domain-specific details.
    pub fn details(mut self, details: impl IntoIterator<Item = Details>) -> Self {
        self.details = details.into_iter().collect();
        self
    }

    /// Sets the response language (`en`, `es`, `ja`, `pt`, `zh`).
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// The features as a comma-separated query value.
    pub(crate) fn visual_features_param(&self) -> String {
        self.visual_features
            .iter()
            .map(VisualFeature::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Optional parameters for [`describe_image`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeImageOptions {
    max_candidates: Option<u32>,
    language: Option<String>,
}

impl DescribeImageOptions {
    /// Creates a new builder.
    pub fn builder() -> DescribeImageOptionsBuilder {
        DescribeImageOptionsBuilder::default()
    }
}

/// Builder for [`DescribeImageOptions`].
#[derive(Debug, Default)]
pub struct DescribeImageOptionsBuilder {
    max_candidates: Option<u32>,
    language: Option<String>,
}

impl DescribeImageOptionsBuilder {
    /// Sets the maximum number of candidate captions (service default 1).
    pub fn max_candidates(mut self, max_candidates: u32) -> Self {
        self.max_candidates = Some(max_candidates);
        self
    }

    /// Sets the response language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if `max_candidates` is zero.
    pub fn build(self) -> ServiceResult<DescribeImageOptions> {
        if self.max_candidates == Some(0) {
            return Err(ServiceError::InvalidArgument("max_candidates must be at least 1".into()));
        }
        Ok(DescribeImageOptions {
            max_candidates: self.max_candidates,
            language: self.language,
        })
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// The result of [`analyze_image`].
///
/// Only the requested features are populated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    #[serde(default)]
    pub categories: Vec<Category>,
    pub adult: Option<AdultInfo>,
    pub color: Option<ColorInfo>,
    pub image_type: Option<ImageType>,
    #[serde(default)]
    pub tags: Vec<ImageTag>,
    pub description: Option<ImageDescriptionDetails>,
    #[serde(default)]
    pub faces: Vec<FaceDescription>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub brands: Vec<DetectedBrand>,
    pub request_id: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

/// An image category from the 86-category taxonomy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub name: String,
    pub score: f64,
    pub detail: Option<CategoryDetail>,
}

/// Domain-specific details attached to a category.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CategoryDetail {
    #[serde(default)]
    pub celebrities: Vec<CelebritiesModel>,
    #[serde(default)]
    pub landmarks: Vec<LandmarksModel>,
}

/// Adult and racy content scores.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdultInfo {
    pub is_adult_content: bool,
    pub is_racy_content: bool,
    pub adult_score: f64,
    pub racy_score: f64,
}

/// Color scheme of the image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    pub dominant_color_foreground: Option<String>,
    pub dominant_color_background: Option<String>,
    #[serde(default)]
    pub dominant_colors: Vec<String>,
    pub accent_color: Option<String>,
    #[serde(rename = "isBWImg")]
    pub is_bw_img: bool,
}

/// Clip-art and line-drawing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageType {
    /// 0 = non-clip-art, 3 = good clip-art.
    pub clip_art_type: i32,
    /// 0 = not a line drawing, 1 = line drawing.
    pub line_drawing_type: i32,
}

/// Gender of a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// A detected face.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDescription {
    pub age: i32,
    pub gender: Option<Gender>,
    pub face_rectangle: FaceRectangle,
}

/// A detected object with its location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedObject {
    pub rectangle: BoundingRect,
    pub object: String,
    pub confidence: f64,
    pub parent: Option<ObjectHierarchy>,
}

/// An ancestor of a detected object in the object taxonomy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectHierarchy {
    pub object: String,
    pub confidence: f64,
    pub parent: Option<Box<ObjectHierarchy>>,
}

/// A detected brand logo.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedBrand {
    pub name: String,
    pub confidence: f64,
    pub rectangle: BoundingRect,
}

/// The result of [`describe_image`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescription {
    pub description: ImageDescriptionDetails,
    pub request_id: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

/// The result of [`tag_image`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagResult {
    pub tags: Vec<ImageTag>,
    pub request_id: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

/// The result of [`get_area_of_interest`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOfInterestResult {
    pub area_of_interest: BoundingRect,
    pub request_id: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

async fn analyze(
    client: &ComputerVisionClient,
    image: ImageInput,
    options: &AnalyzeImageOptions,
) -> ServiceResult<ImageAnalysis> {
    tracing::debug!("submitting image for analysis");

    let request = image
        .into_request(&ANALYZE_IMAGE)?
        .query_list("visualFeatures", options.visual_features.iter().map(VisualFeature::as_str))
        .query_list("details", options.details.iter().map(Details::as_str))
        .query_opt("language", options.language.as_deref());

    let result: ImageAnalysis = client.service().send(request).await?.json()?;

    tracing::debug!(request_id = ?result.request_id, "image analysis complete");
    Ok(result)
}

/// Extract a rich set of visual features from an image URL.
///
/// # Tracing
///
/// Emits a span named `vision::analyze_image` with field `features`.
#[tracing::instrument(
    name = "vision::analyze_image",
    skip(client, url, options),
    fields(features = %options.visual_features_param())
)]
pub async fn analyze_image(
    client: &ComputerVisionClient,
    url: &str,
    options: &AnalyzeImageOptions,
) -> ServiceResult<ImageAnalysis> {
    analyze(client, ImageInput::Url(url.to_string()), options).await
}

/// Extract a rich set of visual features from raw image bytes.
///
/// # Tracing
///
/// Emits a span named `vision::analyze_image_in_stream` with field `features`.
#[tracing::instrument(
    name = "vision::analyze_image_in_stream",
    skip(client, image, options),
    fields(features = %options.visual_features_param())
)]
pub async fn analyze_image_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    options: &AnalyzeImageOptions,
) -> ServiceResult<ImageAnalysis> {
    analyze(client, ImageInput::Stream(image.into()), options).await
}

async fn describe(
    client: &ComputerVisionClient,
    image: ImageInput,
    options: &DescribeImageOptions,
) -> ServiceResult<ImageDescription> {
    tracing::debug!("submitting image for description");

    let request = image
        .into_request(&DESCRIBE_IMAGE)?
        .query_opt("maxCandidates", options.max_candidates)
        .query_opt("language", options.language.as_deref());

    let result: ImageDescription = client.service().send(request).await?.json()?;

    tracing::debug!(captions = result.description.captions.len(), "image description complete");
    Ok(result)
}

/// Generate human-readable captions for an image URL.
///
/// # Tracing
///
/// Emits a span named `vision::describe_image`.
#[tracing::instrument(name = "vision::describe_image", skip(client, url, options))]
pub async fn describe_image(
    client: &ComputerVisionClient,
    url: &str,
    options: &DescribeImageOptions,
) -> ServiceResult<ImageDescription> {
    describe(client, ImageInput::Url(url.to_string()), options).await
}

/// Generate human-readable captions for raw image bytes.
#[tracing::instrument(name = "vision::describe_image_in_stream", skip(client, image, options))]
pub async fn describe_image_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    options: &DescribeImageOptions,
) -> ServiceResult<ImageDescription> {
    describe(client, ImageInput::Stream(image.into()), options).await
}

async fn tag(client: &ComputerVisionClient, image: ImageInput, language: Option<&str>) -> ServiceResult<TagResult> {
    tracing::debug!("submitting image for tagging");

    let request = image.into_request(&TAG_IMAGE)?.query_opt("language", language);
    let result: TagResult = client.service().send(request).await?.json()?;

    tracing::debug!(tags = result.tags.len(), "image tagging complete");
    Ok(result)
}

/// Tag an image URL with content words.
#[tracing::instrument(name = "vision::tag_image", skip(client, url))]
pub async fn tag_image(client: &ComputerVisionClient, url: &str, language: Option<&str>) -> ServiceResult<TagResult> {
    tag(client, ImageInput::Url(url.to_string()), language).await
}

/// Tag raw image bytes with content words.
#[tracing::instrument(name = "vision::tag_image_in_stream", skip(client, image))]
pub async fn tag_image_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    language: Option<&str>,
) -> ServiceResult<TagResult> {
    tag(client, ImageInput::Stream(image.into()), language).await
}

async fn area_of_interest(client: &ComputerVisionClient, image: ImageInput) -> ServiceResult<AreaOfInterestResult> {
    let request = image.into_request(&AREA_OF_INTEREST)?;
    client.service().send(request).await?.json()
}

/// Find the most important region of an image URL.
#[tracing::instrument(name = "vision::get_area_of_interest", skip(client, url))]
pub async fn get_area_of_interest(client: &ComputerVisionClient, url: &str) -> ServiceResult<AreaOfInterestResult> {
    area_of_interest(client, ImageInput::Url(url.to_string())).await
}

/// Find the most important region of raw image bytes.
#[tracing::instrument(name = "vision::get_area_of_interest_in_stream", skip(client, image))]
pub async fn get_area_of_interest_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
) -> ServiceResult<AreaOfInterestResult> {
    area_of_interest(client, ImageInput::Stream(image.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_mock_client;
    use azure_cognitive_core::test_support::json_error;
    use wiremock::matchers::{body_bytes, body_json, header, method, path as match_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IMAGE_URL: &str = "https://example.com/beach.jpg";

    fn analysis_body() -> serde_json::Value {
        serde_json::json!({
            "categories": [
                {
                    "name": "people_",
                    "score": 0.8125,
                    "detail": {
                        "celebrities": [
                            {
                                "name": "Satya Nadella",
                                "confidence": 0.9996,
                                "faceRectangle": {"left": 597, "top": 162, "width": 248, "height": 248}
                            }
                        ]
                    }
                }
            ],
            "adult": {
                "isAdultContent": false,
                "isRacyContent": false,
                "adultScore": 0.0093,
                "racyScore": 0.0240
            },
            "color": {
                "dominantColorForeground": "Brown",
                "dominantColorBackground": "Brown",
                "dominantColors": ["Brown", "Black"],
                "accentColor": "873B59",
                "isBWImg": false
            },
            "imageType": {"clipArtType": 0, "lineDrawingType": 0},
            "tags": [
                {"name": "person", "confidence": 0.98},
                {"name": "man", "confidence": 0.94, "hint": "human"}
            ],
            "description": {
                "tags": ["person", "man", "suit"],
                "captions": [{"text": "Satya Nadella wearing a suit", "confidence": 0.91}]
            },
            "faces": [
                {
                    "age": 44,
                    "gender": "Male",
                    "faceRectangle": {"left": 593, "top": 160, "width": 250, "height": 250}
                }
            ],
            "objects": [
                {
                    "rectangle": {"x": 25, "y": 43, "w": 172, "h": 140},
                    "object": "dog",
                    "confidence": 0.931,
                    "parent": {
                        "object": "mammal",
                        "confidence": 0.94,
                        "parent": {"object": "animal", "confidence": 0.95}
                    }
                }
            ],
            "brands": [
                {"name": "Microsoft", "confidence": 0.706, "rectangle": {"x": 20, "y": 8, "w": 83, "h": 82}}
            ],
            "requestId": "0dbec5ad-a3d3-4f7e-96b4-dfd57efe967d",
            "metadata": {"width": 1500, "height": 1000, "format": "Jpeg"}
        })
    }

    fn expected_analysis() -> ImageAnalysis {
        ImageAnalysis {
            categories: vec![Category {
                name: "people_".into(),
                score: 0.8125,
                detail: Some(CategoryDetail {
                    celebrities: vec![CelebritiesModel {
                        name: "Satya Nadella".into(),
                        confidence: 0.9996,
                        face_rectangle: Some(FaceRectangle {
                            left: 597,
                            top: 162,
                            width: 248,
                            height: 248,
                        }),
                    }],
                    landmarks: vec![],
                }),
            }],
            adult: Some(AdultInfo {
                is_adult_content: false,
                is_racy_content: false,
                adult_score: 0.0093,
                racy_score: 0.0240,
            }),
            color: Some(ColorInfo {
                dominant_color_foreground: Some("Brown".into()),
                dominant_color_background: Some("Brown".into()),
                dominant_colors: vec!["Brown".into(), "Black".into()],
                accent_color: Some("873B59".into()),
                is_bw_img: false,
            }),
            image_type: Some(ImageType {
                clip_art_type: 0,
                line_drawing_type: 0,
            }),
            tags: vec![
                ImageTag {
                    name: "person".into(),
                    confidence: 0.98,
                    hint: None,
                },
                ImageTag {
                    name: "man".into(),
                    confidence: 0.94,
                    hint: Some("human".into()),
                },
            ],
            description: Some(ImageDescriptionDetails {
                tags: vec!["person".into(), "man".into(), "suit".into()],
                captions: vec![crate::models::ImageCaption {
                    text: "Satya Nadella wearing a suit".into(),
                    confidence: 0.91,
                }],
            }),
            faces: vec![FaceDescription {
                age: 44,
                gender: Some(Gender::Male),
                face_rectangle: FaceRectangle {
                    left: 593,
                    top: 160,
                    width: 250,
                    height: 250,
                },
            }],
            objects: vec![DetectedObject {
                rectangle: BoundingRect { x: 25, y: 43, w: 172, h: 140 },
                object: "dog".into(),
                confidence: 0.931,
                parent: Some(ObjectHierarchy {
                    object: "mammal".into(),
                    confidence: 0.94,
                    parent: Some(Box::new(ObjectHierarchy {
                        object: "animal".into(),
                        confidence: 0.95,
                        parent: None,
                    })),
                }),
            }],
            brands: vec![DetectedBrand {
                name: "Microsoft".into(),
                confidence: 0.706,
                rectangle: BoundingRect { x: 20, y: 8, w: 83, h: 82 },
            }],
            request_id: Some("0dbec5ad-a3d3-4f7e-96b4-dfd57efe967d".into()),
            metadata: Some(ImageMetadata {
                width: 1500,
                height: 1000,
                format: Some("Jpeg".into()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Request parameters
    // -----------------------------------------------------------------------

    #[test]
    fn visual_feature_strings_match_service() {
        let variants = [
            (VisualFeature::ImageType, "ImageType"),
            (VisualFeature::Faces, "Faces"),
            (VisualFeature::Adult, "Adult"),
            (VisualFeature::Categories, "Categories"),
            (VisualFeature::Color, "Color"),
            (VisualFeature::Tags, "Tags"),
            (VisualFeature::Description, "Description"),
            (VisualFeature::Objects, "Objects"),
            (VisualFeature::Brands, "Brands"),
        ];
        for (variant, expected) in variants {
            assert_eq!(variant.as_str(), expected);
        }
        assert_eq!(Details::Celebrities.as_str(), "Celebrities");
        assert_eq!(Details::Landmarks.as_str(), "Landmarks");
    }

    #[test]
    fn describe_options_reject_zero_candidates() {
        let err = DescribeImageOptions::builder()
            .max_candidates(0)
            .build()
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert!(err.to_string().contains("max_candidates"), "error: {err}");
    }

    #[tokio::test]
    async fn omitted_lists_send_no_query_keys() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"requestId": "r"})))
            .expect(1)
            .mount(&server)
            .await;

        analyze_image(&client, IMAGE_URL, &AnalyzeImageOptions::new())
            .await
            .expect("should succeed");

        let requests = server.received_requests().await.expect("recording enabled");
        let keys: Vec<String> = requests[0].url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert!(!keys.contains(&"visualFeatures".to_string()), "keys: {keys:?}");
        assert!(!keys.contains(&"details".to_string()), "keys: {keys:?}");
        assert!(!keys.contains(&"language".to_string()), "keys: {keys:?}");
    }

    #[tokio::test]
    async fn lists_are_comma_joined_in_order() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .and(query_param("visualFeatures", "Tags,Faces"))
            .and(query_param("details", "Landmarks,Celebrities"))
            .and(query_param("language", "es"))
            .and(body_json(serde_json::json!({"url": IMAGE_URL})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"requestId": "r"})))
            .expect(1)
            .mount(&server)
            .await;

        let options = AnalyzeImageOptions::new()
            .visual_features([VisualFeature::Tags, VisualFeature::Faces])
            .details([Details::Landmarks, Details::Celebrities])
            .language("es");
        analyze_image(&client, IMAGE_URL, &options).await.expect("should succeed");
    }

    // -----------------------------------------------------------------------
    // Response mapping
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn analyze_image_decodes_every_field() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = analyze_image(&client, IMAGE_URL, &AnalyzeImageOptions::new())
            .await
            .expect("should succeed");
        assert_eq!(result, expected_analysis());
    }

    #[tokio::test]
    async fn analyze_image_in_stream_sends_octet_stream() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .respond_with(ResponseTemplate::new(200).set_body_json(analysis_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = analyze_image_in_stream(&client, vec![0xFF, 0xD8, 0xFF], &AnalyzeImageOptions::new())
            .await
            .expect("should succeed");
        assert_eq!(result.faces.len(), 1);
    }

    #[tokio::test]
    async fn analyze_image_empty_url_fails_before_io() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = analyze_image(&client, "", &AnalyzeImageOptions::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn analyze_image_maps_service_error() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json_error("InvalidImageUrl", "Image URL is badly formatted.")),
            )
            .mount(&server)
            .await;

        let err = analyze_image(&client, "ftp://bad", &AnalyzeImageOptions::new())
            .await
            .expect_err("should fail");
        match err {
            ServiceError::Service {
                status, code, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidImageUrl");
                assert_eq!(message, "Image URL is badly formatted.");
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyze_image_malformed_body_is_deserialization_error() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tags": "not-a-list"})))
            .mount(&server)
            .await;

        let err = analyze_image(&client, IMAGE_URL, &AnalyzeImageOptions::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::Deserialization { operation: "analyze_image", .. }));
    }

    #[tokio::test]
    async fn describe_image_sends_max_candidates() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/describe"))
            .and(query_param("maxCandidates", "3"))
            .and(query_param("language", "ja"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "description": {
                    "tags": ["outdoor", "beach"],
                    "captions": [
                        {"text": "a sandy beach", "confidence": 0.88},
                        {"text": "a beach next to the ocean", "confidence": 0.81}
                    ]
                },
                "requestId": "req-2",
                "metadata": {"width": 800, "height": 600, "format": "Png"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = DescribeImageOptions::builder()
            .max_candidates(3)
            .language("ja")
            .build()
            .expect("valid options");
        let result = describe_image(&client, IMAGE_URL, &options).await.expect("should succeed");

        assert_eq!(result.description.captions.len(), 2);
        assert_eq!(result.description.captions[0].text, "a sandy beach");
        assert_eq!(result.description.tags, vec!["outdoor", "beach"]);
        assert_eq!(result.request_id.as_deref(), Some("req-2"));
    }

    #[tokio::test]
    async fn describe_image_in_stream_rejects_empty_image() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        let err = describe_image_in_stream(&client, Vec::<u8>::new(), &DescribeImageOptions::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn tag_image_decodes_tags() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/tag"))
            .and(query_param("language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tags": [
                    {"name": "grass", "confidence": 0.9999},
                    {"name": "dog", "confidence": 0.9931, "hint": "animal"}
                ],
                "requestId": "req-3",
                "metadata": {"width": 400, "height": 300, "format": "Jpeg"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = tag_image(&client, IMAGE_URL, Some("en")).await.expect("should succeed");
        assert_eq!(
            result.tags,
            vec![
                ImageTag {
                    name: "grass".into(),
                    confidence: 0.9999,
                    hint: None
                },
                ImageTag {
                    name: "dog".into(),
                    confidence: 0.9931,
                    hint: Some("animal".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn tag_image_in_stream_posts_bytes() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/tag"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"tags": []})))
            .expect(1)
            .mount(&server)
            .await;

        let result = tag_image_in_stream(&client, &b"GIF89a"[..], None).await.expect("should succeed");
        assert!(result.tags.is_empty());
    }

    #[tokio::test]
    async fn area_of_interest_decodes_rectangle() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/areaOfInterest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "areaOfInterest": {"x": 10, "y": 12, "w": 200, "h": 180},
                "requestId": "req-4",
                "metadata": {"width": 640, "height": 480, "format": "Jpeg"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = get_area_of_interest(&client, IMAGE_URL).await.expect("should succeed");
        assert_eq!(result.area_of_interest, BoundingRect { x: 10, y: 12, w: 200, h: 180 });
    }

    #[tokio::test]
    async fn area_of_interest_in_stream_posts_bytes() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/areaOfInterest"))
            .and(body_bytes(b"\x89PNG".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "areaOfInterest": {"x": 0, "y": 0, "w": 1, "h": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        get_area_of_interest_in_stream(&client, Bytes::from_static(b"\x89PNG"))
            .await
            .expect("should succeed");
    }

    // -----------------------------------------------------------------------
    // Tracing
    // -----------------------------------------------------------------------

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn analyze_image_emits_span_with_features() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"requestId": "r"})))
            .mount(&server)
            .await;

        let options = AnalyzeImageOptions::new().visual_features([VisualFeature::Tags, VisualFeature::Color]);
        let _ = analyze_image(&client, IMAGE_URL, &options).await;

        assert!(logs_contain("vision::analyze_image"));
        assert!(logs_contain("Tags,Color"));
    }
}
