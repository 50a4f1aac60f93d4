//! Types shared across the Computer Vision operations.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::Operation;
use azure_cognitive_core::request::OperationRequest;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Source of the image to analyze.
///
/// URL variants send `{"url": "..."}` as JSON; `_in_stream` variants send the
/// raw image bytes as `application/octet-stream`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ImageInput {
    Url(String),
    Stream(Bytes),
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

impl ImageInput {
    /// Start a request for `operation` carrying this image as its body.
    pub(crate) fn into_request(self, operation: &'static Operation) -> ServiceResult<OperationRequest> {
        match self {
            Self::Url(url) => {
                if url.trim().is_empty() {
                    return Err(ServiceError::InvalidArgument(format!(
                        "url is required for {}",
                        operation.name
                    )));
                }
                OperationRequest::new(operation).json_body(&ImageUrl { url: &url })
            }
            Self::Stream(bytes) => {
                if bytes.is_empty() {
                    return Err(ServiceError::InvalidArgument(format!(
                        "image is required for {}",
                        operation.name
                    )));
                }
                Ok(OperationRequest::new(operation).binary_body(bytes))
            }
        }
    }
}

/// Image dimensions and format.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageMetadata {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Image format, e.g. `Jpeg`.
    pub format: Option<String>,
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoundingRect {
    /// X-coordinate of the top-left corner.
    pub x: i32,
    /// Y-coordinate of the top-left corner.
    pub y: i32,
    /// Width in pixels.
    pub w: i32,
    /// Height in pixels.
    pub h: i32,
}

/// A face rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FaceRectangle {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// A content tag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageTag {
    /// Tag name.
    pub name: String,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f64,
    /// Optional disambiguation hint.
    pub hint: Option<String>,
}

/// A natural-language caption.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageCaption {
    /// Caption text.
    pub text: String,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f64,
}

/// Tags and captions describing an image.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ImageDescriptionDetails {
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Candidate captions, highest confidence first.
    #[serde(default)]
    pub captions: Vec<ImageCaption>,
}

/// A recognized celebrity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CelebritiesModel {
    pub name: String,
    pub confidence: f64,
    #[serde(rename = "faceRectangle")]
    pub face_rectangle: Option<FaceRectangle>,
}

/// A recognized landmark.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LandmarksModel {
    pub name: String,
    pub confidence: f64,
}
