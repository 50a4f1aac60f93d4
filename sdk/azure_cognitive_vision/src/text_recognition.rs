//! Asynchronous text recognition (printed and handwritten).
//!
//! [`recognize_text`] submits an image and returns `202 Accepted` with an
//! `Operation-Location` header. The result is then fetched with
//! [`get_text_operation_result`] until its status is terminal, or in one
//! step with [`poll_text_operation`].
//!
//! ```rust,no_run
//! use azure_cognitive_vision::client::ComputerVisionClient;
//! use azure_cognitive_vision::text_recognition::{self, TextRecognitionMode};
//! use std::time::Duration;
//!
//! # async fn example(client: &ComputerVisionClient) -> azure_cognitive_core::ServiceResult<()> {
//! let submitted = text_recognition::recognize_text(
//!     client,
//!     "https://example.com/note.jpg",
//!     TextRecognitionMode::Handwritten,
//! )
//! .await?;
//!
//! let operation_id = submitted.headers.operation_id().unwrap_or_default().to_string();
//! let result = text_recognition::poll_text_operation(client, &operation_id, Duration::from_secs(1), 30).await?;
//! if let Some(recognized) = &result.recognition_result {
//!     for line in &recognized.lines {
//!         println!("{}", line.text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::request::OperationRequest;
use azure_cognitive_core::response::{FromHeaders, HeaderReader, ServiceResponse};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;

use crate::client::ComputerVisionClient;
use crate::models::ImageInput;

static RECOGNIZE_TEXT: Operation = Operation {
    name: "recognize_text",
    method: Method::POST,
    path: "/recognizeText",
    success: &[202],
    error_format: ErrorFormat::Json,
};

static GET_TEXT_OPERATION_RESULT: Operation = Operation {
    name: "get_text_operation_result",
    method: Method::GET,
    path: "/textOperations/{operationId}",
    success: &[200],
    error_format: ErrorFormat::Json,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Kind of text to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRecognitionMode {
    Handwritten,
    Printed,
}

impl TextRecognitionMode {
    /// Returns the API string representation of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handwritten => "Handwritten",
            Self::Printed => "Printed",
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Headers returned when a text recognition operation is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeTextHeaders {
    /// URL of the text operation to poll.
    pub operation_location: String,
}

impl RecognizeTextHeaders {
    /// The operation id: the last path segment of the operation location.
    pub fn operation_id(&self) -> Option<&str> {
        let path = self.operation_location.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().filter(|id| !id.is_empty())
    }
}

impl FromHeaders for RecognizeTextHeaders {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            operation_location: headers.required("Operation-Location")?,
        })
    }
}

/// Status of a text operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TextOperationStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    Running,
    Failed,
    Succeeded,
}

impl TextOperationStatus {
    /// Returns `true` once the operation will no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded)
    }
}

impl std::fmt::Display for TextOperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "Not Started",
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::Succeeded => "Succeeded",
        })
    }
}

/// The state of a text operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOperationResult {
    pub status: TextOperationStatus,
    /// Present once the status is `Succeeded`.
    pub recognition_result: Option<RecognitionResult>,
}

/// Recognized lines of text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub lines: Vec<TextLine>,
}

/// A recognized line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    /// Eight coordinates: the four corners, clockwise from top-left.
    pub bounding_box: Vec<i32>,
    pub text: String,
    #[serde(default)]
    pub words: Vec<TextWord>,
}

/// A recognized word.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextWord {
    pub bounding_box: Vec<i32>,
    pub text: String,
    /// `Low` when the service is unsure of the word.
    pub confidence: Option<String>,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

async fn submit(
    client: &ComputerVisionClient,
    image: ImageInput,
    mode: TextRecognitionMode,
) -> ServiceResult<ServiceResponse<(), RecognizeTextHeaders>> {
    tracing::debug!("submitting image for text recognition");

    let request = image.into_request(&RECOGNIZE_TEXT)?.query("mode", mode.as_str());
    let response = client
        .service()
        .send(request)
        .await?
        .headers_only::<RecognizeTextHeaders>()?;

    tracing::debug!(
        operation_location = %response.headers.operation_location,
        "text recognition submitted"
    );
    Ok(response)
}

/// Start recognizing text in an image URL.
///
/// Returns the `Operation-Location` of the accepted operation.
///
/// # Tracing
///
/// Emits a span named `vision::recognize_text` with field `mode`.
#[tracing::instrument(name = "vision::recognize_text", skip(client, url), fields(mode = mode.as_str()))]
pub async fn recognize_text(
    client: &ComputerVisionClient,
    url: &str,
    mode: TextRecognitionMode,
) -> ServiceResult<ServiceResponse<(), RecognizeTextHeaders>> {
    submit(client, ImageInput::Url(url.to_string()), mode).await
}

/// Start recognizing text in raw image bytes.
#[tracing::instrument(
    name = "vision::recognize_text_in_stream",
    skip(client, image),
    fields(mode = mode.as_str())
)]
pub async fn recognize_text_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    mode: TextRecognitionMode,
) -> ServiceResult<ServiceResponse<(), RecognizeTextHeaders>> {
    submit(client, ImageInput::Stream(image.into()), mode).await
}

/// Fetch the current state of a text operation.
///
/// # Tracing
///
/// Emits a span named `vision::get_text_operation_result`.
#[tracing::instrument(name = "vision::get_text_operation_result", skip(client))]
pub async fn get_text_operation_result(
    client: &ComputerVisionClient,
    operation_id: &str,
) -> ServiceResult<TextOperationResult> {
    tracing::debug!("fetching text operation result");

    let request = OperationRequest::new(&GET_TEXT_OPERATION_RESULT).path_param("operationId", operation_id);
    let result: TextOperationResult = client.service().send(request).await?.json()?;

    tracing::debug!(status = %result.status, "text operation result fetched");
    Ok(result)
}

/// Poll a text operation until it reaches a terminal status.
///
/// Returns the final [`TextOperationResult`] when the status is `Succeeded`
/// or `Failed`; the caller should check which.
///
/// # Arguments
///
/// * `poll_interval` - How often to check the status.
/// * `max_attempts` - Maximum number of polls. `0` disables the limit.
///
/// # Errors
///
/// Returns [`ServiceError::PollTimeout`] if `max_attempts` is exceeded.
///
/// # Tracing
///
/// Emits a span named `vision::poll_text_operation`.
#[tracing::instrument(name = "vision::poll_text_operation", skip(client))]
pub async fn poll_text_operation(
    client: &ComputerVisionClient,
    operation_id: &str,
    poll_interval: Duration,
    max_attempts: u32,
) -> ServiceResult<TextOperationResult> {
    tracing::debug!("starting to poll for completion");

    let mut attempts = 0u32;

    loop {
        if max_attempts > 0 {
            attempts += 1;
            if attempts > max_attempts {
                return Err(ServiceError::PollTimeout {
                    operation: "poll_text_operation",
                    attempts: max_attempts,
                });
            }
        }

        let result = get_text_operation_result(client, operation_id).await?;

        if result.status.is_terminal() {
            tracing::debug!(status = %result.status, "operation reached terminal status");
            return Ok(result);
        }

        tracing::trace!(status = %result.status, attempt = attempts, "operation still in progress, waiting");
        tokio::time::sleep(poll_interval).await;
    }
}
