//! Printed text recognition (OCR).
//!
//! Synchronous OCR returns regions, lines, and words with their bounding
//! boxes. For handwriting, use [`crate::text_recognition`].

use azure_cognitive_core::error::ServiceResult;
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;

use crate::client::ComputerVisionClient;
use crate::models::ImageInput;

static RECOGNIZE_PRINTED_TEXT: Operation = Operation {
    name: "recognize_printed_text",
    method: Method::POST,
    path: "/ocr",
    success: &[200],
    error_format: ErrorFormat::Json,
};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Language hint for OCR. `Unk` asks the service to auto-detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrLanguage {
    Unk,
    ZhHans,
    ZhHant,
    Cs,
    Da,
    Nl,
    En,
    Fi,
    Fr,
    De,
    El,
    Hu,
    It,
    Ja,
    Ko,
    Nb,
    Pl,
    Pt,
    Ru,
    Es,
    Sv,
    Tr,
    Ar,
    Ro,
    SrCyrl,
    SrLatn,
    Sk,
}

impl OcrLanguage {
    /// Returns the BCP-47 code sent to the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unk => "unk",
            Self::ZhHans => "zh-Hans",
            Self::ZhHant => "zh-Hant",
            Self::Cs => "cs",
            Self::Da => "da",
            Self::Nl => "nl",
            Self::En => "en",
            Self::Fi => "fi",
            Self::Fr => "fr",
            Self::De => "de",
            Self::El => "el",
            Self::Hu => "hu",
            Self::It => "it",
            Self::Ja => "ja",
            Self::Ko => "ko",
            Self::Nb => "nb",
            Self::Pl => "pl",
            Self::Pt => "pt",
            Self::Ru => "ru",
            Self::Es => "es",
            Self::Sv => "sv",
            Self::Tr => "tr",
            Self::Ar => "ar",
            Self::Ro => "ro",
            Self::SrCyrl => "sr-Cyrl",
            Self::SrLatn => "sr-Latn",
            Self::Sk => "sk",
        }
    }
}

/// Optional parameters for [`recognize_printed_text`].
///
/// Unset values are omitted; the service defaults to `detectOrientation=true`
/// and `language=unk`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OcrOptions {
    detect_orientation: Option<bool>,
    language: Option<OcrLanguage>,
}

impl OcrOptions {
    /// Options with every parameter unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the service should detect and correct text orientation.
    pub fn detect_orientation(mut self, detect: bool) -> Self {
        self.detect_orientation = Some(detect);
        self
    }

    /// The language of the text.
    pub fn language(mut self, language: OcrLanguage) -> Self {
        self.language = Some(language);
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// The result of [`recognize_printed_text`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    /// Detected language code, e.g. `en`.
    pub language: Option<String>,
    /// Angle in degrees by which the text is rotated.
    pub text_angle: Option<f64>,
    /// Orientation of the text: `Up`, `Down`, `Left`, `Right`, or `NotDetected`.
    pub orientation: Option<String>,
    #[serde(default)]
    pub regions: Vec<OcrRegion>,
}

impl OcrResult {
    /// All recognized lines, in reading order, with words joined by spaces.
    pub fn lines(&self) -> Vec<String> {
        self.regions
            .iter()
            .flat_map(|region| &region.lines)
            .map(|line| {
                line.words
                    .iter()
                    .map(|word| word.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

/// A region of text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRegion {
    /// `"left,top,width,height"`.
    pub bounding_box: String,
    #[serde(default)]
    pub lines: Vec<OcrLine>,
}

/// A line of text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrLine {
    pub bounding_box: String,
    #[serde(default)]
    pub words: Vec<OcrWord>,
}

/// A single word.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrWord {
    pub bounding_box: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

async fn recognize(client: &ComputerVisionClient, image: ImageInput, options: &OcrOptions) -> ServiceResult<OcrResult> {
    tracing::debug!("submitting image for OCR");

    let request = image
        .into_request(&RECOGNIZE_PRINTED_TEXT)?
        .query_opt("detectOrientation", options.detect_orientation)
        .query_opt("language", options.language.map(|l| l.as_str()));

    let result: OcrResult = client.service().send(request).await?.json()?;

    tracing::debug!(regions = result.regions.len(), language = ?result.language, "OCR complete");
    Ok(result)
}

/// Recognize printed text in an image URL.
///
/// # Tracing
///
/// Emits a span named `vision::recognize_printed_text`.
#[tracing::instrument(name = "vision::recognize_printed_text", skip(client, url))]
pub async fn recognize_printed_text(
    client: &ComputerVisionClient,
    url: &str,
    options: &OcrOptions,
) -> ServiceResult<OcrResult> {
    recognize(client, ImageInput::Url(url.to_string()), options).await
}

/// Recognize printed text in raw image bytes.
#[tracing::instrument(name = "vision::recognize_printed_text_in_stream", skip(client, image))]
pub async fn recognize_printed_text_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    options: &OcrOptions,
) -> ServiceResult<OcrResult> {
    recognize(client, ImageInput::Stream(image.into()), options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_mock_client;
    use azure_cognitive_core::error::ServiceError;
    use azure_cognitive_core::test_support::json_error;
    use wiremock::matchers::{header, method, path as match_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ocr_body() -> serde_json::Value {
        serde_json::json!({
            "language": "en",
            "textAngle": -2.0,
            "orientation": "Up",
            "regions": [
                {
                    "boundingBox": "21,16,304,451",
                    "lines": [
                        {
                            "boundingBox": "28,16,288,41",
                            "words": [
                                {"boundingBox": "28,16,288,41", "text": "NOTHING"}
                            ]
                        },
                        {
                            "boundingBox": "27,66,283,52",
                            "words": [
                                {"boundingBox": "27,66,283,52", "text": "EXISTS"},
                                {"boundingBox": "30,120,100,40", "text": "EXCEPT"}
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[test]
    fn language_codes_match_service() {
        assert_eq!(OcrLanguage::Unk.as_str(), "unk");
        assert_eq!(OcrLanguage::ZhHans.as_str(), "zh-Hans");
        assert_eq!(OcrLanguage::SrLatn.as_str(), "sr-Latn");
        assert_eq!(OcrLanguage::En.as_str(), "en");
    }

    #[test]
    fn result_language_is_plain_string() {
        let result: OcrResult = serde_json::from_value(ocr_body()).expect("should deserialize");
        assert_eq!(result.language.as_deref(), Some("en"));
        assert_eq!(result.lines(), vec!["NOTHING", "EXISTS EXCEPT"]);
    }

    #[tokio::test]
    async fn recognize_printed_text_sends_options() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/ocr"))
            .and(query_param("detectOrientation", "false"))
            .and(query_param("language", "de"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
            .expect(1)
            .mount(&server)
            .await;

        let options = OcrOptions::new().detect_orientation(false).language(OcrLanguage::De);
        let result = recognize_printed_text(&client, "https://example.com/sign.png", &options)
            .await
            .expect("should succeed");

        assert_eq!(result.orientation.as_deref(), Some("Up"));
        assert_eq!(result.text_angle, Some(-2.0));
        assert_eq!(result.regions[0].lines[1].words[1].text, "EXCEPT");
    }

    #[tokio::test]
    async fn default_options_send_no_query() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/ocr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
            .expect(1)
            .mount(&server)
            .await;

        recognize_printed_text(&client, "https://example.com/sign.png", &OcrOptions::default())
            .await
            .expect("should succeed");

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test]
    async fn in_stream_variant_posts_bytes() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/ocr"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ocr_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = recognize_printed_text_in_stream(&client, vec![1u8, 2, 3], &OcrOptions::new())
            .await
            .expect("should succeed");
        assert_eq!(result.regions.len(), 1);
    }

    #[tokio::test]
    async fn not_found_maps_to_service_error() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/ocr"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "X",
                "message": "Y"
            })))
            .mount(&server)
            .await;

        let err = recognize_printed_text(&client, "https://example.com/sign.png", &OcrOptions::new())
            .await
            .expect_err("should fail");
        match err {
            ServiceError::Service {
                status, code, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "X");
                assert_eq!(message, "Y");
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_language_error_is_surfaced() {
        let server = MockServer::start().await;
        let client = setup_mock_client(&server);

        Mock::given(method("POST"))
            .and(match_path("/ocr"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json_error("NotSupportedLanguage", "Language not supported.")),
            )
            .mount(&server)
            .await;

        let err = recognize_printed_text(&client, "https://example.com/sign.png", &OcrOptions::new())
            .await
            .expect_err("should fail");
        assert_eq!(err.service_code(), Some("NotSupportedLanguage"));
    }
}
