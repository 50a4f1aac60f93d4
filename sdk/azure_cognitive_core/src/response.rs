//! Response classification and decoding.
//!
//! A [`ResponseEnvelope`] holds the raw status, headers, and body of one
//! exchange. Its projection methods first [`classify`] the status against the
//! operation's success codes: on success the body is decoded into the typed
//! result, otherwise the body is parsed into a [`ServiceError`].

use crate::error::{ServiceError, ServiceResult};
use crate::operation::{ErrorFormat, Operation};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;

/// Maximum length for error messages to prevent sensitive data leaks.
const MAX_ERROR_MESSAGE_LEN: usize = 1000;

/// Header carrying the storage error code.
pub const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Outcome class of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The status is one of the operation's success codes.
    Success,
    /// Any other status.
    Failure,
}

/// Classify `status` against an operation's registered success codes.
pub fn classify(status: u16, success: &[u16]) -> Disposition {
    if success.contains(&status) {
        Disposition::Success
    } else {
        Disposition::Failure
    }
}

/// A typed body paired with typed response headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse<T, H> {
    /// The decoded body (`()` for header-only responses).
    pub body: T,
    /// The decoded response headers.
    pub headers: H,
}

impl<T, H> ServiceResponse<T, H> {
    /// Discard the headers.
    pub fn into_body(self) -> T {
        self.body
    }

    /// Split into body and headers.
    pub fn into_parts(self) -> (T, H) {
        (self.body, self.headers)
    }
}

/// Read access to response headers on behalf of one operation.
///
/// Missing required headers are reported as deserialization failures, since
/// they indicate a contract mismatch rather than a service error.
#[derive(Debug, Clone, Copy)]
pub struct HeaderReader<'a> {
    operation: &'static str,
    headers: &'a HeaderMap,
}

impl<'a> HeaderReader<'a> {
    /// Wrap `headers` for `operation`.
    pub fn new(operation: &'static str, headers: &'a HeaderMap) -> Self {
        Self { operation, headers }
    }

    /// The name of the operation the headers belong to.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Return a header value as a string, if present and valid UTF-8.
    pub fn optional(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Return a header value, failing if it is absent.
    pub fn required(&self, name: &str) -> ServiceResult<String> {
        self.optional(name).ok_or_else(|| {
            ServiceError::deserialization(self.operation, format!("{name} header missing from response"))
        })
    }

    /// Parse an optional header value.
    pub fn parse<T>(&self, name: &str) -> ServiceResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    ServiceError::deserialization(self.operation, format!("invalid {name} header '{raw}': {e}"))
                })
            })
            .transpose()
    }

    /// Collect all headers whose name starts with `prefix`, with the prefix removed.
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(prefix)?;
                let value = value.to_str().ok()?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }
}

/// Typed view over the headers of a successful response.
pub trait FromHeaders: Sized {
    /// Build the typed headers.
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self>;
}

impl FromHeaders for () {
    fn from_headers(_: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(())
    }
}

/// The raw outcome of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    operation: &'static Operation,
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseEnvelope {
    /// Assemble an envelope.
    pub fn new(operation: &'static Operation, status: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            operation,
            status,
            headers,
            body,
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The operation that produced this response.
    pub fn operation(&self) -> &'static Operation {
        self.operation
    }

    /// Classify the status against the operation's success codes.
    pub fn disposition(&self) -> Disposition {
        classify(self.status, self.operation.success)
    }

    /// Return the envelope on success, or the parsed service error.
    pub fn into_result(self) -> ServiceResult<Self> {
        match self.disposition() {
            Disposition::Success => Ok(self),
            Disposition::Failure => Err(self.into_error()),
        }
    }

    /// Decode a JSON success body.
    pub fn json<T: DeserializeOwned>(self) -> ServiceResult<T> {
        let envelope = self.into_result()?;
        decode_json(envelope.operation.name, &envelope.body)
    }

    /// Decode an XML success body.
    pub fn xml<T: DeserializeOwned>(self) -> ServiceResult<T> {
        let envelope = self.into_result()?;
        decode_xml(envelope.operation.name, &envelope.body)
    }

    /// Return the raw success body.
    pub fn bytes(self) -> ServiceResult<Bytes> {
        Ok(self.into_result()?.body)
    }

    /// Discard the success body.
    pub fn empty(self) -> ServiceResult<()> {
        self.into_result().map(|_| ())
    }

    /// Decode the headers of a success response whose body is discarded.
    pub fn headers_only<H: FromHeaders>(self) -> ServiceResult<ServiceResponse<(), H>> {
        let envelope = self.into_result()?;
        let headers = H::from_headers(&HeaderReader::new(envelope.operation.name, &envelope.headers))?;
        Ok(ServiceResponse { body: (), headers })
    }

    /// Return the raw success body together with decoded headers.
    pub fn bytes_with_headers<H: FromHeaders>(self) -> ServiceResult<ServiceResponse<Bytes, H>> {
        let envelope = self.into_result()?;
        let headers = H::from_headers(&HeaderReader::new(envelope.operation.name, &envelope.headers))?;
        Ok(ServiceResponse {
            body: envelope.body,
            headers,
        })
    }

    /// Decode a JSON success body together with decoded headers.
    pub fn json_with_headers<T: DeserializeOwned, H: FromHeaders>(self) -> ServiceResult<ServiceResponse<T, H>> {
        let envelope = self.into_result()?;
        let headers = H::from_headers(&HeaderReader::new(envelope.operation.name, &envelope.headers))?;
        let body = decode_json(envelope.operation.name, &envelope.body)?;
        Ok(ServiceResponse { body, headers })
    }

    /// Parse a failed response into a [`ServiceError`].
    pub fn into_error(self) -> ServiceError {
        let request_id = header_str(&self.headers, "x-ms-request-id")
            .or_else(|| header_str(&self.headers, "apim-request-id"));

        let parsed = match self.operation.error_format {
            ErrorFormat::Json => parse_json_error(&self.body),
            ErrorFormat::Xml => parse_xml_error(&self.headers, &self.body),
        };

        match parsed {
            Some(body) => ServiceError::Service {
                status: self.status,
                code: body.code,
                message: truncate_message(&body.message),
                request_id: body.request_id.or(request_id),
            },
            None => {
                let text = String::from_utf8_lossy(&self.body);
                let message = if text.trim().is_empty() {
                    reqwest::StatusCode::from_u16(self.status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("no response body")
                        .to_string()
                } else {
                    text.into_owned()
                };
                ServiceError::http(self.status, truncate_message(&message))
            }
        }
    }
}

struct ErrorBody {
    code: String,
    message: String,
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct JsonErrorDetail {
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "requestId")]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct JsonErrorEnvelope {
    error: JsonErrorDetail,
}

#[derive(Deserialize)]
struct XmlErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

fn parse_json_error(body: &[u8]) -> Option<ErrorBody> {
    let detail = serde_json::from_slice::<JsonErrorEnvelope>(body)
        .map(|e| e.error)
        .or_else(|_| serde_json::from_slice::<JsonErrorDetail>(body))
        .ok()?;

    let code = detail.code?;
    let message = detail
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    Some(ErrorBody {
        code,
        message,
        request_id: detail.request_id,
    })
}

fn parse_xml_error(headers: &HeaderMap, body: &[u8]) -> Option<ErrorBody> {
    let parsed = std::str::from_utf8(body)
        .ok()
        .filter(|text| !text.trim().is_empty())
        .and_then(|text| serde_xml_rs::from_str::<XmlErrorBody>(text).ok());

    let code = header_str(headers, ERROR_CODE_HEADER)
        .or_else(|| parsed.as_ref().and_then(|p| p.code.clone()))?;
    let message = parsed
        .and_then(|p| p.message)
        .map(|m| m.trim().to_string())
        .unwrap_or_else(|| code.clone());

    Some(ErrorBody {
        code,
        message,
        request_id: None,
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn decode_json<T: DeserializeOwned>(operation: &'static str, body: &[u8]) -> ServiceResult<T> {
    serde_json::from_slice(body).map_err(|e| ServiceError::deserialization(operation, e))
}

pub(crate) fn decode_xml<T: DeserializeOwned>(operation: &'static str, body: &[u8]) -> ServiceResult<T> {
    let text = std::str::from_utf8(body).map_err(|e| ServiceError::deserialization(operation, e))?;
    // Strip a UTF-8 byte-order mark; storage listings sometimes carry one.
    let text = text.trim_start_matches('\u{feff}');
    serde_xml_rs::from_str(text).map_err(|e| ServiceError::deserialization(operation, e))
}

/// Replace the token following each occurrence of `marker` with `[REDACTED]`.
fn redact_after(mut result: String, marker: &str) -> String {
    let mut search_start = 0;
    while let Some(relative_pos) = result[search_start..].find(marker) {
        let token_start = search_start + relative_pos + marker.len();

        if result[token_start..].starts_with("[REDACTED]") {
            search_start = token_start + 10;
            continue;
        }

        let token_end = result[token_start..]
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '&' | '<'))
            .map(|pos| token_start + pos)
            .unwrap_or(result.len());

        if token_end > token_start {
            result.replace_range(token_start..token_end, "[REDACTED]");
            search_start = token_start + 10; // "[REDACTED]" is 10 chars
        } else {
            search_start = token_start;
        }
    }
    result
}

/// Remove credentials that services sometimes echo back in error text:
/// bearer tokens, subscription keys, and SAS signatures.
pub(crate) fn sanitize_error_message(msg: &str) -> String {
    let mut result = msg.to_string();
    for marker in ["Bearer ", "Ocp-Apim-Subscription-Key: ", "sig="] {
        result = redact_after(result, marker);
    }
    result
}

/// Sanitize, then truncate a message that exceeds the maximum length.
pub(crate) fn truncate_message(msg: &str) -> String {
    let sanitized = sanitize_error_message(msg);

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &sanitized[..end])
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use reqwest::Method;

    static JSON_OP: Operation = Operation {
        name: "describe_image",
        method: Method::POST,
        path: "/describe",
        success: &[200],
        error_format: ErrorFormat::Json,
    };

    static XML_OP: Operation = Operation {
        name: "delete_container",
        method: Method::DELETE,
        path: "/{container}",
        success: &[202],
        error_format: ErrorFormat::Xml,
    };

    static ACCEPTED_OP: Operation = Operation {
        name: "recognize_text",
        method: Method::POST,
        path: "/recognizeText",
        success: &[202],
        error_format: ErrorFormat::Json,
    };

    #[derive(Debug, PartialEq)]
    struct LocationHeaders {
        location: String,
    }

    impl FromHeaders for LocationHeaders {
        fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
            Ok(Self {
                location: headers.required("Operation-Location")?,
            })
        }
    }

    fn envelope(op: &'static Operation, status: u16, body: &'static str) -> ResponseEnvelope {
        ResponseEnvelope::new(op, status, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn classify_is_a_pure_status_lookup() {
        assert_eq!(classify(200, &[200]), Disposition::Success);
        assert_eq!(classify(202, &[200]), Disposition::Failure);
        assert_eq!(classify(202, &[202]), Disposition::Success);
        assert_eq!(classify(206, &[200, 206]), Disposition::Success);
    }

    #[test]
    fn success_body_decodes_as_json() {
        let value: serde_json::Value = envelope(&JSON_OP, 200, r#"{"requestId":"r-1"}"#)
            .json()
            .expect("should decode");
        assert_eq!(value["requestId"], "r-1");
    }

    #[test]
    fn flat_json_error_is_service_error() {
        let err = envelope(&JSON_OP, 404, r#"{"code":"X","message":"Y","requestId":"r-9"}"#)
            .json::<serde_json::Value>()
            .expect_err("should fail");
        match err {
            ServiceError::Service {
                status,
                code,
                message,
                request_id,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "X");
                assert_eq!(message, "Y");
                assert_eq!(request_id.as_deref(), Some("r-9"));
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[test]
    fn nested_json_error_is_service_error() {
        let err = envelope(
            &JSON_OP,
            400,
            r#"{"error":{"code":"InvalidImageUrl","message":"Image URL is badly formatted."}}"#,
        )
        .json::<serde_json::Value>()
        .expect_err("should fail");
        assert_eq!(err.service_code(), Some("InvalidImageUrl"));
        assert!(err.to_string().contains("badly formatted"));
    }

    #[test]
    fn unparseable_error_body_is_http_error() {
        let err = envelope(&JSON_OP, 503, "Service Unavailable")
            .json::<serde_json::Value>()
            .expect_err("should fail");
        match err {
            ServiceError::Http { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_body_uses_canonical_reason() {
        let err = envelope(&JSON_OP, 404, "").empty().expect_err("should fail");
        assert_eq!(err.to_string(), "HTTP error: 404 - Not Found");
    }

    #[test]
    fn malformed_success_body_is_deserialization_error() {
        let err = envelope(&JSON_OP, 200, "{not json")
            .json::<serde_json::Value>()
            .expect_err("should fail");
        match err {
            ServiceError::Deserialization { operation, .. } => assert_eq!(operation, "describe_image"),
            other => panic!("expected Deserialization error, got {other:?}"),
        }
    }

    #[test]
    fn xml_error_prefers_error_code_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ERROR_CODE_HEADER, HeaderValue::from_static("ContainerNotFound"));
        headers.insert("x-ms-request-id", HeaderValue::from_static("req-42"));
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?><Error><Code>Other</Code><Message>The specified container does not exist.</Message></Error>";
        let err = ResponseEnvelope::new(&XML_OP, 404, headers, Bytes::from_static(body.as_bytes()))
            .into_error();
        match err {
            ServiceError::Service {
                status,
                code,
                message,
                request_id,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "ContainerNotFound");
                assert_eq!(message, "The specified container does not exist.");
                assert_eq!(request_id.as_deref(), Some("req-42"));
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[test]
    fn xml_error_without_body_uses_header_code() {
        let mut headers = HeaderMap::new();
        headers.insert(ERROR_CODE_HEADER, HeaderValue::from_static("BlobNotFound"));
        let err = ResponseEnvelope::new(&XML_OP, 404, headers, Bytes::new()).into_error();
        assert_eq!(err.service_code(), Some("BlobNotFound"));
    }

    #[test]
    fn accepted_response_yields_headers_and_empty_body() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Operation-Location",
            HeaderValue::from_static("https://westus.api.cognitive.microsoft.com/vision/v2.0/textOperations/123"),
        );
        let response = ResponseEnvelope::new(&ACCEPTED_OP, 202, headers, Bytes::new())
            .headers_only::<LocationHeaders>()
            .expect("should succeed");
        assert_eq!(response.body, ());
        assert_eq!(
            response.headers.location,
            "https://westus.api.cognitive.microsoft.com/vision/v2.0/textOperations/123"
        );
    }

    #[test]
    fn missing_required_header_is_deserialization_error() {
        let err = envelope(&ACCEPTED_OP, 202, "")
            .headers_only::<LocationHeaders>()
            .expect_err("should fail");
        assert!(matches!(err, ServiceError::Deserialization { .. }));
        assert!(err.to_string().contains("Operation-Location"));
    }

    #[test]
    fn header_reader_collects_prefixed_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-meta-owner", HeaderValue::from_static("alice"));
        headers.insert("x-ms-meta-project", HeaderValue::from_static("vision"));
        headers.insert("content-length", HeaderValue::from_static("12"));
        let reader = HeaderReader::new("get_properties", &headers);

        let mut meta = reader.with_prefix("x-ms-meta-");
        meta.sort();
        assert_eq!(
            meta,
            vec![
                ("owner".to_string(), "alice".to_string()),
                ("project".to_string(), "vision".to_string())
            ]
        );
        assert_eq!(reader.parse::<u64>("content-length").expect("valid"), Some(12));
        assert!(reader.parse::<u64>("x-ms-meta-owner").is_err());
    }

    // --- Error sanitization ---

    #[test]
    fn sanitization_removes_bearer_tokens() {
        let result = sanitize_error_message("Invalid token: Bearer eyJhbGciOiJSUzI1NiJ9.abc");
        assert!(!result.contains("eyJhbGci"));
        assert!(result.contains("Bearer [REDACTED]"));
    }

    #[test]
    fn sanitization_removes_sas_signatures() {
        let result = sanitize_error_message(
            "Signature did not match. String to sign used was r sv=2021-08-06&sig=AbCdEf%2Bgh%3D&se=2030",
        );
        assert!(!result.contains("AbCdEf"));
        assert!(result.contains("sig=[REDACTED]&se=2030"));
    }

    #[test]
    fn sanitization_preserves_legitimate_errors() {
        let msg = "Input image is too large. The image must be smaller than 4MB.";
        assert_eq!(sanitize_error_message(msg), msg);
    }

    #[test]
    fn sanitization_before_truncation() {
        let padding = "x".repeat(990);
        let msg = format!("{padding} Bearer averylongtokenthatwouldbetrimmed");
        let result = truncate_message(&msg);
        assert!(!result.contains("averylongtoken"));
        assert!(result.ends_with("... (truncated)"));
    }

    #[test]
    fn error_messages_are_sanitized_in_service_errors() {
        let err = envelope(
            &JSON_OP,
            401,
            r#"{"code":"Unauthorized","message":"Access denied for Bearer secret-token-value"}"#,
        )
        .into_error();
        let text = err.to_string();
        assert!(!text.contains("secret-token-value"), "text: {text}");
        assert!(text.contains("[REDACTED]"), "text: {text}");
    }
}
