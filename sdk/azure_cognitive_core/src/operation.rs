//! Static descriptors for REST endpoints.
//!
//! Each endpoint is described once by an [`Operation`]: its name (used for
//! tracing and error context), HTTP verb, path template, the status codes
//! that count as success, and the shape of its error body. Descriptors are
//! `static` items owned by the crate that exposes the endpoint.

use crate::error::{ServiceError, ServiceResult};
use reqwest::Method;

/// Wire format of an operation's error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFormat {
    /// `{"code": "...", "message": "..."}` or `{"error": {"code": ..., "message": ...}}`.
    Json,
    /// `<Error><Code>...</Code><Message>...</Message></Error>`, with the code
    /// also available in the `x-ms-error-code` header.
    Xml,
}

/// Fixed metadata describing one REST endpoint.
///
/// Path templates use `{name}` for a single percent-encoded segment and
/// `{name*}` for a value whose `/` separators are kept as segment boundaries.
#[derive(Debug)]
pub struct Operation {
    /// Operation name, used for tracing and error context.
    pub name: &'static str,
    /// HTTP verb.
    pub method: Method,
    /// Path template relative to the client's base URL.
    pub path: &'static str,
    /// Status codes that produce a typed result.
    pub success: &'static [u16],
    /// How to parse the body of a failed response.
    pub error_format: ErrorFormat,
}

impl Operation {
    /// Returns `true` if `status` is one of this operation's success codes.
    pub fn is_success(&self, status: u16) -> bool {
        self.success.contains(&status)
    }

    /// Render the path template into URL segments.
    ///
    /// Every placeholder must have a non-empty value in `params`; a missing or
    /// empty value is an [`ServiceError::InvalidArgument`]. A `{name*}` value
    /// splits on `/` and keeps empty segments, so `a//b` and `dir/` address
    /// exactly that name. `.` and `..` segments are rejected.
    pub(crate) fn render_segments(&self, params: &[(&'static str, String)]) -> ServiceResult<Vec<String>> {
        let mut segments = Vec::new();

        for raw in self.path.split('/').filter(|s| !s.is_empty()) {
            let Some(token) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                segments.push(raw.to_string());
                continue;
            };

            let (name, multi) = match token.strip_suffix('*') {
                Some(name) => (name, true),
                None => (token, false),
            };

            let value = params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ServiceError::InvalidArgument(format!("{name} is required for {}", self.name))
                })?;

            let parts: Vec<&str> = if multi { value.split('/').collect() } else { vec![value] };
            if let Some(dot) = parts.iter().find(|p| is_dot_segment(p)) {
                return Err(ServiceError::InvalidArgument(format!(
                    "{name} for {} cannot contain the path segment '{dot}'",
                    self.name
                )));
            }
            segments.extend(parts.into_iter().map(str::to_string));
        }

        Ok(segments)
    }
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    static ANALYZE_BY_DOMAIN: Operation = Operation {
        name: "analyze_image_by_domain",
        method: Method::POST,
        path: "/models/{model}/analyze",
        success: &[200],
        error_format: ErrorFormat::Json,
    };

    static GET_BLOB: Operation = Operation {
        name: "download_blob",
        method: Method::GET,
        path: "/{container}/{blob*}",
        success: &[200, 206],
        error_format: ErrorFormat::Xml,
    };

    #[test]
    fn success_codes_are_exact() {
        assert!(GET_BLOB.is_success(200));
        assert!(GET_BLOB.is_success(206));
        assert!(!GET_BLOB.is_success(201));
        assert!(!GET_BLOB.is_success(404));
    }

    #[test]
    fn renders_single_segment_placeholder() {
        let segments = ANALYZE_BY_DOMAIN
            .render_segments(&[("model", "celebrities".into())])
            .expect("should render");
        assert_eq!(segments, vec!["models", "celebrities", "analyze"]);
    }

    #[test]
    fn single_segment_placeholder_keeps_slashes_in_value() {
        let segments = ANALYZE_BY_DOMAIN
            .render_segments(&[("model", "a/b".into())])
            .expect("should render");
        assert_eq!(segments, vec!["models", "a/b", "analyze"]);
    }

    #[test]
    fn multi_segment_placeholder_splits_on_slash() {
        let segments = GET_BLOB
            .render_segments(&[
                ("container", "photos".into()),
                ("blob", "2024/summer/beach.jpg".into()),
            ])
            .expect("should render");
        assert_eq!(segments, vec!["photos", "2024", "summer", "beach.jpg"]);
    }

    #[test]
    fn multi_segment_placeholder_keeps_empty_segments() {
        let render = |blob: &str| {
            GET_BLOB
                .render_segments(&[("container", "photos".into()), ("blob", blob.into())])
                .expect("should render")
        };
        assert_eq!(render("/"), vec!["photos", "", ""]);
        assert_eq!(render("a//b"), vec!["photos", "a", "", "b"]);
        assert_eq!(render("dir/"), vec!["photos", "dir", ""]);
    }

    #[test]
    fn dot_segments_are_invalid_argument() {
        for blob in [".", "..", "a/../b", "./x"] {
            let err = GET_BLOB
                .render_segments(&[("container", "photos".into()), ("blob", blob.into())])
                .expect_err("should fail");
            assert!(matches!(err, ServiceError::InvalidArgument(_)), "{blob}: {err}");
        }
        let err = ANALYZE_BY_DOMAIN
            .render_segments(&[("model", "..".into())])
            .expect_err("should fail");
        assert!(err.to_string().contains("model"), "error: {err}");
    }

    #[test]
    fn missing_placeholder_is_invalid_argument() {
        let err = ANALYZE_BY_DOMAIN.render_segments(&[]).expect_err("should fail");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert!(err.to_string().contains("model"), "error: {err}");
    }

    #[test]
    fn empty_placeholder_is_invalid_argument() {
        let err = GET_BLOB
            .render_segments(&[("container", "".into()), ("blob", "x".into())])
            .expect_err("should fail");
        assert!(err.to_string().contains("container"), "error: {err}");
    }
}
