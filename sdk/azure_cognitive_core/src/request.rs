//! Request assembly for a single operation call.

use crate::error::ServiceResult;
use crate::operation::Operation;
use bytes::Bytes;
use serde::Serialize;

/// Content type used for raw binary payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type used for XML payloads.
pub const APPLICATION_XML: &str = "application/xml";

/// The body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body at all.
    Empty,
    /// A JSON document.
    Json(serde_json::Value),
    /// Raw bytes sent as `application/octet-stream`.
    Binary(Bytes),
    /// An XML document.
    Xml(String),
}

/// The transport-ready parameters of one call.
///
/// Query parameters keep insertion order. Optional values passed as `None`
/// are omitted entirely so the service applies its documented default.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    operation: &'static Operation,
    path_params: Vec<(&'static str, String)>,
    query: Vec<(&'static str, String)>,
    headers: Vec<(String, String)>,
    body: RequestBody,
}

impl OperationRequest {
    /// Start a request for `operation`.
    pub fn new(operation: &'static Operation) -> Self {
        Self {
            operation,
            path_params: Vec::new(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Set a path template parameter.
    pub fn path_param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.path_params.push((name, value.into()));
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: &'static str, value: impl ToString) -> Self {
        self.query.push((name, value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn query_opt<T: ToString>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Add a comma-separated list parameter, preserving the caller's order.
    ///
    /// An empty list adds nothing.
    pub fn query_list<I, S>(self, name: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");

        if joined.is_empty() {
            self
        } else {
            self.query(name, joined)
        }
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a request header only when a value is present.
    pub fn header_opt<V: Into<String>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.header(name, value),
            None => self,
        }
    }

    /// Set a JSON body.
    pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> ServiceResult<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a raw binary body.
    pub fn binary_body(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Binary(bytes.into());
        self
    }

    /// Set an XML body.
    pub fn xml_body(mut self, xml: impl Into<String>) -> Self {
        self.body = RequestBody::Xml(xml.into());
        self
    }

    /// The operation this request targets.
    pub fn operation(&self) -> &'static Operation {
        self.operation
    }

    /// Path template parameters.
    pub fn path_params(&self) -> &[(&'static str, String)] {
        &self.path_params
    }

    /// Query parameters, in insertion order.
    pub fn query_pairs(&self) -> &[(&'static str, String)] {
        &self.query
    }

    /// Look up the first value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Request headers, in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up the first value of a request header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The request body.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (Vec<(String, String)>, RequestBody) {
        (self.headers, self.body)
    }
}
