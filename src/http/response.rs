//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hold the final status, headers and buffered body of a request
//! - Build JSON, text and raw responses for handlers and middleware
//! - Convert into an Axum response at the server boundary
//!
//! # Design Decisions
//! - Bodies are fully buffered `Bytes`; no streaming through the pipeline
//! - Cloning is cheap so responses can be cached and replayed

use std::borrow::Cow;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::http::json;

/// A complete HTTP response produced by the pipeline.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Serialize `value` as a JSON body. Integers wider than 64 bits are
    /// written as decimal strings.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(&json::Wide(value))?;
        Ok(Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Plain text body.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
            .with_body(body.into())
    }

    /// Encode a handler value for the given content type.
    pub fn encode(status: StatusCode, value: &Value, content_type: &str) -> Result<Self, serde_json::Error> {
        let body = json::encode_body(value, content_type)?;
        Ok(Self::new(status).with_content_type(content_type).with_body(body))
    }

    /// Wrap a handler value without serialization rules.
    ///
    /// Strings become the body verbatim, `null` becomes an empty body and
    /// anything else is written as JSON text.
    pub fn raw(value: Value, content_type: Option<&str>) -> Self {
        let body = match value {
            Value::Null => Bytes::new(),
            Value::String(text) => Bytes::from(text),
            other => Bytes::from(other.to_string()),
        };
        let response = Self::ok().with_body(body);
        match content_type {
            Some(content_type) => response.with_content_type(content_type),
            None => response,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set `name`, replacing any previous values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the content type, ignoring values that are not valid header text.
    pub fn with_content_type(self, content_type: &str) -> Self {
        match HeaderValue::from_str(content_type) {
            Ok(value) => self.with_header(header::CONTENT_TYPE, value),
            Err(_) => {
                tracing::warn!(content_type, "Ignoring invalid content type");
                self
            }
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
