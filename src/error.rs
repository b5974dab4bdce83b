//! Request-time error taxonomy.
//!
//! Every stage of the pipeline reports failure as an [`HttpError`]; the
//! dispatcher turns it into a [`Response`] carrying the standard error body:
//!
//! ```json
//! { "error": true, "message": "...", "statusCode": 404, "timestamp": "2024-01-01T00:00:00.000Z" }
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::Response;

/// A terminal pipeline outcome other than a normal handler reply.
#[derive(Debug, Error)]
pub enum HttpError {
    /// No registered route accepts the method and path.
    #[error("Route not found")]
    NotFound,

    /// The route exists but is not exposed to callers.
    #[error("Forbidden")]
    Forbidden,

    /// Authentication failed, errored, or no authenticator is configured.
    #[error("{0}")]
    Unauthorized(String),

    /// An intentional error raised by a handler or middleware.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Anything else that went wrong while handling the request.
    #[error("{0}")]
    Internal(String),

    /// A complete response used to leave the pipeline early.
    #[error("early response with status {}", .0.status())]
    Respond(Box<Response>),
}

impl HttpError {
    /// Error with an explicit status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HttpError::Status {
            status,
            message: message.into(),
        }
    }

    /// Error with an explicit status and its canonical reason as the message.
    pub fn with_status(status: StatusCode) -> Self {
        let message = status.canonical_reason().unwrap_or("Unknown Error");
        Self::new(status, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        HttpError::Internal(message.to_string())
    }

    /// Leave the pipeline immediately with `response`.
    pub fn respond(response: Response) -> Self {
        HttpError::Respond(Box::new(response))
    }

    /// The HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::Forbidden => StatusCode::FORBIDDEN,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::Status { status, .. } => *status,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Respond(response) => response.status(),
        }
    }

    /// Render the error. A carried response is returned unchanged.
    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            HttpError::Respond(response) => return *response,
            other => ErrorBody::new(status, other.to_string()),
        };
        match serde_json::to_vec(&body) {
            Ok(bytes) => Response::new(status)
                .with_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )
                .with_body(bytes),
            Err(_) => Response::text(status, body.message),
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Internal(err.to_string())
    }
}

impl From<Response> for HttpError {
    fn from(response: Response) -> Self {
        HttpError::respond(response)
    }
}

/// Wire shape of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
    pub status_code: u16,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            status_code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
