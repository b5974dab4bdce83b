//! Stock middleware.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};

use crate::error::HttpError;
use crate::http::{RequestContext, Response};
use crate::middleware::chain::AfterMiddleware;

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// After-middleware that stamps `x-response-time: <millis>ms` using the
/// request's start marker. Requests without a marker pass through untouched.
pub fn response_time() -> impl AfterMiddleware {
    |mut response: Response, request: Arc<RequestContext>| async move {
        if let Some(started) = request.started_at() {
            let millis = started.elapsed().as_secs_f64() * 1000.0;
            if let Ok(value) = HeaderValue::from_str(&format!("{millis:.3}ms")) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(RESPONSE_TIME_HEADER), value);
            }
        }
        Ok::<_, HttpError>(response)
    }
}
