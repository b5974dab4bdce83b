//! Cacheable form of a handler reply.
//!
//! Cache stores only hold JSON, so a reply that is a finished response is
//! flattened into status, headers and body on the way in and rebuilt on a
//! hit. Header values and the body are base64 so arbitrary bytes survive.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HttpError;
use crate::http::Response;
use crate::routing::Reply;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplySnapshot {
    Json {
        value: Value,
    },
    Response {
        status: u16,
        /// `(name, base64 value)` in map order, repeated names included.
        headers: Vec<(String, String)>,
        /// Base64 of the raw body.
        body: String,
    },
}

impl ReplySnapshot {
    pub fn capture(reply: &Reply) -> Self {
        match reply {
            Reply::Json(value) => ReplySnapshot::Json {
                value: value.clone(),
            },
            Reply::Response(response) => ReplySnapshot::Response {
                status: response.status().as_u16(),
                headers: response
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.as_str().to_owned(), STANDARD.encode(value.as_bytes())))
                    .collect(),
                body: STANDARD.encode(response.body()),
            },
        }
    }

    pub fn into_value(self) -> Result<Value, HttpError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a reply from a cached value.
    ///
    /// Values that are not snapshots (for example written by a custom cache
    /// provider) are treated as plain JSON replies.
    pub fn restore(value: Value) -> Reply {
        match serde_json::from_value::<ReplySnapshot>(value.clone()) {
            Ok(snapshot) => snapshot.into_reply().unwrap_or(Reply::Json(value)),
            Err(_) => Reply::Json(value),
        }
    }

    fn into_reply(self) -> Option<Reply> {
        match self {
            ReplySnapshot::Json { value } => Some(Reply::Json(value)),
            ReplySnapshot::Response {
                status,
                headers,
                body,
            } => {
                let status = StatusCode::from_u16(status).ok()?;
                let mut map = HeaderMap::with_capacity(headers.len());
                for (name, value) in headers {
                    let name = HeaderName::try_from(name).ok()?;
                    let value = STANDARD.decode(value).ok()?;
                    map.append(name, HeaderValue::from_bytes(&value).ok()?);
                }
                let body = STANDARD.decode(body).ok()?;
                Some(Reply::Response(Response::from_parts(status, map, body.into())))
            }
        }
    }
}
