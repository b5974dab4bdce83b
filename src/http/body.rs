//! Request body decoding.
//!
//! Decoding is best-effort: any parse failure yields no content instead of
//! failing the request.

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use serde_json::Value;

use crate::http::params::ParamMap;

/// A decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(ParamMap),
    /// `multipart/form-data`
    Multipart(MultipartForm),
    /// Anything else, read as text.
    Text(String),
}

impl Content {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&ParamMap> {
        match self {
            Content::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&MultipartForm> {
        match self {
            Content::Multipart(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormPart {
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// Parts of a `multipart/form-data` body in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    /// First part named `name`.
    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Text value of the first non-file part named `name`.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|p| p.name == name && !p.is_file())
            .and_then(FormPart::text)
    }

    pub fn files(&self) -> impl Iterator<Item = &FormPart> {
        self.parts.iter().filter(|p| p.is_file())
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Decode `body` according to the request's content type.
pub async fn decode(headers: &HeaderMap, body: Bytes) -> Option<Content> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/json" => match serde_json::from_slice(&body) {
            Ok(value) => Some(Content::Json(value)),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed JSON body");
                None
            }
        },
        "application/x-www-form-urlencoded" => Some(Content::Form(ParamMap::parse(&body))),
        "multipart/form-data" => match decode_multipart(content_type, body).await {
            Ok(form) => Some(Content::Multipart(form)),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding malformed multipart body");
                None
            }
        },
        _ => Some(Content::Text(String::from_utf8_lossy(&body).into_owned())),
    }
}

async fn decode_multipart(content_type: &str, body: Bytes) -> Result<MultipartForm, multer::Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let data = field.bytes().await?;
        parts.push(FormPart {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(MultipartForm { parts })
}
