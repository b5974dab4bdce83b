//! Per-request context threaded through the pipeline.
//!
//! # Responsibilities
//! - Capture method, URI, headers and the buffered raw body
//! - Parse query parameters and cookies up front
//! - Carry pipeline results: path params, decoded content, principal
//! - Offer a typed context bag for middleware-to-handler hand-off
//!
//! # Design Decisions
//! - Transport fields are read-only; pipeline-owned fields are set by the
//!   dispatcher and auth gate only
//! - The context bag is an `Extensions` map keyed by type

use std::collections::HashMap;
use std::time::Instant;

use axum::http::request::Parts;
use axum::http::{header, Extensions, HeaderMap, Method, Request, Uri};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::auth::Principal;
use crate::http::body::Content;
use crate::http::params::ParamMap;
use crate::routing::{PathParams, Route};

/// Everything known about one inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: ParamMap,
    cookies: HashMap<String, String>,
    body: Bytes,
    params: PathParams,
    content: Option<Content>,
    principal: Option<Principal>,
    context: Extensions,
    meta: Value,
    route_path: Option<String>,
    started_at: Option<Instant>,
    body_over_limit: bool,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let query = uri
            .query()
            .map(|q| ParamMap::parse(q.as_bytes()))
            .unwrap_or_default();
        let cookies = parse_cookies(&headers);
        Self {
            method,
            uri,
            headers,
            query,
            cookies,
            body,
            params: PathParams::new(),
            content: None,
            principal: None,
            context: Extensions::new(),
            meta: Value::Null,
            route_path: None,
            started_at: None,
            body_over_limit: false,
        }
    }

    /// Build from the head of an HTTP request and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, without the leading `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
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

    pub fn query(&self) -> &ParamMap {
        &self.query
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The body exactly as received.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Named captures from the matched route pattern.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Decoded body; absent for GET/HEAD, raw-request routes and parse failures.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Typed per-request values written by middleware.
    pub fn context(&self) -> &Extensions {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Extensions {
        &mut self.context
    }

    /// Metadata declared on the matched route.
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// Pattern of the matched route, e.g. `/users/:id`.
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.as_deref()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// True when the transport dropped the body for exceeding the configured
    /// size limit. The body is then empty and decodes as absent content.
    pub fn body_over_limit(&self) -> bool {
        self.body_over_limit
    }

    pub(crate) fn mark_body_over_limit(&mut self) {
        self.body_over_limit = true;
    }

    pub(crate) fn mark_started(&mut self, at: Instant) {
        self.started_at = Some(at);
    }

    pub(crate) fn attach_route(&mut self, route: &Route, params: PathParams) {
        self.params = params;
        self.meta = route.options().meta.clone();
        self.route_path = Some(route.path().to_owned());
    }

    pub(crate) fn set_content(&mut self, content: Option<Content>) {
        self.content = content;
    }

    pub(crate) fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }
}

impl From<Request<Bytes>> for RequestContext {
    fn from(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }
}

/// Collect `name=value` pairs from every `Cookie` header. First occurrence wins.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, raw)) = pair.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let raw = raw.trim();
            let raw = raw
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .unwrap_or(raw);
            let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
            cookies.entry(name.to_owned()).or_insert(decoded);
        }
    }
    cookies
}
