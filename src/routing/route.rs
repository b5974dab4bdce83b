//! Registered routes and their options.
//!
//! # Responsibilities
//! - Normalize and validate the HTTP method
//! - Compile the path pattern and score it once, at registration
//! - Carry per-route options (exposure, auth, cache, raw modes, metadata)
//! - Define the handler contract and what a handler may return
//!
//! # Design Decisions
//! - A `Route` is immutable once built; only its position in the table moves
//! - Exposure is resolved against the configured default at build time
//! - Options deserialize from camelCase so route manifests can carry them

use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::HttpError;
use crate::http::{json, RequestContext, Response};
use crate::routing::pattern::{PathParams, PathPattern, PatternError};
use crate::routing::specificity;

/// Methods a route may be registered for.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// Registration-time failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unsupported HTTP method {0:?}")]
    InvalidMethod(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Parse a method name case-insensitively.
pub fn parse_method(method: &str) -> Result<Method, RouteError> {
    let upper = method.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or_else(|| RouteError::InvalidMethod(method.to_owned()))
}

/// Cache policy: a bare TTL in seconds, or a TTL with an explicit key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachePolicy {
    Ttl(f64),
    Keyed {
        ttl: f64,
        #[serde(default)]
        key: Option<String>,
    },
}

impl CachePolicy {
    pub fn ttl(&self) -> f64 {
        match self {
            CachePolicy::Ttl(ttl) | CachePolicy::Keyed { ttl, .. } => *ttl,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            CachePolicy::Ttl(_) => None,
            CachePolicy::Keyed { key, .. } => key.as_deref(),
        }
    }

    /// Only a positive TTL routes the handler through the cache.
    pub fn is_active(&self) -> bool {
        self.ttl() > 0.0
    }
}

impl From<f64> for CachePolicy {
    fn from(ttl: f64) -> Self {
        CachePolicy::Ttl(ttl)
    }
}

/// Per-route options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteOptions {
    /// `None` falls back to `[routing] expose_by_default`.
    pub expose: Option<bool>,
    pub auth: bool,
    pub cache: Option<CachePolicy>,
    /// Skip body decoding.
    pub raw_request: bool,
    /// Handler output is the final response body.
    pub raw_response: bool,
    pub response_content_type: Option<String>,
    /// Opaque value copied onto every matched request.
    pub meta: Value,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = Some(expose);
        self
    }

    pub fn auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    pub fn cache(mut self, policy: impl Into<CachePolicy>) -> Self {
        self.cache = Some(policy.into());
        self
    }

    pub fn cache_with_key(mut self, ttl: f64, key: impl Into<String>) -> Self {
        self.cache = Some(CachePolicy::Keyed {
            ttl,
            key: Some(key.into()),
        });
        self
    }

    pub fn raw_request(mut self, raw: bool) -> Self {
        self.raw_request = raw;
        self
    }

    pub fn raw_response(mut self, raw: bool) -> Self {
        self.raw_response = raw;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response_content_type = Some(content_type.into());
        self
    }

    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// What a handler produced.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A value to be serialized with the route's content type.
    Json(Value),
    /// A finished response, used as-is.
    Response(Response),
}

impl Reply {
    /// Serialize any value into a JSON reply. `u128`/`i128` values outside
    /// the 64-bit range become decimal strings.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        Ok(Reply::Json(json::to_value(value)?))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Json(Value::String(text))
    }
}

impl From<&'static str> for Reply {
    fn from(text: &'static str) -> Self {
        Reply::Json(Value::String(text.to_owned()))
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<Reply, HttpError>>;

/// A route handler.
///
/// Implemented for async closures taking `Arc<RequestContext>`:
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use switchyard::{Dispatcher, HttpError, RequestContext};
///
/// let dispatcher = Dispatcher::default();
/// dispatcher
///     .get("/users/:id", |req: Arc<RequestContext>| async move {
///         Ok::<_, HttpError>(json!({ "id": req.param("id") }))
///     })
///     .unwrap();
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Arc<RequestContext>) -> HandlerFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HttpError>> + Send + 'static,
    R: Into<Reply>,
{
    fn call(&self, request: Arc<RequestContext>) -> HandlerFuture {
        (self)(request).map(|result| result.map(Into::into)).boxed()
    }
}

/// A route as supplied by a caller or a route source, before compilation.
#[derive(Clone)]
pub struct RouteDefinition {
    pub method: String,
    pub path: String,
    pub options: RouteOptions,
    pub handler: Arc<dyn Handler>,
}

impl RouteDefinition {
    pub fn new<H: Handler>(method: impl Into<String>, path: impl Into<String>, handler: H) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            options: RouteOptions::default(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Supplies route definitions in bulk (static lists, manifests, discovery).
pub trait RouteSource {
    fn routes(&self) -> Vec<RouteDefinition>;
}

impl RouteSource for Vec<RouteDefinition> {
    fn routes(&self) -> Vec<RouteDefinition> {
        self.clone()
    }
}

impl RouteSource for [RouteDefinition] {
    fn routes(&self) -> Vec<RouteDefinition> {
        self.to_vec()
    }
}

/// A compiled, registered route.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    options: RouteOptions,
    exposed: bool,
    score: u64,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Compile `definition`; `expose_by_default` applies when the options leave exposure unset.
    pub fn compile(definition: RouteDefinition, expose_by_default: bool) -> Result<Self, RouteError> {
        let method = parse_method(&definition.method)?;
        let pattern = PathPattern::compile(&definition.path)?;
        let score = specificity::score(&definition.path);
        let exposed = definition.options.expose.unwrap_or(expose_by_default);

        Ok(Self {
            method,
            pattern,
            options: definition.options,
            exposed,
            score,
            handler: definition.handler,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The pattern as registered.
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn is_exposed(&self) -> bool {
        self.exposed
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// OPTIONS requests are accepted by any route.
    pub fn accepts(&self, method: &Method) -> bool {
        self.method == *method || *method == Method::OPTIONS
    }

    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        self.pattern.match_path(path)
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            method: self.method.to_string(),
            path: self.path().to_owned(),
            score: self.score,
            exposed: self.exposed,
            auth: self.options.auth,
            cached: self.options.cache.as_ref().is_some_and(CachePolicy::is_active),
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("score", &self.score)
            .field("exposed", &self.exposed)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub method: String,
    pub path: String,
    pub score: u64,
    pub exposed: bool,
    pub auth: bool,
    pub cached: bool,
}
