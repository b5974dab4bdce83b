//! The request dispatcher.
//!
//! # Responsibilities
//! - Own the route table, middleware chain, auth gate and cache gate
//! - Register routes and middleware at any time through `&self`
//! - Run each request through the pipeline and always produce a response
//!
//! # Design Decisions
//! - Route table and middleware chain are immutable snapshots behind
//!   `ArcSwap`; writers publish a modified copy, readers never block
//! - A request keeps the snapshot it started with, even if routes change
//!   while it is in flight
//! - Errors are values (`HttpError`) until the single funnel at the end;
//!   panics are caught there too

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::http::{Method, StatusCode};
use futures_util::FutureExt;

use crate::auth::{AuthGate, Authenticator};
use crate::cache::{CacheGate, CacheProvider};
use crate::config::{AppConfig, CacheConfig, RoutingConfig};
use crate::dispatch::snapshot::ReplySnapshot;
use crate::error::HttpError;
use crate::http::{body, RequestContext, Response};
use crate::middleware::{AfterMiddleware, BeforeMiddleware, Flow, MiddlewareChain};
use crate::observability::metrics;
use crate::routing::{
    Handler, Reply, Route, RouteDefinition, RouteError, RouteMatch, RouteOptions, RouteSource,
    RouteSummary, RouteTable,
};

/// Routes requests through the pipeline.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct Dispatcher {
    config: RoutingConfig,
    routes: ArcSwap<RouteTable>,
    middleware: ArcSwap<MiddlewareChain>,
    auth: AuthGate,
    cache: CacheGate,
}

impl Dispatcher {
    pub fn new(routing: RoutingConfig, cache: CacheConfig) -> Self {
        Self {
            config: routing,
            routes: ArcSwap::from_pointee(RouteTable::new()),
            middleware: ArcSwap::from_pointee(MiddlewareChain::new()),
            auth: AuthGate::new(),
            cache: CacheGate::new(Duration::from_millis(cache.cleanup_interval_ms)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.routing.clone(), config.cache.clone())
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    // ----- routes -----

    /// Register `handler` for `method` and `path`.
    pub fn route<H: Handler>(
        &self,
        method: &str,
        path: &str,
        options: RouteOptions,
        handler: H,
    ) -> Result<(), RouteError> {
        self.add_route(RouteDefinition::new(method, path, handler).with_options(options))
    }

    pub fn get<H: Handler>(&self, path: &str, handler: H) -> Result<(), RouteError> {
        self.route("GET", path, RouteOptions::default(), handler)
    }

    pub fn post<H: Handler>(&self, path: &str, handler: H) -> Result<(), RouteError> {
        self.route("POST", path, RouteOptions::default(), handler)
    }

    pub fn put<H: Handler>(&self, path: &str, handler: H) -> Result<(), RouteError> {
        self.route("PUT", path, RouteOptions::default(), handler)
    }

    pub fn patch<H: Handler>(&self, path: &str, handler: H) -> Result<(), RouteError> {
        self.route("PATCH", path, RouteOptions::default(), handler)
    }

    pub fn delete<H: Handler>(&self, path: &str, handler: H) -> Result<(), RouteError> {
        self.route("DELETE", path, RouteOptions::default(), handler)
    }

    /// Compile and insert one route.
    pub fn add_route(&self, definition: RouteDefinition) -> Result<(), RouteError> {
        let route = Arc::new(self.compile(definition)?);
        tracing::debug!(
            method = %route.method(),
            path = route.path(),
            score = route.score(),
            exposed = route.is_exposed(),
            "Route registered"
        );

        self.routes.rcu(|table| {
            let mut next = RouteTable::clone(table);
            next.insert(Arc::clone(&route));
            next
        });
        metrics::record_route_count(self.route_count());
        Ok(())
    }

    /// Append every route from `source`. Nothing is registered if any fails to compile.
    pub fn load_routes<S: RouteSource + ?Sized>(&self, source: &S) -> Result<usize, RouteError> {
        let compiled = self.compile_all(source)?;
        let count = compiled.len();
        self.routes.rcu(|table| {
            let mut next = RouteTable::clone(table);
            for route in &compiled {
                next.insert(Arc::clone(route));
            }
            next
        });
        metrics::record_route_count(self.route_count());
        tracing::info!(count, total = self.route_count(), "Routes loaded");
        Ok(count)
    }

    /// Swap the whole table for the routes in `source`.
    ///
    /// The old table stays in place if any route fails to compile.
    pub fn replace_routes<S: RouteSource + ?Sized>(&self, source: &S) -> Result<usize, RouteError> {
        let compiled = self.compile_all(source)?;
        let mut table = RouteTable::new();
        for route in compiled {
            table.insert(route);
        }
        let count = table.len();
        self.routes.store(Arc::new(table));
        metrics::record_route_count(count);
        tracing::info!(count, "Route table replaced");
        Ok(count)
    }

    pub fn clear_routes(&self) {
        self.routes.store(Arc::new(RouteTable::new()));
        metrics::record_route_count(0);
        tracing::info!("Route table cleared");
    }

    /// Registered routes in dispatch order.
    pub fn routes(&self) -> Vec<RouteSummary> {
        self.routes.load().summaries()
    }

    pub fn route_count(&self) -> usize {
        self.routes.load().len()
    }

    fn compile(&self, definition: RouteDefinition) -> Result<Route, RouteError> {
        let method = definition.method.clone();
        let path = definition.path.clone();
        Route::compile(definition, self.config.expose_by_default).inspect_err(|e| {
            tracing::error!(method = %method, path = %path, error = %e, "Rejected route");
        })
    }

    fn compile_all<S: RouteSource + ?Sized>(&self, source: &S) -> Result<Vec<Arc<Route>>, RouteError> {
        source
            .routes()
            .into_iter()
            .map(|definition| self.compile(definition).map(Arc::new))
            .collect()
    }

    // ----- middleware -----

    /// Append a before-middleware.
    pub fn before<M: BeforeMiddleware>(&self, middleware: M) {
        let middleware: Arc<dyn BeforeMiddleware> = Arc::new(middleware);
        self.before_all([middleware]);
    }

    /// Append an after-middleware.
    pub fn after<M: AfterMiddleware>(&self, middleware: M) {
        let middleware: Arc<dyn AfterMiddleware> = Arc::new(middleware);
        self.after_all([middleware]);
    }

    /// Append several before-middleware in order.
    pub fn before_all<I>(&self, middleware: I)
    where
        I: IntoIterator<Item = Arc<dyn BeforeMiddleware>>,
    {
        let added: Vec<_> = middleware.into_iter().collect();
        self.middleware.rcu(|chain| {
            let mut next = MiddlewareChain::clone(chain);
            next.extend_before(added.iter().cloned());
            next
        });
    }

    /// Append several after-middleware in order.
    pub fn after_all<I>(&self, middleware: I)
    where
        I: IntoIterator<Item = Arc<dyn AfterMiddleware>>,
    {
        let added: Vec<_> = middleware.into_iter().collect();
        self.middleware.rcu(|chain| {
            let mut next = MiddlewareChain::clone(chain);
            next.extend_after(added.iter().cloned());
            next
        });
    }

    /// Independent copy of the current chain.
    pub fn middleware(&self) -> MiddlewareChain {
        MiddlewareChain::clone(&self.middleware.load())
    }

    pub fn set_middleware(&self, chain: MiddlewareChain) {
        self.middleware.store(Arc::new(chain));
    }

    // ----- auth and cache -----

    pub fn set_authenticator<A: Authenticator>(&self, authenticator: A) {
        self.auth.set(authenticator);
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn set_cache_provider<P: CacheProvider>(&self, provider: P) {
        self.cache.set_provider(provider);
    }

    pub fn cache(&self) -> &CacheGate {
        &self.cache
    }

    // ----- dispatch -----

    /// Run `request` through the pipeline. Never fails: every error, and any
    /// panic, becomes an error response.
    pub async fn dispatch(&self, mut request: RequestContext) -> Response {
        let started = Instant::now();
        request.mark_started(started);
        let method = request.method().clone();
        let path = request.path().to_owned();

        let response = match AssertUnwindSafe(self.run(request)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let status = err.status_code();
                if status.is_server_error() {
                    tracing::error!(%method, path = %path, status = status.as_u16(), error = %err, "Request failed");
                } else {
                    tracing::debug!(%method, path = %path, status = status.as_u16(), error = %err, "Request rejected");
                }
                err.into_response()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(%method, path = %path, panic = message, "Handler panicked");
                HttpError::Internal(message.to_owned()).into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), started);
        response
    }

    async fn run(&self, request: RequestContext) -> Result<Response, HttpError> {
        // 1. Match
        let table = self.routes.load_full();
        let Some(RouteMatch { route, params }) = table.find(request.method(), request.path()) else {
            tracing::debug!(method = %request.method(), path = request.path(), "No route matched");
            return Err(HttpError::NotFound);
        };

        // 2. Exposure
        if !route.is_exposed() {
            tracing::warn!(method = %request.method(), route = route.path(), "Blocked request to unexposed route");
            return Err(HttpError::Forbidden);
        }
        tracing::debug!(method = %request.method(), path = request.path(), route = route.path(), "Route matched");

        let mut request = request;
        request.attach_route(&route, params);
        let options = route.options();

        // 3. Before middleware
        let chain = self.middleware.load_full();
        let mut request = match chain.run_before(request).await? {
            Flow::Continue(request) => request,
            Flow::Respond(response) => {
                tracing::debug!(route = route.path(), status = response.status().as_u16(), "Before middleware responded");
                return Ok(response);
            }
        };

        // 4. Auth
        if options.auth {
            if let Err(err) = self.auth.authenticate(&mut request).await {
                let message = err
                    .message()
                    .map(str::to_owned)
                    .unwrap_or_else(|| self.config.unauthorized_message.clone());
                tracing::warn!(route = route.path(), reason = %message, "Authentication failed");
                return Err(HttpError::Unauthorized(message));
            }
        }

        // 5. Body decoding
        if !options.raw_request && *request.method() != Method::GET && *request.method() != Method::HEAD {
            let content = body::decode(request.headers(), request.body_bytes().clone()).await;
            request.set_content(content);
        }

        // 6. Handler, through the cache when the route asks for it
        let request = Arc::new(request);
        let reply = match options.cache.as_ref().filter(|policy| policy.is_active()) {
            Some(policy) => {
                let key = policy
                    .key()
                    .map(str::to_owned)
                    .unwrap_or_else(|| CacheGate::generate_key(&request));
                let handler = Arc::clone(route.handler());
                let cached_request = Arc::clone(&request);
                let value = self
                    .cache
                    .get(
                        &key,
                        move || async move {
                            let reply = handler.call(cached_request).await?;
                            ReplySnapshot::capture(&reply).into_value()
                        },
                        policy.ttl(),
                    )
                    .await?;
                ReplySnapshot::restore(value)
            }
            None => route.handler().call(Arc::clone(&request)).await?,
        };

        // 7. Normalize
        let response = match reply {
            Reply::Response(response) => response,
            Reply::Json(value) if options.raw_response => {
                Response::raw(value, options.response_content_type.as_deref())
            }
            Reply::Json(value) => {
                let content_type = options
                    .response_content_type
                    .as_deref()
                    .unwrap_or(&self.config.default_content_type);
                Response::encode(StatusCode::OK, &value, content_type)?
            }
        };

        // 8. After middleware
        chain.run_after(response, &request).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RoutingConfig::default(), CacheConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("routes", &self.route_count())
            .field("middleware", &self.middleware.load())
            .field("auth", &self.auth)
            .field("cache", &self.cache)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "Internal Server Error"
    }
}
