//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that hands every request to the dispatcher
//! - Wire up transport middleware (request ID, tracing, timeout)
//! - Buffer request bodies up to the configured limit
//! - Bind to a listener and shut down gracefully

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::http::RequestContext;

/// Application state injected into the fallback handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a [`Dispatcher`].
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(config: AppConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            dispatcher,
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The fully layered router, e.g. for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Every request, whatever its path, goes through the dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> impl IntoResponse {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let (body, over_limit) = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => (bytes, false),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %parts.uri.path(),
                limit = state.max_body_bytes,
                error = %e,
                "Request body unreadable or over limit, dropping it"
            );
            (Default::default(), true)
        }
    };

    let mut context = RequestContext::from_parts(parts, body);
    if over_limit {
        context.mark_body_over_limit();
    }
    state.dispatcher.dispatch(context).await
}
