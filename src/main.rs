//! switchyard server binary.
//!
//! Loads configuration, registers a small demo route set and serves it.
//!
//! ```text
//! switchyard [--config PATH] [--bind ADDR] [--list-routes]
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use switchyard::config::{load_config, AppConfig};
use switchyard::http::Content;
use switchyard::lifecycle::{shutdown_signal, Shutdown};
use switchyard::middleware::response_time;
use switchyard::observability::{logging, metrics};
use switchyard::{AuthError, Dispatcher, HttpError, HttpServer, Principal, RequestContext, RouteOptions};

#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about = "Declarative HTTP routing and request pipeline")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `[listener] bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Print the route table in dispatch order and exit.
    #[arg(long)]
    list_routes: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_tracing(&config.observability.log_level);
    tracing::info!("switchyard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        expose_by_default = config.routing.expose_by_default,
        "Configuration loaded"
    );

    let dispatcher = Arc::new(Dispatcher::from_config(&config));
    register_demo_routes(&dispatcher)?;

    if cli.list_routes {
        for route in dispatcher.routes() {
            println!(
                "{:<7} {:<24} score={:<6} exposed={:<5} auth={:<5} cached={}",
                route.method, route.path, route.score, route.exposed, route.auth, route.cached
            );
        }
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    HttpServer::new(config, dispatcher).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn register_demo_routes(dispatcher: &Dispatcher) -> Result<(), switchyard::routing::RouteError> {
    dispatcher.set_authenticator(bearer_auth);
    dispatcher.after(response_time());

    dispatcher.get("/health", health)?;
    dispatcher.route("POST", "/echo/:name", RouteOptions::new(), echo)?;
    dispatcher.route("GET", "/clock", RouteOptions::new().cache(5.0), clock)?;
    dispatcher.route("GET", "/admin/stats", RouteOptions::new().expose(false), health)?;
    dispatcher.route("GET", "/me", RouteOptions::new().auth(true), me)?;
    Ok(())
}

/// Accepts `Authorization: Bearer <user>` and treats the token as the user id.
fn bearer_auth(
    request: &RequestContext,
) -> impl std::future::Future<Output = Result<Principal, AuthError>> + Send + 'static {
    let header = request.header("authorization").map(str::to_owned);
    async move {
        let token = header
            .as_deref()
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::new("Missing bearer token"))?;
        Ok(Principal::new(token))
    }
}

async fn health(_request: Arc<RequestContext>) -> Result<Value, HttpError> {
    Ok(json!({ "status": "ok" }))
}

async fn echo(request: Arc<RequestContext>) -> Result<Value, HttpError> {
    let body = match request.content() {
        Some(Content::Json(value)) => value.clone(),
        Some(Content::Form(form)) => serde_json::to_value(form)?,
        Some(Content::Text(text)) => Value::String(text.clone()),
        Some(Content::Multipart(form)) => json!({ "parts": form.len() }),
        None => Value::Null,
    };
    Ok(json!({
        "name": request.param("name"),
        "query": request.query(),
        "body": body,
    }))
}

async fn clock(_request: Arc<RequestContext>) -> Result<Value, HttpError> {
    Ok(json!({ "now": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }))
}

async fn me(request: Arc<RequestContext>) -> Result<Value, HttpError> {
    let principal = request
        .principal()
        .ok_or_else(|| HttpError::Unauthorized("Unauthorized".into()))?;
    Ok(json!({ "id": principal.id, "attributes": principal.attributes }))
}
