//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, Request};
use bytes::Bytes;
use serde_json::Value;
use switchyard::config::AppConfig;
use switchyard::lifecycle::Shutdown;
use switchyard::{Dispatcher, HttpError, HttpServer, RequestContext, Response};
use tokio::net::TcpListener;

/// Build a request context for dispatching directly.
#[allow(dead_code)]
pub fn request(method: Method, uri: &str) -> RequestContext {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
        .into()
}

/// Build a request context carrying a body and content type.
#[allow(dead_code)]
pub fn request_with_body(method: Method, uri: &str, content_type: &str, body: &'static str) -> RequestContext {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", content_type)
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
        .into()
}

/// Parse a response body as JSON.
#[allow(dead_code)]
pub fn json_body(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

/// Assert the standard error body for `status`.
#[allow(dead_code)]
pub fn assert_error_body(response: &Response, status: u16, message: &str) {
    assert_eq!(response.status().as_u16(), status);
    let body = json_body(response);
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 4, "unexpected error body: {body}");
    assert_eq!(object["error"], true);
    assert_eq!(object["message"], message);
    assert_eq!(object["statusCode"], status);
    let timestamp = object["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

/// Handler returning a fixed tag, handy for telling routes apart.
#[allow(dead_code)]
pub fn tagged(tag: &'static str) -> impl Fn(Arc<RequestContext>) -> std::future::Ready<Result<Value, HttpError>> + Send + Sync + 'static {
    move |_req: Arc<RequestContext>| std::future::ready(Ok(Value::String(tag.to_string())))
}

/// Start a server for `dispatcher` on an ephemeral port.
#[allow(dead_code)]
pub async fn start_server(dispatcher: Arc<Dispatcher>) -> (SocketAddr, Shutdown) {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        HttpServer::new(config, dispatcher).run(listener, rx).await.unwrap();
    });

    (addr, shutdown)
}
