//! Declarative routing and request pipeline for HTTP APIs.
//!
//! # Architecture Overview
//!
//! ```text
//!   registration                          request time
//!   ────────────                          ────────────
//!   route(method, path, options, h)       RequestContext
//!     → routing::pattern (compile)          → dispatch::Dispatcher
//!     → routing::specificity (score)           1. match (routing::table)
//!     → routing::table (insert + sort)         2. exposure check
//!                                              3. before middleware
//!                                              4. auth gate
//!                                              5. body decode
//!                                              6. handler (cache gate)
//!                                              7. normalize
//!                                              8. after middleware
//!                                              9. error funnel
//!                                          → Response
//! ```

// Core pipeline
pub mod auth;
pub mod cache;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routing;

// Ambient concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use auth::{AuthError, Principal};
pub use config::AppConfig;
pub use dispatch::Dispatcher;
pub use error::HttpError;
pub use http::{HttpServer, RequestContext, Response};
pub use middleware::Flow;
pub use routing::{Reply, RouteDefinition, RouteOptions};
