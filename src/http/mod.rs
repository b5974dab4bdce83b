//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → request.rs (RequestContext: query, cookies, headers, raw body)
//!     → [dispatcher runs the pipeline]
//!     → body.rs (content decoding, on demand)
//!     → response.rs / json.rs (normalized Response)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - The pipeline never sees Axum types beyond `axum::http`
//! - Bodies are buffered once, up to a configured limit
//! - Header maps stay case-insensitive and multi-valued

pub mod body;
pub mod json;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use body::{Content, FormPart, MultipartForm};
pub use params::{ParamMap, ParamValue};
pub use request::RequestContext;
pub use response::Response;
pub use server::HttpServer;
