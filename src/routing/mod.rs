//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     RouteDefinition (method, path, options, handler)
//!     → route.rs (normalize method, resolve exposure)
//!     → pattern.rs (compile path to anchored matcher)
//!     → specificity.rs (score)
//!     → table.rs (insert, re-sort by score)
//!
//! Lookup:
//!     (method, path)
//!     → table.rs (scan in score order)
//!     → Return: RouteMatch { route, params } or None
//! ```
//!
//! # Design Decisions
//! - Malformed patterns fail at registration, never at match time
//! - Deterministic: same table and input always match the same route
//! - First match wins (ordered by specificity)

pub mod pattern;
pub mod route;
pub mod specificity;
pub mod table;

pub use pattern::{PathParams, PathPattern, PatternError};
pub use route::{
    parse_method, CachePolicy, Handler, HandlerFuture, Reply, Route, RouteDefinition, RouteError,
    RouteOptions, RouteSource, RouteSummary,
};
pub use table::{RouteMatch, RouteTable};
