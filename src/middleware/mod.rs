//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! matched request
//!     → before chain (registration order)
//!         each: Flow::Continue(request) → next
//!               Flow::Respond(response) → return it, skip everything else
//!     → [auth, body decode, handler]
//!     → after chain (registration order, all run)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Short-circuiting is an explicit `Flow` value, not an error
//! - The after chain has no short-circuit; every middleware sees the response
//! - Middleware are shared `Arc`s, so cloning a chain is shallow

pub mod builtin;
pub mod chain;

pub use builtin::response_time;
pub use chain::{AfterFuture, AfterMiddleware, BeforeFuture, BeforeMiddleware, Flow, MiddlewareChain};
