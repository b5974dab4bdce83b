//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber wakes
//!     → server stops accepting, drains in-flight requests → exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - One broadcast channel; any task can subscribe

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
