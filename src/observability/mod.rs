//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape, when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP layer's trace spans
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
