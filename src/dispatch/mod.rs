//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → dispatcher.rs
//!         1. match           (route table snapshot)         → 404
//!         2. exposure        (route flag)                   → 403
//!         3. before chain    (Flow::Respond short-circuits)
//!         4. auth gate       (routes with auth)             → 401
//!         5. body decode     (skipped for GET/HEAD, raw)
//!         6. handler         (through the cache gate if cached;
//!                             snapshot.rs flattens responses)
//!         7. normalize       (raw / Response / encoded value)
//!         8. after chain     (all run)
//!         9. error funnel    (HttpError or panic → error body)
//!     → Response
//! ```

pub mod dispatcher;
pub mod snapshot;

pub use dispatcher::Dispatcher;
pub use snapshot::ReplySnapshot;
