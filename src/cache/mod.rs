//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! route with cache policy (ttl > 0)
//!     → key: explicit policy key, or derived from method/path/query/principal
//!     → gate.rs (CacheGate)
//!         custom provider configured → delegate entirely
//!         otherwise → store.rs (MemoryCache get-or-compute)
//!     → cached or freshly computed value
//! ```
//!
//! # Design Decisions
//! - Values are plain JSON; finished responses are snapshotted by the
//!   dispatcher before they reach the cache
//! - A TTL of zero or less means "do not cache"
//! - The default key never mixes anonymous and authenticated callers

pub mod gate;
pub mod store;

pub use gate::{derive_key, CacheFactory, CacheFuture, CacheGate, CacheProvider, ANONYMOUS};
pub use store::MemoryCache;
