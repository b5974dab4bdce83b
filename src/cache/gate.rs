//! The cache stage of the pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::cache::store::MemoryCache;
use crate::error::HttpError;
use crate::http::RequestContext;

/// Placeholder principal id for unauthenticated requests in derived keys.
pub const ANONYMOUS: &str = "anonymous";

/// Produces the value to cache on a miss.
pub type CacheFactory = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, HttpError>> + Send>;

pub type CacheFuture = BoxFuture<'static, Result<Value, HttpError>>;

/// A replacement for the built-in store.
///
/// When configured it receives every cached lookup and owns the whole
/// get-or-compute decision: whether to call `factory`, where to store the
/// result, and how to honour `ttl_secs`.
pub trait CacheProvider: Send + Sync + 'static {
    fn get_or_compute(&self, key: String, factory: CacheFactory, ttl_secs: f64) -> CacheFuture;
}

impl<F, Fut> CacheProvider for F
where
    F: Fn(String, CacheFactory, f64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HttpError>> + Send + 'static,
{
    fn get_or_compute(&self, key: String, factory: CacheFactory, ttl_secs: f64) -> CacheFuture {
        (self)(key, factory, ttl_secs).boxed()
    }
}

/// Routes cached handler calls to the custom provider or the built-in store.
pub struct CacheGate {
    store: MemoryCache,
    provider: ArcSwapOption<Box<dyn CacheProvider>>,
}

impl CacheGate {
    pub fn new(cleanup_interval: Duration) -> Self {
        Self {
            store: MemoryCache::new(cleanup_interval),
            provider: ArcSwapOption::empty(),
        }
    }

    /// Get-or-compute through the configured provider, or the built-in store.
    pub async fn get<F, Fut>(&self, key: &str, factory: F, ttl_secs: f64) -> Result<Value, HttpError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, HttpError>> + Send + 'static,
    {
        match self.provider.load_full() {
            Some(provider) => {
                let factory: CacheFactory = Box::new(move || factory().boxed());
                provider.get_or_compute(key.to_owned(), factory, ttl_secs).await
            }
            None => self.store.get_or_compute(key, factory, ttl_secs).await,
        }
    }

    /// Install a custom provider, replacing any previous one.
    pub fn set_provider<P: CacheProvider>(&self, provider: P) {
        let provider: Box<dyn CacheProvider> = Box::new(provider);
        self.provider.store(Some(Arc::new(provider)));
    }

    /// Go back to the built-in store.
    pub fn clear_provider(&self) {
        self.provider.store(None);
    }

    pub fn has_provider(&self) -> bool {
        self.provider.load().is_some()
    }

    /// The built-in store, used whenever no provider is configured.
    pub fn store(&self) -> &MemoryCache {
        &self.store
    }

    /// Default key for a request.
    pub fn generate_key(request: &RequestContext) -> String {
        derive_key(
            request.method().as_str(),
            request.path(),
            request.query_string().unwrap_or_default(),
            request.principal().map(|p| p.id.as_str()),
        )
    }
}

impl Default for CacheGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl std::fmt::Debug for CacheGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGate")
            .field("entries", &self.store.len())
            .field("custom_provider", &self.has_provider())
            .finish()
    }
}

/// `METHOD:path:query:principal`, where path, query and a real principal id
/// are each written as `{byte length}:{text}`, and a missing principal is
/// the bare [`ANONYMOUS`] sentinel.
///
/// The length prefixes keep the key unambiguous when components contain
/// `:`, and the sentinel can never equal an encoded id.
pub fn derive_key(method: &str, path: &str, query: &str, principal: Option<&str>) -> String {
    let principal = match principal {
        Some(id) => format!("{}:{id}", id.len()),
        None => ANONYMOUS.to_owned(),
    };
    format!("{method}:{}:{path}:{}:{query}:{principal}", path.len(), query.len())
}
