//! Ordered before/after middleware lists.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::error::HttpError;
use crate::http::{RequestContext, Response};

/// Outcome of a before-middleware.
#[derive(Debug)]
pub enum Flow {
    /// Keep going with the (possibly modified) request.
    Continue(RequestContext),
    /// Stop here and send this response.
    Respond(Response),
}

pub type BeforeFuture = BoxFuture<'static, Result<Flow, HttpError>>;
pub type AfterFuture = BoxFuture<'static, Result<Response, HttpError>>;

/// Runs before auth and the handler; may short-circuit with a response.
pub trait BeforeMiddleware: Send + Sync + 'static {
    fn before(&self, request: RequestContext) -> BeforeFuture;
}

impl<F, Fut> BeforeMiddleware for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, HttpError>> + Send + 'static,
{
    fn before(&self, request: RequestContext) -> BeforeFuture {
        (self)(request).boxed()
    }
}

/// Runs on every response produced by the pipeline.
pub trait AfterMiddleware: Send + Sync + 'static {
    fn after(&self, response: Response, request: Arc<RequestContext>) -> AfterFuture;
}

impl<F, Fut> AfterMiddleware for F
where
    F: Fn(Response, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HttpError>> + Send + 'static,
{
    fn after(&self, response: Response, request: Arc<RequestContext>) -> AfterFuture {
        (self)(response, request).boxed()
    }
}

/// Two independent, ordered middleware lists.
///
/// `Clone` copies the lists but shares the middleware themselves.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    before: Vec<Arc<dyn BeforeMiddleware>>,
    after: Vec<Arc<dyn AfterMiddleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_before<M: BeforeMiddleware>(&mut self, middleware: M) {
        self.before.push(Arc::new(middleware));
    }

    pub fn add_after<M: AfterMiddleware>(&mut self, middleware: M) {
        self.after.push(Arc::new(middleware));
    }

    /// Append several before-middleware, keeping their order.
    pub fn extend_before<I>(&mut self, middleware: I)
    where
        I: IntoIterator<Item = Arc<dyn BeforeMiddleware>>,
    {
        self.before.extend(middleware);
    }

    /// Append several after-middleware, keeping their order.
    pub fn extend_after<I>(&mut self, middleware: I)
    where
        I: IntoIterator<Item = Arc<dyn AfterMiddleware>>,
    {
        self.after.extend(middleware);
    }

    pub fn before_len(&self) -> usize {
        self.before.len()
    }

    pub fn after_len(&self) -> usize {
        self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Run the before list in order, stopping at the first response.
    pub async fn run_before(&self, mut request: RequestContext) -> Result<Flow, HttpError> {
        for middleware in &self.before {
            match middleware.before(request).await? {
                Flow::Continue(next) => request = next,
                Flow::Respond(response) => return Ok(Flow::Respond(response)),
            }
        }
        Ok(Flow::Continue(request))
    }

    /// Run the whole after list in order.
    pub async fn run_after(
        &self,
        mut response: Response,
        request: &Arc<RequestContext>,
    ) -> Result<Response, HttpError> {
        for middleware in &self.after {
            response = middleware.after(response, Arc::clone(request)).await?;
        }
        Ok(response)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}
