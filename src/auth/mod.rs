//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! route requires auth
//!     → gate.rs (AuthGate: load configured Authenticator)
//!     → Authenticator::authenticate(&request)
//!     → Ok(Principal): attached to the request, returned to dispatcher
//!     → Err / panic / not configured: AuthError → 401
//! ```
//!
//! # Design Decisions
//! - One authenticator at a time; setting a new one replaces the old
//! - Fail closed: no authenticator means every protected route is 401
//! - Authorization decisions stay with handlers and middleware

pub mod gate;

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::http::RequestContext;

pub use gate::AuthGate;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier, also used to partition cache entries.
    pub id: String,
    /// Provider-specific claims (roles, scopes, profile).
    #[serde(default)]
    pub attributes: Value,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Value::Null,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Authentication failure. The message, if any, becomes the 401 body message.
#[derive(Debug, Clone, Default, Error)]
#[error("{}", .message.as_deref().unwrap_or("authentication failed"))]
pub struct AuthError {
    message: Option<String>,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Failure without a message; the configured generic message is used.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

pub type AuthFuture = BoxFuture<'static, Result<Principal, AuthError>>;

/// Resolves the caller of a request.
///
/// Implemented for closures `Fn(&RequestContext) -> impl Future`, which copy
/// what they need out of the request before going async:
///
/// ```
/// use switchyard::{AuthError, Principal, RequestContext};
///
/// let authenticate = |req: &RequestContext| {
///     let token = req.header("authorization").map(str::to_owned);
///     async move {
///         match token.as_deref().and_then(|t| t.strip_prefix("Bearer ")) {
///             Some(user) => Ok(Principal::new(user)),
///             None => Err(AuthError::new("Missing bearer token")),
///         }
///     }
/// };
/// # switchyard::auth::AuthGate::default().set(authenticate);
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, request: &RequestContext) -> AuthFuture;
}

impl<F, Fut> Authenticator for F
where
    F: Fn(&RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Principal, AuthError>> + Send + 'static,
{
    fn authenticate(&self, request: &RequestContext) -> AuthFuture {
        (self)(request).boxed()
    }
}
