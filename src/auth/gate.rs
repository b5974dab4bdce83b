//! The auth stage of the pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::FutureExt;

use crate::auth::{AuthError, Authenticator, Principal};
use crate::http::RequestContext;

/// Holds the configured [`Authenticator`] and applies it to requests.
#[derive(Default)]
pub struct AuthGate {
    provider: ArcSwapOption<Box<dyn Authenticator>>,
}

impl AuthGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `authenticator`, replacing any previous one.
    pub fn set<A: Authenticator>(&self, authenticator: A) {
        let provider: Box<dyn Authenticator> = Box::new(authenticator);
        self.provider.store(Some(Arc::new(provider)));
    }

    pub fn clear(&self) {
        self.provider.store(None);
    }

    pub fn is_configured(&self) -> bool {
        self.provider.load().is_some()
    }

    /// Authenticate `request` and attach the principal to it on success.
    ///
    /// Errors and panics from the authenticator both come back as
    /// [`AuthError`], as does a missing authenticator.
    pub async fn authenticate(&self, request: &mut RequestContext) -> Result<Principal, AuthError> {
        let Some(provider) = self.provider.load_full() else {
            tracing::warn!(path = %request.path(), "Route requires auth but no authenticator is configured");
            return Err(AuthError::anonymous());
        };

        let attempt = AssertUnwindSafe(provider.authenticate(request)).catch_unwind().await;
        let principal = match attempt {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(path = %request.path(), "Authenticator panicked");
                return Err(AuthError::anonymous());
            }
        };

        request.set_principal(principal.clone());
        Ok(principal)
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}
