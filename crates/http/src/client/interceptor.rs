//! Request/response interception shared by every service client
//!
//! Before a request: attach the stored token, or stop the request when the
//! token has expired or is missing on a protected page. After a failed
//! response: turn a 401 from a protected endpoint into a forced logout.

use super::error::{CancelReason, ClientError};
use crate::navigation::Navigator;
use sigma_core::{PermissionContext, SigmaConfig, TokenStore, token_is_expired};
use std::sync::Arc;
use tracing::{debug, warn};

/// Substring matcher over a list of path fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatcher {
    fragments: Vec<String>,
}

impl PathMatcher {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments
                .into_iter()
                .map(Into::into)
                .filter(|f: &String| !f.is_empty())
                .collect(),
        }
    }

    /// `true` if `path` contains any fragment
    pub fn matches(&self, path: &str) -> bool {
        self.fragments.iter().any(|f| path.contains(f.as_str()))
    }
}

/// Auth interceptor pair
pub struct AuthInterceptor {
    store: TokenStore,
    context: Option<PermissionContext>,
    navigator: Arc<dyn Navigator>,
    public_endpoints: PathMatcher,
    public_pages: PathMatcher,
    login_url: String,
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("public_endpoints", &self.public_endpoints)
            .field("public_pages", &self.public_pages)
            .field("login_url", &self.login_url)
            .finish_non_exhaustive()
    }
}

impl AuthInterceptor {
    pub fn new(store: TokenStore, navigator: Arc<dyn Navigator>, config: &SigmaConfig) -> Self {
        Self {
            store,
            context: None,
            navigator,
            public_endpoints: PathMatcher::new(config.auth.public_endpoints.iter().cloned()),
            public_pages: PathMatcher::new(config.app.public_pages.iter().cloned()),
            login_url: config.app.login_url(),
        }
    }

    /// Also clear this context whenever the session is invalidated
    pub fn with_context(mut self, context: PermissionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_public_endpoint(&self, path: &str) -> bool {
        self.public_endpoints.matches(path)
    }

    fn on_login_page(&self, current: &str) -> bool {
        current.starts_with(&self.login_url)
    }

    /// Decide how a request to `path` may proceed.
    ///
    /// Returns the token to send as a bearer credential, `None` to send the
    /// request without one, or [`ClientError::Cancelled`] if it must not be
    /// sent at all.
    pub fn before_request(&self, path: &str) -> Result<Option<String>, ClientError> {
        if self.is_public_endpoint(path) {
            debug!(path, "Public endpoint, sending without token");
            return Ok(None);
        }

        match self.store.get_token() {
            Some(token) => {
                if token_is_expired(&token, chrono::Utc::now().timestamp()) {
                    warn!(path, "Stored token has expired, cancelling request");
                    self.invalidate_session();
                    return Err(ClientError::Cancelled(CancelReason::TokenExpired));
                }
                Ok(Some(token))
            }
            None => {
                let current = self.navigator.current_path();
                if self.public_pages.matches(&current) || self.on_login_page(&current) {
                    return Ok(None);
                }
                warn!(path, page = %current, "No token on a protected page, cancelling request");
                self.navigator.redirect_to_login();
                Err(ClientError::Cancelled(CancelReason::MissingToken))
            }
        }
    }

    /// Apply side effects for a failed request to `path` and hand the error
    /// back unchanged.
    pub fn after_error(&self, path: &str, error: ClientError) -> ClientError {
        match &error {
            ClientError::Cancelled(_) => {}
            ClientError::AuthenticationFailed(_) if self.is_public_endpoint(path) => {
                debug!(path, "401 from public endpoint left to the caller");
            }
            ClientError::AuthenticationFailed(_) => {
                warn!(path, "Backend rejected the session");
                self.invalidate_session();
            }
            _ => {}
        }
        error
    }

    /// Drop the token and session state, then go to login unless already there
    fn invalidate_session(&self) {
        self.store.remove_token();
        if let Some(context) = &self.context {
            context.clear_permissions();
        }
        if !self.on_login_page(&self.navigator.current_path()) {
            self.navigator.redirect_to_login();
        }
    }
}
