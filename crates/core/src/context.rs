//! Session permission context
//!
//! A [`PermissionContext`] is built once at startup and cloned into whatever
//! needs it. It moves through three phases:
//!
//! - `Uninitialized`: nothing has looked at the token store yet
//! - `Populated`: a decodable token was found or a login succeeded
//! - `Cleared`: logout, invalidation, or no usable token
//!
//! State is published through a `watch` channel so guards can re-evaluate as
//! soon as it changes.

use crate::claims::{self, Claims, Identifier, Permission, Role};
use crate::permissions::{PermissionQuery, RoleQuery, dedup_roles, flatten_permissions};
use crate::storage::TokenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shortest time the login loading state stays visible
pub const DEFAULT_MIN_LOGIN_DURATION: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Populated,
    Cleared,
}

/// Snapshot of the session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub permissions: Vec<Permission>,
    pub roles: Vec<Role>,
    /// Raw decoded claims of the current token
    pub user_data: Option<Claims>,
    pub loading: bool,
    pub is_processing_login: bool,
}

impl SessionState {
    /// A login or initial load is still in flight
    pub fn is_busy(&self) -> bool {
        self.loading || self.is_processing_login
    }

    pub fn has_permission(&self, id: &Identifier) -> bool {
        self.permissions.has_permission(id)
    }

    pub fn has_any_permission(&self, ids: &[Identifier]) -> bool {
        self.permissions.has_any_permission(ids)
    }

    pub fn has_all_permissions(&self, ids: &[Identifier]) -> bool {
        self.permissions.has_all_permissions(ids)
    }

    pub fn has_role(&self, id: &Identifier) -> bool {
        self.roles.has_role(id)
    }

    pub fn has_any_role(&self, ids: &[Identifier]) -> bool {
        self.roles.has_any_role(ids)
    }

    pub fn has_all_roles(&self, ids: &[Identifier]) -> bool {
        self.roles.has_all_roles(ids)
    }
}

/// Result of deriving session state from a token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDerivation {
    pub claims: Claims,
    pub permissions: Vec<Permission>,
}

struct Inner {
    store: TokenStore,
    state: watch::Sender<SessionState>,
    min_login_duration: Duration,
}

/// Shared permission state for the running application
#[derive(Clone)]
pub struct PermissionContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PermissionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionContext")
            .field("state", &*self.inner.state.borrow())
            .field("min_login_duration", &self.inner.min_login_duration)
            .finish_non_exhaustive()
    }
}

impl PermissionContext {
    pub fn new(store: TokenStore) -> Self {
        Self::with_min_login_duration(store, DEFAULT_MIN_LOGIN_DURATION)
    }

    pub fn with_min_login_duration(store: TokenStore, min_login_duration: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                store,
                state,
                min_login_duration,
            }),
        }
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receive every subsequent state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Load state from a token already in storage without raising `loading`.
    ///
    /// Distinguishes "already signed in, app starting" from an active login.
    pub fn initialize(&self) {
        if let Some(token) = self.inner.store.get_token() {
            debug!("Found stored token during initialization");
            self.update_from_token(Some(&token), false);
        } else {
            debug!("No stored token during initialization");
            self.inner.state.send_modify(|state| {
                state.phase = SessionPhase::Cleared;
            });
        }
    }

    /// Replace permissions, roles and user data with those carried by `token`.
    ///
    /// A missing, empty or undecodable token clears them and yields `None`.
    /// The loading flags are left untouched.
    pub fn update_from_token(
        &self,
        token: Option<&str>,
        is_from_login: bool,
    ) -> Option<TokenDerivation> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            self.clear_claims();
            return None;
        };

        let claims = match claims::decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(is_from_login, "Discarding undecodable token: {e}");
                self.clear_claims();
                return None;
            }
        };

        let permissions = flatten_permissions(&claims.roles);
        let roles = dedup_roles(&claims.roles);
        debug!(
            is_from_login,
            permissions = permissions.len(),
            roles = roles.len(),
            "Derived permissions from token"
        );

        self.inner.state.send_modify(|state| {
            state.phase = SessionPhase::Populated;
            state.permissions = permissions.clone();
            state.roles = roles;
            state.user_data = Some(claims.clone());
        });

        Some(TokenDerivation {
            claims,
            permissions,
        })
    }

    /// Publish a freshly issued token and hold the loading state for at least
    /// the configured minimum duration before calling `on_complete`.
    ///
    /// The flags are raised before this returns. Must be called within a
    /// tokio runtime. Overlapping calls are not coordinated: the last token
    /// wins and every call's `on_complete` runs.
    pub fn login_success<F>(&self, token: &str, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.state.send_modify(|state| {
            state.is_processing_login = true;
            state.loading = true;
        });
        let started = Instant::now();

        self.update_from_token(Some(token), true);

        let remaining = remaining_login_gate(self.inner.min_login_duration, started.elapsed());
        let context = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            context.inner.state.send_modify(|state| {
                state.is_processing_login = false;
                state.loading = false;
            });
            info!("Login completed");
            on_complete();
        })
    }

    /// Re-derive state from whatever token storage currently holds
    pub fn refresh_permissions(&self) -> Option<TokenDerivation> {
        let token = self.inner.store.get_token()?;
        self.update_from_token(Some(&token), false)
    }

    /// Reset every field to its initial empty value
    pub fn clear_permissions(&self) {
        self.inner.state.send_replace(SessionState {
            phase: SessionPhase::Cleared,
            ..SessionState::default()
        });
        debug!("Cleared session permissions");
    }

    /// Drop the stored token and clear the session
    pub fn logout(&self) {
        self.inner.store.remove_token();
        self.clear_permissions();
        info!("Logged out");
    }

    fn clear_claims(&self) {
        self.inner.state.send_modify(|state| {
            state.phase = SessionPhase::Cleared;
            state.permissions.clear();
            state.roles.clear();
            state.user_data = None;
        });
    }

    pub fn has_permission(&self, id: impl Into<Identifier>) -> bool {
        self.inner.state.borrow().has_permission(&id.into())
    }

    pub fn has_any_permission(&self, ids: &[Identifier]) -> bool {
        self.inner.state.borrow().has_any_permission(ids)
    }

    pub fn has_all_permissions(&self, ids: &[Identifier]) -> bool {
        self.inner.state.borrow().has_all_permissions(ids)
    }

    pub fn has_role(&self, id: impl Into<Identifier>) -> bool {
        self.inner.state.borrow().has_role(&id.into())
    }

    pub fn has_any_role(&self, ids: &[Identifier]) -> bool {
        self.inner.state.borrow().has_any_role(ids)
    }

    pub fn has_all_roles(&self, ids: &[Identifier]) -> bool {
        self.inner.state.borrow().has_all_roles(ids)
    }
}

fn remaining_login_gate(min: Duration, elapsed: Duration) -> Duration {
    min.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{token_expiring_in, unsigned_token};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn viewer_token() -> String {
        token_expiring_in(3600, json!([{"id": 1, "name": "Viewer", "permisos": [{"id": 1, "name": "view"}]}]))
    }

    #[test]
    fn starts_uninitialized_and_empty() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let state = context.snapshot();
        assert_eq!(state.phase, SessionPhase::Uninitialized);
        assert!(state.permissions.is_empty());
        assert!(!state.is_busy());
    }

    #[test]
    fn initialize_is_silent() {
        let store = TokenStore::in_memory();
        store.set_token(&viewer_token(), true);
        let context = PermissionContext::new(store);

        context.initialize();

        let state = context.snapshot();
        assert_eq!(state.phase, SessionPhase::Populated);
        assert!(!state.loading);
        assert!(!state.is_processing_login);
        assert!(context.has_permission(1));
    }

    #[test]
    fn initialize_without_token_clears() {
        let context = PermissionContext::new(TokenStore::in_memory());
        context.initialize();
        assert_eq!(context.snapshot().phase, SessionPhase::Cleared);
    }

    #[test]
    fn single_permission_scenario() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let token = token_expiring_in(600, json!([{"permisos": [{"id": 1, "name": "view"}]}]));

        let derived = context.update_from_token(Some(&token), false).unwrap();
        assert_eq!(derived.permissions, vec![Permission::new(1, "view")]);
        assert!(context.has_permission(1));
        assert!(!context.has_permission(2));
    }

    #[test]
    fn permission_shared_by_roles_is_published_once() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let token = token_expiring_in(
            600,
            json!([
                {"id": 1, "permisos": [{"id": "P", "name": "orders"}]},
                {"id": 2, "permisos": [{"id": "P", "name": "orders"}, {"id": "Q", "name": "billing"}]}
            ]),
        );

        context.update_from_token(Some(&token), false);
        let state = context.snapshot();
        let p_entries = state
            .permissions
            .iter()
            .filter(|p| p.id == Identifier::from("P"))
            .count();
        assert_eq!(p_entries, 1);
        assert_eq!(state.permissions.len(), 2);
    }

    #[test]
    fn empty_or_malformed_token_clears_claims() {
        let context = PermissionContext::new(TokenStore::in_memory());
        context.update_from_token(Some(&viewer_token()), false);

        assert!(context.update_from_token(None, false).is_none());
        assert!(context.snapshot().user_data.is_none());

        context.update_from_token(Some(&viewer_token()), false);
        assert!(context.update_from_token(Some("not.a-token"), false).is_none());
        let state = context.snapshot();
        assert!(state.permissions.is_empty());
        assert!(state.user_data.is_none());
        assert!(!context.has_any_permission(&[Identifier::from(1)]));
    }

    #[test]
    fn unusual_role_entries_do_not_discard_the_rest() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let token = token_expiring_in(
            600,
            json!([
                {"id": 1, "permisos": null},
                {"id": 2, "permisos": [{"id": null, "name": "broken"}, {"id": 3, "name": "view"}]}
            ]),
        );

        assert!(context.update_from_token(Some(&token), false).is_some());
        assert_eq!(context.snapshot().phase, SessionPhase::Populated);
        assert!(context.has_permission(3));
        assert!(context.has_all_roles(&[Identifier::from(1), Identifier::from(2)]));

        context.update_from_token(Some(&token_expiring_in(600, json!(null))), false);
        let state = context.snapshot();
        assert_eq!(state.phase, SessionPhase::Populated);
        assert!(state.permissions.is_empty());
        assert!(state.user_data.is_some());
    }

    #[test]
    fn user_data_keeps_unmodelled_claims() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let token = unsigned_token(&json!({"exp": 1, "email": "ops@sigma.test", "rol": []}));
        context.update_from_token(Some(&token), false);

        let state = context.snapshot();
        let user = state.user_data.unwrap();
        assert_eq!(user.get("email"), Some(&json!("ops@sigma.test")));
    }

    #[test]
    fn refresh_reads_current_storage() {
        let store = TokenStore::in_memory();
        let context = PermissionContext::new(store.clone());
        assert!(context.refresh_permissions().is_none());

        store.set_token(&viewer_token(), false);
        let derived = context.refresh_permissions().unwrap();
        assert_eq!(derived.permissions.len(), 1);
    }

    #[test]
    fn logout_clears_storage_and_state() {
        let store = TokenStore::in_memory();
        store.set_token(&viewer_token(), true);
        let context = PermissionContext::new(store.clone());
        context.initialize();

        context.logout();

        assert_eq!(store.get_token(), None);
        assert_eq!(
            context.snapshot(),
            SessionState {
                phase: SessionPhase::Cleared,
                ..SessionState::default()
            }
        );
    }

    #[test]
    fn role_predicates() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let token = token_expiring_in(
            600,
            json!([{"id": 10, "nombre": "Admin"}, {"id": 11, "name": "Billing"}]),
        );
        context.update_from_token(Some(&token), false);

        assert!(context.has_role("Admin"));
        assert!(context.has_role(11));
        assert!(context.has_all_roles(&[Identifier::from(10), Identifier::from("Billing")]));
        assert!(context.has_any_role(&[Identifier::from("Auditor"), Identifier::from(11)]));
        assert!(!context.has_any_role(&[Identifier::from("Auditor")]));
    }

    #[test]
    fn login_gate_accounts_for_elapsed_time() {
        let min = DEFAULT_MIN_LOGIN_DURATION;
        assert_eq!(remaining_login_gate(min, Duration::from_millis(50)), Duration::from_millis(1150));
        assert_eq!(remaining_login_gate(min, Duration::from_millis(5000)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn login_holds_loading_for_minimum_duration() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let fired = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let handle = {
            let fired = fired.clone();
            context.login_success(&viewer_token(), move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };

        // Raised synchronously and permissions already visible
        let state = context.snapshot();
        assert!(state.loading && state.is_processing_login);
        assert!(context.has_permission(1));

        tokio::time::advance(Duration::from_millis(1199)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        handle.await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_MIN_LOGIN_DURATION);
        assert!(elapsed < DEFAULT_MIN_LOGIN_DURATION + Duration::from_millis(50));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!context.snapshot().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_logins_both_complete() {
        let context = PermissionContext::new(TokenStore::in_memory());
        let fired = Arc::new(AtomicUsize::new(0));
        let second_token = token_expiring_in(600, json!([{"permisos": [{"id": 2, "name": "edit"}]}]));

        let first = {
            let fired = fired.clone();
            context.login_success(&viewer_token(), move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };
        tokio::time::advance(Duration::from_millis(300)).await;
        let second = {
            let fired = fired.clone();
            context.login_success(&second_token, move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };

        first.await.unwrap();
        // The first timer lowers the flags while the second is still pending
        assert!(!context.snapshot().is_busy());
        second.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(context.has_permission(2));
        assert!(!context.has_permission(1));
    }

    #[tokio::test]
    async fn subscribers_see_clearing() {
        let context = PermissionContext::new(TokenStore::in_memory());
        context.update_from_token(Some(&viewer_token()), false);
        let mut updates = context.subscribe();

        context.clear_permissions();

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().phase, SessionPhase::Cleared);
    }
}
