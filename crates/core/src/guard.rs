//! Access guard: decides whether protected content may be shown

use crate::claims::Identifier;
use crate::context::SessionState;

/// How a set of identifiers is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Match {
    #[default]
    Any,
    All,
}

/// Outcome of evaluating an [`AccessRequirement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Session is still loading; show nothing yet
    Pending,
    Granted,
    Denied,
}

/// What a piece of content requires from the session.
///
/// Checks run in a fixed order (single role, single permission, permission
/// set, role set) and stop at the first failure. A requirement with no
/// checks grants access once the session is idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    role: Option<Identifier>,
    permission: Option<Identifier>,
    permissions: Option<(Vec<Identifier>, Match)>,
    roles: Option<(Vec<Identifier>, Match)>,
}

impl AccessRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: impl Into<Identifier>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<Identifier>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn permissions<I, T>(mut self, ids: I, mode: Match) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        self.permissions = Some((ids.into_iter().map(Into::into).collect(), mode));
        self
    }

    pub fn roles<I, T>(mut self, ids: I, mode: Match) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Identifier>,
    {
        self.roles = Some((ids.into_iter().map(Into::into).collect(), mode));
        self
    }

    pub fn evaluate(&self, state: &SessionState) -> AccessDecision {
        if state.is_busy() {
            return AccessDecision::Pending;
        }

        if let Some(role) = &self.role {
            if !state.has_role(role) {
                return AccessDecision::Denied;
            }
        }

        if let Some(permission) = &self.permission {
            if !state.has_permission(permission) {
                return AccessDecision::Denied;
            }
        }

        if let Some((ids, mode)) = &self.permissions {
            let held = match mode {
                Match::Any => state.has_any_permission(ids),
                Match::All => state.has_all_permissions(ids),
            };
            if !held {
                return AccessDecision::Denied;
            }
        }

        if let Some((ids, mode)) = &self.roles {
            let held = match mode {
                Match::Any => state.has_any_role(ids),
                Match::All => state.has_all_roles(ids),
            };
            if !held {
                return AccessDecision::Denied;
            }
        }

        AccessDecision::Granted
    }

    /// `children` when granted, `fallback` when denied, nothing while pending
    pub fn gate<T>(&self, state: &SessionState, children: T, fallback: Option<T>) -> Option<T> {
        match self.evaluate(state) {
            AccessDecision::Pending => None,
            AccessDecision::Granted => Some(children),
            AccessDecision::Denied => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Permission, Role};
    use crate::context::SessionPhase;
    use serde_json::json;

    fn session() -> SessionState {
        let roles: Vec<Role> = serde_json::from_value(json!([
            {"id": 1, "name": "Mechanic"},
            {"id": 2, "name": "Supervisor"}
        ]))
        .unwrap();

        SessionState {
            phase: SessionPhase::Populated,
            permissions: vec![Permission::new(10, "orders.view"), Permission::new(11, "orders.edit")],
            roles,
            ..SessionState::default()
        }
    }

    #[test]
    fn nothing_renders_while_busy() {
        let requirement = AccessRequirement::new();
        let mut state = session();
        state.is_processing_login = true;

        assert_eq!(requirement.evaluate(&state), AccessDecision::Pending);
        assert_eq!(requirement.gate(&state, "page", Some("denied")), None);

        state.is_processing_login = false;
        state.loading = true;
        assert_eq!(requirement.evaluate(&state), AccessDecision::Pending);
    }

    #[test]
    fn empty_requirement_grants() {
        assert_eq!(AccessRequirement::new().evaluate(&session()), AccessDecision::Granted);
    }

    #[test]
    fn every_specified_check_must_pass() {
        let state = session();

        let ok = AccessRequirement::new()
            .role("Mechanic")
            .permission(10)
            .permissions([10, 11], Match::All)
            .roles([2, 3], Match::Any);
        assert_eq!(ok.evaluate(&state), AccessDecision::Granted);

        let missing_role = ok.clone().role("Auditor");
        assert_eq!(missing_role.evaluate(&state), AccessDecision::Denied);

        let missing_permission = ok.clone().permission(99);
        assert_eq!(missing_permission.evaluate(&state), AccessDecision::Denied);

        let not_all = ok.clone().permissions([10, 99], Match::All);
        assert_eq!(not_all.evaluate(&state), AccessDecision::Denied);

        let no_role_in_set = ok.roles([3, 4], Match::Any);
        assert_eq!(no_role_in_set.evaluate(&state), AccessDecision::Denied);
    }

    #[test]
    fn denied_uses_fallback_or_nothing() {
        let state = session();
        let requirement = AccessRequirement::new().permission(42);

        assert_eq!(requirement.gate(&state, "page", None), None);
        assert_eq!(requirement.gate(&state, "page", Some("no access")), Some("no access"));

        let allowed = AccessRequirement::new().permissions([42, 10], Match::Any);
        assert_eq!(allowed.gate(&state, "page", Some("no access")), Some("page"));
    }

    #[test]
    fn cleared_session_denies_everything_specific() {
        let state = SessionState {
            phase: SessionPhase::Cleared,
            ..SessionState::default()
        };
        assert_eq!(
            AccessRequirement::new().permission(10).evaluate(&state),
            AccessDecision::Denied
        );
    }
}
