//! Flattening roles into permission sets and querying them

use crate::claims::{Identifier, Permission, Role};
use std::collections::HashSet;

/// Collect the permissions of every role, keeping the first entry seen for
/// each id (role order, then permission order).
pub fn flatten_permissions(roles: &[Role]) -> Vec<Permission> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .flat_map(|role| role.permissions.iter())
        .filter(|permission| seen.insert(permission.id.clone()))
        .cloned()
        .collect()
}

/// Drop repeated roles, first seen wins.
///
/// Roles are keyed by id; roles without an id are keyed by name. Roles with
/// neither are kept as they are.
pub fn dedup_roles(roles: &[Role]) -> Vec<Role> {
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();
    roles
        .iter()
        .filter(|role| match (&role.id, &role.name) {
            (Some(id), _) => seen_ids.insert(id.clone()),
            (None, Some(name)) => seen_names.insert(name.clone()),
            (None, None) => true,
        })
        .cloned()
        .collect()
}

/// Predicates over a permission list
pub trait PermissionQuery {
    fn has_permission(&self, id: &Identifier) -> bool;

    /// `false` for an empty list
    fn has_any_permission(&self, ids: &[Identifier]) -> bool {
        ids.iter().any(|id| self.has_permission(id))
    }

    /// `true` for an empty list
    fn has_all_permissions(&self, ids: &[Identifier]) -> bool {
        ids.iter().all(|id| self.has_permission(id))
    }
}

impl PermissionQuery for [Permission] {
    fn has_permission(&self, id: &Identifier) -> bool {
        self.iter().any(|p| &p.id == id)
    }
}

/// Predicates over a role list
pub trait RoleQuery {
    fn has_role(&self, id: &Identifier) -> bool;

    fn has_any_role(&self, ids: &[Identifier]) -> bool {
        ids.iter().any(|id| self.has_role(id))
    }

    fn has_all_roles(&self, ids: &[Identifier]) -> bool {
        ids.iter().all(|id| self.has_role(id))
    }
}

impl RoleQuery for [Role] {
    fn has_role(&self, id: &Identifier) -> bool {
        self.iter().any(|role| role.matches(id))
    }
}
