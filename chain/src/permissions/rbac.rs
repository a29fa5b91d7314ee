// chain/src/permissions/rbac.rs

//! Role-based access control layered on top of the flat ACL.
//!
//! Grounded on `original_source/blockchain/permissions/rbac.py`: roles
//! bundle permissions, assigning a role grants its permissions through the
//! underlying [`AccessControlList`], and revoking a role only revokes a
//! permission if no other assigned role still grants it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::acl::{AccessControlList, Permission};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<String>,
    pub description: String,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: BTreeSet<String>, description: impl Into<String>) -> Self {
        Role {
            name: name.into(),
            permissions,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBasedAccessControl {
    roles: BTreeMap<String, Role>,
    role_assignments: BTreeMap<String, BTreeSet<String>>,
    acl: AccessControlList,
}

impl RoleBasedAccessControl {
    pub fn new() -> Self {
        let mut rbac = RoleBasedAccessControl {
            roles: BTreeMap::new(),
            role_assignments: BTreeMap::new(),
            acl: AccessControlList::new(),
        };
        rbac.init_default_roles();
        rbac
    }

    fn init_default_roles(&mut self) {
        use Permission::*;
        self.create_role(Role::new(
            "validator",
            [CanValidate, CanProposeBlock, CanSendTx, CanReceiveTx, CanReadState, CanReadBlocks]
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            "Block validator with proposal rights",
        ));
        self.create_role(Role::new(
            "user",
            [CanSendTx, CanReceiveTx, CanTransfer, CanReadState, CanReadBlocks]
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            "Regular user with transaction rights",
        ));
        self.create_role(Role::new(
            "admin",
            [CanGrantPermissions, CanRevokePermissions, CanUpdateValidators, CanDeployContract, Admin]
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            "Administrator with governance rights",
        ));
        self.create_role(Role::new(
            "observer",
            [CanReadState, CanReadBlocks].iter().map(|p| p.as_str().to_string()).collect(),
            "Read-only observer",
        ));
    }

    pub fn create_role(&mut self, role: Role) -> bool {
        if self.roles.contains_key(&role.name) {
            return false;
        }
        self.roles.insert(role.name.clone(), role);
        true
    }

    pub fn delete_role(&mut self, role_name: &str, timestamp: f64) -> bool {
        if !self.roles.contains_key(role_name) {
            return false;
        }
        let addresses: Vec<String> = self.role_assignments.keys().cloned().collect();
        for address in addresses {
            self.revoke_role(&address, role_name, timestamp);
        }
        self.roles.remove(role_name);
        true
    }

    pub fn assign_role(&mut self, address: &str, role_name: &str, timestamp: f64) -> bool {
        let Some(role) = self.roles.get(role_name).cloned() else {
            return false;
        };
        let assigned = self.role_assignments.entry(address.to_string()).or_default();
        if !assigned.insert(role_name.to_string()) {
            return false;
        }
        for permission in &role.permissions {
            self.acl.grant_permission(address, permission, None, timestamp);
        }
        true
    }

    pub fn revoke_role(&mut self, address: &str, role_name: &str, timestamp: f64) -> bool {
        let Some(assigned) = self.role_assignments.get_mut(address) else {
            return false;
        };
        if !assigned.remove(role_name) {
            return false;
        }
        let remaining_roles: Vec<String> = assigned.iter().cloned().collect();
        let Some(role) = self.roles.get(role_name).cloned() else {
            return true;
        };
        for permission in &role.permissions {
            let held_elsewhere = remaining_roles.iter().any(|other| {
                self.roles
                    .get(other)
                    .is_some_and(|r| r.permissions.contains(permission))
            });
            if !held_elsewhere {
                self.acl.revoke_permission(address, permission, None, timestamp);
            }
        }
        true
    }

    /// Adds `permission` to `role_name` and grants it to every address
    /// currently holding that role, per spec §4.9: "permission mutations
    /// on a role propagate to all current holders."
    pub fn add_permission_to_role(&mut self, role_name: &str, permission: &str, timestamp: f64) -> bool {
        let Some(role) = self.roles.get_mut(role_name) else {
            return false;
        };
        if !role.permissions.insert(permission.to_string()) {
            return false;
        }
        let holders: Vec<String> = self
            .role_assignments
            .iter()
            .filter(|(_, roles)| roles.contains(role_name))
            .map(|(address, _)| address.clone())
            .collect();
        for address in holders {
            self.acl.grant_permission(&address, permission, None, timestamp);
        }
        true
    }

    /// Removes `permission` from `role_name` and, for every current
    /// holder, revokes it unless another assigned role still grants it —
    /// the same "held elsewhere?" rule `revoke_role` uses.
    pub fn remove_permission_from_role(&mut self, role_name: &str, permission: &str, timestamp: f64) -> bool {
        let Some(role) = self.roles.get_mut(role_name) else {
            return false;
        };
        if !role.permissions.remove(permission) {
            return false;
        }
        let holders: Vec<String> = self
            .role_assignments
            .iter()
            .filter(|(_, roles)| roles.contains(role_name))
            .map(|(address, _)| address.clone())
            .collect();
        for address in holders {
            let assigned_roles = self.role_assignments.get(&address).cloned().unwrap_or_default();
            let held_elsewhere = assigned_roles.iter().any(|other| {
                other != role_name
                    && self.roles.get(other).is_some_and(|r| r.permissions.contains(permission))
            });
            if !held_elsewhere {
                self.acl.revoke_permission(&address, permission, None, timestamp);
            }
        }
        true
    }

    pub fn has_role(&self, address: &str, role_name: &str) -> bool {
        self.role_assignments
            .get(address)
            .is_some_and(|roles| roles.contains(role_name))
    }

    pub fn has_permission(&self, address: &str, permission: &str) -> bool {
        self.acl.has_permission(address, permission)
    }

    pub fn roles_of(&self, address: &str) -> BTreeSet<String> {
        self.role_assignments.get(address).cloned().unwrap_or_default()
    }

    pub fn permissions_of(&self, address: &str) -> BTreeSet<String> {
        self.acl.get_permissions(address)
    }

    pub fn role_permissions(&self, role_name: &str) -> BTreeSet<String> {
        self.roles
            .get(role_name)
            .map(|r| r.permissions.clone())
            .unwrap_or_default()
    }

    pub fn all_roles(&self) -> Vec<&Role> {
        self.roles.values().collect()
    }
}

impl Default for RoleBasedAccessControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roles_are_seeded() {
        let rbac = RoleBasedAccessControl::new();
        assert_eq!(rbac.all_roles().len(), 4);
    }

    #[test]
    fn assigning_role_grants_its_permissions() {
        let mut rbac = RoleBasedAccessControl::new();
        assert!(rbac.assign_role("0xa", "validator", 0.0));
        assert!(rbac.has_permission("0xa", "can_propose_block"));
    }

    #[test]
    fn revoking_role_keeps_permission_shared_with_another_role() {
        let mut rbac = RoleBasedAccessControl::new();
        rbac.assign_role("0xa", "validator", 0.0);
        rbac.assign_role("0xa", "user", 0.0);
        rbac.revoke_role("0xa", "validator", 0.0);
        // both roles grant can_read_state, so it should survive
        assert!(rbac.has_permission("0xa", "can_read_state"));
        // only validator grants can_propose_block
        assert!(!rbac.has_permission("0xa", "can_propose_block"));
    }

    #[test]
    fn double_assign_is_a_no_op() {
        let mut rbac = RoleBasedAccessControl::new();
        assert!(rbac.assign_role("0xa", "user", 0.0));
        assert!(!rbac.assign_role("0xa", "user", 0.0));
    }

    #[test]
    fn adding_permission_to_role_propagates_to_current_holders() {
        let mut rbac = RoleBasedAccessControl::new();
        rbac.assign_role("0xa", "observer", 0.0);
        assert!(!rbac.has_permission("0xa", "can_deploy_contract"));

        assert!(rbac.add_permission_to_role("observer", "can_deploy_contract", 1.0));
        assert!(rbac.has_permission("0xa", "can_deploy_contract"));
        assert!(rbac.role_permissions("observer").contains("can_deploy_contract"));
    }

    #[test]
    fn removing_permission_from_role_revokes_unless_held_elsewhere() {
        let mut rbac = RoleBasedAccessControl::new();
        rbac.assign_role("0xa", "validator", 0.0);
        rbac.assign_role("0xa", "user", 0.0);

        // can_read_state is granted by both validator and user.
        assert!(rbac.remove_permission_from_role("validator", "can_read_state", 1.0));
        assert!(rbac.has_permission("0xa", "can_read_state"));

        // can_propose_block is only granted by validator.
        assert!(rbac.remove_permission_from_role("validator", "can_propose_block", 1.0));
        assert!(!rbac.has_permission("0xa", "can_propose_block"));
    }
}
