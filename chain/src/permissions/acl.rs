// chain/src/permissions/acl.rs

//! Flat access control list: address -> permission set, with a reverse
//! index and an audit trail.
//!
//! Grounded on `original_source/blockchain/permissions/acl.py`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Standard blockchain permission tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CanSendTx,
    CanReceiveTx,
    CanTransfer,
    CanValidate,
    CanProposeBlock,
    CanUpdateValidators,
    CanGrantPermissions,
    CanRevokePermissions,
    CanUpdateConsensus,
    CanDeployContract,
    CanCallContract,
    Admin,
    SuperAdmin,
    CanReadState,
    CanReadBlocks,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanSendTx => "can_send_tx",
            Permission::CanReceiveTx => "can_receive_tx",
            Permission::CanTransfer => "can_transfer",
            Permission::CanValidate => "can_validate",
            Permission::CanProposeBlock => "can_propose_block",
            Permission::CanUpdateValidators => "can_update_validators",
            Permission::CanGrantPermissions => "can_grant_permissions",
            Permission::CanRevokePermissions => "can_revoke_permissions",
            Permission::CanUpdateConsensus => "can_update_consensus",
            Permission::CanDeployContract => "can_deploy_contract",
            Permission::CanCallContract => "can_call_contract",
            Permission::Admin => "admin",
            Permission::SuperAdmin => "super_admin",
            Permission::CanReadState => "can_read_state",
            Permission::CanReadBlocks => "can_read_blocks",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub address: String,
    pub permission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControlList {
    permissions: BTreeMap<String, BTreeSet<String>>,
    reverse_index: BTreeMap<String, BTreeSet<String>>,
    audit_log: Vec<AuditEntry>,
}

impl AccessControlList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `permission` to `address`. Returns `false` if it was already
    /// held (no mutation, no audit entry), mirroring the source's
    /// "changed?" return value.
    pub fn grant_permission(&mut self, address: &str, permission: &str, granted_by: Option<&str>, timestamp: f64) -> bool {
        let held = self.permissions.entry(address.to_string()).or_default();
        if !held.insert(permission.to_string()) {
            return false;
        }
        self.reverse_index
            .entry(permission.to_string())
            .or_default()
            .insert(address.to_string());
        self.audit_log.push(AuditEntry {
            action: "grant".into(),
            address: address.into(),
            permission: permission.into(),
            actor: granted_by.map(str::to_string),
            timestamp,
        });
        true
    }

    pub fn revoke_permission(&mut self, address: &str, permission: &str, revoked_by: Option<&str>, timestamp: f64) -> bool {
        let Some(held) = self.permissions.get_mut(address) else {
            return false;
        };
        if !held.remove(permission) {
            return false;
        }
        if let Some(addrs) = self.reverse_index.get_mut(permission) {
            addrs.remove(address);
        }
        self.audit_log.push(AuditEntry {
            action: "revoke".into(),
            address: address.into(),
            permission: permission.into(),
            actor: revoked_by.map(str::to_string),
            timestamp,
        });
        true
    }

    /// Exact match, OR `super_admin`, OR `admin` unless the permission
    /// being checked is `super_admin` itself.
    pub fn has_permission(&self, address: &str, permission: &str) -> bool {
        let Some(held) = self.permissions.get(address) else {
            return false;
        };
        if held.contains(permission) {
            return true;
        }
        if held.contains(Permission::SuperAdmin.as_str()) {
            return true;
        }
        if held.contains(Permission::Admin.as_str()) && permission != Permission::SuperAdmin.as_str() {
            return true;
        }
        false
    }

    pub fn get_permissions(&self, address: &str) -> BTreeSet<String> {
        self.permissions.get(address).cloned().unwrap_or_default()
    }

    pub fn get_addresses_with_permission(&self, permission: &str) -> BTreeSet<String> {
        self.reverse_index.get(permission).cloned().unwrap_or_default()
    }

    pub fn revoke_all_permissions(&mut self, address: &str, revoked_by: Option<&str>, timestamp: f64) -> usize {
        let Some(held) = self.permissions.get(address) else {
            return 0;
        };
        let to_revoke: Vec<String> = held.iter().cloned().collect();
        to_revoke
            .into_iter()
            .filter(|permission| self.revoke_permission(address, permission, revoked_by, timestamp))
            .count()
    }

    pub fn grant_admin(&mut self, address: &str, granted_by: Option<&str>, timestamp: f64) -> bool {
        self.grant_permission(address, Permission::Admin.as_str(), granted_by, timestamp)
    }

    pub fn grant_super_admin(&mut self, address: &str, granted_by: Option<&str>, timestamp: f64) -> bool {
        self.grant_permission(address, Permission::SuperAdmin.as_str(), granted_by, timestamp)
    }

    pub fn is_admin(&self, address: &str) -> bool {
        self.has_permission(address, Permission::Admin.as_str())
    }

    pub fn is_super_admin(&self, address: &str) -> bool {
        self.has_permission(address, Permission::SuperAdmin.as_str())
    }

    pub fn audit_log(
        &self,
        address: Option<&str>,
        permission: Option<&str>,
        action: Option<&str>,
    ) -> Vec<&AuditEntry> {
        self.audit_log
            .iter()
            .filter(|entry| address.is_none_or(|a| entry.address == a))
            .filter(|entry| permission.is_none_or(|p| entry.permission == p))
            .filter(|entry| action.is_none_or(|act| entry.action == act))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_idempotent_and_reports_change() {
        let mut acl = AccessControlList::new();
        assert!(acl.grant_permission("0xa", "can_transfer", None, 0.0));
        assert!(!acl.grant_permission("0xa", "can_transfer", None, 0.0));
        assert_eq!(acl.audit_log.len(), 1);
    }

    #[test]
    fn admin_implies_everything_except_super_admin() {
        let mut acl = AccessControlList::new();
        acl.grant_admin("0xa", None, 0.0);
        assert!(acl.has_permission("0xa", "can_deploy_contract"));
        assert!(!acl.has_permission("0xa", Permission::SuperAdmin.as_str()));
    }

    #[test]
    fn super_admin_implies_everything() {
        let mut acl = AccessControlList::new();
        acl.grant_super_admin("0xa", None, 0.0);
        assert!(acl.has_permission("0xa", Permission::SuperAdmin.as_str()));
        assert!(acl.has_permission("0xa", "anything_at_all"));
    }

    #[test]
    fn revoke_all_clears_reverse_index() {
        let mut acl = AccessControlList::new();
        acl.grant_permission("0xa", "can_transfer", None, 0.0);
        acl.grant_permission("0xa", "can_send_tx", None, 0.0);
        assert_eq!(acl.revoke_all_permissions("0xa", None, 0.0), 2);
        assert!(acl.get_addresses_with_permission("can_transfer").is_empty());
    }

    #[test]
    fn audit_log_filters_by_address_and_action() {
        let mut acl = AccessControlList::new();
        acl.grant_permission("0xa", "can_transfer", Some("0xroot"), 0.0);
        acl.grant_permission("0xb", "can_transfer", Some("0xroot"), 1.0);
        acl.revoke_permission("0xa", "can_transfer", Some("0xroot"), 2.0);

        assert_eq!(acl.audit_log(Some("0xa"), None, None).len(), 2);
        assert_eq!(acl.audit_log(None, None, Some("grant")).len(), 2);
    }
}
