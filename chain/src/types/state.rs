// chain/src/types/state.rs

//! Deterministic chain state: accounts, validators, and snapshot/rollback.
//!
//! Grounded on `original_source/blockchain/core/state.py`. `BlockchainState`
//! is the single source of truth the chain engine mutates while executing a
//! block; `snapshot`/`restore` give the engine a cheap rollback point when a
//! block fails mid-execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub storage: Map<String, Value>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AccountState {
    pub fn new(address: impl Into<String>) -> Self {
        AccountState {
            address: address.into(),
            balance: 0.0,
            nonce: 0,
            storage: Map::new(),
            permissions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorState {
    pub address: String,
    pub pub_key: String,
    #[serde(default = "default_power")]
    pub power: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub total_blocks_proposed: u64,
    #[serde(default)]
    pub total_blocks_signed: u64,
}

fn default_power() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl ValidatorState {
    pub fn new(address: impl Into<String>, pub_key: impl Into<String>, power: u64, name: impl Into<String>) -> Self {
        ValidatorState {
            address: address.into(),
            pub_key: pub_key.into(),
            power,
            name: name.into(),
            active: true,
            total_blocks_proposed: 0,
            total_blocks_signed: 0,
        }
    }
}

pub const GENESIS_HASH_SENTINEL: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainState {
    pub chain_id: String,
    pub height: u64,
    pub last_block_hash: String,
    pub app_hash: String,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountState>,
    #[serde(default)]
    pub validators: BTreeMap<String, ValidatorState>,
    #[serde(default)]
    pub custom_state: Map<String, Value>,
}

impl BlockchainState {
    pub fn new(chain_id: impl Into<String>) -> Self {
        BlockchainState {
            chain_id: chain_id.into(),
            height: 0,
            last_block_hash: GENESIS_HASH_SENTINEL.to_string(),
            app_hash: GENESIS_HASH_SENTINEL.to_string(),
            accounts: BTreeMap::new(),
            validators: BTreeMap::new(),
            custom_state: Map::new(),
        }
    }

    /// Fetches (creating on demand) the account at `address`.
    pub fn get_account(&mut self, address: &str) -> &mut AccountState {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| AccountState::new(address))
    }

    pub fn get_account_read(&self, address: &str) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn get_validator(&self, address: &str) -> Option<&ValidatorState> {
        self.validators.get(address)
    }

    pub fn add_validator(&mut self, validator: ValidatorState) {
        self.validators.insert(validator.address.clone(), validator);
    }

    pub fn remove_validator(&mut self, address: &str) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.active = false;
        }
    }

    pub fn active_validators(&self) -> Vec<&ValidatorState> {
        self.validators.values().filter(|v| v.active).collect()
    }

    /// Debits `from_address` and credits `to_address`, bumping the
    /// sender's nonce. Returns `false` (no mutation) on insufficient
    /// balance.
    pub fn transfer(&mut self, from_address: &str, to_address: &str, amount: f64) -> bool {
        if self.get_account(from_address).balance < amount {
            return false;
        }
        self.get_account(from_address).balance -= amount;
        self.get_account(from_address).nonce += 1;
        self.get_account(to_address).balance += amount;
        true
    }

    pub fn grant_permission(&mut self, address: &str, permission: &str) {
        let account = self.get_account(address);
        if !account.permissions.iter().any(|p| p == permission) {
            account.permissions.push(permission.to_string());
        }
    }

    pub fn revoke_permission(&mut self, address: &str, permission: &str) {
        let account = self.get_account(address);
        account.permissions.retain(|p| p != permission);
    }

    pub fn has_permission(&self, address: &str, permission: &str) -> bool {
        self.accounts
            .get(address)
            .map(|account| account.permissions.iter().any(|p| p == permission))
            .unwrap_or(false)
    }

    /// SHA-256 over canonical JSON of the full state. `serde_json::Map` and
    /// `BTreeMap` both serialize keys in sorted order, so this matches the
    /// source's `json.dumps(sort_keys=True)` without a custom serializer.
    pub fn calculate_app_hash(&mut self) -> String {
        let canonical = serde_json::to_string(self).expect("state always serializes");
        let hash = crypto::hash_string(&canonical);
        self.app_hash = hash.clone();
        hash
    }

    /// Deep copy of the current state, used as a rollback point before
    /// speculatively executing a block.
    pub fn snapshot(&self) -> BlockchainState {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: BlockchainState) {
        *self = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_balance_and_bumps_nonce() {
        let mut state = BlockchainState::new("chain-1");
        state.get_account("0xalice").balance = 100.0;
        assert!(state.transfer("0xalice", "0xbob", 40.0));
        assert_eq!(state.get_account("0xalice").balance, 60.0);
        assert_eq!(state.get_account("0xalice").nonce, 1);
        assert_eq!(state.get_account("0xbob").balance, 40.0);
    }

    #[test]
    fn transfer_rejects_insufficient_balance_without_mutating() {
        let mut state = BlockchainState::new("chain-1");
        assert!(!state.transfer("0xalice", "0xbob", 1.0));
        assert_eq!(state.get_account("0xalice").balance, 0.0);
    }

    #[test]
    fn grant_and_revoke_permission_are_idempotent() {
        let mut state = BlockchainState::new("chain-1");
        state.grant_permission("0xalice", "validator");
        state.grant_permission("0xalice", "validator");
        assert_eq!(state.get_account("0xalice").permissions.len(), 1);
        assert!(state.has_permission("0xalice", "validator"));

        state.revoke_permission("0xalice", "validator");
        assert!(!state.has_permission("0xalice", "validator"));
    }

    #[test]
    fn snapshot_and_restore_undo_mutations() {
        let mut state = BlockchainState::new("chain-1");
        state.get_account("0xalice").balance = 50.0;
        let snapshot = state.snapshot();

        state.transfer("0xalice", "0xbob", 50.0);
        assert_eq!(state.get_account("0xbob").balance, 50.0);

        state.restore(snapshot);
        assert_eq!(state.get_account("0xalice").balance, 50.0);
        assert_eq!(state.get_account_read("0xbob"), None);
    }

    #[test]
    fn app_hash_is_deterministic_and_order_independent() {
        let mut a = BlockchainState::new("chain-1");
        a.get_account("0xalice").balance = 1.0;
        a.get_account("0xbob").balance = 2.0;

        let mut b = BlockchainState::new("chain-1");
        b.get_account("0xbob").balance = 2.0;
        b.get_account("0xalice").balance = 1.0;

        assert_eq!(a.calculate_app_hash(), b.calculate_app_hash());
    }

    #[test]
    fn round_trip_preserves_state() {
        let mut state = BlockchainState::new("chain-1");
        state.get_account("0xalice").balance = 10.0;
        state.add_validator(ValidatorState::new("0xv1", "pub", 10, "validator-1"));
        let json = serde_json::to_string(&state).unwrap();
        let restored: BlockchainState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
