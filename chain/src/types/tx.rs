//! Transaction model: tagged variants over a common signed envelope.
//!
//! Grounded on `original_source/blockchain/core/transaction.py`. The wire
//! form keeps the source's single-class-plus-`data`-map shape (§6 of the
//! spec fixes this envelope for interop); constructors analogous to the
//! source's `TransferTransaction`/`ValidatorUpdateTransaction`/
//! `PermissionTransaction`/`GenesisTransaction` give each kind a typed,
//! ergonomic entry point instead of hand-built `data` maps at call sites.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::crypto::{self, Address, CryptoError, KeyPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    ValidatorUpdate,
    PermissionGrant,
    PermissionRevoke,
    Genesis,
    DeployContract,
    CallContract,
    Custom,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Transfer => "transfer",
            TxKind::ValidatorUpdate => "validator_update",
            TxKind::PermissionGrant => "permission_grant",
            TxKind::PermissionRevoke => "permission_revoke",
            TxKind::Genesis => "genesis",
            TxKind::DeployContract => "deploy_contract",
            TxKind::CallContract => "call_contract",
            TxKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    pub from_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub to_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub sender: Address,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub nonce: u64,
    pub timestamp: f64,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
}

pub const GENESIS_SIGNATURE: &str = "genesis_signature";
pub const GENESIS_SENDER: &str = "genesis";

impl Transaction {
    fn new(
        kind: TxKind,
        sender: impl Into<String>,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        data: Map<String, Value>,
        nonce: u64,
        timestamp: f64,
    ) -> Self {
        Transaction {
            kind,
            sender: sender.into(),
            inputs,
            outputs,
            data,
            nonce,
            timestamp,
            signature: String::new(),
            public_key: String::new(),
        }
    }

    pub fn transfer(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
        nonce: u64,
        timestamp: f64,
    ) -> Self {
        let sender = sender.into();
        let inputs = vec![TxInput {
            from_address: sender.clone(),
            amount: Some(amount),
            data: None,
        }];
        let outputs = vec![TxOutput {
            to_address: recipient.into(),
            amount: Some(amount),
            data: None,
        }];
        Transaction::new(TxKind::Transfer, sender, inputs, outputs, Map::new(), nonce, timestamp)
    }

    pub fn validator_update(
        sender: impl Into<String>,
        validator_address: impl Into<String>,
        action: &str,
        power: Option<u64>,
        pub_key: Option<String>,
        nonce: u64,
        timestamp: f64,
    ) -> Self {
        let mut data = Map::new();
        data.insert("validator_address".into(), json!(validator_address.into()));
        data.insert("action".into(), json!(action));
        if let Some(power) = power {
            data.insert("power".into(), json!(power));
        }
        if let Some(pub_key) = pub_key {
            data.insert("pub_key".into(), json!(pub_key));
        }
        Transaction::new(TxKind::ValidatorUpdate, sender, Vec::new(), Vec::new(), data, nonce, timestamp)
    }

    /// `action` is `"grant"` for a flat ACL permission or `"set_level"` for
    /// an MLS promotion; `kind` is `PERMISSION_GRANT` in both cases per
    /// spec §4.3 (the promotion/demotion distinction is resolved at
    /// execution time, never trusted from the kind or action tag).
    pub fn permission_grant(
        sender: impl Into<String>,
        target_address: impl Into<String>,
        permission: Option<String>,
        new_level: Option<u8>,
        action: &str,
        nonce: u64,
        timestamp: f64,
    ) -> Self {
        let data = permission_data(target_address, permission, new_level, action);
        Transaction::new(TxKind::PermissionGrant, sender, Vec::new(), Vec::new(), data, nonce, timestamp)
    }

    /// `action` is `"revoke"` for a flat ACL revoke or `"set_level"` for an
    /// MLS demotion.
    pub fn permission_revoke(
        sender: impl Into<String>,
        target_address: impl Into<String>,
        permission: Option<String>,
        new_level: Option<u8>,
        action: &str,
        nonce: u64,
        timestamp: f64,
    ) -> Self {
        let data = permission_data(target_address, permission, new_level, action);
        Transaction::new(TxKind::PermissionRevoke, sender, Vec::new(), Vec::new(), data, nonce, timestamp)
    }

    pub fn genesis(chain_id: impl Into<String>, validators: Value, timestamp: f64) -> Self {
        let mut data = Map::new();
        data.insert("chain_id".into(), json!(chain_id.into()));
        data.insert("validators".into(), validators);
        data.insert("genesis_time".into(), json!(timestamp));
        let mut tx = Transaction::new(
            TxKind::Genesis,
            GENESIS_SENDER,
            Vec::new(),
            Vec::new(),
            data,
            0,
            timestamp,
        );
        tx.signature = GENESIS_SIGNATURE.to_string();
        tx
    }

    /// Canonical digest: SHA-256 over UTF-8 of a JSON object with sorted
    /// keys, excluding `signature`/`public_key`. `serde_json::Map` is
    /// `BTreeMap`-backed by default (no `preserve_order` feature), so
    /// nested objects sort recursively as well.
    pub fn digest(&self) -> String {
        let mut map = Map::new();
        map.insert("type".into(), json!(self.kind.as_str()));
        map.insert("sender".into(), json!(self.sender));
        map.insert("inputs".into(), json!(self.inputs));
        map.insert("outputs".into(), json!(self.outputs));
        map.insert("data".into(), Value::Object(self.data.clone()));
        map.insert("nonce".into(), json!(self.nonce));
        map.insert("timestamp".into(), json!(self.timestamp));
        let canonical = serde_json::to_string(&Value::Object(map)).expect("map serializes");
        crypto::hash_string(&canonical)
    }

    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), CryptoError> {
        let message = self.digest();
        self.signature = crypto::sign_message(&message, private_key_hex)?;
        let keypair = KeyPair::from_private_key_hex(private_key_hex)?;
        self.public_key = keypair.get_public_key_hex();
        Ok(())
    }

    /// Verify against the stored public key, or an explicit override.
    pub fn verify_signature(&self, public_key_override: Option<&str>) -> bool {
        let key = match public_key_override {
            Some(k) => k,
            None => &self.public_key,
        };
        if key.is_empty() {
            return false;
        }
        crypto::verify_signature(&self.digest(), &self.signature, key)
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.kind, TxKind::Genesis)
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn data_u8(&self, key: &str) -> Option<u8> {
        self.data.get(key).and_then(Value::as_u64).map(|v| v as u8)
    }

    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(Value::as_f64)
    }

    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }
}

fn permission_data(
    target_address: impl Into<String>,
    permission: Option<String>,
    new_level: Option<u8>,
    action: &str,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("target_address".into(), json!(target_address.into()));
    data.insert("action".into(), json!(action));
    if let Some(permission) = permission {
        data.insert("permission".into(), json!(permission));
    }
    if let Some(new_level) = new_level {
        data.insert("new_level".into(), json!(new_level));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    #[test]
    fn signing_does_not_change_digest() {
        let kp = generate_keypair();
        let mut tx = Transaction::transfer(kp.get_address(), "0xbob", 10.0, 0, 100.0);
        let before = tx.digest();
        tx.sign(&kp.get_private_key_hex()).unwrap();
        assert_eq!(tx.digest(), before);
    }

    #[test]
    fn sign_then_verify_succeeds_and_tamper_fails() {
        let kp = generate_keypair();
        let mut tx = Transaction::transfer(kp.get_address(), "0xbob", 10.0, 0, 100.0);
        tx.sign(&kp.get_private_key_hex()).unwrap();
        assert!(tx.verify_signature(None));

        let mut tampered = tx.clone();
        tampered.outputs[0].amount = Some(999.0);
        assert!(!tampered.verify_signature(None));
    }

    #[test]
    fn genesis_transaction_is_self_signed_sentinel() {
        let tx = Transaction::genesis("chain-1", json!([]), 0.0);
        assert_eq!(tx.signature, GENESIS_SIGNATURE);
        assert_eq!(tx.sender, GENESIS_SENDER);
        assert!(tx.is_genesis());
    }

    #[test]
    fn round_trip_preserves_digest() {
        let kp = generate_keypair();
        let mut tx = Transaction::transfer(kp.get_address(), "0xbob", 10.0, 3, 42.0);
        tx.sign(&kp.get_private_key_hex()).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let restored: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.digest(), tx.digest());
        assert_eq!(restored, tx);
    }

    #[test]
    fn permission_grant_set_level_carries_new_level_not_trusted_kind() {
        let tx = Transaction::permission_grant("0xc", "0xm", None, Some(3), "set_level", 0, 0.0);
        assert_eq!(tx.kind, TxKind::PermissionGrant);
        assert_eq!(tx.data_u8("new_level"), Some(3));
    }
}
