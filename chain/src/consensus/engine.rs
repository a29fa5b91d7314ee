// chain/src/consensus/engine.rs

//! The chain engine: transaction admission, block proposal, and block
//! commit against a pluggable [`Consensus`] mechanism.
//!
//! Grounded on spec §4.7 ("Chain engine"). The chain is append-only and
//! strictly monotonic in height (§1) — there is no fork choice, only
//! "does this block extend the tip".

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::crypto;
use crate::permissions::MultiLevelPermissionSystem;
use crate::types::{Block, BlockchainState, Transaction, TxKind, ValidatorState};

use super::config::ConsensusConfig;
use super::error::ConsensusError;
use super::mechanism::Consensus;
use super::store::BlockStore;

/// Maps a transaction kind to the flat permission tag its sender must
/// hold, per spec §4.7 "Permission gating".
fn required_permission(kind: TxKind) -> Option<&'static str> {
    match kind {
        TxKind::Transfer => Some("can_transfer"),
        TxKind::ValidatorUpdate => Some("can_update_validators"),
        TxKind::PermissionGrant => Some("can_grant_permissions"),
        TxKind::PermissionRevoke => Some("can_revoke_permissions"),
        TxKind::Genesis | TxKind::DeployContract | TxKind::CallContract | TxKind::Custom => None,
    }
}

pub struct ChainEngine<S: BlockStore, C: Consensus> {
    pub config: ConsensusConfig,
    store: S,
    consensus: C,
    state: BlockchainState,
    mls: Option<MultiLevelPermissionSystem>,
    pending: Vec<Transaction>,
    pending_digests: BTreeSet<String>,
}

impl<S: BlockStore, C: Consensus> ChainEngine<S, C> {
    pub fn new(config: ConsensusConfig, store: S, consensus: C, state: BlockchainState) -> Self {
        let mut engine = ChainEngine {
            config,
            store,
            consensus,
            state,
            mls: None,
            pending: Vec::new(),
            pending_digests: BTreeSet::new(),
        };
        engine.consensus.initialize(&engine.state);
        engine
    }

    pub fn with_mls(mut self, mls: MultiLevelPermissionSystem) -> Self {
        self.mls = Some(mls);
        self
    }

    pub fn state(&self) -> &BlockchainState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn height(&self) -> u64 {
        self.state.height
    }

    pub fn tip_block(&self) -> Option<Block> {
        self.store.tip_block()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    /// Validates and enqueues a transaction per spec §4.7 Admission.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), ConsensusError> {
        if tx.signature.is_empty() && !tx.is_genesis() {
            return Err(ConsensusError::Other("transaction is missing a signature".into()));
        }
        if !tx.is_genesis() {
            if tx.public_key.is_empty() {
                return Err(ConsensusError::Other("signed transaction is missing a public key".into()));
            }
            let derived = crypto::address_from_public_key(&tx.public_key)
                .map_err(|e| ConsensusError::Other(format!("invalid public key: {e}")))?;
            if derived != tx.sender {
                return Err(ConsensusError::Other("sender does not match public key".into()));
            }
            if !tx.verify_signature(None) {
                return Err(ConsensusError::Other("transaction signature is invalid".into()));
            }
        }

        let account_nonce = self.state.get_account_read(&tx.sender).map(|a| a.nonce).unwrap_or(0);
        if tx.nonce < account_nonce {
            return Err(ConsensusError::Other("transaction nonce is stale".into()));
        }

        self.check_transaction_permissions(&tx)?;

        let digest = tx.digest();
        if self.pending_digests.contains(&digest) {
            return Err(ConsensusError::Other("transaction already pending".into()));
        }

        self.pending_digests.insert(digest);
        self.pending.push(tx);
        Ok(())
    }

    /// Spec §4.7 "Permission gating": maps tx kind to a required flat
    /// permission tag, plus an MLS floor when `data.security_level` is set.
    fn check_transaction_permissions(&mut self, tx: &Transaction) -> Result<(), ConsensusError> {
        if let Some(tag) = required_permission(tx.kind) {
            if !self.state.has_permission(&tx.sender, tag) {
                return Err(ConsensusError::Other(format!("sender lacks required permission {tag}")));
            }
        }
        if let Some(required_level) = tx.data.get("security_level").and_then(|v| v.as_u64()) {
            let Some(mls) = self.mls.as_mut() else {
                return Err(ConsensusError::Other("security_level gating requires an MLS instance".into()));
            };
            if (mls.get_user_level(&tx.sender) as u64) < required_level {
                return Err(ConsensusError::Other("sender's clearance level is too low".into()));
            }
        }
        Ok(())
    }

    /// Builds a candidate block at `height + 1` and signs it over its
    /// merkle root with `proposer_private_key_hex`, per spec §4.7
    /// Proposal. Returns `None` unless `proposer_address` is an active
    /// validator or the block cannot be signed.
    pub fn propose_block(&mut self, proposer_address: &str, proposer_private_key_hex: &str, timestamp: f64) -> Option<Block> {
        if !self.state.get_validator(proposer_address).is_some_and(|v| v.active) {
            return None;
        }
        let height = self.state.height + 1;
        let max_txs = self.config.max_block_txs;
        let txs = self.consensus.select_transactions(&self.pending, max_txs);
        if txs.is_empty() && !self.config.allow_empty_blocks {
            return None;
        }
        let consensus_data = self.consensus.prepare_consensus_data(height, &self.state);
        let mut block = Block::new(height, self.state.last_block_hash.clone(), txs, timestamp, proposer_address, consensus_data);
        let signature = crypto::sign_message(&block.merkle_root, proposer_private_key_hex).ok()?;
        block.finalize(signature).ok()?;
        Some(block)
    }

    /// Re-runs the same structural admission checks `add_transaction` uses
    /// (signature present, pubkey present, address match, signature
    /// verifies, nonce not stale) against a transaction already included
    /// in a block, per spec §4.7 Commit.
    fn check_transaction_admission(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.signature.is_empty() && !tx.is_genesis() {
            return Err(ConsensusError::Other("transaction is missing a signature".into()));
        }
        if !tx.is_genesis() {
            if tx.public_key.is_empty() {
                return Err(ConsensusError::Other("signed transaction is missing a public key".into()));
            }
            let derived = crypto::address_from_public_key(&tx.public_key)
                .map_err(|e| ConsensusError::Other(format!("invalid public key: {e}")))?;
            if derived != tx.sender {
                return Err(ConsensusError::Other("sender does not match public key".into()));
            }
            if !tx.verify_signature(None) {
                return Err(ConsensusError::Other("transaction signature is invalid".into()));
            }
        }
        let account_nonce = self.state.get_account_read(&tx.sender).map(|a| a.nonce).unwrap_or(0);
        if tx.nonce < account_nonce {
            return Err(ConsensusError::Other("transaction nonce is stale".into()));
        }
        Ok(())
    }

    /// Commits a block per spec §4.7 Commit.
    pub fn add_block(&mut self, block: Block) -> Result<(), ConsensusError> {
        let expected_height = self.state.height + 1;
        if block.height != expected_height {
            return Err(ConsensusError::NonMonotonicHeight { expected: expected_height, got: block.height });
        }
        if block.previous_hash != self.state.last_block_hash {
            return Err(ConsensusError::Storage("previous hash does not match the current tip".into()));
        }
        if !block.verify_merkle_root() {
            return Err(ConsensusError::Validation(super::error::ValidationError::Invalid("merkle root does not match transactions")));
        }
        let signature = block
            .signature
            .as_deref()
            .ok_or_else(|| ConsensusError::Validation(super::error::ValidationError::Invalid("block is not signed")))?;
        let proposer_pub_key = self
            .state
            .get_validator(&block.validator_address)
            .map(|v| v.pub_key.clone())
            .ok_or_else(|| ConsensusError::Validation(super::error::ValidationError::Invalid("block proposer is not a known validator")))?;
        if !crypto::verify_signature(&block.merkle_root, signature, &proposer_pub_key) {
            return Err(ConsensusError::Validation(super::error::ValidationError::Invalid("bad block signature")));
        }

        let mut seen_digests = BTreeSet::new();
        for tx in &block.transactions {
            self.check_transaction_admission(tx)?;
            self.check_transaction_permissions(tx)?;
            let digest = tx.digest();
            if !seen_digests.insert(digest) {
                return Err(ConsensusError::Other("block contains a duplicate transaction".into()));
            }
        }

        let previous_block = self.tip_block();
        self.consensus
            .validate_block(&block, previous_block.as_ref(), &self.state)
            .map_err(ConsensusError::from)?;

        let snapshot = self.state.snapshot();
        match self.execute_transactions(&block) {
            Ok(()) => {}
            Err(e) => {
                warn!("block {} rejected during execution: {e}", block.height);
                self.state.restore(snapshot);
                return Err(e);
            }
        }

        self.state.height = block.height;
        self.state.last_block_hash = block.hash.clone().unwrap_or_default();
        self.state.calculate_app_hash();

        for tx in &block.transactions {
            self.pending_digests.remove(&tx.digest());
        }
        self.pending.retain(|tx| !block.transactions.iter().any(|btx| btx.digest() == tx.digest()));

        if let Some(validator) = self.state.validators.get_mut(&block.validator_address) {
            validator.total_blocks_proposed += 1;
        }

        self.consensus.on_block_committed(&block, &self.state);
        info!("committed block {} by {}", block.height, block.validator_address);
        self.store.put_block(block);
        Ok(())
    }

    /// Spec §4.7 "Execution dispatch".
    fn execute_transactions(&mut self, block: &Block) -> Result<(), ConsensusError> {
        for tx in &block.transactions {
            self.execute_transaction(tx)?;
        }
        Ok(())
    }

    fn execute_transaction(&mut self, tx: &Transaction) -> Result<(), ConsensusError> {
        match tx.kind {
            TxKind::Genesis | TxKind::DeployContract | TxKind::CallContract | TxKind::Custom => Ok(()),
            TxKind::Transfer => {
                let input = tx
                    .inputs
                    .first()
                    .ok_or_else(|| ConsensusError::Other("transfer transaction has no input".into()))?;
                let output = tx
                    .outputs
                    .first()
                    .ok_or_else(|| ConsensusError::Other("transfer transaction has no output".into()))?;
                let amount = output
                    .amount
                    .ok_or_else(|| ConsensusError::Other("transfer transaction output has no amount".into()))?;
                if !self.state.transfer(&input.from_address, &output.to_address, amount) {
                    return Err(ConsensusError::Other("insufficient balance".into()));
                }
                Ok(())
            }
            TxKind::ValidatorUpdate => self.execute_validator_update(tx),
            TxKind::PermissionGrant | TxKind::PermissionRevoke => self.execute_permission_change(tx),
        }
    }

    fn execute_validator_update(&mut self, tx: &Transaction) -> Result<(), ConsensusError> {
        let address = tx
            .data_str("validator_address")
            .ok_or_else(|| ConsensusError::Other("validator_update missing validator_address".into()))?;
        let action = tx.data_str("action").unwrap_or("add");
        match action {
            "add" => {
                let power = tx.data_u64("power").unwrap_or(10);
                let pub_key = tx.data_str("pub_key").unwrap_or_default();
                self.state.add_validator(ValidatorState::new(address, pub_key, power, ""));
            }
            "remove" => self.state.remove_validator(address),
            "update_power" => {
                let power = tx
                    .data_u64("power")
                    .ok_or_else(|| ConsensusError::Other("update_power missing power".into()))?;
                let validator = self
                    .state
                    .validators
                    .get_mut(address)
                    .ok_or_else(|| ConsensusError::Other("unknown validator".into()))?;
                validator.power = power;
            }
            other => return Err(ConsensusError::Other(format!("unknown validator_update action {other}"))),
        }
        Ok(())
    }

    /// Routes `PERMISSION_GRANT`/`PERMISSION_REVOKE` transactions, resolving
    /// an `action=set_level` promotion vs. demotion by comparing `new_level`
    /// to the target's *current* level at execution time rather than
    /// trusting the transaction kind (see spec's Open Questions).
    fn execute_permission_change(&mut self, tx: &Transaction) -> Result<(), ConsensusError> {
        let target = tx
            .data_str("target_address")
            .ok_or_else(|| ConsensusError::Other("permission transaction missing target_address".into()))?;
        let action = tx.data_str("action").unwrap_or("grant");
        match action {
            "grant" => {
                let permission = tx
                    .data_str("permission")
                    .ok_or_else(|| ConsensusError::Other("grant missing permission".into()))?;
                self.state.grant_permission(target, permission);
                Ok(())
            }
            "revoke" => {
                let permission = tx
                    .data_str("permission")
                    .ok_or_else(|| ConsensusError::Other("revoke missing permission".into()))?;
                self.state.revoke_permission(target, permission);
                Ok(())
            }
            "set_level" => {
                let new_level = tx
                    .data_u8("new_level")
                    .ok_or_else(|| ConsensusError::Other("set_level missing new_level".into()))?;
                let mls = self.mls.as_mut().ok_or_else(|| ConsensusError::Other("no MLS instance configured".into()))?;
                let current = mls.get_user_level(target);
                let applied = if new_level > current {
                    mls.promote_user(&tx.sender, target, new_level, tx.timestamp)
                } else {
                    mls.demote_user(&tx.sender, target, new_level, tx.timestamp)
                };
                if !applied {
                    return Err(ConsensusError::Other("MLS level change was rejected".into()));
                }
                Ok(())
            }
            other => Err(ConsensusError::Other(format!("unknown permission action {other}"))),
        }
    }

    /// Builds the chain's genesis state and block from a validator set,
    /// bootstrapping an empty store.
    pub fn bootstrap_genesis(&mut self, chain_id: &str, validators: Vec<ValidatorState>, timestamp: f64) {
        self.state = BlockchainState::new(chain_id);
        for validator in &validators {
            self.state.add_validator(validator.clone());
        }
        self.state.calculate_app_hash();
        let validators_json = serde_json::to_value(
            validators.iter().map(|v| (v.address.clone(), v.power)).collect::<std::collections::BTreeMap<_, _>>(),
        )
        .expect("validator map always serializes");
        let genesis = Block::genesis(chain_id, validators_json, timestamp);
        debug!("bootstrapped genesis for chain {chain_id} with {} validators", validators.len());
        self.consensus.initialize(&self.state);
        self.store.put_block(genesis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::mechanisms::round_robin_poa::RoundRobin;
    use crate::crypto::KeyPair;
    use std::collections::BTreeMap;

    struct MemStore {
        blocks: BTreeMap<u64, Block>,
    }

    impl MemStore {
        fn new() -> Self {
            MemStore { blocks: BTreeMap::new() }
        }
    }

    impl BlockStore for MemStore {
        fn get_block(&self, height: u64) -> Option<Block> {
            self.blocks.get(&height).cloned()
        }

        fn put_block(&mut self, block: Block) {
            self.blocks.insert(block.height, block);
        }

        fn tip_height(&self) -> Option<u64> {
            self.blocks.keys().max().copied()
        }
    }

    fn engine_with_one_validator() -> (ChainEngine<MemStore, RoundRobin>, KeyPair, String) {
        let keypair = crypto::generate_keypair();
        let address = keypair.get_address();
        let mut state = BlockchainState::new("chain-1");
        state.add_validator(ValidatorState::new(address.clone(), keypair.get_public_key_hex(), 10, "v1"));
        state.grant_permission(&address, "can_transfer");
        state.grant_permission(&address, "can_update_validators");
        state.grant_permission(&address, "can_grant_permissions");
        state.grant_permission(&address, "can_revoke_permissions");

        let mut store = MemStore::new();
        let genesis = Block::genesis("chain-1", serde_json::json!({address.clone(): 10}), 0.0);
        store.put_block(genesis);

        let engine = ChainEngine::new(ConsensusConfig::default(), store, RoundRobin::new(), state);
        (engine, keypair, address)
    }

    #[test]
    fn propose_block_fails_for_non_validator() {
        let (mut engine, kp, _addr) = engine_with_one_validator();
        assert!(engine.propose_block("0xnotavalidator", &kp.get_private_key_hex(), 1.0).is_none());
    }

    #[test]
    fn transfer_transaction_is_rejected_without_permission() {
        let (mut engine, keypair, address) = engine_with_one_validator();
        engine.state.revoke_permission(&address, "can_transfer");
        let mut tx = Transaction::transfer(address.clone(), "0xbob", 1.0, 0, 0.0);
        tx.sign(&keypair.get_private_key_hex()).unwrap();
        assert!(engine.add_transaction(tx).is_err());
    }

    #[test]
    fn full_propose_and_commit_cycle_advances_height() {
        let (mut engine, keypair, address) = engine_with_one_validator();
        engine.state.get_account(&address).balance = 100.0;
        let mut tx = Transaction::transfer(address.clone(), "0xbob", 10.0, 0, 0.0);
        tx.sign(&keypair.get_private_key_hex()).unwrap();
        engine.add_transaction(tx).unwrap();

        let block = engine.propose_block(&address, &keypair.get_private_key_hex(), 1.0).expect("should propose");
        engine.add_block(block).unwrap();

        assert_eq!(engine.height(), 1);
        assert_eq!(engine.state().get_account_read("0xbob").unwrap().balance, 10.0);
        assert!(engine.pending_transactions().is_empty());
    }

    #[test]
    fn non_monotonic_height_is_rejected() {
        let (mut engine, keypair, address) = engine_with_one_validator();
        let mut bad_block = Block::new(5, "deadbeef", vec![], 1.0, &address, serde_json::Map::new());
        let sig = crypto::sign_message(&bad_block.merkle_root, &keypair.get_private_key_hex()).unwrap();
        bad_block.finalize(sig).unwrap();
        assert!(matches!(engine.add_block(bad_block), Err(ConsensusError::NonMonotonicHeight { .. })));
    }

    #[test]
    fn block_with_forged_signature_is_rejected() {
        let (mut engine, _keypair, address) = engine_with_one_validator();
        let mut block = Block::new(1, engine.state.last_block_hash.clone(), vec![], 1.0, &address, serde_json::Map::new());
        block.finalize("not-a-real-signature".to_string()).unwrap();
        assert!(matches!(engine.add_block(block), Err(ConsensusError::Validation(_))));
    }

    #[test]
    fn block_with_stale_nonce_transaction_is_rejected_on_commit() {
        let (mut engine, keypair, address) = engine_with_one_validator();
        engine.state.get_account(&address).balance = 100.0;
        engine.state.get_account(&address).nonce = 5;

        let mut stale_tx = Transaction::transfer(address.clone(), "0xbob", 1.0, 0, 0.0);
        stale_tx.sign(&keypair.get_private_key_hex()).unwrap();

        let consensus_data = serde_json::Map::new();
        let mut block = Block::new(1, engine.state.last_block_hash.clone(), vec![stale_tx], 1.0, &address, consensus_data);
        let sig = crypto::sign_message(&block.merkle_root, &keypair.get_private_key_hex()).unwrap();
        block.finalize(sig).unwrap();

        assert!(matches!(engine.add_block(block), Err(ConsensusError::Other(_))));
    }
}
