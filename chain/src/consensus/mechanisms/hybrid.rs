// chain/src/consensus/mechanisms/hybrid.rs

//! Hybrid consensus: PoA-style authority rotation for block production,
//! gated by PoS-weighted authority selection and validator voting for
//! sensitive transactions.
//!
//! Grounded on `original_source/blockchain/consensus/hybrid.py`: authorities
//! are the top-N validators by `score = stake*weight + performance*(1-weight)`,
//! rotating every `authority_rotation_interval` blocks; transactions tagged
//! `validator_update`/`permission_grant`/`permission_revoke` require
//! `votes >= floor(total_validators * voting_threshold)` before inclusion.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState, Transaction, TxKind};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

pub struct HybridConsensus {
    num_authorities: usize,
    authority_rotation_interval: u64,
    important_tx_voting: bool,
    voting_threshold: f64,
    min_stake: f64,
    stake_weight: f64,
    authorities: Vec<String>,
    stakes: BTreeMap<String, f64>,
    validator_scores: BTreeMap<String, f64>,
    pending_votes: BTreeMap<String, BTreeMap<String, bool>>,
    last_rotation_height: u64,
}

impl HybridConsensus {
    pub fn new(
        num_authorities: usize,
        authority_rotation_interval: u64,
        important_tx_voting: bool,
        voting_threshold: f64,
        min_stake: f64,
        stake_weight: f64,
    ) -> Self {
        HybridConsensus {
            num_authorities,
            authority_rotation_interval,
            important_tx_voting,
            voting_threshold,
            min_stake,
            stake_weight,
            authorities: Vec::new(),
            stakes: BTreeMap::new(),
            validator_scores: BTreeMap::new(),
            pending_votes: BTreeMap::new(),
            last_rotation_height: 0,
        }
    }

    fn calculate_score(&self, state: &BlockchainState, address: &str) -> f64 {
        let stake = self.stakes.get(address).copied().unwrap_or(0.0);
        let performance = state
            .get_validator(address)
            .map(|v| {
                let total = v.total_blocks_proposed + v.total_blocks_signed;
                if total > 0 {
                    (v.total_blocks_signed as f64 / total as f64) * 100.0
                } else {
                    50.0
                }
            })
            .unwrap_or(50.0);
        stake * self.stake_weight + performance * (1.0 - self.stake_weight)
    }

    fn select_authorities(&mut self, state: &BlockchainState) {
        let mut validators: Vec<String> = state.active_validators().iter().map(|v| v.address.clone()).collect();
        validators.sort_by(|a, b| {
            self.validator_scores
                .get(b)
                .copied()
                .unwrap_or(0.0)
                .partial_cmp(&self.validator_scores.get(a).copied().unwrap_or(0.0))
                .unwrap()
                .then_with(|| a.cmp(b))
        });
        let n = self.num_authorities.min(validators.len());
        self.authorities = validators.into_iter().take(n).collect();
    }

    fn requires_voting(&self, tx: &Transaction) -> bool {
        self.important_tx_voting
            && matches!(tx.kind, TxKind::ValidatorUpdate | TxKind::PermissionGrant | TxKind::PermissionRevoke)
    }

    fn has_sufficient_votes(&self, tx: &Transaction, state: &BlockchainState) -> bool {
        let hash = tx.digest();
        let Some(votes) = self.pending_votes.get(&hash) else {
            return false;
        };
        let approve_count = votes.values().filter(|v| **v).count();
        let required = ((state.active_validators().len() as f64) * self.voting_threshold) as usize;
        approve_count >= required
    }

    pub fn cast_vote_for_transaction(&mut self, tx_hash: impl Into<String>, voter_address: &str, approve: bool, state: &BlockchainState) -> bool {
        if !state.get_validator(voter_address).is_some_and(|v| v.active) {
            return false;
        }
        self.pending_votes.entry(tx_hash.into()).or_default().insert(voter_address.to_string(), approve);
        true
    }

    pub fn add_stake(&mut self, validator_address: &str, amount: f64, state: &BlockchainState) {
        *self.stakes.entry(validator_address.to_string()).or_insert(0.0) += amount;
        let score = self.calculate_score(state, validator_address);
        self.validator_scores.insert(validator_address.to_string(), score);
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }
}

impl Consensus for HybridConsensus {
    fn initialize(&mut self, state: &BlockchainState) {
        for validator in state.active_validators() {
            self.stakes.insert(validator.address.clone(), (validator.power * 10) as f64);
        }
        for validator in state.active_validators() {
            let score = self.calculate_score(state, &validator.address);
            self.validator_scores.insert(validator.address.clone(), score);
        }
        self.select_authorities(state);
    }

    fn select_proposer(&self, height: u64, _state: &BlockchainState) -> Option<String> {
        if self.authorities.is_empty() {
            return None;
        }
        let idx = (height as usize) % self.authorities.len();
        Some(self.authorities[idx].clone())
    }

    fn select_transactions(&self, pending: &[Transaction], max_txs: usize) -> Vec<Transaction> {
        let mut sorted: Vec<&Transaction> = pending.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());
        sorted
            .into_iter()
            .take(max_txs)
            .filter(|tx| !self.requires_voting(tx) || self.pending_votes.contains_key(&tx.digest()))
            .cloned()
            .collect()
    }

    fn prepare_consensus_data(&self, height: u64, _state: &BlockchainState) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("hybrid".into()));
        data.insert("total_authorities".into(), serde_json::json!(self.authorities.len()));
        data.insert(
            "epoch".into(),
            serde_json::json!(if self.authority_rotation_interval > 0 { height / self.authority_rotation_interval } else { 0 }),
        );
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, _state: &BlockchainState) -> Result<(), ValidationError> {
        if !self.authorities.iter().any(|a| a == &block.validator_address) {
            return Err(ValidationError::Custom(format!("{} is not a current authority", block.validator_address)));
        }
        let expected = self
            .select_proposer(block.height, _state)
            .ok_or(ValidationError::Invalid("no authorities configured"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Invalid("wrong authority's turn"));
        }
        let stake = self.stakes.get(&block.validator_address).copied().unwrap_or(0.0);
        if stake < self.min_stake {
            return Err(ValidationError::Invalid("authority holds insufficient stake"));
        }
        for tx in &block.transactions {
            if self.requires_voting(tx) && !self.has_sufficient_votes(tx, _state) {
                return Err(ValidationError::Custom(format!(
                    "transaction {} requires validator votes it does not have",
                    tx.digest()
                )));
            }
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, state: &BlockchainState) {
        let score = self.calculate_score(state, &block.validator_address);
        self.validator_scores.insert(block.validator_address.clone(), score);
        for tx in &block.transactions {
            self.pending_votes.remove(&tx.digest());
        }
        if self.authority_rotation_interval > 0 && block.height.saturating_sub(self.last_rotation_height) >= self.authority_rotation_interval {
            self.select_authorities(state);
            self.last_rotation_height = block.height;
        }
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorState;

    fn state_with(addrs: &[&str]) -> BlockchainState {
        let mut state = BlockchainState::new("c");
        for addr in addrs {
            state.add_validator(ValidatorState::new(*addr, "pub", 10, ""));
        }
        state
    }

    #[test]
    fn authorities_are_selected_by_score_after_init() {
        let mut hybrid = HybridConsensus::new(1, 100, true, 0.66, 0.0, 0.5);
        let state = state_with(&["0xa", "0xb"]);
        hybrid.initialize(&state);
        assert_eq!(hybrid.authorities().len(), 1);
    }

    #[test]
    fn validator_update_tx_requires_votes_before_inclusion() {
        let mut hybrid = HybridConsensus::new(1, 100, true, 0.66, 0.0, 0.5);
        let state = state_with(&["0xa", "0xb", "0xc"]);
        hybrid.initialize(&state);
        let tx = Transaction::validator_update("0xa", "0xnew", "add", Some(10), None, 0, 0.0);
        let selected = hybrid.select_transactions(&[tx.clone()], 10);
        assert!(selected.is_empty());
        hybrid.cast_vote_for_transaction(tx.digest(), "0xa", true, &state);
        hybrid.cast_vote_for_transaction(tx.digest(), "0xb", true, &state);
        hybrid.cast_vote_for_transaction(tx.digest(), "0xc", true, &state);
        let selected = hybrid.select_transactions(&[tx], 10);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn authority_below_min_stake_is_rejected() {
        let mut hybrid = HybridConsensus::new(1, 100, true, 0.66, 1_000_000.0, 0.5);
        let state = state_with(&["0xa"]);
        hybrid.initialize(&state);
        let block = Block::new(0, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
        assert!(hybrid.validate_block(&block, None, &state).is_err());
    }
}
