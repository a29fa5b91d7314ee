// chain/src/consensus/mechanisms/dpos.rs

//! Delegated Proof of Stake: stakeholders vote for a fixed-size set of
//! delegates that round-robin block production.
//!
//! Grounded on `original_source/blockchain/consensus/dpos.py`: votes are
//! `voter -> {delegate -> stake}`, totals are recalculated on every vote
//! change, the active set is the top `num_delegates` by total vote, and
//! delegates rotate `height mod len(active_delegates)`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

pub struct DelegatedProofOfStake {
    num_delegates: usize,
    round_length: u64,
    vote_update_interval: u64,
    votes: BTreeMap<String, BTreeMap<String, f64>>,
    delegate_votes: BTreeMap<String, f64>,
    active_delegates: Vec<String>,
    current_round: u64,
    blocks_in_round: u64,
    last_vote_update: u64,
}

impl DelegatedProofOfStake {
    pub fn new(num_delegates: usize, round_length: u64, vote_update_interval: u64) -> Self {
        DelegatedProofOfStake {
            num_delegates,
            round_length,
            vote_update_interval,
            votes: BTreeMap::new(),
            delegate_votes: BTreeMap::new(),
            active_delegates: Vec::new(),
            current_round: 0,
            blocks_in_round: 0,
            last_vote_update: 0,
        }
    }

    fn recalculate_votes(&mut self) {
        self.delegate_votes.clear();
        for delegate_votes in self.votes.values() {
            for (delegate, stake) in delegate_votes {
                *self.delegate_votes.entry(delegate.clone()).or_insert(0.0) += stake;
            }
        }
    }

    pub fn cast_vote(&mut self, voter_address: impl Into<String>, delegate_address: impl Into<String>, stake: f64) {
        let voter = voter_address.into();
        let delegate = delegate_address.into();
        self.votes.entry(voter).or_default().insert(delegate, stake);
        self.recalculate_votes();
    }

    pub fn remove_vote(&mut self, voter_address: &str, delegate_address: &str) -> bool {
        if let Some(delegate_votes) = self.votes.get_mut(voter_address) {
            if delegate_votes.remove(delegate_address).is_some() {
                self.recalculate_votes();
                return true;
            }
        }
        false
    }

    pub fn update_active_delegates(&mut self) {
        let mut sorted: Vec<(&String, &f64)> = self.delegate_votes.iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap().then_with(|| a.0.cmp(b.0)));
        self.active_delegates = sorted.into_iter().take(self.num_delegates).map(|(addr, _)| addr.clone()).collect();
    }

    pub fn active_delegates(&self) -> &[String] {
        &self.active_delegates
    }
}

impl Consensus for DelegatedProofOfStake {
    fn initialize(&mut self, state: &BlockchainState) {
        for validator in state.active_validators().into_iter().take(self.num_delegates) {
            self.active_delegates.push(validator.address.clone());
            self.delegate_votes.insert(validator.address.clone(), validator.power as f64);
        }
    }

    fn select_proposer(&self, height: u64, _state: &BlockchainState) -> Option<String> {
        if self.active_delegates.is_empty() {
            return None;
        }
        let idx = (height as usize) % self.active_delegates.len();
        Some(self.active_delegates[idx].clone())
    }

    fn prepare_consensus_data(&self, height: u64, state: &BlockchainState) -> Map<String, Value> {
        let delegate = self.select_proposer(height, state).unwrap_or_default();
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("dpos".into()));
        data.insert("delegate".into(), Value::String(delegate.clone()));
        data.insert("round".into(), serde_json::json!(self.current_round));
        data.insert("block_in_round".into(), serde_json::json!(self.blocks_in_round));
        data.insert("total_delegates".into(), serde_json::json!(self.active_delegates.len()));
        data.insert("delegate_votes".into(), serde_json::json!(self.delegate_votes.get(&delegate).copied().unwrap_or(0.0)));
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        if !self.active_delegates.iter().any(|d| d == &block.validator_address) {
            return Err(ValidationError::Custom(format!("{} is not an active delegate", block.validator_address)));
        }
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no active delegates"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "wrong delegate turn: expected {}",
                expected
            )));
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        self.blocks_in_round += 1;
        if self.round_length > 0 && self.blocks_in_round >= self.round_length {
            self.current_round += 1;
            self.blocks_in_round = 0;
        }
        if self.vote_update_interval > 0 && block.height.saturating_sub(self.last_vote_update) >= self.vote_update_interval {
            self.update_active_delegates();
            self.last_vote_update = block.height;
        }
    }

    fn name(&self) -> &'static str {
        "delegated_proof_of_stake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_recalculation_ranks_delegates_by_total_stake() {
        let mut dpos = DelegatedProofOfStake::new(1, 21, 100);
        dpos.cast_vote("0xv1", "0xd1", 10.0);
        dpos.cast_vote("0xv2", "0xd2", 50.0);
        dpos.update_active_delegates();
        assert_eq!(dpos.active_delegates(), &["0xd2".to_string()]);
    }

    #[test]
    fn removing_a_vote_drops_a_delegate_with_no_remaining_support() {
        let mut dpos = DelegatedProofOfStake::new(2, 21, 100);
        dpos.cast_vote("0xv1", "0xd1", 10.0);
        dpos.remove_vote("0xv1", "0xd1");
        dpos.update_active_delegates();
        assert!(dpos.active_delegates().is_empty());
    }

    #[test]
    fn proposer_rotates_round_robin_over_active_delegates() {
        let mut dpos = DelegatedProofOfStake::new(2, 21, 100);
        dpos.cast_vote("0xv1", "0xd1", 10.0);
        dpos.cast_vote("0xv2", "0xd2", 10.0);
        dpos.update_active_delegates();
        let state = BlockchainState::new("c");
        let p0 = dpos.select_proposer(0, &state);
        let p1 = dpos.select_proposer(1, &state);
        assert_ne!(p0, p1);
    }

    #[test]
    fn round_advances_after_round_length_blocks() {
        let mut dpos = DelegatedProofOfStake::new(1, 2, 1000);
        let state = BlockchainState::new("c");
        for h in 0..2 {
            let block = Block::new(h, "prev", vec![], 0.0, "0xd1", serde_json::Map::new());
            dpos.on_block_committed(&block, &state);
        }
        assert_eq!(dpos.current_round, 1);
    }
}
