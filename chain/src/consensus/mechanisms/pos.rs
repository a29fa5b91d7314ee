// chain/src/consensus/mechanisms/pos.rs

//! Proof of Stake: stake-weighted, deterministically-randomized proposer
//! selection with slashing.
//!
//! Grounded on `original_source/blockchain/consensus/pos.py`: the per-height
//! draw is seeded with `sha256(str(height))` so every honest node derives
//! the same proposer, eligibility requires `stake >= min_stake` and no
//! slashing record, and slashing takes a fixed fraction of stake.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

pub struct ProofOfStake {
    min_stake: f64,
    epoch_length: u64,
    slashing_penalty: f64,
    stakes: BTreeMap<String, f64>,
    slashed_validators: BTreeMap<String, f64>,
    current_epoch: u64,
}

impl ProofOfStake {
    pub fn new(min_stake: f64, epoch_length: u64, slashing_penalty: f64) -> Self {
        ProofOfStake {
            min_stake,
            epoch_length,
            slashing_penalty,
            stakes: BTreeMap::new(),
            slashed_validators: BTreeMap::new(),
            current_epoch: 0,
        }
    }

    fn seeded_rng(height: u64) -> ChaCha20Rng {
        let digest = Sha256::digest(height.to_string().as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        ChaCha20Rng::from_seed(seed)
    }

    pub fn add_stake(&mut self, validator_address: impl Into<String>, amount: f64) {
        let address = validator_address.into();
        *self.stakes.entry(address).or_insert(0.0) += amount;
    }

    pub fn remove_stake(&mut self, validator_address: &str, amount: f64) -> bool {
        let current = self.stakes.get(validator_address).copied().unwrap_or(0.0);
        if current < amount {
            return false;
        }
        self.stakes.insert(validator_address.to_string(), current - amount);
        true
    }

    pub fn slash_validator(&mut self, validator_address: &str) {
        let Some(stake) = self.stakes.get(validator_address).copied() else {
            return;
        };
        let penalty = stake * self.slashing_penalty;
        self.stakes.insert(validator_address.to_string(), stake - penalty);
        self.slashed_validators.insert(validator_address.to_string(), penalty);
    }

    fn eligible(&self) -> Vec<(&String, f64)> {
        self.stakes
            .iter()
            .filter(|(addr, stake)| **stake >= self.min_stake && !self.slashed_validators.contains_key(*addr))
            .map(|(addr, stake)| (addr, *stake))
            .collect()
    }
}

impl Consensus for ProofOfStake {
    fn initialize(&mut self, state: &BlockchainState) {
        for validator in state.active_validators() {
            self.stakes.insert(validator.address.clone(), (validator.power * 10) as f64);
        }
    }

    fn select_proposer(&self, height: u64, _state: &BlockchainState) -> Option<String> {
        let eligible = self.eligible();
        if eligible.is_empty() {
            return None;
        }
        let total_stake: f64 = eligible.iter().map(|(_, s)| s).sum();
        let mut rng = Self::seeded_rng(height);
        let draw = rng.gen_range(0.0..total_stake);
        let mut cumulative = 0.0;
        for (addr, stake) in &eligible {
            cumulative += stake;
            if cumulative >= draw {
                return Some((*addr).clone());
            }
        }
        Some(eligible[0].0.clone())
    }

    fn prepare_consensus_data(&self, _height: u64, _state: &BlockchainState) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("pos".into()));
        data.insert("total_stake".into(), serde_json::json!(self.stakes.values().sum::<f64>()));
        data.insert("epoch".into(), serde_json::json!(self.current_epoch));
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        let stake = self.stakes.get(&block.validator_address).copied().unwrap_or(0.0);
        if stake < self.min_stake {
            return Err(ValidationError::Invalid("proposer stake is below the minimum"));
        }
        if self.slashed_validators.contains_key(&block.validator_address) {
            return Err(ValidationError::Invalid("proposer has been slashed"));
        }
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no eligible validators"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but stake-weighted draw expected {}",
                block.validator_address, expected
            )));
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        if self.epoch_length > 0 && block.height % self.epoch_length == 0 {
            self.current_epoch += 1;
        }
    }

    fn name(&self) -> &'static str {
        "proof_of_stake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposer_selection_is_deterministic_for_a_given_height() {
        let mut pos = ProofOfStake::new(100.0, 100, 0.1);
        pos.add_stake("0xa", 500.0);
        pos.add_stake("0xb", 500.0);
        let first = pos.select_proposer(7, &BlockchainState::new("c"));
        let second = pos.select_proposer(7, &BlockchainState::new("c"));
        assert_eq!(first, second);
    }

    #[test]
    fn below_minimum_stake_is_ineligible() {
        let mut pos = ProofOfStake::new(100.0, 100, 0.1);
        pos.add_stake("0xa", 50.0);
        assert!(pos.select_proposer(1, &BlockchainState::new("c")).is_none());
    }

    #[test]
    fn slashing_removes_eligibility() {
        let mut pos = ProofOfStake::new(100.0, 100, 0.1);
        pos.add_stake("0xa", 500.0);
        pos.slash_validator("0xa");
        assert!(pos.select_proposer(1, &BlockchainState::new("c")).is_none());
    }

    #[test]
    fn epoch_advances_at_boundary() {
        let mut pos = ProofOfStake::new(100.0, 10, 0.1);
        let state = BlockchainState::new("c");
        let block = Block::new(10, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
        pos.on_block_committed(&block, &state);
        assert_eq!(pos.current_epoch, 1);
    }
}
