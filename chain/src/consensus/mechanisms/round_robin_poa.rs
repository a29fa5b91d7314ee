// chain/src/consensus/mechanisms/round_robin_poa.rs

//! Round-robin and proof-of-authority proposer rotation.
//!
//! Grounded on `original_source/blockchain/consensus/round_robin.py` and
//! `poa.py`: both walk an ordered validator list by `height mod len`,
//! skipping inactive entries; PoA additionally restricts the rotation to
//! a configured `authorities` set and enforces a minimum inter-block time
//! against the previous block.

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

/// Plain round-robin over every active validator, in address order.
pub struct RoundRobin {
    validator_list: Vec<String>,
}

impl RoundRobin {
    pub fn new() -> Self {
        RoundRobin { validator_list: Vec::new() }
    }

    fn refresh(&mut self, state: &BlockchainState) {
        if self.validator_list.is_empty() {
            self.validator_list = state.active_validators().iter().map(|v| v.address.clone()).collect();
            self.validator_list.sort();
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Consensus for RoundRobin {
    fn initialize(&mut self, state: &BlockchainState) {
        self.refresh(state);
    }

    fn select_proposer(&self, height: u64, state: &BlockchainState) -> Option<String> {
        if self.validator_list.is_empty() {
            return None;
        }
        let active: Vec<&String> = self
            .validator_list
            .iter()
            .filter(|addr| state.get_validator(addr).is_some_and(|v| v.active))
            .collect();
        if active.is_empty() {
            return None;
        }
        let idx = (height as usize) % active.len();
        Some(active[idx].clone())
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no active validators to propose"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but round-robin expected {}",
                block.validator_address, expected
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// Round-robin restricted to a configured set of authorities, with a
/// minimum inter-block time enforced against the previous block.
pub struct ProofOfAuthority {
    authorities: Vec<String>,
    min_block_interval_secs: f64,
}

impl ProofOfAuthority {
    pub fn new(authorities: Vec<String>, min_block_interval_secs: f64) -> Self {
        let mut authorities = authorities;
        authorities.sort();
        ProofOfAuthority { authorities, min_block_interval_secs }
    }

    pub fn is_authority(&self, address: &str) -> bool {
        self.authorities.iter().any(|a| a == address)
    }

    pub fn add_authority(&mut self, address: impl Into<String>) {
        let address = address.into();
        if !self.is_authority(&address) {
            self.authorities.push(address);
            self.authorities.sort();
        }
    }

    pub fn remove_authority(&mut self, address: &str) {
        self.authorities.retain(|a| a != address);
    }
}

impl Consensus for ProofOfAuthority {
    fn initialize(&mut self, state: &BlockchainState) {
        if self.authorities.is_empty() {
            self.authorities = state.active_validators().iter().map(|v| v.address.clone()).collect();
            self.authorities.sort();
        }
    }

    fn select_proposer(&self, height: u64, _state: &BlockchainState) -> Option<String> {
        if self.authorities.is_empty() {
            return None;
        }
        let idx = (height as usize) % self.authorities.len();
        Some(self.authorities[idx].clone())
    }

    fn prepare_consensus_data(&self, _height: u64, _state: &BlockchainState) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("authorities".into(), serde_json::json!(self.authorities));
        data
    }

    /// Takes the previous block as an explicit parameter instead of
    /// reaching into `state` for it, unlike `poa.py`'s
    /// `state.blockchain.get_block(height - 1)`.
    fn validate_block(&self, block: &Block, previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        if !self.is_authority(&block.validator_address) {
            return Err(ValidationError::Custom(format!("{} is not an authority", block.validator_address)));
        }
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no authorities configured"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but it is not {}'s turn",
                block.validator_address, expected
            )));
        }
        if let Some(prev) = previous_block {
            if block.timestamp - prev.timestamp < self.min_block_interval_secs {
                return Err(ValidationError::Invalid("block produced before minimum interval elapsed"));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "proof_of_authority"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorState;
    use serde_json::Map as JMap;

    fn state_with_validators(addrs: &[&str]) -> BlockchainState {
        let mut state = BlockchainState::new("chain-1");
        for addr in addrs {
            state.add_validator(ValidatorState::new(*addr, "pub", 10, ""));
        }
        state
    }

    #[test]
    fn round_robin_rotates_by_height() {
        let mut rr = RoundRobin::new();
        let state = state_with_validators(&["0xa", "0xb", "0xc"]);
        rr.initialize(&state);
        assert_eq!(rr.select_proposer(0, &state), Some("0xa".to_string()));
        assert_eq!(rr.select_proposer(1, &state), Some("0xb".to_string()));
        assert_eq!(rr.select_proposer(3, &state), Some("0xa".to_string()));
    }

    #[test]
    fn poa_rejects_non_authority_proposer() {
        let poa = ProofOfAuthority::new(vec!["0xa".to_string(), "0xb".to_string()], 1.0);
        let state = state_with_validators(&["0xa", "0xb"]);
        let block = Block::new(0, "prev", vec![], 0.0, "0xoutsider", JMap::new());
        assert!(poa.validate_block(&block, None, &state).is_err());
    }

    #[test]
    fn poa_enforces_minimum_block_interval() {
        let poa = ProofOfAuthority::new(vec!["0xa".to_string()], 5.0);
        let state = state_with_validators(&["0xa"]);
        let prev = Block::new(0, "g", vec![], 10.0, "0xa", JMap::new());
        let block = Block::new(1, "prev_hash", vec![], 12.0, "0xa", JMap::new());
        assert!(poa.validate_block(&block, Some(&prev), &state).is_err());
    }
}
