// chain/src/consensus/mechanisms/pbft.rs

//! Practical Byzantine Fault Tolerance: three-phase (pre-prepare, prepare,
//! commit) voting with view changes.
//!
//! Grounded on `original_source/consensus/pbft.py`: the primary for view
//! `v` is `sorted(validators, key=address)[v % n]`, and prepare/commit
//! each require `2f + 1` votes where `f = (n - 1) / 3`.

use std::collections::BTreeMap;

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbftPhase {
    PrePrepare,
    Prepare,
    Commit,
}

#[derive(Default)]
struct PbftRound {
    prepares: BTreeMap<String, bool>,
    commits: BTreeMap<String, bool>,
}

pub struct Pbft {
    view: u64,
    rounds: BTreeMap<u64, PbftRound>,
}

impl Pbft {
    pub fn new() -> Self {
        Pbft { view: 0, rounds: BTreeMap::new() }
    }

    fn quorum(n: usize) -> usize {
        let f = (n.saturating_sub(1)) / 3;
        2 * f + 1
    }

    fn primary(&self, state: &BlockchainState) -> Option<String> {
        let mut validators: Vec<String> = state.active_validators().iter().map(|v| v.address.clone()).collect();
        if validators.is_empty() {
            return None;
        }
        validators.sort();
        let idx = (self.view as usize) % validators.len();
        Some(validators[idx].clone())
    }

    pub fn add_prepare(&mut self, height: u64, voter: &str, state: &BlockchainState) -> bool {
        let round = self.rounds.entry(height).or_default();
        round.prepares.insert(voter.to_string(), true);
        round.prepares.len() >= Self::quorum(state.active_validators().len())
    }

    pub fn add_commit(&mut self, height: u64, voter: &str, state: &BlockchainState) -> bool {
        let round = self.rounds.entry(height).or_default();
        round.commits.insert(voter.to_string(), true);
        round.commits.len() >= Self::quorum(state.active_validators().len())
    }

    pub fn trigger_view_change(&mut self) {
        self.view += 1;
    }
}

impl Default for Pbft {
    fn default() -> Self {
        Self::new()
    }
}

impl Consensus for Pbft {
    fn initialize(&mut self, _state: &BlockchainState) {}

    fn select_proposer(&self, _height: u64, state: &BlockchainState) -> Option<String> {
        self.primary(state)
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        let primary = self.primary(state).ok_or(ValidationError::Invalid("no validators to act as primary"))?;
        if block.validator_address != primary {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but the current view's primary is {}",
                block.validator_address, primary
            )));
        }
        let round = self.rounds.get(&block.height);
        let n = state.active_validators().len();
        let quorum = Self::quorum(n);
        if n > 0 {
            let committed = round.map(|r| r.commits.len()).unwrap_or(0);
            if committed < quorum {
                return Err(ValidationError::Invalid("block lacks commit quorum"));
            }
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        self.rounds.remove(&block.height);
    }

    fn name(&self) -> &'static str {
        "pbft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorState;

    fn state() -> BlockchainState {
        let mut state = BlockchainState::new("chain-1");
        for addr in ["0xa", "0xb", "0xc", "0xd"] {
            state.add_validator(ValidatorState::new(addr, "pub", 10, ""));
        }
        state
    }

    #[test]
    fn quorum_is_2f_plus_1() {
        // n=4 -> f=1 -> quorum=3
        assert_eq!(Pbft::quorum(4), 3);
    }

    #[test]
    fn primary_is_deterministic_by_view_and_address_order() {
        let pbft = Pbft::new();
        let s = state();
        assert_eq!(pbft.select_proposer(0, &s), Some("0xa".to_string()));
    }

    #[test]
    fn view_change_rotates_primary() {
        let mut pbft = Pbft::new();
        pbft.trigger_view_change();
        let s = state();
        assert_eq!(pbft.select_proposer(0, &s), Some("0xb".to_string()));
    }

    #[test]
    fn commit_quorum_gates_validation() {
        let mut pbft = Pbft::new();
        let s = state();
        let block = Block::new(1, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
        assert!(pbft.validate_block(&block, None, &s).is_err());
        pbft.add_commit(1, "0xa", &s);
        pbft.add_commit(1, "0xb", &s);
        pbft.add_commit(1, "0xc", &s);
        assert!(pbft.validate_block(&block, None, &s).is_ok());
    }
}
