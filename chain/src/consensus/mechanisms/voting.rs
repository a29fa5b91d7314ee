// chain/src/consensus/mechanisms/voting.rs

//! Voting-based consensus: validators explicitly vote on competing block
//! proposals before one commits.
//!
//! Grounded on `original_source/blockchain/consensus/voting.py`: proposals
//! are keyed by block hash, votes are a set of voter addresses per hash,
//! a proposal wins once `votes >= ceil(total_validators * threshold)`,
//! and proposals expire after a timeout. Like the rest of this crate,
//! time is an explicit `f64` argument rather than a wall-clock read, so
//! expiry here takes `now` from the caller instead of `time.time()`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

struct Proposal {
    block: Block,
    voters: BTreeSet<String>,
    proposed_at: f64,
}

pub struct VotingBasedConsensus {
    voting_threshold: f64,
    proposal_timeout_secs: f64,
    max_concurrent_proposals: usize,
    proposals: BTreeMap<String, Proposal>,
    last_committed_height: u64,
}

impl VotingBasedConsensus {
    pub fn new(voting_threshold: f64, proposal_timeout_secs: f64, max_concurrent_proposals: usize) -> Self {
        VotingBasedConsensus {
            voting_threshold,
            proposal_timeout_secs,
            max_concurrent_proposals,
            proposals: BTreeMap::new(),
            last_committed_height: 0,
        }
    }

    fn required_votes(&self, total_validators: usize) -> usize {
        ((total_validators as f64) * self.voting_threshold).ceil() as usize
    }

    fn is_expired(&self, proposal: &Proposal, now: f64) -> bool {
        now - proposal.proposed_at > self.proposal_timeout_secs
    }

    pub fn propose_block_for_voting(&mut self, block: Block, now: f64) -> bool {
        let Some(hash) = block.hash.clone() else {
            return false;
        };
        self.proposals.retain(|_, p| !self.is_expired(p, now));
        if self.proposals.len() >= self.max_concurrent_proposals {
            return false;
        }
        if self.proposals.contains_key(&hash) {
            return false;
        }
        self.proposals.insert(hash, Proposal { block, voters: BTreeSet::new(), proposed_at: now });
        true
    }

    pub fn cast_vote(&mut self, block_hash: &str, voter_address: &str, state: &BlockchainState, now: f64) -> bool {
        let expired = match self.proposals.get(block_hash) {
            Some(p) => self.is_expired(p, now),
            None => return false,
        };
        if expired {
            self.proposals.remove(block_hash);
            return false;
        }
        if !state.get_validator(voter_address).is_some_and(|v| v.active) {
            return false;
        }
        let Some(proposal) = self.proposals.get_mut(block_hash) else {
            return false;
        };
        if !proposal.voters.insert(voter_address.to_string()) {
            return false;
        }
        let required = self.required_votes(state.active_validators().len());
        proposal.voters.len() >= required
    }

    pub fn get_winning_proposal(&self, height: u64, state: &BlockchainState) -> Option<&Block> {
        let required = self.required_votes(state.active_validators().len());
        self.proposals
            .values()
            .find(|p| p.block.height == height && p.voters.len() >= required)
            .map(|p| &p.block)
    }
}

impl Consensus for VotingBasedConsensus {
    fn initialize(&mut self, _state: &BlockchainState) {}

    fn select_proposer(&self, height: u64, state: &BlockchainState) -> Option<String> {
        let mut active: Vec<&String> = state.active_validators().iter().map(|v| &v.address).collect();
        if active.is_empty() {
            return None;
        }
        active.sort();
        let idx = (height as usize) % active.len();
        Some(active[idx].clone())
    }

    fn prepare_consensus_data(&self, _height: u64, _state: &BlockchainState) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("voting".into()));
        data.insert("voting_threshold".into(), serde_json::json!(self.voting_threshold));
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        if !state.get_validator(&block.validator_address).is_some_and(|v| v.active) {
            return Err(ValidationError::Invalid("proposer is not an active validator"));
        }
        if let Some(hash) = &block.hash {
            if let Some(proposal) = self.proposals.get(hash) {
                let required = self.required_votes(state.active_validators().len());
                if proposal.voters.len() < required {
                    return Err(ValidationError::Custom(format!(
                        "not enough votes: {}/{}",
                        proposal.voters.len(),
                        required
                    )));
                }
            }
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        self.last_committed_height = block.height;
        self.proposals.retain(|_, p| p.block.height > block.height);
    }

    fn name(&self) -> &'static str {
        "voting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorState;

    fn state_with(addrs: &[&str]) -> BlockchainState {
        let mut state = BlockchainState::new("c");
        for addr in addrs {
            state.add_validator(ValidatorState::new(*addr, "pub", 1, ""));
        }
        state
    }

    fn proposed_block(height: u64) -> Block {
        let mut block = Block::new(height, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
        block.finalize("sig".to_string()).unwrap();
        block
    }

    #[test]
    fn threshold_is_reached_after_enough_votes() {
        let mut voting = VotingBasedConsensus::new(0.66, 10.0, 3);
        let state = state_with(&["0xa", "0xb", "0xc"]);
        let block = proposed_block(1);
        voting.propose_block_for_voting(block.clone(), 0.0);
        let hash = block.hash.clone().unwrap();
        assert!(!voting.cast_vote(&hash, "0xa", &state, 1.0));
        assert!(voting.cast_vote(&hash, "0xb", &state, 1.0));
    }

    #[test]
    fn expired_proposals_cannot_be_voted_on() {
        let mut voting = VotingBasedConsensus::new(0.66, 5.0, 3);
        let state = state_with(&["0xa"]);
        let block = proposed_block(1);
        voting.propose_block_for_voting(block.clone(), 0.0);
        let hash = block.hash.clone().unwrap();
        assert!(!voting.cast_vote(&hash, "0xa", &state, 10.0));
    }

    #[test]
    fn concurrent_proposal_cap_is_enforced() {
        let mut voting = VotingBasedConsensus::new(0.66, 100.0, 1);
        let b1 = proposed_block(1);
        let mut b2 = Block::new(2, "prev", vec![], 0.0, "0xb", serde_json::Map::new());
        b2.finalize("sig2".to_string()).unwrap();
        assert!(voting.propose_block_for_voting(b1, 0.0));
        assert!(!voting.propose_block_for_voting(b2, 0.0));
    }
}
