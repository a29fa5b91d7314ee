// chain/src/consensus/mechanisms/raft.rs

//! Raft-style leader election and log replication.
//!
//! Grounded on `original_source/blockchain/consensus/raft.py`: a node is
//! FOLLOWER, CANDIDATE, or LEADER; only the current leader may propose,
//! and a block is rejected if its stamped term is behind the validator's
//! own term.

use std::collections::BTreeMap;

use rand::Rng;
use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaftState {
    Follower,
    Candidate,
    Leader,
}

pub struct RaftLogEntry {
    pub term: u64,
    pub index: usize,
    pub block_hash: String,
    pub committed: bool,
}

pub struct Raft {
    election_timeout_min_ms: u64,
    election_timeout_max_ms: u64,
    state: RaftState,
    current_term: u64,
    voted_for: Option<String>,
    current_leader: Option<String>,
    log: Vec<RaftLogEntry>,
    commit_index: usize,
    next_index: BTreeMap<String, usize>,
    match_index: BTreeMap<String, usize>,
}

impl Raft {
    pub fn new(election_timeout_min_ms: u64, election_timeout_max_ms: u64) -> Self {
        Raft {
            election_timeout_min_ms,
            election_timeout_max_ms,
            state: RaftState::Follower,
            current_term: 0,
            voted_for: None,
            current_leader: None,
            log: Vec::new(),
            commit_index: 0,
            next_index: BTreeMap::new(),
            match_index: BTreeMap::new(),
        }
    }

    pub fn random_election_timeout_ms(&self) -> u64 {
        rand::thread_rng().gen_range(self.election_timeout_min_ms..=self.election_timeout_max_ms)
    }

    pub fn state(&self) -> RaftState {
        self.state
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn current_leader(&self) -> Option<&str> {
        self.current_leader.as_deref()
    }

    pub fn start_election(&mut self, node_address: impl Into<String>) {
        self.state = RaftState::Candidate;
        self.current_term += 1;
        self.voted_for = Some(node_address.into());
    }

    pub fn receive_vote(&mut self, term: u64) {
        if term > self.current_term {
            self.current_term = term;
            self.state = RaftState::Follower;
            self.voted_for = None;
        }
    }

    pub fn become_leader(&mut self, node_address: impl Into<String>, peers: &[String]) {
        self.state = RaftState::Leader;
        self.current_leader = Some(node_address.into());
        self.next_index = peers.iter().map(|p| (p.clone(), self.log.len())).collect();
        self.match_index = peers.iter().map(|p| (p.clone(), 0)).collect();
    }

    pub fn step_down(&mut self) {
        self.state = RaftState::Follower;
        self.current_leader = None;
    }

    pub fn append_entry(&mut self, block_hash: impl Into<String>) {
        let index = self.log.len();
        self.log.push(RaftLogEntry { term: self.current_term, index, block_hash: block_hash.into(), committed: false });
    }

    pub fn commit_entry(&mut self, index: usize) {
        if let Some(entry) = self.log.get_mut(index) {
            entry.committed = true;
            self.commit_index = self.commit_index.max(index);
        }
    }
}

impl Consensus for Raft {
    fn initialize(&mut self, _state: &BlockchainState) {}

    fn select_proposer(&self, _height: u64, _state: &BlockchainState) -> Option<String> {
        self.current_leader.clone()
    }

    fn prepare_consensus_data(&self, _height: u64, _state: &BlockchainState) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("raft".into()));
        data.insert("term".into(), serde_json::json!(self.current_term));
        data.insert("leader".into(), serde_json::json!(self.current_leader));
        data.insert("log_index".into(), serde_json::json!(self.log.len()));
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, _state: &BlockchainState) -> Result<(), ValidationError> {
        if self.state != RaftState::Leader {
            return Err(ValidationError::Invalid("this node is not the Raft leader"));
        }
        if Some(block.validator_address.as_str()) != self.current_leader.as_deref() {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but the current leader is {:?}",
                block.validator_address, self.current_leader
            )));
        }
        let term = block.consensus_data.get("term").and_then(Value::as_u64).unwrap_or(0);
        if term < self.current_term {
            return Err(ValidationError::Invalid("block term is behind the current Raft term"));
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        if let Some(index) = self.log.iter().position(|e| e.block_hash == block.hash.clone().unwrap_or_default()) {
            self.commit_entry(index);
        }
    }

    fn name(&self) -> &'static str {
        "raft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_moves_follower_to_candidate_and_bumps_term() {
        let mut raft = Raft::new(150, 300);
        raft.start_election("0xa");
        assert_eq!(raft.state(), RaftState::Candidate);
        assert_eq!(raft.current_term(), 1);
    }

    #[test]
    fn higher_term_vote_demotes_to_follower() {
        let mut raft = Raft::new(150, 300);
        raft.start_election("0xa");
        raft.receive_vote(5);
        assert_eq!(raft.state(), RaftState::Follower);
        assert_eq!(raft.current_term(), 5);
    }

    #[test]
    fn only_the_leader_may_propose() {
        let state = BlockchainState::new("chain-1");
        let mut raft = Raft::new(150, 300);
        raft.become_leader("0xa", &["0xb".to_string()]);
        let block = Block::new(1, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
        assert!(raft.validate_block(&block, None, &state).is_ok());
        raft.step_down();
        assert!(raft.validate_block(&block, None, &state).is_err());
    }
}
