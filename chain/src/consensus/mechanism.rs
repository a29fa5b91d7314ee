//! The pluggable consensus interface every mechanism implements.
//!
//! Grounded on `original_source/consensus/base.py`'s `BaseConsensus` ABC:
//! mechanisms decide who may propose, which transactions go in a block,
//! what consensus-specific data a block header carries, and whether a
//! candidate block is valid — everything else (state execution, storage,
//! merkle roots) lives in the chain engine, not here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState, Transaction};

use super::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub voter: String,
    pub block_hash: String,
    pub height: u64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub height: u64,
    pub votes: Vec<ConsensusVote>,
}

impl ConsensusRound {
    pub fn add_vote(&mut self, vote: ConsensusVote) {
        if !self.votes.iter().any(|v| v.voter == vote.voter) {
            self.votes.push(vote);
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// `votes >= floor(2 * total_validators / 3) + 1`.
    pub fn has_supermajority(&self, total_validators: usize) -> bool {
        self.vote_count() >= (2 * total_validators / 3) + 1
    }
}

/// A pluggable consensus mechanism.
///
/// Implementations are plain data (no I/O): the chain engine drives them
/// by calling these methods at the right points in block production and
/// import. `validate_block` takes the previous block explicitly rather
/// than reaching back into `state` for it — unlike
/// `ProofOfAuthority.validate_block` in the source, which pulls
/// `state.blockchain.get_block(height - 1)` directly and so cannot be
/// used without a live blockchain handle.
pub trait Consensus {
    /// One-time setup against the genesis validator set.
    fn initialize(&mut self, state: &BlockchainState);

    /// Address of the validator allowed to propose at `height`.
    fn select_proposer(&self, height: u64, state: &BlockchainState) -> Option<String>;

    /// Filters/orders the mempool for inclusion in the next block.
    fn select_transactions(&self, pending: &[Transaction], max_txs: usize) -> Vec<Transaction> {
        pending.iter().take(max_txs).cloned().collect()
    }

    /// Extra fields this mechanism wants stamped into the block header.
    fn prepare_consensus_data(&self, height: u64, state: &BlockchainState) -> Map<String, Value> {
        let _ = (height, state);
        Map::new()
    }

    /// Structural + mechanism-specific validation of a candidate block.
    fn validate_block(
        &self,
        block: &Block,
        previous_block: Option<&Block>,
        state: &BlockchainState,
    ) -> Result<(), ValidationError>;

    /// Called by the engine after a block is committed, so mechanisms can
    /// update internal bookkeeping (vote tallies, stake epochs, timers).
    fn on_block_committed(&mut self, block: &Block, state: &BlockchainState) {
        let _ = (block, state);
    }

    fn get_consensus_params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn update_consensus_params(&mut self, params: &Map<String, Value>) {
        let _ = params;
    }

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(voter: &str) -> ConsensusVote {
        ConsensusVote {
            voter: voter.to_string(),
            block_hash: "h".to_string(),
            height: 1,
            timestamp: 0.0,
        }
    }

    #[test]
    fn supermajority_formula_matches_source() {
        let mut round = ConsensusRound::default();
        // 4 validators: need floor(2*4/3)+1 = 3
        for voter in ["a", "b"] {
            round.add_vote(vote(voter));
        }
        assert!(!round.has_supermajority(4));
        round.add_vote(vote("c"));
        assert!(round.has_supermajority(4));
    }

    #[test]
    fn duplicate_voter_counted_once() {
        let mut round = ConsensusRound::default();
        round.add_vote(vote("a"));
        round.add_vote(vote("a"));
        assert_eq!(round.vote_count(), 1);
    }
}
