// chain/src/consensus/mechanisms/lottery.rs

//! Lottery consensus: a weighted, deterministic random draw over ticket
//! holders.
//!
//! Grounded on `original_source/blockchain/consensus/lottery.py`: each
//! validator holds `max(power, min_tickets)` tickets, the draw is seeded
//! deterministically per height, and only active validators' tickets
//! enter the pool. The source seeds with `int(prev_block.hash, 16) +
//! height`; `select_proposer`'s fixed signature here has no previous-block
//! handle, so the draw is seeded from `height` alone (the source's own
//! fallback path when no previous block is available).

use std::collections::BTreeMap;
use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use serde_json::{Map, Value};

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

struct WinRecord {
    height: u64,
    winner: String,
}

pub struct LotteryConsensus {
    min_tickets: u64,
    ticket_pool: BTreeMap<String, u64>,
    winning_history: VecDeque<WinRecord>,
}

impl LotteryConsensus {
    pub fn new(min_tickets: u64) -> Self {
        LotteryConsensus { min_tickets, ticket_pool: BTreeMap::new(), winning_history: VecDeque::new() }
    }

    fn seeded_rng(height: u64) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(height)
    }

    fn win_probability(&self, address: &str) -> f64 {
        let total: u64 = self.ticket_pool.values().sum();
        if total == 0 {
            return 0.0;
        }
        let tickets = self.ticket_pool.get(address).copied().unwrap_or(0);
        (tickets as f64 / total as f64) * 100.0
    }

    pub fn add_tickets(&mut self, validator_address: impl Into<String>, num_tickets: u64) {
        *self.ticket_pool.entry(validator_address.into()).or_insert(0) += num_tickets;
    }

    pub fn remove_tickets(&mut self, validator_address: &str, num_tickets: u64) -> bool {
        let Some(current) = self.ticket_pool.get(validator_address).copied() else {
            return false;
        };
        let new_amount = current.saturating_sub(num_tickets).max(self.min_tickets);
        self.ticket_pool.insert(validator_address.to_string(), new_amount);
        true
    }
}

impl Consensus for LotteryConsensus {
    fn initialize(&mut self, state: &BlockchainState) {
        for validator in state.active_validators() {
            self.ticket_pool.insert(validator.address.clone(), validator.power.max(self.min_tickets));
        }
    }

    fn select_proposer(&self, height: u64, state: &BlockchainState) -> Option<String> {
        if self.ticket_pool.is_empty() {
            return None;
        }
        let mut tickets: Vec<&String> = Vec::new();
        for (addr, count) in &self.ticket_pool {
            if state.get_validator(addr).is_some_and(|v| v.active) {
                for _ in 0..*count {
                    tickets.push(addr);
                }
            }
        }
        if tickets.is_empty() {
            return None;
        }
        let mut rng = Self::seeded_rng(height);
        let idx = rng.gen_range(0..tickets.len());
        Some(tickets[idx].clone())
    }

    fn prepare_consensus_data(&self, height: u64, state: &BlockchainState) -> Map<String, Value> {
        let winner = self.select_proposer(height, state).unwrap_or_default();
        let mut data = Map::new();
        data.insert("consensus".into(), Value::String("lottery".into()));
        data.insert("winner".into(), Value::String(winner.clone()));
        data.insert("tickets".into(), serde_json::json!(self.ticket_pool.get(&winner).copied().unwrap_or(0)));
        data.insert("total_tickets".into(), serde_json::json!(self.ticket_pool.values().sum::<u64>()));
        data.insert("win_probability".into(), serde_json::json!(self.win_probability(&winner)));
        data
    }

    fn validate_block(&self, block: &Block, _previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        if self.ticket_pool.get(&block.validator_address).copied().unwrap_or(0) < 1 {
            return Err(ValidationError::Invalid("proposer holds no lottery tickets"));
        }
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no ticket holders"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but the lottery drew {}",
                block.validator_address, expected
            )));
        }
        Ok(())
    }

    fn on_block_committed(&mut self, block: &Block, _state: &BlockchainState) {
        self.winning_history.push_back(WinRecord { height: block.height, winner: block.validator_address.clone() });
        if self.winning_history.len() > 100 {
            self.winning_history.pop_front();
        }
    }

    fn name(&self) -> &'static str {
        "lottery"
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

    #[test]
    fn draw_is_deterministic_for_a_given_height() {
        let mut lottery = LotteryConsensus::new(1);
        lottery.add_tickets("0xa", 5);
        lottery.add_tickets("0xb", 5);
        let state = state_with(&["0xa", "0xb"]);
        assert_eq!(lottery.select_proposer(3, &state), lottery.select_proposer(3, &state));
    }

    #[test]
    fn inactive_validators_hold_no_drawable_tickets() {
        let mut lottery = LotteryConsensus::new(1);
        lottery.add_tickets("0xa", 10);
        let state = BlockchainState::new("c");
        assert!(lottery.select_proposer(1, &state).is_none());
    }

    #[test]
    fn winning_history_caps_at_100_entries() {
        let mut lottery = LotteryConsensus::new(1);
        let state = BlockchainState::new("c");
        for h in 0..150u64 {
            let block = Block::new(h, "prev", vec![], 0.0, "0xa", serde_json::Map::new());
            lottery.on_block_committed(&block, &state);
        }
        assert_eq!(lottery.winning_history.len(), 100);
    }
}
