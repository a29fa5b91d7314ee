// chain/src/consensus/mechanisms/tendermint.rs

//! Weighted round-robin BFT, modeled on Tendermint's proposer rotation.
//!
//! Grounded on `original_source/blockchain/consensus/tendermint.py`: the
//! proposer is chosen by a cumulative walk over validators (sorted by
//! address) weighted by voting power, keyed on `height mod total_power`;
//! a block is rejected if it is older than `2 * block_time` or carries
//! more than `max_block_size` transactions.

use crate::types::{Block, BlockchainState};

use crate::consensus::error::ValidationError;
use crate::consensus::mechanism::Consensus;

pub struct TendermintBft {
    block_time_secs: f64,
    max_block_size: usize,
}

impl TendermintBft {
    pub fn new(block_time_secs: f64, max_block_size: usize) -> Self {
        TendermintBft { block_time_secs, max_block_size }
    }
}

impl Consensus for TendermintBft {
    fn initialize(&mut self, _state: &BlockchainState) {}

    fn select_proposer(&self, height: u64, state: &BlockchainState) -> Option<String> {
        let mut validators: Vec<(&str, u64)> = state
            .active_validators()
            .iter()
            .map(|v| (v.address.as_str(), v.power))
            .collect();
        validators.sort_by_key(|(addr, _)| *addr);
        let total_power: u64 = validators.iter().map(|(_, p)| *p).sum();
        if total_power == 0 {
            return None;
        }
        let mut target = height % total_power;
        for (addr, power) in validators {
            if target < power {
                return Some(addr.to_string());
            }
            target -= power;
        }
        None
    }

    fn validate_block(&self, block: &Block, previous_block: Option<&Block>, state: &BlockchainState) -> Result<(), ValidationError> {
        let expected = self
            .select_proposer(block.height, state)
            .ok_or(ValidationError::Invalid("no validators with voting power"))?;
        if block.validator_address != expected {
            return Err(ValidationError::Custom(format!(
                "block proposed by {} but weighted rotation expected {}",
                block.validator_address, expected
            )));
        }
        if let Some(prev) = previous_block {
            if block.timestamp - prev.timestamp > 2.0 * self.block_time_secs {
                return Err(ValidationError::Invalid("block is older than twice the target block time"));
            }
        }
        if block.transactions.len() > self.max_block_size {
            return Err(ValidationError::Invalid("block exceeds max_block_size"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tendermint_bft"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidatorState;

    fn state() -> BlockchainState {
        let mut state = BlockchainState::new("chain-1");
        state.add_validator(ValidatorState::new("0xa", "pub", 5, ""));
        state.add_validator(ValidatorState::new("0xb", "pub", 15, ""));
        state
    }

    #[test]
    fn proposer_selection_is_weighted() {
        let tm = TendermintBft::new(5.0, 100);
        let s = state();
        // total_power = 20, height 0..5 -> 0xa (weight 5), 5..20 -> 0xb
        assert_eq!(tm.select_proposer(0, &s), Some("0xa".to_string()));
        assert_eq!(tm.select_proposer(6, &s), Some("0xb".to_string()));
    }

    #[test]
    fn stale_block_is_rejected() {
        let tm = TendermintBft::new(5.0, 100);
        let s = state();
        let proposer = tm.select_proposer(1, &s).unwrap();
        let prev = Block::new(0, "g", vec![], 0.0, &proposer, serde_json::Map::new());
        let block = Block::new(1, "prev", vec![], 30.0, &proposer, serde_json::Map::new());
        assert!(tm.validate_block(&block, Some(&prev), &s).is_err());
    }

    #[test]
    fn block_over_max_size_is_rejected() {
        use crate::types::Transaction;

        let tm = TendermintBft::new(5.0, 1);
        let s = state();
        let proposer = tm.select_proposer(0, &s).unwrap();
        let txs = vec![
            Transaction::transfer("0xa", "0xb", 1.0, 0, 0.0),
            Transaction::transfer("0xa", "0xb", 1.0, 1, 0.0),
        ];
        let block = Block::new(0, "g", txs, 0.0, &proposer, serde_json::Map::new());
        assert!(tm.validate_block(&block, None, &s).is_err());
    }
}
