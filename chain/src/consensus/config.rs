//! Consensus configuration shared by every pluggable mechanism.
//!
//! Per-mechanism knobs that don't generalize (e.g. `num_delegates` for
//! DPoS, `election_timeout_ms` for Raft) live on the mechanism struct
//! itself; this struct only holds the parameters every mechanism agrees
//! on, matching `get_consensus_params`/`update_consensus_params` in
//! `original_source/consensus/base.py`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Target time between blocks, in seconds.
    pub block_time_secs: f64,
    /// Soft limit on the number of transactions per block.
    pub max_block_txs: usize,
    /// Whether a block may be proposed with zero transactions.
    pub allow_empty_blocks: bool,
    /// Extra mechanism-specific parameters (e.g. `min_stake`, `view_timeout_ms`).
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_time_secs: 5.0,
            max_block_txs: 10_000,
            allow_empty_blocks: true,
            params: BTreeMap::new(),
        }
    }
}

impl ConsensusConfig {
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        self.params.insert(key.into(), value);
    }
}
