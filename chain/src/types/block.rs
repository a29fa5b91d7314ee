// chain/src/types/block.rs

//! Block header and body, canonical hashing, and genesis construction.
//!
//! Grounded on `original_source/blockchain/core/block.py`: a header's hash
//! is SHA-256 over canonical JSON of its fields, the merkle root is
//! computed eagerly from transaction digests at construction time, and
//! `finalize` stamps the proposer's signature and the block hash together.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::crypto;
use crate::merkle;

use super::tx::Transaction;

#[derive(Debug)]
pub enum BlockError {
    EmptyValidatorAddress,
    MerkleRootMismatch,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::EmptyValidatorAddress => write!(f, "block has no validator address set"),
            BlockError::MerkleRootMismatch => {
                write!(f, "merkle root does not match recomputed transaction digests")
            }
        }
    }
}

impl std::error::Error for BlockError {}

pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub timestamp: f64,
    pub validator_address: String,
    pub consensus_data: Map<String, Value>,
}

impl BlockHeader {
    /// SHA-256 over canonical JSON of all header fields.
    pub fn hash(&self) -> String {
        let mut map = Map::new();
        map.insert("height".into(), json!(self.height));
        map.insert("previous_hash".into(), json!(self.previous_hash));
        map.insert("merkle_root".into(), json!(self.merkle_root));
        map.insert("timestamp".into(), json!(self.timestamp));
        map.insert("validator_address".into(), json!(self.validator_address));
        map.insert("consensus_data".into(), Value::Object(self.consensus_data.clone()));
        let canonical = serde_json::to_string(&Value::Object(map)).expect("map serializes");
        crypto::hash_string(&canonical)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub timestamp: f64,
    pub validator_address: String,
    pub consensus_data: Map<String, Value>,
    pub merkle_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Block {
    /// Builds an unfinalized block: the merkle root over transaction
    /// digests is computed immediately, matching the source's eager
    /// `__init__`; `hash`/`signature` remain unset until [`Block::finalize`].
    pub fn new(
        height: u64,
        previous_hash: impl Into<String>,
        transactions: Vec<Transaction>,
        timestamp: f64,
        validator_address: impl Into<String>,
        consensus_data: Map<String, Value>,
    ) -> Self {
        let merkle_root = Self::calculate_merkle_root(&transactions);
        Block {
            height,
            previous_hash: previous_hash.into(),
            transactions,
            timestamp,
            validator_address: validator_address.into(),
            consensus_data,
            merkle_root,
            hash: None,
            signature: None,
        }
    }

    fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let digests: Vec<String> = transactions.iter().map(Transaction::digest).collect();
        merkle::root_of(&digests)
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            height: self.height,
            previous_hash: self.previous_hash.clone(),
            merkle_root: self.merkle_root.clone(),
            timestamp: self.timestamp,
            validator_address: self.validator_address.clone(),
            consensus_data: self.consensus_data.clone(),
        }
    }

    /// Stamps the proposer's signature and derives the final block hash
    /// from the header. Requires a non-empty `validator_address`.
    pub fn finalize(&mut self, signature: impl Into<String>) -> Result<(), BlockError> {
        if self.validator_address.is_empty() {
            return Err(BlockError::EmptyValidatorAddress);
        }
        self.signature = Some(signature.into());
        self.hash = Some(self.header().hash());
        Ok(())
    }

    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.merkle_root
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }

    /// Builds and self-finalizes the genesis block: height 0, an all-zero
    /// previous hash, a single genesis transaction, and the sentinel
    /// `"genesis_signature"` in place of a real proposer signature.
    pub fn genesis(
        chain_id: impl Into<String>,
        initial_validators: Value,
        genesis_time: f64,
    ) -> Self {
        let chain_id = chain_id.into();
        let tx = Transaction::genesis(chain_id.clone(), initial_validators, genesis_time);
        let mut consensus_data = Map::new();
        consensus_data.insert("chain_id".into(), json!(chain_id));
        let mut block = Block::new(
            0,
            GENESIS_PREVIOUS_HASH,
            vec![tx],
            genesis_time,
            "genesis",
            consensus_data,
        );
        block
            .finalize(crate::types::tx::GENESIS_SIGNATURE)
            .expect("genesis always has a validator_address");
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tx::Transaction;

    fn sample_tx() -> Transaction {
        Transaction::transfer("0xalice", "0xbob", 5.0, 0, 0.0)
    }

    #[test]
    fn merkle_root_is_computed_eagerly_and_verifies() {
        let block = Block::new(1, "prev", vec![sample_tx()], 0.0, "0xv", Map::new());
        assert!(!block.merkle_root.is_empty());
        assert!(block.verify_merkle_root());
    }

    #[test]
    fn finalize_requires_validator_address() {
        let mut block = Block::new(1, "prev", vec![sample_tx()], 0.0, "", Map::new());
        assert!(matches!(block.finalize("sig"), Err(BlockError::EmptyValidatorAddress)));
    }

    #[test]
    fn finalize_sets_hash_from_header() {
        let mut block = Block::new(1, "prev", vec![sample_tx()], 0.0, "0xv", Map::new());
        block.finalize("sig").unwrap();
        assert_eq!(block.hash.as_deref(), Some(block.header().hash().as_str()));
        assert_eq!(block.signature.as_deref(), Some("sig"));
    }

    #[test]
    fn tampered_transactions_fail_merkle_verification() {
        let mut block = Block::new(1, "prev", vec![sample_tx()], 0.0, "0xv", Map::new());
        block.transactions.push(Transaction::transfer("0xeve", "0xmallory", 1.0, 0, 0.0));
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn genesis_block_is_height_zero_and_self_finalized() {
        let block = Block::genesis("chain-1", json!([]), 0.0);
        assert!(block.is_genesis());
        assert_eq!(block.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(block.signature.as_deref(), Some(crate::types::tx::GENESIS_SIGNATURE));
        assert!(block.hash.is_some());
        assert!(block.verify_merkle_root());
    }
}
