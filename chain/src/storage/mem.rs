//! In-memory block store.
//!
//! Useful for unit tests, benchmarks, and anything that doesn't need
//! blocks to survive a process restart. Blocks are keyed directly by
//! height, matching the chain's append-only, non-forking shape (§1).

use std::collections::BTreeMap;

use crate::consensus::store::BlockStore;
use crate::types::Block;

/// In-memory implementation of [`BlockStore`].
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: BTreeMap<u64, Block>,
}

impl InMemoryBlockStore {
    /// Creates a new, empty in-memory block store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get_block(&self, height: u64) -> Option<Block> {
        self.blocks.get(&height).cloned()
    }

    fn put_block(&mut self, block: Block) {
        self.blocks.insert(block.height, block);
    }

    fn tip_height(&self) -> Option<u64> {
        self.blocks.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Block;
    use serde_json::Map;

    fn dummy_block(height: u64, previous_hash: &str) -> Block {
        Block::new(height, previous_hash, Vec::new(), 1_700_000_000.0 + height as f64, "0xvalidator", Map::new())
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let mut store = InMemoryBlockStore::new();
        let block = dummy_block(0, &"0".repeat(64));

        store.put_block(block.clone());
        let fetched = store.get_block(0).expect("block should be present");

        assert_eq!(fetched.height, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tip_height_tracks_highest_inserted_block() {
        let mut store = InMemoryBlockStore::new();
        assert_eq!(store.tip_height(), None);

        store.put_block(dummy_block(0, &"0".repeat(64)));
        store.put_block(dummy_block(1, "abc"));

        assert_eq!(store.tip_height(), Some(1));
        assert!(store.tip_block().is_some());
    }
}
