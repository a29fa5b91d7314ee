//! Storage abstraction used by the chain engine.
//!
//! The chain is append-only and strictly monotonic in height (§1, §4.1 —
//! no reorgs, no forks), so blocks are addressed by height rather than by
//! hash-linked branches.

use crate::types::Block;

pub trait BlockStore {
    /// Fetches the block at `height`, if present.
    fn get_block(&self, height: u64) -> Option<Block>;

    /// Appends `block` to the store. Callers must ensure `block.height`
    /// immediately follows the current tip.
    fn put_block(&mut self, block: Block);

    /// Height of the most recently appended block, or `None` before genesis.
    fn tip_height(&self) -> Option<u64>;

    fn tip_block(&self) -> Option<Block> {
        self.tip_height().and_then(|h| self.get_block(h))
    }
}
