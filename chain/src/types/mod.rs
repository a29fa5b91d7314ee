//! Core domain types used by the chain: transactions, blocks, and state.
//!
//! Strongly-typed wrappers are kept where they pay for themselves
//! (addresses, digests as hex strings) without reaching for newtypes the
//! rest of the crate has no use for.

pub mod block;
pub mod state;
pub mod tx;

pub use block::{Block, BlockError, BlockHeader};
pub use state::{AccountState, BlockchainState, ValidatorState};
pub use tx::{Transaction, TxInput, TxKind, TxOutput};
