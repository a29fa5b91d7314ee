//! Storage backends for the chain.
//!
//! This module provides concrete implementations of the
//! [`crate::consensus::store::BlockStore`] trait, plus state/permission
//! persistence alongside it:
//!
//! - an in-memory store ([`mem::InMemoryBlockStore`]) for tests,
//! - a JSON-file-backed store ([`json::JsonFileStore`]) for a running
//!   node, per §3.5.

pub mod json;
pub mod mem;

pub use json::{JsonFileStore, StorageError};
pub use mem::InMemoryBlockStore;
