//! Chain library crate.
//!
//! This crate implements a permissioned ledger core: an append-only,
//! strictly-monotonic block chain driven by a pluggable consensus
//! mechanism, guarded by a flat permission system and an independent
//! multi-level security lattice. It provides:
//!
//! - SECP256k1 keys and signing (`crypto`),
//! - a binary merkle tree over transaction digests (`merkle`),
//! - strongly-typed domain types: transactions, blocks, state (`types`),
//! - permission subsystems: ACL, RBAC, and the MLS lattice (`permissions`),
//! - peer and validator-set bookkeeping for an outer network layer (`network`),
//! - the pluggable consensus mechanism interface and nine concrete
//!   implementations, plus the chain engine that drives them (`consensus`),
//! - JSON-file-backed persistence (`storage`),
//! - in-process Prometheus metrics (`metrics`),
//! - and top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces to run a validator node;
//! see `main.rs` for a minimal single-process demo.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod metrics;
pub mod network;
pub mod permissions;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ChainConfig, MetricsConfig, MlsConfig, StorageConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{ChainEngine, Consensus, ConsensusConfig, ConsensusError, ValidationError};

// Re-export storage backends.
pub use storage::{InMemoryBlockStore, JsonFileStore, StorageError};

// Re-export metrics registry and chain metrics.
pub use metrics::{ConsensusMetrics, MetricsRegistry};

// Re-export the top-level error type.
pub use error::ChainError;

// Re-export domain types at the crate root for convenience.
pub use types::*;
