//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - on-disk storage (`StorageConfig`),
//! - the multi-level permission lattice (`MlsConfig`),
//! - in-process metrics collection (`MetricsConfig`).
//!
//! The goal is to have a single `ChainConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::path::PathBuf;

use crate::consensus::ConsensusConfig;
use crate::crypto::Address;

/// Configuration for on-disk persistence.
///
/// Blocks, chain state, and the permission lattice are each persisted
/// as a JSON file under `data_dir` (§3.5); writes are atomic rename-over
/// via a temp file in the same directory.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/chain"),
        }
    }
}

/// Configuration for the multi-level permission system bootstrapped at
/// genesis.
#[derive(Clone, Debug)]
pub struct MlsConfig {
    /// Number of clearance levels, including level 0 (public).
    pub num_levels: u8,
    /// Address granted the top clearance level at genesis.
    pub creator_address: Address,
    /// Optional human-readable names for each level, lowest first.
    pub level_names: Option<Vec<String>>,
}

impl Default for MlsConfig {
    fn default() -> Self {
        Self {
            num_levels: 5,
            creator_address: String::new(),
            level_names: None,
        }
    }
}

/// Configuration for in-process metrics collection.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to collect metrics at all.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration for a chain node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - consensus tuning (`consensus`),
/// - persistent storage (`storage`),
/// - the permission lattice (`mls`),
/// - metrics collection (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub consensus: ConsensusConfig,
    pub storage: StorageConfig,
    pub mls: MlsConfig,
    pub metrics: MetricsConfig,
}
