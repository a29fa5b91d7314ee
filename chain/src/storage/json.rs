//! JSON-file-backed persistence.
//!
//! Three files live under a node's `data_dir`: `blocks.json` (the full
//! block list, height-ordered), `state.json` (the current
//! [`BlockchainState`]), and `permissions.json` (the
//! [`MultiLevelPermissionSystem`]). Every write replaces the whole file:
//! serialize to a [`tempfile::NamedTempFile`] in the same directory, then
//! `persist`-rename over the destination, so a crash mid-write never
//! leaves a half-written file behind (§3.5, spec §6).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;

use crate::consensus::store::BlockStore;
use crate::permissions::MultiLevelPermissionSystem;
use crate::types::{Block, BlockchainState};

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying I/O failure reading or writing a file.
    Io(io::Error),
    /// The file's contents did not parse as the expected JSON shape.
    CorruptJson(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptJson(e.to_string())
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "storage I/O error: {e}"),
            StorageError::CorruptJson(msg) => write!(f, "corrupt JSON in storage file: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

fn write_atomic(path: &Path, value: &impl Serialize) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.persist(path).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// JSON-file-backed implementation of [`BlockStore`], plus chain state
/// and permission-lattice persistence for the rest of the engine.
///
/// Blocks are kept fully in memory and flushed to `blocks.json` on every
/// [`JsonFileStore::put_block`]; this is adequate for the devnet / small
/// permissioned-network scale this crate targets (§1), not a
/// high-throughput production ledger.
pub struct JsonFileStore {
    data_dir: PathBuf,
    blocks: Vec<Block>,
}

impl JsonFileStore {
    fn blocks_path(data_dir: &Path) -> PathBuf {
        data_dir.join("blocks.json")
    }

    fn state_path(data_dir: &Path) -> PathBuf {
        data_dir.join("state.json")
    }

    fn permissions_path(data_dir: &Path) -> PathBuf {
        data_dir.join("permissions.json")
    }

    /// Opens a store rooted at `data_dir`. If `blocks.json` exists and
    /// parses, its contents are loaded; otherwise the store starts empty
    /// (genesis is the caller's responsibility, per spec §4.7).
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        let blocks = match read_json::<Vec<Block>>(&Self::blocks_path(&data_dir)) {
            Ok(blocks) => blocks,
            Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { data_dir, blocks })
    }

    /// `true` if all three persisted files are present on disk, meaning
    /// a prior run's state can be restored instead of re-bootstrapping
    /// genesis.
    pub fn has_persisted_state(&self) -> bool {
        [
            Self::blocks_path(&self.data_dir),
            Self::state_path(&self.data_dir),
            Self::permissions_path(&self.data_dir),
        ]
        .iter()
        .all(|p| p.exists())
    }

    fn flush_blocks(&self) -> Result<(), StorageError> {
        write_atomic(&Self::blocks_path(&self.data_dir), &self.blocks)
    }

    /// Persists the blockchain state to `state.json`.
    pub fn save_state(&self, state: &BlockchainState) -> Result<(), StorageError> {
        write_atomic(&Self::state_path(&self.data_dir), state)
    }

    /// Loads the blockchain state from `state.json`.
    pub fn load_state(&self) -> Result<BlockchainState, StorageError> {
        read_json(&Self::state_path(&self.data_dir))
    }

    /// Persists the permission lattice to `permissions.json`.
    pub fn save_permissions(
        &self,
        mls: &MultiLevelPermissionSystem,
    ) -> Result<(), StorageError> {
        write_atomic(&Self::permissions_path(&self.data_dir), mls)
    }

    /// Loads the permission lattice from `permissions.json`.
    pub fn load_permissions(&self) -> Result<MultiLevelPermissionSystem, StorageError> {
        read_json(&Self::permissions_path(&self.data_dir))
    }
}

impl BlockStore for JsonFileStore {
    fn get_block(&self, height: u64) -> Option<Block> {
        self.blocks.iter().find(|b| b.height == height).cloned()
    }

    fn put_block(&mut self, block: Block) {
        self.blocks.push(block);
        if let Err(e) = self.flush_blocks() {
            log::error!("failed to persist blocks.json: {e}");
        }
    }

    fn tip_height(&self) -> Option<u64> {
        self.blocks.last().map(|b| b.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn dummy_block(height: u64) -> Block {
        Block::new(height, "0".repeat(64), Vec::new(), 1_700_000_000.0 + height as f64, "0xvalidator", Map::new())
    }

    #[test]
    fn put_block_persists_and_reopen_restores() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = JsonFileStore::open(dir.path()).expect("open store");
            store.put_block(dummy_block(0));
            store.put_block(dummy_block(1));
        }

        let store = JsonFileStore::open(dir.path()).expect("reopen store");
        assert_eq!(store.tip_height(), Some(1));
        assert_eq!(store.get_block(0).unwrap().height, 0);
    }

    #[test]
    fn state_and_permissions_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open store");

        let state = BlockchainState::new("test-chain");
        store.save_state(&state).expect("save state");
        let loaded = store.load_state().expect("load state");
        assert_eq!(loaded.chain_id, "test-chain");

        let mls = MultiLevelPermissionSystem::new(5, "0xcreator", None, 0.0).expect("valid mls");
        store.save_permissions(&mls).expect("save permissions");
        store.load_permissions().expect("load permissions");
    }

    #[test]
    fn has_persisted_state_requires_all_three_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::open(dir.path()).expect("open store");
        assert!(!store.has_persisted_state());

        store.put_block(dummy_block(0));
        assert!(!store.has_persisted_state());

        store.save_state(&BlockchainState::new("test-chain")).expect("save state");
        let mls = MultiLevelPermissionSystem::new(5, "0xcreator", None, 0.0).expect("valid mls");
        store.save_permissions(&mls).expect("save permissions");
        assert!(store.has_persisted_state());
    }
}
