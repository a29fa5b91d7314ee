// src/main.rs
//
// Minimal demo node that wires up the chain library:
//
// - JSON-file-backed storage
// - round-robin consensus over a freshly generated validator set
// - in-process Prometheus metrics (no HTTP exporter)
// - a loop that proposes and commits empty blocks at a fixed interval.

use std::time::Duration;

use chain::consensus::mechanisms::round_robin_poa::RoundRobin;
use chain::crypto;
use chain::storage::JsonFileStore;
use chain::types::{BlockchainState, ValidatorState};
use chain::{ChainConfig, ChainEngine, MetricsRegistry};

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run_node().await {
        log::error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = ChainConfig::default();

    let metrics = MetricsRegistry::new()
        .map_err(|e| format!("failed to initialise metrics registry: {e}"))?;

    let store = JsonFileStore::open(&cfg.storage.data_dir)
        .map_err(|e| format!("failed to open store at {:?}: {e}", cfg.storage.data_dir))?;

    let mut engine = ChainEngine::new(
        cfg.consensus.clone(),
        store,
        RoundRobin::new(),
        BlockchainState::new("demo-chain"),
    );

    let keypair = crypto::generate_keypair();
    let proposer_address = keypair.get_address();
    engine.bootstrap_genesis(
        "demo-chain",
        vec![ValidatorState::new(
            &proposer_address,
            keypair.get_public_key_hex(),
            10,
            "demo-validator",
        )],
        0.0,
    );

    let block_interval = cfg.consensus.block_time_secs;
    log::info!("starting node with block_time_secs={block_interval} proposer={proposer_address}");

    let mut timestamp = block_interval;
    loop {
        let start = std::time::Instant::now();

        match engine.propose_block(&proposer_address, &keypair.get_private_key_hex(), timestamp) {
            Some(block) => {
                let height = block.height;
                match engine.add_block(block) {
                    Ok(()) => log::info!("committed block height={height}"),
                    Err(e) => log::warn!("failed to commit block height={height}: {e}"),
                }
                metrics
                    .consensus
                    .block_commit_seconds
                    .observe(start.elapsed().as_secs_f64());
                metrics.consensus.blocks_committed.inc();
            }
            None => log::warn!("no eligible proposer for height={}", engine.height() + 1),
        }

        metrics
            .consensus
            .mempool_size
            .set(engine.pending_transactions().len() as f64);

        tokio::time::sleep(Duration::from_secs_f64(block_interval)).await;
        timestamp += block_interval;
    }
}
