//! Prometheus-backed in-process metrics.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed chain metrics. Unlike the
//! teacher, this crate does not expose `/metrics` over HTTP — that is
//! an outer-surface concern left to whatever embeds this crate.
//! [`MetricsRegistry::gather_text`] hands back the Prometheus text
//! exposition format for an embedder to serve however it likes.

use prometheus::{self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};

/// Chain-level Prometheus metrics.
///
/// Registered into a [`Registry`] and updated from the consensus engine
/// as blocks are proposed, validated, and committed.
#[derive(Clone)]
pub struct ConsensusMetrics {
    /// Latency of a full `add_block` call (validation + execution), in seconds.
    pub block_commit_seconds: Histogram,
    /// Number of blocks rejected by consensus validation.
    pub blocks_rejected: IntCounter,
    /// Number of blocks committed.
    pub blocks_committed: IntCounter,
    /// Current size of the pending transaction pool.
    pub mempool_size: prometheus::Gauge,
}

impl ConsensusMetrics {
    /// Registers chain metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_commit_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "chain_block_commit_seconds",
                "Time to validate and execute a block in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(block_commit_seconds.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "chain_blocks_rejected_total",
            "Total number of blocks rejected by consensus validation",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let blocks_committed = IntCounter::with_opts(Opts::new(
            "chain_blocks_committed_total",
            "Total number of blocks committed to the chain",
        ))?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let mempool_size = prometheus::Gauge::with_opts(Opts::new(
            "chain_mempool_size",
            "Current number of pending transactions awaiting inclusion",
        ))?;
        registry.register(Box::new(mempool_size.clone()))?;

        Ok(Self {
            block_commit_seconds,
            blocks_rejected,
            blocks_committed,
            mempool_size,
        })
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the handle a node passes around. It can be wrapped in an
/// `Arc` and shared across threads.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        Ok(Self {
            registry,
            consensus,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            log::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        metrics.block_commit_seconds.observe(0.123);
        metrics.blocks_rejected.inc();
        metrics.blocks_committed.inc();
        metrics.mempool_size.set(4.0);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.block_commit_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("chain_block_commit_seconds"));
    }
}
