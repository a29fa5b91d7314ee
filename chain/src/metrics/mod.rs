//! Metrics and instrumentation for the chain.
//!
//! This module defines Prometheus-compatible metrics for the chain
//! engine. No HTTP exporter is included — that outer surface is left to
//! whatever process embeds this crate; [`MetricsRegistry::gather_text`]
//! produces the Prometheus text format for it to serve.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use chain::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new()?;
//! registry.consensus.block_commit_seconds.observe(duration_secs);
//! let text = registry.gather_text();
//! ```

pub mod prometheus;

pub use prometheus::{ConsensusMetrics, MetricsRegistry};
