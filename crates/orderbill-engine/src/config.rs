//! Engine configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Default number of orders below which evaluation stays on the calling thread
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Billing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on evaluation worker threads (further capped by the
    /// machine's available parallelism)
    pub max_workers: usize,
    /// Minimum number of in-scope orders before evaluation fans out
    pub parallel_threshold: usize,
    /// Record skipped order/service pairs in the billing run
    pub collect_diagnostics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: available_workers(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            collect_diagnostics: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, reading `.env` first
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_value("ORDERBILL_MAX_WORKERS") {
            cfg.max_workers = v;
        }
        if let Some(v) = env_value("ORDERBILL_PARALLEL_THRESHOLD") {
            cfg.parallel_threshold = v;
        }
        if let Some(v) = env_value("ORDERBILL_COLLECT_DIAGNOSTICS") {
            cfg.collect_diagnostics = v;
        }
        cfg
    }

    /// Worker threads to use for `order_count` orders
    pub fn workers_for(&self, order_count: usize) -> usize {
        if order_count < self.parallel_threshold.max(1) {
            return 1;
        }
        self.max_workers.min(available_workers()).clamp(1, order_count)
    }
}

fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
