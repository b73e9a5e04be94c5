use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Engine-wide tuning knobs. Constructed in code or deserialized from JSON
/// handed over by the host; every field has a sane default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Below this classification confidence, resolution short-circuits to
    /// the generic fallback handler.
    pub low_confidence_threshold: f64,
    /// Minimum fuzzy-match similarity accepted by the classifier.
    pub fuzzy_threshold: f64,
    /// Bound on a single capability-handler execution.
    pub handler_timeout_ms: u64,
    /// How many recent actions the duplicate advisory looks back over.
    pub duplicate_window: usize,
    /// Fixed cadence of performance sampling, independent of observers.
    pub sampler_cadence_ms: u64,
    /// Throttle bounds for the pattern miner's own scan cadence.
    pub miner_min_interval_ms: u64,
    pub miner_max_interval_ms: u64,
    pub miner_backoff_multiplier: f64,
    /// Static per-intent handler ordering. Handlers not listed here are
    /// appended dynamically by priority.
    pub intent_chains: HashMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.3,
            fuzzy_threshold: 0.7,
            handler_timeout_ms: 5_000,
            duplicate_window: 3,
            sampler_cadence_ms: 10_000,
            miner_min_interval_ms: 60_000,
            miner_max_interval_ms: 3_600_000,
            miner_backoff_multiplier: 2.0,
            intent_chains: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
