use crate::signature::RequestSignature;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Classified purpose of a user request. Produced fresh per request, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_type: String,
    pub confidence: f64,
    pub args: HashMap<String, String>,
}

impl Intent {
    pub fn unknown(confidence: f64) -> Self {
        Self {
            intent_type: "unknown".to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            args: HashMap::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.intent_type == "unknown"
    }
}

/// Outcome of one `resolve` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub success: bool,
    pub message: String,
    pub handler_used: Option<String>,
    pub fallback_used: bool,
    /// Non-blocking "this was just done" advisory. Execution proceeds anyway.
    pub duplicate_advisory: Option<String>,
    /// Alternative handler names offered when the whole chain failed.
    pub suggestions: Vec<String>,
}

/// Learned per-signature handler choice. Bounded to the most recent 100
/// records, oldest evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub signature: RequestSignature,
    pub chosen_handler: String,
    pub timestamp_ms: i64,
    pub success: bool,
}

/// One resolved request, appended after every resolution. Immutable once
/// written; read by the pattern miner. Bounded ring of 1 000.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: u64,
    pub command: String,
    pub context: HashMap<String, String>,
    pub timestamp_ms: i64,
    pub success: bool,
    pub duration_ms: u64,
}

/// Per-observer polling configuration. `current_interval_ms` is mutated only
/// by the throttle controller; `min <= current <= max` holds at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub name: String,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub current_interval_ms: u64,
    pub backoff_multiplier: f64,
}

impl ThrottleConfig {
    pub fn new(name: impl Into<String>, min_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        let min_ms = min_ms.max(1);
        let max_ms = max_ms.max(min_ms);
        Self {
            name: name.into(),
            min_interval_ms: min_ms,
            max_interval_ms: max_ms,
            current_interval_ms: min_ms,
            backoff_multiplier: if multiplier > 1.0 { multiplier } else { 2.0 },
        }
    }

    pub fn clamp_current(&mut self) {
        self.current_interval_ms = self
            .current_interval_ms
            .clamp(self.min_interval_ms, self.max_interval_ms);
    }
}

/// Rolling resource snapshot used for emergency-mode decisions. Kept in a
/// bounded window, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub cpu_pct: f32,
    pub memory_mb: u64,
    pub disk_io_count: u64,
    pub active_connections: usize,
    pub timestamp_ms: i64,
}

/// A repeated subsequence of user actions detected across the action log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub id: u64,
    pub action_sequence: Vec<String>,
    pub frequency: u32,
    pub confidence: f64,
    pub contexts: BTreeSet<String>,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub is_automated: bool,
}

impl BehaviorPattern {
    /// Literal grouping key for a command sequence.
    pub fn sequence_key(sequence: &[String]) -> String {
        sequence.join("\u{1f}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    Workflow,
    Shortcut,
    Reminder,
}

/// Derived automation proposal; computed on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSuggestion {
    pub pattern: BehaviorPattern,
    pub estimated_savings_ms: i64,
    pub automation_type: AutomationType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_config_orders_bounds() {
        let cfg = ThrottleConfig::new("clipboard", 500, 100, 2.0);
        assert!(cfg.min_interval_ms <= cfg.max_interval_ms);
        assert!(cfg.current_interval_ms >= cfg.min_interval_ms);
        assert!(cfg.current_interval_ms <= cfg.max_interval_ms);
    }

    #[test]
    fn test_throttle_config_rejects_degenerate_multiplier() {
        let cfg = ThrottleConfig::new("window", 100, 1000, 0.5);
        assert!(cfg.backoff_multiplier > 1.0);
    }

    #[test]
    fn test_unknown_intent_clamps_confidence() {
        let intent = Intent::unknown(1.7);
        assert!(intent.is_unknown());
        assert!(intent.confidence <= 1.0);
    }

    #[test]
    fn test_sequence_key_is_order_sensitive() {
        let a = BehaviorPattern::sequence_key(&["open chrome".into(), "search x".into()]);
        let b = BehaviorPattern::sequence_key(&["search x".into(), "open chrome".into()]);
        assert_ne!(a, b);
    }
}
