use crate::store::PatternStore;
use reflex_core::{ActionRecord, AutomationType, BehaviorPattern, PatternSuggestion};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// How far back the scan reaches.
    pub window_ms: i64,
    /// Max spread between the first and last action of one sequence.
    pub max_gap_ms: i64,
    pub min_sequence_len: usize,
    pub max_sequence_len: usize,
    /// Sequences seen fewer times than this within the window are noise.
    pub min_frequency: u32,
    /// Assumed manual cost of one action, for savings estimates.
    pub per_action_cost_ms: i64,
    /// Assumed cost of running the same sequence automated.
    pub automated_cost_ms: i64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            window_ms: 24 * 60 * 60 * 1_000,
            max_gap_ms: 30 * 60 * 1_000,
            min_sequence_len: 2,
            max_sequence_len: 5,
            min_frequency: 2,
            per_action_cost_ms: 3_000,
            automated_cost_ms: 500,
        }
    }
}

/// Mines the action log for repeated subsequences and turns them into ranked
/// automation suggestions. Reads a snapshot of the log, writes only to its
/// own pattern store.
pub struct PatternMiner {
    config: MinerConfig,
    store: Arc<PatternStore>,
}

impl PatternMiner {
    pub fn new(config: MinerConfig, store: Arc<PatternStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Sliding-window extraction over a snapshot of the action log. Pure:
    /// returns candidates without touching the store.
    pub fn detect_patterns(&self, actions: &[ActionRecord]) -> Vec<BehaviorPattern> {
        let mut sorted: Vec<&ActionRecord> = actions.iter().collect();
        sorted.sort_by_key(|a| a.timestamp_ms);

        struct Group {
            sequence: Vec<String>,
            frequency: u32,
            contexts: BTreeSet<String>,
        }

        let mut groups: HashMap<String, Group> = HashMap::new();

        for i in 0..sorted.len() {
            for len in self.config.min_sequence_len..=self.config.max_sequence_len {
                let end = i + len;
                if end > sorted.len() {
                    break;
                }
                // Longer windows only spread further; stop at the first gap
                if sorted[end - 1].timestamp_ms - sorted[i].timestamp_ms > self.config.max_gap_ms {
                    break;
                }

                let sequence: Vec<String> =
                    sorted[i..end].iter().map(|a| a.command.clone()).collect();
                let key = BehaviorPattern::sequence_key(&sequence);

                let group = groups.entry(key).or_insert_with(|| Group {
                    sequence,
                    frequency: 0,
                    contexts: BTreeSet::new(),
                });
                group.frequency += 1;
                for record in &sorted[i..end] {
                    for (k, v) in &record.context {
                        group.contexts.insert(format!("{}={}", k, v));
                    }
                }
            }
        }

        let mut candidates: Vec<BehaviorPattern> = groups
            .into_values()
            .filter(|g| g.frequency >= self.config.min_frequency)
            .map(|g| BehaviorPattern {
                id: 0,
                confidence: score(g.frequency, g.contexts.len()),
                action_sequence: g.sequence,
                frequency: g.frequency,
                contexts: g.contexts,
                first_seen_ms: 0,
                last_seen_ms: 0,
                is_automated: false,
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// One full scan cycle: detect over the snapshot and merge every
    /// candidate into the persistent store. Returns how many sequences were
    /// new or grew, which the caller uses to adjust its own throttle. A
    /// re-scan of an unchanged window reports zero.
    pub async fn run_scan(&self, actions: &[ActionRecord], now_ms: i64) -> usize {
        let candidates = self.detect_patterns(actions);

        let mut advanced = 0;
        for candidate in candidates {
            if self.store.merge(candidate, now_ms).await {
                advanced += 1;
            }
        }

        if advanced > 0 {
            info!("Pattern scan learned {} sequences", advanced);
        } else {
            debug!("Pattern scan found nothing new");
        }
        advanced
    }

    /// Ranked automation proposals for every non-automated pattern seen at
    /// least `min_frequency` times, best savings first.
    pub async fn suggestions(&self) -> Vec<PatternSuggestion> {
        let mut suggestions: Vec<PatternSuggestion> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|p| p.frequency >= self.config.min_frequency && !p.is_automated)
            .map(|pattern| {
                let len = pattern.action_sequence.len() as i64;
                let estimated_savings_ms = (len * self.config.per_action_cost_ms
                    - self.config.automated_cost_ms)
                    * pattern.frequency as i64;
                let automation_type = match pattern.action_sequence.len() {
                    n if n > 3 => AutomationType::Workflow,
                    2..=3 => AutomationType::Shortcut,
                    _ => AutomationType::Reminder,
                };
                PatternSuggestion {
                    pattern,
                    estimated_savings_ms,
                    automation_type,
                }
            })
            .collect();

        suggestions.sort_by_key(|s| std::cmp::Reverse(s.estimated_savings_ms));
        suggestions
    }
}

/// Frequency dominates; context diversity corroborates.
pub(crate) fn score(frequency: u32, distinct_contexts: usize) -> f64 {
    0.7 * (frequency as f64 / 5.0).min(1.0) + 0.3 * (distinct_contexts as f64 / 3.0).min(1.0)
}
