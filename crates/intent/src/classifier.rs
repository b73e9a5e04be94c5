use crate::extract::extract_args;
use crate::keywords::IntentTable;
use reflex_core::{normalize_text, Intent};
use tracing::debug;

const TIER1_CONFIDENCE: f64 = 0.95;
const MISSING_ARG_PENALTY: f64 = 0.1;
const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Two-tier intent classifier: exact/substring keyword match first, then a
/// normalized edit-distance fuzzy pass over the same table. Pure function
/// over static tables; no I/O.
pub struct IntentClassifier {
    table: IntentTable,
    fuzzy_threshold: f64,
}

impl IntentClassifier {
    pub fn new(table: IntentTable) -> Self {
        Self {
            table,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn classify(&self, text: &str) -> Intent {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Intent::unknown(0.0);
        }

        // Tier 1: substring match, first entry wins
        for entry in self.table.entries() {
            if entry.triggers().any(|kw| normalized.contains(kw)) {
                debug!(intent = %entry.intent, "tier-1 keyword match");
                return self.finish(&entry.intent, TIER1_CONFIDENCE, &normalized);
            }
        }

        // Tier 2: fuzzy match against every keyword and synonym
        let mut best_intent: Option<&str> = None;
        let mut best_similarity = 0.0_f64;
        for entry in self.table.entries() {
            for kw in entry.triggers() {
                let similarity = strsim::normalized_levenshtein(&normalized, kw);
                if similarity > best_similarity {
                    best_similarity = similarity;
                    best_intent = Some(&entry.intent);
                }
            }
        }

        match best_intent {
            Some(intent) if best_similarity >= self.fuzzy_threshold => {
                debug!(intent, similarity = best_similarity, "tier-2 fuzzy match");
                self.finish(intent, best_similarity, &normalized)
            }
            _ => Intent::unknown(best_similarity),
        }
    }

    fn finish(&self, intent_type: &str, base_confidence: f64, normalized: &str) -> Intent {
        let args = extract_args(intent_type, normalized);

        let missing = self
            .table
            .required_args(intent_type)
            .iter()
            .filter(|name| !args.contains_key(*name))
            .count();

        let confidence =
            (base_confidence - missing as f64 * MISSING_ARG_PENALTY).clamp(0.0, 1.0);

        Intent {
            intent_type: intent_type.to_string(),
            confidence,
            args,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(IntentTable::default())
    }
}
