use reflex_core::BehaviorPattern;
use reflex_memory::{MemoryError, Persistence};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const PATTERNS_KEY: &str = "patterns";
const MAX_PATTERNS: usize = 200;

/// Persistent store of detected behavior patterns, keyed by the literal
/// command-sequence key. Patterns are never deleted automatically except by
/// least-recently-seen eviction once the cap is reached.
pub struct PatternStore {
    patterns: RwLock<HashMap<String, BehaviorPattern>>,
    next_id: AtomicU64,
    cap: usize,
    persistence: Option<Arc<dyn Persistence>>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            cap: MAX_PATTERNS,
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        let mut store = Self::new();
        store.persistence = Some(persistence);
        store
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    pub async fn restore(&self) -> Result<(), MemoryError> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        if let Some(bytes) = persistence.load(PATTERNS_KEY).await? {
            let patterns: HashMap<String, BehaviorPattern> = serde_json::from_slice(&bytes)?;
            let max_id = patterns.values().map(|p| p.id).max().unwrap_or(0);
            self.next_id.store(max_id + 1, Ordering::SeqCst);
            *self.patterns.write().await = patterns;
            debug!("Pattern store restored");
        }
        Ok(())
    }

    /// Merge one freshly mined candidate. An existing pattern with the same
    /// sequence absorbs it: frequency takes the larger of the stored and the
    /// re-mined count (so re-scanning an unchanged window is idempotent),
    /// contexts are unioned, confidence is recomputed from the merged counts,
    /// and `last_seen` is bumped. New sequences are inserted with
    /// `first_seen = last_seen = now`. Returns whether the store learned
    /// something: a new sequence, or a higher count for a known one.
    pub async fn merge(&self, candidate: BehaviorPattern, now_ms: i64) -> bool {
        let advanced = {
            let mut patterns = self.patterns.write().await;
            let key = BehaviorPattern::sequence_key(&candidate.action_sequence);

            let advanced = match patterns.get_mut(&key) {
                Some(existing) => {
                    let grew = candidate.frequency > existing.frequency;
                    existing.frequency = existing.frequency.max(candidate.frequency);
                    existing.contexts.extend(candidate.contexts);
                    existing.confidence =
                        crate::miner::score(existing.frequency, existing.contexts.len());
                    existing.last_seen_ms = now_ms;
                    grew
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    patterns.insert(
                        key,
                        BehaviorPattern {
                            id,
                            first_seen_ms: now_ms,
                            last_seen_ms: now_ms,
                            ..candidate
                        },
                    );
                    true
                }
            };

            while patterns.len() > self.cap {
                let stalest = patterns
                    .iter()
                    .min_by_key(|(_, p)| p.last_seen_ms)
                    .map(|(k, _)| k.clone());
                match stalest {
                    Some(key) => {
                        debug!("Evicting least-recently-seen pattern: {}", key);
                        patterns.remove(&key);
                    }
                    None => break,
                }
            }
            advanced
        };
        self.persist().await;
        advanced
    }

    pub async fn all(&self) -> Vec<BehaviorPattern> {
        self.patterns.read().await.values().cloned().collect()
    }

    pub async fn get_by_sequence(&self, sequence: &[String]) -> Option<BehaviorPattern> {
        let key = BehaviorPattern::sequence_key(sequence);
        self.patterns.read().await.get(&key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.patterns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.patterns.read().await.is_empty()
    }

    /// Flip a pattern to automated once the host has wired it up; automated
    /// patterns stop appearing in suggestions.
    pub async fn mark_automated(&self, id: u64) -> bool {
        let marked = {
            let mut patterns = self.patterns.write().await;
            match patterns.values_mut().find(|p| p.id == id) {
                Some(pattern) => {
                    pattern.is_automated = true;
                    true
                }
                None => false,
            }
        };
        if marked {
            self.persist().await;
        }
        marked
    }

    async fn persist(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.patterns.read().await.clone();
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = persistence.save(PATTERNS_KEY, &bytes).await {
                    warn!("Failed to persist patterns, continuing in memory: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize patterns: {}", e),
        }
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflex_memory::FilePersistence;
    use std::collections::BTreeSet;

    fn candidate(sequence: &[&str], frequency: u32) -> BehaviorPattern {
        BehaviorPattern {
            id: 0,
            action_sequence: sequence.iter().map(|s| s.to_string()).collect(),
            frequency,
            confidence: 0.5,
            contexts: BTreeSet::new(),
            first_seen_ms: 0,
            last_seen_ms: 0,
            is_automated: false,
        }
    }

    #[tokio::test]
    async fn test_insert_then_merge_same_sequence() {
        let store = PatternStore::new();
        store.merge(candidate(&["a", "b"], 2), 100).await;
        store.merge(candidate(&["a", "b"], 3), 200).await;

        assert_eq!(store.len().await, 1);
        let pattern = store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(pattern.frequency, 3);
        assert_eq!(pattern.first_seen_ms, 100);
        assert_eq!(pattern.last_seen_ms, 200);
    }

    #[tokio::test]
    async fn test_remerge_is_idempotent_for_frequency() {
        let store = PatternStore::new();
        store.merge(candidate(&["a", "b"], 3), 100).await;
        store.merge(candidate(&["a", "b"], 3), 200).await;

        let pattern = store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(pattern.frequency, 3);
    }

    #[tokio::test]
    async fn test_merge_reports_new_and_grown_sequences() {
        let store = PatternStore::new();

        assert!(store.merge(candidate(&["a", "b"], 2), 100).await);
        assert!(!store.merge(candidate(&["a", "b"], 2), 200).await);
        assert!(store.merge(candidate(&["a", "b"], 3), 300).await);
    }

    #[tokio::test]
    async fn test_merge_recomputes_confidence_from_merged_counts() {
        let store = PatternStore::new();
        store.merge(candidate(&["a", "b"], 2), 100).await;
        store.merge(candidate(&["a", "b"], 3), 200).await;

        let pattern = store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        // 0.7 * 3/5 with no contexts; the candidate's own 0.5 is discarded
        assert!((pattern.confidence - 0.42).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cap_evicts_least_recently_seen() {
        let store = PatternStore::new().with_cap(2);
        store.merge(candidate(&["a", "b"], 2), 100).await;
        store.merge(candidate(&["c", "d"], 2), 200).await;
        store.merge(candidate(&["e", "f"], 2), 300).await;

        assert_eq!(store.len().await, 2);
        assert!(store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .is_none());
        assert!(store
            .get_by_sequence(&["e".to_string(), "f".to_string()])
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_mark_automated() {
        let store = PatternStore::new();
        store.merge(candidate(&["a", "b"], 2), 100).await;
        let pattern = store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert!(store.mark_automated(pattern.id).await);
        let updated = store
            .get_by_sequence(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert!(updated.is_automated);

        assert!(!store.mark_automated(9_999).await);
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(FilePersistence::new(temp_dir.path()));
        persistence.initialize().await.unwrap();

        {
            let store = PatternStore::with_persistence(persistence.clone());
            store.merge(candidate(&["a", "b"], 2), 100).await;
        }

        let restored = PatternStore::with_persistence(persistence);
        restored.restore().await.unwrap();
        assert_eq!(restored.len().await, 1);
    }
}
