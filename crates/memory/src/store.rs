use crate::persistence::{MemoryError, Persistence};
use reflex_core::{ActionRecord, PreferenceRecord, RequestSignature};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const PREFERENCES_KEY: &str = "preferences";
const ACTIONS_KEY: &str = "actions";

const MAX_PREFERENCES: usize = 100;
const MAX_ACTIONS: usize = 1_000;

/// Bounded in-memory store for learned preferences and the action log.
///
/// Writes to each collection are serialized behind its own lock. Durability
/// is delegated to the [`Persistence`] seam; any failure there is logged and
/// the store keeps operating in memory.
pub struct MemoryStore {
    preferences: RwLock<VecDeque<PreferenceRecord>>,
    actions: RwLock<VecDeque<ActionRecord>>,
    next_action_id: AtomicU64,
    persistence: Option<Arc<dyn Persistence>>,
    max_preferences: usize,
    max_actions: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            preferences: RwLock::new(VecDeque::new()),
            actions: RwLock::new(VecDeque::new()),
            next_action_id: AtomicU64::new(1),
            persistence: None,
            max_preferences: MAX_PREFERENCES,
            max_actions: MAX_ACTIONS,
        }
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        let mut store = Self::new();
        store.persistence = Some(persistence);
        store
    }

    /// Override collection bounds (mainly for tests).
    pub fn with_bounds(mut self, max_preferences: usize, max_actions: usize) -> Self {
        self.max_preferences = max_preferences.max(1);
        self.max_actions = max_actions.max(1);
        self
    }

    /// Reload both collections from the persistence layer. Missing keys are
    /// fine; a fresh store starts empty.
    pub async fn restore(&self) -> Result<(), MemoryError> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        if let Some(bytes) = persistence.load(PREFERENCES_KEY).await? {
            let records: VecDeque<PreferenceRecord> = serde_json::from_slice(&bytes)?;
            *self.preferences.write().await = records;
        }
        if let Some(bytes) = persistence.load(ACTIONS_KEY).await? {
            let records: VecDeque<ActionRecord> = serde_json::from_slice(&bytes)?;
            let max_id = records.iter().map(|r| r.id).max().unwrap_or(0);
            self.next_action_id.store(max_id + 1, Ordering::SeqCst);
            *self.actions.write().await = records;
        }

        debug!("Memory store restored from persistence");
        Ok(())
    }

    pub async fn get_preference(&self, signature: &RequestSignature) -> Option<PreferenceRecord> {
        let prefs = self.preferences.read().await;
        prefs.iter().find(|p| &p.signature == signature).cloned()
    }

    /// Insert or replace the record for its signature, evicting the oldest
    /// record when the bound is exceeded.
    pub async fn upsert_preference(&self, record: PreferenceRecord) {
        {
            let mut prefs = self.preferences.write().await;
            if let Some(existing) = prefs.iter_mut().find(|p| p.signature == record.signature) {
                *existing = record;
            } else {
                prefs.push_back(record);
            }

            while prefs.len() > self.max_preferences {
                let oldest = prefs
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, p)| p.timestamp_ms)
                    .map(|(i, _)| i);
                match oldest {
                    Some(i) => {
                        prefs.remove(i);
                    }
                    None => break,
                }
            }
        }
        self.persist_preferences().await;
    }

    /// Timestamp of the most recent successful resolution through `handler`,
    /// derived from the preference records.
    pub async fn last_success_ms(&self, handler: &str) -> Option<i64> {
        let prefs = self.preferences.read().await;
        prefs
            .iter()
            .filter(|p| p.success && p.chosen_handler == handler)
            .map(|p| p.timestamp_ms)
            .max()
    }

    /// Append an action record, assigning its id. Oldest entries fall off the
    /// ring when the bound is exceeded.
    pub async fn append_action(&self, mut record: ActionRecord) -> u64 {
        let id = self.next_action_id.fetch_add(1, Ordering::SeqCst);
        record.id = id;
        {
            let mut actions = self.actions.write().await;
            actions.push_back(record);
            while actions.len() > self.max_actions {
                actions.pop_front();
            }
        }
        self.persist_actions().await;
        id
    }

    /// Last `limit` actions in chronological order.
    pub async fn recent_actions(&self, limit: usize) -> Vec<ActionRecord> {
        let actions = self.actions.read().await;
        let start = actions.len().saturating_sub(limit);
        actions.iter().skip(start).cloned().collect()
    }

    /// Snapshot of all actions at or after `since_ms`, for the pattern miner.
    pub async fn actions_since(&self, since_ms: i64) -> Vec<ActionRecord> {
        let actions = self.actions.read().await;
        actions
            .iter()
            .filter(|a| a.timestamp_ms >= since_ms)
            .cloned()
            .collect()
    }

    pub async fn action_count(&self) -> usize {
        self.actions.read().await.len()
    }

    /// Force both collections out to the persistence layer.
    pub async fn flush(&self) -> Result<(), MemoryError> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };

        let prefs = self.preferences.read().await.clone();
        persistence
            .save(PREFERENCES_KEY, &serde_json::to_vec(&prefs)?)
            .await?;

        let actions = self.actions.read().await.clone();
        persistence
            .save(ACTIONS_KEY, &serde_json::to_vec(&actions)?)
            .await?;

        Ok(())
    }

    async fn persist_preferences(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.preferences.read().await.clone();
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = persistence.save(PREFERENCES_KEY, &bytes).await {
                    warn!("Failed to persist preferences, continuing in memory: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize preferences: {}", e),
        }
    }

    async fn persist_actions(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.actions.read().await.clone();
        match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = persistence.save(ACTIONS_KEY, &bytes).await {
                    warn!("Failed to persist actions, continuing in memory: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize actions: {}", e),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
