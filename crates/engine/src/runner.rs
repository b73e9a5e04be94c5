use crate::config::EngineConfig;
use crate::orchestrator::Orchestrator;
use crate::registry::HandlerRegistry;
use reflex_core::{PatternSuggestion, ResolveOutcome, ThrottleConfig};
use reflex_intent::{IntentClassifier, IntentTable};
use reflex_memory::MemoryStore;
use reflex_patterns::PatternMiner;
use reflex_throttle::{PerformanceSampler, ThrottleController};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MINER_THROTTLE_NAME: &str = "pattern_miner";

/// Engine assembly: one orchestrator plus the periodic background tasks
/// (performance sampling, pattern mining). The host constructs it with its
/// own handler registry and persistence wiring, calls `start`, resolves
/// requests, and calls `shutdown` to stop all timers cleanly.
pub struct Engine {
    orchestrator: Orchestrator,
    memory: Arc<MemoryStore>,
    throttle: Arc<ThrottleController>,
    miner: Arc<PatternMiner>,
    config: EngineConfig,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build with the default intent table. Hosts with their own intent
    /// vocabulary assemble a classifier and go through
    /// [`Engine::with_classifier`].
    pub fn new(
        config: EngineConfig,
        registry: HandlerRegistry,
        memory: Arc<MemoryStore>,
        throttle: Arc<ThrottleController>,
        miner: Arc<PatternMiner>,
    ) -> Self {
        let classifier = IntentClassifier::new(IntentTable::default())
            .with_fuzzy_threshold(config.fuzzy_threshold);
        Self::with_classifier(config, classifier, registry, memory, throttle, miner)
    }

    pub fn with_classifier(
        config: EngineConfig,
        classifier: IntentClassifier,
        registry: HandlerRegistry,
        memory: Arc<MemoryStore>,
        throttle: Arc<ThrottleController>,
        miner: Arc<PatternMiner>,
    ) -> Self {
        let orchestrator =
            Orchestrator::new(classifier, registry, memory.clone(), config.clone());
        Self {
            orchestrator,
            memory,
            throttle,
            miner,
            config,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn throttle(&self) -> &Arc<ThrottleController> {
        &self.throttle
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub async fn resolve(
        &self,
        text: &str,
        context: HashMap<String, String>,
    ) -> ResolveOutcome {
        self.orchestrator.resolve(text, context).await
    }

    pub async fn suggestions(&self) -> Vec<PatternSuggestion> {
        self.miner.suggestions().await
    }

    /// Spawn the periodic tasks. Idempotent wiring is the host's concern;
    /// calling `start` twice spawns duplicate timers.
    pub async fn start(&self) {
        self.throttle
            .register(ThrottleConfig::new(
                MINER_THROTTLE_NAME,
                self.config.miner_min_interval_ms,
                self.config.miner_max_interval_ms,
                self.config.miner_backoff_multiplier,
            ))
            .await;

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_sampler());
        tasks.push(self.spawn_miner());
        info!("Engine background tasks started");
    }

    /// Abort every periodic task and flush the stores. Persistence writes
    /// are atomic at the record level, so an abort mid-cycle cannot leave a
    /// torn file behind.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.memory.flush().await {
            warn!("Flush on shutdown failed: {}", e);
        }
        info!("Engine stopped");
    }

    fn spawn_sampler(&self) -> JoinHandle<()> {
        let throttle = self.throttle.clone();
        let cadence_ms = self.config.sampler_cadence_ms;

        tokio::spawn(async move {
            let mut sampler = PerformanceSampler::new();
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_millis(cadence_ms.max(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let sample = sampler.sample();
                throttle.record_sample(sample).await;
            }
        })
    }

    fn spawn_miner(&self) -> JoinHandle<()> {
        let throttle = self.throttle.clone();
        let memory = self.memory.clone();
        let miner = self.miner.clone();
        let max_interval_ms = self.config.miner_max_interval_ms;

        tokio::spawn(async move {
            loop {
                // Re-read the interval each cycle so throttle adjustments and
                // emergency mode take effect on the next sleep
                let interval_ms = throttle
                    .interval(MINER_THROTTLE_NAME)
                    .await
                    .unwrap_or(max_interval_ms);
                tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms.max(1))).await;

                let now_ms = chrono::Utc::now().timestamp_millis();
                let since_ms = now_ms - miner.config().window_ms;
                let actions = memory.actions_since(since_ms).await;
                let found = miner.run_scan(&actions, now_ms).await;

                // A scan that learned something earns a tighter cadence;
                // unchanged windows back the cadence off
                let result = if found > 0 {
                    throttle.decrease(MINER_THROTTLE_NAME).await
                } else {
                    throttle.increase(MINER_THROTTLE_NAME).await
                };
                if let Err(e) = result {
                    debug!("Miner throttle adjustment skipped: {}", e);
                }
            }
        })
    }
}
