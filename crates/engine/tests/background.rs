//! Engine lifecycle: background mining cadence, emergency throttling, and
//! clean shutdown with flushed stores.

use async_trait::async_trait;
use reflex_core::{
    ActionRecord, CapabilityHandler, EngineError, HandlerOutcome, Intent, PerformanceSample,
    ThrottleConfig,
};
use reflex_engine::{Engine, EngineConfig, HandlerRegistry};
use reflex_intent::{IntentClassifier, IntentEntry, IntentTable};
use reflex_memory::{FilePersistence, MemoryStore};
use reflex_patterns::{MinerConfig, PatternMiner, PatternStore};
use reflex_throttle::{PerformanceThresholds, ThrottleController};
use std::collections::HashMap;
use std::sync::Arc;

struct AlwaysOk;

#[async_trait]
impl CapabilityHandler for AlwaysOk {
    fn name(&self) -> &str {
        "generic"
    }
    fn priority(&self) -> i32 {
        0
    }
    fn can_handle(&self, _intent: &Intent) -> bool {
        true
    }
    async fn execute(&self, _intent: &Intent) -> Result<HandlerOutcome, EngineError> {
        Ok(HandlerOutcome::ok("done"))
    }
}

fn engine_parts(
    memory: Arc<MemoryStore>,
    config: EngineConfig,
) -> (Engine, Arc<ThrottleController>, Arc<PatternStore>) {
    // Thresholds far above anything a loaded test machine produces, so only
    // the samples injected by the tests can trip emergency mode
    let throttle = Arc::new(ThrottleController::with_thresholds(PerformanceThresholds {
        cpu_warning_pct: 900.0,
        cpu_critical_pct: 1_000.0,
        memory_warning_mb: 5_000_000,
        memory_critical_mb: 10_000_000,
        disk_io_warning: u64::MAX / 4,
        disk_io_critical: u64::MAX / 2,
        connections_warning: usize::MAX / 4,
        connections_critical: usize::MAX / 2,
    }));
    let pattern_store = Arc::new(PatternStore::new());
    let miner = Arc::new(PatternMiner::new(
        MinerConfig::default(),
        pattern_store.clone(),
    ));

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(AlwaysOk));

    let engine = Engine::new(config, registry, memory, throttle.clone(), miner);
    (engine, throttle, pattern_store)
}

fn action(command: &str, ts: i64) -> ActionRecord {
    ActionRecord {
        id: 0,
        command: command.to_string(),
        context: HashMap::new(),
        timestamp_ms: ts,
        success: true,
        duration_ms: 10,
    }
}

#[tokio::test]
async fn test_miner_task_finds_repeated_routine() {
    let memory = Arc::new(MemoryStore::new());

    let now = chrono::Utc::now().timestamp_millis();
    let minute = 60_000;
    for rep in 0..3 {
        let base = now - (3 - rep) * 60 * minute;
        memory.append_action(action("open chrome", base)).await;
        memory.append_action(action("search x", base + minute)).await;
        memory.append_action(action("open gmail", base + 2 * minute)).await;
    }

    let config = EngineConfig {
        miner_min_interval_ms: 10,
        miner_max_interval_ms: 1_000,
        sampler_cadence_ms: 3_600_000,
        ..EngineConfig::default()
    };
    let (engine, _throttle, pattern_store) = engine_parts(memory, config);

    engine.start().await;
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    engine.shutdown().await;

    let pattern = pattern_store
        .get_by_sequence(&[
            "open chrome".to_string(),
            "search x".to_string(),
            "open gmail".to_string(),
        ])
        .await
        .expect("miner task should have found the routine");
    assert_eq!(pattern.frequency, 3);

    let suggestions = engine.suggestions().await;
    assert!(!suggestions.is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_mining() {
    let memory = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        miner_min_interval_ms: 10,
        miner_max_interval_ms: 1_000,
        sampler_cadence_ms: 3_600_000,
        ..EngineConfig::default()
    };
    let (engine, _throttle, pattern_store) = engine_parts(memory.clone(), config);

    engine.start().await;
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    engine.shutdown().await;

    // Actions appended after shutdown are never mined
    let now = chrono::Utc::now().timestamp_millis();
    memory.append_action(action("late a", now)).await;
    memory.append_action(action("late b", now + 1)).await;
    memory.append_action(action("late a", now + 2)).await;
    memory.append_action(action("late b", now + 3)).await;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    assert!(pattern_store
        .get_by_sequence(&["late a".to_string(), "late b".to_string()])
        .await
        .is_none());
}

#[tokio::test]
async fn test_critical_memory_sample_forces_all_observers_to_max() {
    let memory = Arc::new(MemoryStore::new());
    let (engine, throttle, _patterns) = engine_parts(memory, EngineConfig::default());

    throttle
        .register(ThrottleConfig::new("clipboard", 100, 2_000, 2.0))
        .await;
    throttle
        .register(ThrottleConfig::new("window", 250, 5_000, 2.0))
        .await;
    engine.start().await;

    throttle
        .record_sample(PerformanceSample {
            cpu_pct: 5.0,
            memory_mb: 50_000_000,
            disk_io_count: 0,
            active_connections: 1,
            timestamp_ms: 0,
        })
        .await;

    assert!(throttle.emergency_active());
    assert_eq!(throttle.interval("clipboard").await.unwrap(), 2_000);
    assert_eq!(throttle.interval("window").await.unwrap(), 5_000);
    assert_eq!(throttle.interval("pattern_miner").await.unwrap(), 3_600_000);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_flushes_memory_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let persistence = Arc::new(FilePersistence::new(temp_dir.path()));
    persistence.initialize().await.unwrap();

    let memory = Arc::new(MemoryStore::with_persistence(persistence.clone()));
    let config = EngineConfig {
        sampler_cadence_ms: 3_600_000,
        ..EngineConfig::default()
    };
    let (engine, _throttle, _patterns) = engine_parts(memory, config);

    engine.start().await;
    engine
        .resolve("open chrome", HashMap::new())
        .await;
    engine.shutdown().await;

    let restored = MemoryStore::with_persistence(persistence);
    restored.restore().await.unwrap();
    assert_eq!(restored.action_count().await, 1);
}

struct CoffeeMachine;

#[async_trait]
impl CapabilityHandler for CoffeeMachine {
    fn name(&self) -> &str {
        "coffee_machine"
    }
    fn priority(&self) -> i32 {
        5
    }
    fn can_handle(&self, intent: &Intent) -> bool {
        intent.intent_type == "brew_coffee"
    }
    async fn execute(&self, _intent: &Intent) -> Result<HandlerOutcome, EngineError> {
        Ok(HandlerOutcome::ok("brewing"))
    }
}

#[tokio::test]
async fn test_custom_intent_table_routes_through_engine() {
    let memory = Arc::new(MemoryStore::new());
    let throttle = Arc::new(ThrottleController::new());
    let pattern_store = Arc::new(PatternStore::new());
    let miner = Arc::new(PatternMiner::new(MinerConfig::default(), pattern_store));

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(CoffeeMachine));

    let config = EngineConfig::default();
    let table = IntentTable::empty().with_entry(IntentEntry::new(
        "brew_coffee",
        &["brew", "coffee"],
        &[],
        &[],
    ));
    let classifier =
        IntentClassifier::new(table).with_fuzzy_threshold(config.fuzzy_threshold);
    let engine =
        Engine::with_classifier(config, classifier, registry, memory, throttle, miner);

    let outcome = engine.resolve("brew a double espresso", HashMap::new()).await;
    assert!(outcome.success);
    assert_eq!(outcome.handler_used.as_deref(), Some("coffee_machine"));
    // Confident tier-1 match on the custom entry, so no generic fallback
    assert!(!outcome.fallback_used);
}

#[tokio::test]
async fn test_engine_resolve_round_trip() {
    let memory = Arc::new(MemoryStore::new());
    let (engine, _throttle, _patterns) = engine_parts(memory, EngineConfig::default());

    let outcome = engine
        .resolve("remind me to stretch", HashMap::new())
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.handler_used.as_deref(), Some("generic"));
}
