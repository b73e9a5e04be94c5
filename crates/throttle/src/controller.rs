use reflex_core::{PerformanceSample, ThrottleConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const MAX_SAMPLES: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("Unknown observer: {0}")]
    UnknownObserver(String),
}

#[derive(Debug, Clone)]
pub enum ThrottleEvent {
    EmergencyEntered { reason: String },
    EmergencyExited,
}

/// Two-tier thresholds. Crossing any critical line enters emergency mode;
/// emergency mode only exits once every metric is back below its warning
/// line. The gap between the tiers is the hysteresis band.
#[derive(Debug, Clone)]
pub struct PerformanceThresholds {
    pub cpu_warning_pct: f32,
    pub cpu_critical_pct: f32,
    pub memory_warning_mb: u64,
    pub memory_critical_mb: u64,
    /// Disk thresholds are byte volume per sampling window, matching what
    /// the sampler reports.
    pub disk_io_warning: u64,
    pub disk_io_critical: u64,
    pub connections_warning: usize,
    pub connections_critical: usize,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            cpu_warning_pct: 70.0,
            cpu_critical_pct: 90.0,
            memory_warning_mb: 2_048,
            memory_critical_mb: 4_096,
            disk_io_warning: 256 * 1024 * 1024,
            disk_io_critical: 1024 * 1024 * 1024,
            connections_warning: 500,
            connections_critical: 1_000,
        }
    }
}

impl PerformanceThresholds {
    fn critical_breach(&self, sample: &PerformanceSample) -> Option<String> {
        if sample.cpu_pct >= self.cpu_critical_pct {
            return Some(format!("cpu {:.1}% >= {:.1}%", sample.cpu_pct, self.cpu_critical_pct));
        }
        if sample.memory_mb >= self.memory_critical_mb {
            return Some(format!(
                "memory {}MB >= {}MB",
                sample.memory_mb, self.memory_critical_mb
            ));
        }
        if sample.disk_io_count >= self.disk_io_critical {
            return Some(format!(
                "disk io {} >= {}",
                sample.disk_io_count, self.disk_io_critical
            ));
        }
        if sample.active_connections >= self.connections_critical {
            return Some(format!(
                "connections {} >= {}",
                sample.active_connections, self.connections_critical
            ));
        }
        None
    }

    fn above_warning(&self, sample: &PerformanceSample) -> bool {
        sample.cpu_pct >= self.cpu_warning_pct
            || sample.memory_mb >= self.memory_warning_mb
            || sample.disk_io_count >= self.disk_io_warning
            || sample.active_connections >= self.connections_warning
    }
}

/// Owns every background observer's polling interval. Injectable instance,
/// no module-level state; the same handle is shared by the observers, the
/// pattern miner, and the sampling task.
pub struct ThrottleController {
    configs: RwLock<HashMap<String, ThrottleConfig>>,
    samples: RwLock<VecDeque<PerformanceSample>>,
    emergency: AtomicBool,
    thresholds: PerformanceThresholds,
    events: broadcast::Sender<ThrottleEvent>,
}

impl ThrottleController {
    pub fn new() -> Self {
        Self::with_thresholds(PerformanceThresholds::default())
    }

    pub fn with_thresholds(thresholds: PerformanceThresholds) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            configs: RwLock::new(HashMap::new()),
            samples: RwLock::new(VecDeque::new()),
            emergency: AtomicBool::new(false),
            thresholds,
            events,
        }
    }

    pub async fn register(&self, mut config: ThrottleConfig) {
        config.clamp_current();
        debug!(observer = %config.name, "registered throttle config");
        self.configs.write().await.insert(config.name.clone(), config);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThrottleEvent> {
        self.events.subscribe()
    }

    pub fn emergency_active(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    /// Effective polling interval for an observer. Always the configured max
    /// while emergency mode is on, regardless of the stored current value.
    pub async fn interval(&self, name: &str) -> Result<u64, ThrottleError> {
        let configs = self.configs.read().await;
        let config = configs
            .get(name)
            .ok_or_else(|| ThrottleError::UnknownObserver(name.to_string()))?;
        if self.emergency_active() {
            Ok(config.max_interval_ms)
        } else {
            Ok(config.current_interval_ms)
        }
    }

    /// Back off: the observer saw nothing actionable.
    pub async fn increase(&self, name: &str) -> Result<u64, ThrottleError> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(name)
            .ok_or_else(|| ThrottleError::UnknownObserver(name.to_string()))?;
        let widened = (config.current_interval_ms as f64 * config.backoff_multiplier).round() as u64;
        config.current_interval_ms = widened.clamp(config.min_interval_ms, config.max_interval_ms);
        Ok(config.current_interval_ms)
    }

    /// Tighten: the observer saw meaningful activity. No-op while emergency
    /// mode is on.
    pub async fn decrease(&self, name: &str) -> Result<u64, ThrottleError> {
        let mut configs = self.configs.write().await;
        let config = configs
            .get_mut(name)
            .ok_or_else(|| ThrottleError::UnknownObserver(name.to_string()))?;
        if !self.emergency_active() {
            let tightened =
                (config.current_interval_ms as f64 / config.backoff_multiplier).round() as u64;
            config.current_interval_ms =
                tightened.clamp(config.min_interval_ms, config.max_interval_ms);
        }
        Ok(config.current_interval_ms)
    }

    /// Feed one performance sample and run the emergency-mode transition
    /// check. Samples arrive on a fixed cadence independent of per-observer
    /// throttles.
    pub async fn record_sample(&self, sample: PerformanceSample) {
        {
            let mut samples = self.samples.write().await;
            samples.push_back(sample);
            while samples.len() > MAX_SAMPLES {
                samples.pop_front();
            }
        }

        let breach = self.thresholds.critical_breach(&sample);
        let in_emergency = self.emergency_active();

        if let Some(reason) = breach {
            if !in_emergency {
                self.enter_emergency(reason).await;
            }
        } else if in_emergency && !self.thresholds.above_warning(&sample) {
            self.exit_emergency().await;
        }
    }

    pub async fn config(&self, name: &str) -> Option<ThrottleConfig> {
        self.configs.read().await.get(name).cloned()
    }

    pub async fn sample_count(&self) -> usize {
        self.samples.read().await.len()
    }

    async fn enter_emergency(&self, reason: String) {
        warn!("Entering emergency mode: {}", reason);
        {
            let mut configs = self.configs.write().await;
            for config in configs.values_mut() {
                config.current_interval_ms = config.max_interval_ms;
            }
        }
        self.emergency.store(true, Ordering::SeqCst);
        let _ = self.events.send(ThrottleEvent::EmergencyEntered { reason });
    }

    /// Exit halves intervals toward min instead of resetting to min, so a
    /// still-warm system does not immediately flap back in.
    async fn exit_emergency(&self) {
        info!("Exiting emergency mode");
        {
            let mut configs = self.configs.write().await;
            for config in configs.values_mut() {
                let halved = config.current_interval_ms / 2;
                config.current_interval_ms =
                    halved.clamp(config.min_interval_ms, config.max_interval_ms);
            }
        }
        self.emergency.store(false, Ordering::SeqCst);
        let _ = self.events.send(ThrottleEvent::EmergencyExited);
    }
}

impl Default for ThrottleController {
    fn default() -> Self {
        Self::new()
    }
}
