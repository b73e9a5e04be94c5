use reflex_core::PerformanceSample;
use sysinfo::System;

/// Collects the resource snapshots fed into the throttle controller. One
/// instance is owned by the engine's sampling task; `sample` refreshes the
/// underlying system handle in place so CPU deltas are meaningful.
pub struct PerformanceSampler {
    system: System,
}

impl PerformanceSampler {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }

    pub fn sample(&mut self) -> PerformanceSample {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_processes();

        let cpu_pct = self.system.global_cpu_info().cpu_usage();
        let memory_mb = self.system.used_memory() / 1024 / 1024;

        // Bytes moved since last refresh, summed over all processes. The
        // controller's default disk thresholds are sized for this byte volume.
        let disk_io_count: u64 = self
            .system
            .processes()
            .values()
            .map(|p| {
                let usage = p.disk_usage();
                usage.read_bytes + usage.written_bytes
            })
            .sum();

        let active_connections = self.system.processes().len();

        PerformanceSample {
            cpu_pct,
            memory_mb,
            disk_io_count,
            active_connections,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl Default for PerformanceSampler {
    fn default() -> Self {
        Self::new()
    }
}
