//! Engine configuration: worker pool sizing, memory ceilings, and Auto-Config tuning.

use serde::{Deserialize, Serialize};

/// Hard ceiling on worker count, independent of configuration: `hardware_concurrency * 4`
/// clamped to 512 (spec.md §4.1).
#[must_use]
pub fn max_workers() -> usize {
    (num_cpus::get().saturating_mul(4)).min(512).max(1)
}

/// Auto-Config's scale multiplier on recommended deltas (spec.md §4.4 Step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Half-magnitude deltas.
    Conservative,
    /// Deltas as computed.
    Moderate,
    /// Double-magnitude deltas.
    Aggressive,
}

impl Strategy {
    /// The scalar multiplier this strategy applies to recommendation magnitudes.
    #[must_use]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Conservative => 0.5,
            Self::Moderate => 1.0,
            Self::Aggressive => 2.0,
        }
    }
}

/// A coarse workload hint a caller can set to bias Auto-Config before it has collected
/// enough history of its own (spec.md §6 `set_workload_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadHint {
    /// Expect CPU-bound tasks.
    CpuBound,
    /// Expect IO-bound tasks.
    IoBound,
    /// Expect memory-bound tasks.
    MemoryBound,
    /// No hint; rely entirely on observed metrics.
    Balanced,
}

/// Validated configuration for an [`crate::Engine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Initial worker thread count. Defaults to `hardware_concurrency` (or 4 if that
    /// cannot be determined), per spec.md §4.1.
    pub worker_count: usize,
    /// Maximum queued tasks before `submit` fails with `DispatchFailed`.
    pub max_queue_depth: usize,
    /// Default per-task timeout used by the façade's await-with-deadline helpers.
    pub default_timeout_secs: u64,
    /// System memory usage percent above which admission is refused (spec.md §4.3).
    pub max_memory_percent: f64,
    /// Live-task count above which admission is refused, independent of memory.
    pub max_live_tasks: usize,
    /// How often the Memory Manager sweeps released, finished records (milliseconds).
    pub cleanup_interval_ms: u64,
    /// Work Unit free-list: units retained when idle.
    pub free_list_initial: usize,
    /// Work Unit free-list: hard cap; units are destroyed past this on release.
    pub free_list_max: usize,
    /// Auto-Config tick interval (milliseconds).
    pub autoconfig_interval_ms: u64,
    /// Auto-Config also runs after this many job completions, independent of the timer.
    pub autoconfig_job_trigger: u64,
    /// Whether Auto-Config is enabled at startup.
    pub autoconfig_enabled: bool,
    /// Auto-Config's delta-magnitude strategy.
    pub autoconfig_strategy: Strategy,
    /// Optional workload hint seeding Auto-Config before history accumulates.
    pub workload_hint: WorkloadHint,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(4),
            max_queue_depth: 10_000,
            default_timeout_secs: 30,
            max_memory_percent: 95.0,
            max_live_tasks: 100_000,
            cleanup_interval_ms: 30_000,
            free_list_initial: 64,
            free_list_max: 4096,
            autoconfig_interval_ms: 5_000,
            autoconfig_job_trigger: 50,
            autoconfig_enabled: true,
            autoconfig_strategy: Strategy::Moderate,
            workload_hint: WorkloadHint::Balanced,
        }
    }
}

impl EngineConfig {
    /// Validate configuration values, returning a description of the first problem found.
    ///
    /// # Errors
    ///
    /// Returns `Err` describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.worker_count > max_workers() {
            return Err(format!(
                "worker_count {} exceeds max_workers {}",
                self.worker_count,
                max_workers()
            ));
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.default_timeout_secs == 0 {
            return Err("default_timeout_secs must be greater than 0".into());
        }
        if !(0.0..=100.0).contains(&self.max_memory_percent) {
            return Err("max_memory_percent must be within [0, 100]".into());
        }
        if self.max_live_tasks == 0 {
            return Err("max_live_tasks must be greater than 0".into());
        }
        if self.cleanup_interval_ms == 0 {
            return Err("cleanup_interval_ms must be greater than 0".into());
        }
        if self.free_list_initial > self.free_list_max {
            return Err("free_list_initial must not exceed free_list_max".into());
        }
        if self.autoconfig_interval_ms == 0 {
            return Err("autoconfig_interval_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the JSON cannot be parsed as `EngineConfig` or fails validation.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_worker_count() {
        let mut cfg = EngineConfig::default();
        cfg.worker_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_worker_count_above_max() {
        let mut cfg = EngineConfig::default();
        cfg.worker_count = max_workers() + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_memory_percent() {
        let mut cfg = EngineConfig::default();
        cfg.max_memory_percent = 150.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_free_list_initial_above_max() {
        let mut cfg = EngineConfig::default();
        cfg.free_list_initial = cfg.free_list_max + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_json_round_trip() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed = EngineConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.worker_count, cfg.worker_count);
    }

    #[test]
    fn strategy_multipliers() {
        assert!((Strategy::Conservative.multiplier() - 0.5).abs() < f64::EPSILON);
        assert!((Strategy::Moderate.multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((Strategy::Aggressive.multiplier() - 2.0).abs() < f64::EPSILON);
    }
}
