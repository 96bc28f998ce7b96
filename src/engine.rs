//! The `Engine`: the single explicit value a host binding constructs and holds for the
//! lifetime of the process (spec.md §9's "replace singletons with an explicit value
//! constructed at boundary-entry" design note).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::autoconfig::{AdjustmentInfo, AutoConfigController, MetricsRecord, Recommendations};
use crate::config::{max_workers, EngineConfig, Strategy, WorkloadHint};
use crate::core::memory::SweepHandle;
use crate::core::{Callable, EngineError, EngineResult, MemoryConfig, MemoryManager, StatsCollector, StatsSnapshot, WorkerPool};
use crate::logger::{self, LogLevel};
use crate::multiproc::Multiprocessor;

/// A point-in-time view of the Memory Manager, surfaced through `memory_stats` (spec.md
/// §6).
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    /// Task records currently in the table (finished-but-unreleased included).
    pub live_tasks: usize,
    /// Current system memory usage, percent.
    pub memory_usage_percent: f64,
    /// The process-wide ceiling set via `set_max_memory_limit`, or `0` if never set.
    pub max_memory_limit_bytes: u64,
}

/// Static facts about the hosting machine and the engine's limits, surfaced through
/// `system_info` (spec.md §6).
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    /// `num_cpus::get()`.
    pub hardware_concurrency: usize,
    /// `min(hardware_concurrency * 4, 512)`.
    pub max_workers: usize,
}

/// Options accepted by `configure` (spec.md §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigureOptions {
    /// New worker count, if given.
    pub workers: Option<usize>,
    /// New default timeout, seconds, if given.
    pub timeout_secs: Option<u64>,
    /// New log level, if given.
    pub logging: Option<LogLevel>,
    /// New memory ceiling, bytes, if given.
    pub max_memory_bytes: Option<u64>,
}

/// The task execution engine: a Worker Pool, its Memory Manager, and an Auto-Config
/// Controller tuning them from observed metrics.
pub struct Engine {
    pool: Arc<WorkerPool>,
    memory: Arc<MemoryManager>,
    autoconfig: Arc<AutoConfigController>,
    #[allow(dead_code)]
    multiproc: Arc<Multiprocessor>,
    sweeper: std::sync::Mutex<Option<SweepHandle>>,
    default_timeout_secs: AtomicU64,
}

impl Engine {
    /// Validate `config`, build every component, and start the background sweep and
    /// Auto-Config threads (the latter only if `config.autoconfig_enabled`).
    ///
    /// # Errors
    ///
    /// Returns `ArgumentInvalid` if `config` fails validation.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::ArgumentInvalid)?;

        let memory = Arc::new(MemoryManager::new(MemoryConfig {
            max_memory_percent: config.max_memory_percent,
            max_live_tasks: config.max_live_tasks,
            free_list_initial: config.free_list_initial,
            free_list_max: config.free_list_max,
            cleanup_interval: Duration::from_millis(config.cleanup_interval_ms),
        }));
        let stats = Arc::new(StatsCollector::default());
        let pool = Arc::new(WorkerPool::new(&config, Arc::clone(&memory), stats));
        let multiproc = Arc::new(Multiprocessor::new());

        let autoconfig = AutoConfigController::new(
            Arc::clone(&pool),
            Arc::clone(&memory),
            Arc::clone(&multiproc),
            Duration::from_millis(config.autoconfig_interval_ms),
            config.autoconfig_job_trigger,
            config.default_timeout_secs,
            config.autoconfig_strategy,
            config.workload_hint,
            config.autoconfig_enabled,
        );
        autoconfig.start();

        let sweeper = memory.start_sweeper();

        info!(workers = config.worker_count, "engine started");

        Ok(Self {
            pool,
            memory,
            autoconfig,
            multiproc,
            sweeper: std::sync::Mutex::new(Some(sweeper)),
            default_timeout_secs: AtomicU64::new(config.default_timeout_secs),
        })
    }

    /// Submit a callable with no priority bias.
    ///
    /// # Errors
    ///
    /// See [`Self::submit_with_priority`].
    pub fn submit(&self, callable: Callable) -> EngineResult<u64> {
        self.submit_with_priority(callable, 0)
    }

    /// Submit a callable with an explicit priority. `priority` is range-validated by
    /// the façade but is not currently consulted by the dispatch channel, which is
    /// FIFO; accepted for forward compatibility with priority-aware scheduling.
    ///
    /// # Errors
    ///
    /// `ShutdownInProgress`, `AdmissionDenied`, or `DispatchFailed`.
    pub fn submit_with_priority(&self, callable: Callable, priority: i32) -> EngineResult<u64> {
        self.pool.submit(callable, priority)
    }

    /// Block until the task finishes, or `timeout` elapses if given.
    #[must_use]
    pub fn await_task(&self, id: u64, timeout: Option<Duration>) -> bool {
        self.pool.await_task(id, timeout)
    }

    /// Await every id in turn; returns `true` only if every task finished within its
    /// individual `timeout`.
    #[must_use]
    pub fn await_all(&self, ids: &[u64], timeout: Option<Duration>) -> bool {
        ids.iter().all(|&id| self.pool.await_task(id, timeout))
    }

    /// Result bytes for `id`, or empty if unknown, unfinished, or errored.
    #[must_use]
    pub fn get_result(&self, id: u64) -> Vec<u8> {
        self.pool.get_result(id)
    }

    /// Error string for `id`, or the `"Tasklet not found."` sentinel if unknown.
    #[must_use]
    pub fn get_error(&self, id: u64) -> String {
        self.pool.get_error(id)
    }

    /// Whether `id` finished with an error.
    #[must_use]
    pub fn has_error(&self, id: u64) -> bool {
        self.pool.has_error(id)
    }

    /// Whether `id` has finished (unknown ids read as finished).
    #[must_use]
    pub fn is_finished(&self, id: u64) -> bool {
        self.pool.is_finished(id)
    }

    /// Mark `id`'s record eligible for reclamation by the next Memory Manager sweep.
    pub fn release_task(&self, id: u64) {
        self.pool.release_task(id);
    }

    /// A snapshot of the Stats Collector.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.pool.stats()
    }

    /// A snapshot of the Memory Manager.
    #[must_use]
    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            live_tasks: self.memory.live_task_count(),
            memory_usage_percent: self.memory.memory_usage_percent(),
            max_memory_limit_bytes: self.memory.get_max_memory_limit(),
        }
    }

    /// Static facts about the hosting machine and this engine's limits.
    #[must_use]
    pub fn system_info(&self) -> SystemInfo {
        SystemInfo { hardware_concurrency: num_cpus::get(), max_workers: max_workers() }
    }

    /// Apply a batch of configuration changes at once. A given worker count is clamped
    /// into `[1, max_workers]` the same way `set_worker_count` clamps it.
    pub fn configure(&self, options: ConfigureOptions) -> EngineResult<()> {
        if let Some(workers) = options.workers {
            self.set_worker_count(workers)?;
        }
        if let Some(timeout) = options.timeout_secs {
            self.default_timeout_secs.store(timeout, Ordering::Relaxed);
        }
        if let Some(level) = options.logging {
            self.set_log_level(level);
        }
        if let Some(bytes) = options.max_memory_bytes {
            self.set_max_memory_limit(bytes);
        }
        Ok(())
    }

    /// Resize the worker pool. `n` is clamped into `[1, max_workers]`, so `0` becomes `1`
    /// rather than failing.
    pub fn set_worker_count(&self, n: usize) -> EngineResult<()> {
        self.pool.set_worker_count(n)
    }

    /// Change the engine's global log level.
    pub fn set_log_level(&self, level: LogLevel) {
        logger::set_log_level(level);
    }

    /// Override the process-wide memory ceiling used informationally alongside
    /// `can_allocate`'s percent-based check.
    pub fn set_max_memory_limit(&self, bytes: u64) {
        self.memory.set_max_memory_limit(bytes);
    }

    /// Change how often the Memory Manager's background sweep runs.
    pub fn set_cleanup_interval(&self, ms: u64) {
        self.memory.set_cleanup_interval(Duration::from_millis(ms));
    }

    /// Enable Auto-Config's automatic ticking.
    pub fn enable_autoconfig(&self) {
        self.autoconfig.enable();
    }

    /// Disable Auto-Config's automatic ticking (`force_analysis` still works).
    pub fn disable_autoconfig(&self) {
        self.autoconfig.disable();
    }

    /// Change Auto-Config's delta-magnitude strategy.
    pub fn set_strategy(&self, strategy: Strategy) {
        self.autoconfig.set_strategy(strategy);
    }

    /// Seed Auto-Config with a workload hint.
    pub fn set_workload_type(&self, hint: WorkloadHint) {
        self.autoconfig.set_workload_type(hint);
    }

    /// Run one Auto-Config analysis tick synchronously, regardless of the timer.
    pub fn force_analysis(&self) {
        self.autoconfig.force_analysis();
    }

    /// All retained Auto-Config metrics records, oldest first, capped at 100.
    #[must_use]
    pub fn metrics_history(&self) -> Vec<MetricsRecord> {
        self.autoconfig.metrics_history()
    }

    /// Auto-Config's latest recommendation set.
    #[must_use]
    pub fn recommendations(&self) -> Recommendations {
        self.autoconfig.recommendations()
    }

    /// The most recent adjustment Auto-Config actually applied, if any.
    #[must_use]
    pub fn last_adjustment(&self) -> Option<AdjustmentInfo> {
        self.autoconfig.last_adjustment()
    }

    /// Register a callback invoked with every Auto-Config recommendation record.
    /// Panics inside the callback are caught and logged, never propagated.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Recommendations) + Send + Sync + 'static,
    {
        self.autoconfig.register_callback(callback);
    }

    /// Refuse new submissions, stop the background threads, and tear down workers.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.autoconfig.stop();
        if let Some(sweeper) = self.sweeper.lock().unwrap().take() {
            sweeper.stop();
        }
        self.pool.shutdown();
        info!("engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
