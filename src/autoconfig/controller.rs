//! The Auto-Config Controller: periodic metrics collection, classification, and
//! recommendation application (spec.md §4.4).
//!
//! The periodic tick runs on a dedicated sleeping thread, following the pack's
//! `AdaptiveThreadPool::start_load_monitor` shape rather than an async task, so this
//! controller carries no tokio dependency of its own.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sysinfo::System;
use tracing::{debug, warn};

use crate::config::{Strategy, WorkloadHint};
use crate::core::{JobCompletion, MemoryManager, WorkerPool};
use crate::multiproc::Multiprocessor;

use super::metrics::{
    classify_workload, estimate_complexity, now_timestamp_ms, JobHistory, MetricsHistory, MetricsRecord,
};
use super::recommend::{self, RecommendInputs, Recommendations};

/// A change the controller actually applied, logged with reason and impact.
#[derive(Debug, Clone)]
pub struct AdjustmentInfo {
    /// Why the change was made.
    pub reason: String,
    /// Human-readable description of what changed.
    pub changes_made: String,
    /// The confidence behind the decision, carried through as "performance impact".
    pub performance_impact: f64,
    /// Wall-clock milliseconds since the Unix epoch when the change was applied.
    pub timestamp_ms: u128,
}

type Callback = dyn Fn(&Recommendations) + Send + Sync;

struct TickState {
    last_instant: Instant,
    last_completed: u64,
    last_throughput: Option<f64>,
}

/// Periodically retunes a [`WorkerPool`] from observed metrics.
pub struct AutoConfigController {
    pool: Arc<WorkerPool>,
    memory: Arc<MemoryManager>,
    multiproc: Arc<Multiprocessor>,

    enabled: AtomicBool,
    strategy: StdMutex<Strategy>,
    workload_hint: StdMutex<WorkloadHint>,
    interval: Duration,
    job_trigger: u64,
    current_timeout_secs: AtomicU64,

    history: RwLock<MetricsHistory>,
    recommendations: RwLock<Recommendations>,
    adjustment: RwLock<Option<AdjustmentInfo>>,

    job_history: StdMutex<JobHistory>,
    jobs_since_tick: AtomicU64,
    tick_state: StdMutex<TickState>,
    callbacks: StdMutex<Vec<Arc<Callback>>>,

    stop: Arc<StdMutex<bool>>,
    thread: StdMutex<Option<std::thread::JoinHandle<()>>>,
}

fn neutral_recommendations() -> Recommendations {
    recommend::compute(&RecommendInputs {
        record: &MetricsRecord {
            timestamp_ms: 0,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            worker_count: 1,
            worker_utilization: 0.0,
            throughput_per_sec: 0.0,
            mean_exec_ms: 0.0,
            success_rate: 1.0,
            pattern: super::metrics::WorkloadPattern::Steady,
            complexity: super::metrics::Complexity::Trivial,
        },
        current_workers: 1,
        max_workers: 1,
        current_timeout_secs: 30,
        queue_depth: 0,
        current_memory_percent: 95.0,
        recent_failure_rate: 0.0,
        strategy: Strategy::Moderate,
    })
}

impl AutoConfigController {
    /// Build a controller and wire it to the pool's job-completion observer. Does not
    /// start the background thread; call `start` for that.
    #[must_use]
    pub fn new(
        pool: Arc<WorkerPool>,
        memory: Arc<MemoryManager>,
        multiproc: Arc<Multiprocessor>,
        interval: Duration,
        job_trigger: u64,
        default_timeout_secs: u64,
        strategy: Strategy,
        workload_hint: WorkloadHint,
        enabled: bool,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            pool: Arc::clone(&pool),
            memory,
            multiproc,
            enabled: AtomicBool::new(enabled),
            strategy: StdMutex::new(strategy),
            workload_hint: StdMutex::new(workload_hint),
            interval,
            job_trigger,
            current_timeout_secs: AtomicU64::new(default_timeout_secs),
            history: RwLock::new(MetricsHistory::new()),
            recommendations: RwLock::new(neutral_recommendations()),
            adjustment: RwLock::new(None),
            job_history: StdMutex::new(JobHistory::new()),
            jobs_since_tick: AtomicU64::new(0),
            tick_state: StdMutex::new(TickState { last_instant: Instant::now(), last_completed: 0, last_throughput: None }),
            callbacks: StdMutex::new(Vec::new()),
            stop: Arc::new(StdMutex::new(false)),
            thread: StdMutex::new(None),
        });

        let observer_target = Arc::clone(&controller);
        pool.set_job_observer(move |completion: JobCompletion| {
            observer_target.job_history.lock().unwrap().push(completion.duration_ms);
            observer_target.jobs_since_tick.fetch_add(1, Ordering::Relaxed);
        });

        controller
    }

    /// Start the background timer thread. No-op if already running.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.thread.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let controller = Arc::clone(self);
        let stop = Arc::clone(&self.stop);
        let poll_interval = Duration::from_millis(100).min(self.interval);

        *guard = std::thread::Builder::new()
            .name("autoconfig-tick".to_string())
            .spawn(move || {
                let mut elapsed = Duration::ZERO;
                loop {
                    std::thread::sleep(poll_interval);
                    if *stop.lock().unwrap() {
                        return;
                    }
                    elapsed += poll_interval;
                    let jobs = controller.jobs_since_tick.load(Ordering::Relaxed);
                    if elapsed >= controller.interval || jobs >= controller.job_trigger {
                        elapsed = Duration::ZERO;
                        controller.jobs_since_tick.store(0, Ordering::Relaxed);
                        if controller.enabled.load(Ordering::Relaxed) {
                            controller.tick();
                        }
                    }
                }
            })
            .ok();
    }

    /// Stop the background thread, if running.
    pub fn stop(&self) {
        *self.stop.lock().unwrap() = true;
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Run one analysis tick synchronously, regardless of the timer.
    pub fn force_analysis(&self) {
        self.tick();
    }

    fn tick(&self) {
        enum Probe {
            System { cpu: f64, memory: f64 },
            Pool { worker_count: usize, active: u64, completed: u64, failed: u64 },
            Timing { mean_ms: f64 },
        }

        let stats = self.pool.stats();
        let job_mean = self.job_history.lock().unwrap().mean_ms();

        let closures: Vec<Box<dyn FnOnce() -> Probe + Send>> = vec![
            Box::new({
                let mut system = System::new();
                move || {
                    system.refresh_cpu_usage();
                    system.refresh_memory();
                    let cpu = system.global_cpu_usage() as f64;
                    let total = system.total_memory();
                    let memory_pct = if total == 0 {
                        50.0
                    } else {
                        (system.used_memory() as f64 / total as f64) * 100.0
                    };
                    Probe::System { cpu, memory: memory_pct }
                }
            }),
            Box::new(move || Probe::Pool {
                worker_count: stats.worker_count,
                active: stats.active,
                completed: stats.completed,
                failed: stats.failed,
            }),
            Box::new(move || Probe::Timing { mean_ms: job_mean }),
        ];

        let results = self.multiproc.execute_parallel(closures);

        let mut cpu_percent = 0.0;
        let mut memory_percent = self.memory.memory_usage_percent();
        let mut worker_count = self.pool.worker_count();
        let mut active = 0u64;
        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut mean_exec_ms = 0.0;

        for result in results {
            match result {
                Probe::System { cpu, memory } => {
                    cpu_percent = cpu;
                    memory_percent = memory;
                }
                Probe::Pool { worker_count: w, active: a, completed: c, failed: f } => {
                    worker_count = w;
                    active = a;
                    completed = c;
                    failed = f;
                }
                Probe::Timing { mean_ms } => mean_exec_ms = mean_ms,
            }
        }

        let worker_utilization = if worker_count == 0 { 0.0 } else { active as f64 / worker_count as f64 };
        let success_rate = if completed + failed == 0 { 1.0 } else { completed as f64 / (completed + failed) as f64 };

        let (throughput_per_sec, throughput_ratio) = {
            let mut state = self.tick_state.lock().unwrap();
            let elapsed_secs = state.last_instant.elapsed().as_secs_f64().max(0.001);
            let delta_completed = completed.saturating_sub(state.last_completed);
            let throughput = delta_completed as f64 / elapsed_secs;
            let ratio = match state.last_throughput {
                Some(prev) if prev > 0.0 => throughput / prev,
                _ => 1.0,
            };
            state.last_instant = Instant::now();
            state.last_completed = completed;
            state.last_throughput = Some(throughput);
            (throughput, ratio)
        };

        let pattern = classify_workload(cpu_percent, memory_percent, mean_exec_ms, throughput_ratio);
        let complexity = estimate_complexity(mean_exec_ms);

        let record = MetricsRecord {
            timestamp_ms: now_timestamp_ms(),
            cpu_percent,
            memory_percent,
            worker_count,
            worker_utilization,
            throughput_per_sec,
            mean_exec_ms,
            success_rate,
            pattern,
            complexity,
        };

        self.history.write().push(record);

        let recent_failure_rate = 1.0 - success_rate;
        let strategy = *self.strategy.lock().unwrap();
        let recommendations = recommend::compute(&RecommendInputs {
            record: &record,
            current_workers: worker_count,
            max_workers: crate::config::max_workers(),
            current_timeout_secs: self.current_timeout_secs.load(Ordering::Relaxed),
            queue_depth: active as usize,
            current_memory_percent: self.memory.configured_max_memory_percent(),
            recent_failure_rate,
            strategy,
        });

        *self.recommendations.write() = recommendations;

        if recommendations.worker.should_scale_up || recommendations.worker.should_scale_down {
            if self.pool.set_worker_count(recommendations.worker.recommended).is_ok() {
                let reason = if recommendations.worker.should_scale_up {
                    format!("worker utilization {:.0}% exceeded scale-up threshold", worker_utilization * 100.0)
                } else {
                    format!("worker utilization {:.0}% fell below scale-down threshold", worker_utilization * 100.0)
                };
                *self.adjustment.write() = Some(AdjustmentInfo {
                    reason,
                    changes_made: format!("worker_count: {worker_count} -> {}", recommendations.worker.recommended),
                    performance_impact: recommendations.worker.confidence,
                    timestamp_ms: now_timestamp_ms(),
                });
            }
        }

        if recommendations.timeout.should_adjust {
            self.current_timeout_secs.store(recommendations.timeout.recommended_secs, Ordering::Relaxed);
        }

        self.run_callbacks(&recommendations);
        debug!(?pattern, ?complexity, "autoconfig tick complete");
    }

    fn run_callbacks(&self, recommendations: &Recommendations) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(recommendations))).is_err() {
                warn!("autoconfig callback panicked; ignoring");
            }
        }
    }

    /// Enable automatic ticking (the background thread still only acts when enabled).
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable automatic ticking. `force_analysis` still works while disabled.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Whether automatic ticking is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Change the delta-magnitude strategy.
    pub fn set_strategy(&self, strategy: Strategy) {
        *self.strategy.lock().unwrap() = strategy;
    }

    /// Seed the controller with a workload hint, informational only until metrics
    /// accumulate (the classifier never reads this value directly).
    pub fn set_workload_type(&self, hint: WorkloadHint) {
        *self.workload_hint.lock().unwrap() = hint;
    }

    /// All retained metrics records, oldest first, capped at 100.
    #[must_use]
    pub fn metrics_history(&self) -> Vec<MetricsRecord> {
        self.history.read().records()
    }

    /// The latest computed recommendations.
    #[must_use]
    pub fn recommendations(&self) -> Recommendations {
        *self.recommendations.read()
    }

    /// The most recent applied adjustment, if any has been made yet.
    #[must_use]
    pub fn last_adjustment(&self) -> Option<AdjustmentInfo> {
        self.adjustment.read().clone()
    }

    /// Register a callback invoked with the full recommendation record after each
    /// analysis tick. Panics inside the callback are caught and logged, never
    /// propagated.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Recommendations) + Send + Sync + 'static,
    {
        self.callbacks.lock().unwrap().push(Arc::new(callback));
    }
}

impl Drop for AutoConfigController {
    fn drop(&mut self) {
        *self.stop.lock().unwrap() = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::memory::MemoryConfig;

    fn build() -> (Arc<WorkerPool>, Arc<MemoryManager>, Arc<Multiprocessor>) {
        let config = EngineConfig { worker_count: 2, ..EngineConfig::default() };
        let memory = Arc::new(MemoryManager::new(MemoryConfig {
            max_memory_percent: 95.0,
            max_live_tasks: 1000,
            free_list_initial: 0,
            free_list_max: 256,
            cleanup_interval: Duration::from_secs(30),
        }));
        let stats = Arc::new(crate::core::StatsCollector::default());
        let pool = Arc::new(WorkerPool::new(&config, Arc::clone(&memory), stats));
        (pool, memory, Arc::new(Multiprocessor::new()))
    }

    #[test]
    fn force_analysis_populates_history_and_recommendations() {
        let (pool, memory, multiproc) = build();
        let controller = AutoConfigController::new(
            Arc::clone(&pool),
            memory,
            multiproc,
            Duration::from_secs(5),
            50,
            30,
            Strategy::Moderate,
            WorkloadHint::Balanced,
            true,
        );

        controller.force_analysis();
        assert_eq!(controller.metrics_history().len(), 1);
        let recs = controller.recommendations();
        assert!((0.0..=1.0).contains(&recs.worker.confidence));
        pool.shutdown();
    }

    #[test]
    fn callback_panic_does_not_propagate() {
        let (pool, memory, multiproc) = build();
        let controller = AutoConfigController::new(
            Arc::clone(&pool),
            memory,
            multiproc,
            Duration::from_secs(5),
            50,
            30,
            Strategy::Moderate,
            WorkloadHint::Balanced,
            true,
        );
        controller.register_callback(|_| panic!("observer exploded"));
        controller.force_analysis();
        pool.shutdown();
    }

    #[test]
    fn disable_then_enable_round_trips() {
        let (pool, memory, multiproc) = build();
        let controller = AutoConfigController::new(
            pool, memory, multiproc, Duration::from_secs(5), 50, 30, Strategy::Moderate, WorkloadHint::Balanced, true,
        );
        assert!(controller.is_enabled());
        controller.disable();
        assert!(!controller.is_enabled());
        controller.enable();
        assert!(controller.is_enabled());
    }
}
