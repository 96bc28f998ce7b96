//! The Worker Pool: a fixed-ish gang of OS threads pulling [`WorkUnit`]s off a bounded
//! channel and resolving the matching [`TaskRecord`] (spec.md §3, §4.1).
//!
//! Grounded on the teacher's `WorkerPool<P, R, E>` in `worker_pool/native.rs`: the
//! dispatch channel, the per-worker thread loop, and the shutdown-with-timeout dance
//! are all the teacher's shape. What changed: the callable is a synchronous boxed
//! closure instead of an async `TaskExecutor` trait object, so workers are plain
//! `std::thread::Builder` threads with no per-worker tokio runtime; results live on the
//! Memory Manager's task table instead of a separate `ResultStorage` map, since the
//! Memory Manager already needs to index records by id for its sweep.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::util::clock;

use super::error::{EngineError, EngineResult};
use super::memory::MemoryManager;
use super::stats::{StatsCollector, StatsSnapshot};
use super::task::TaskRecord;
use super::work_unit::{Callable, WorkUnit};

enum Job {
    Task(WorkUnit),
    Poison,
}

/// A single job's outcome, handed to whoever is observing completions (Auto-Config's
/// job history, primarily) right after the Stats Collector sees it.
#[derive(Debug, Clone, Copy)]
pub struct JobCompletion {
    /// Wall-clock duration the callable ran for, in milliseconds.
    pub duration_ms: u64,
    /// Whether the callable returned `Ok`.
    pub succeeded: bool,
}

type JobObserver = dyn Fn(JobCompletion) + Send + Sync;

/// State shared between the `WorkerPool` handle and every worker thread it owns.
pub struct PoolShared {
    memory: Arc<MemoryManager>,
    stats: Arc<StatsCollector>,
    task_id_counter: AtomicU64,
    shutdown: AtomicBool,
    job_observer: StdMutex<Option<Arc<JobObserver>>>,
}

/// A gang of worker threads draining a bounded dispatch channel.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    task_tx: StdMutex<Option<Sender<Job>>>,
    task_rx: Receiver<Job>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    worker_count: AtomicUsize,
    max_workers: usize,
}

impl WorkerPool {
    /// Build a pool and fill it with `config.worker_count` workers.
    #[must_use]
    pub fn new(config: &EngineConfig, memory: Arc<MemoryManager>, stats: Arc<StatsCollector>) -> Self {
        let (tx, rx) = bounded(config.max_queue_depth);
        let shared = Arc::new(PoolShared {
            memory,
            stats,
            task_id_counter: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
            job_observer: StdMutex::new(None),
        });

        let pool = Self {
            shared,
            task_tx: StdMutex::new(Some(tx)),
            task_rx: rx,
            workers: StdMutex::new(Vec::new()),
            worker_count: AtomicUsize::new(0),
            max_workers: crate::config::max_workers(),
        };

        for i in 0..config.worker_count {
            pool.spawn_one(i);
        }
        pool
    }

    fn spawn_one(&self, index: usize) {
        let shared = Arc::clone(&self.shared);
        let rx = self.task_rx.clone();
        let cpu = index % num_cpus::get().max(1);

        let handle = std::thread::Builder::new()
            .name(format!("tasklet-worker-{index}"))
            .spawn(move || worker_loop(&shared, &rx, cpu))
            .expect("spawning a worker thread should not fail under normal conditions");

        self.shared.stats.record_thread_spawned();
        self.workers.lock().unwrap().push(handle);
        self.worker_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current worker thread count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Relaxed)
    }

    /// Submit a callable for execution, returning its task id on success. `priority` is
    /// accepted and range-validated at the façade boundary but does not currently
    /// influence dispatch order: the channel is FIFO once a unit is enqueued.
    ///
    /// # Errors
    ///
    /// `ShutdownInProgress` if the pool is shutting down, `AdmissionDenied` if the
    /// Memory Manager refuses capacity, or `DispatchFailed` if the dispatch channel is
    /// full.
    pub fn submit(&self, callable: Callable, _priority: i32) -> EngineResult<u64> {
        if self.shared.shutdown.load(Ordering::Relaxed) {
            return Err(EngineError::ShutdownInProgress);
        }
        if !self.shared.memory.can_allocate() {
            return Err(EngineError::AdmissionDenied(
                "memory pressure or live-task cap exceeded".into(),
            ));
        }

        let task_id = self.shared.task_id_counter.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(TaskRecord::new(task_id));

        let mut unit = self.shared.memory.acquire_work_unit();
        unit.task_id = task_id;
        unit.callable = Some(callable);
        unit.enqueued_at = Some(clock::monotonic_now());

        let guard = self.task_tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            drop(guard);
            self.shared.memory.release_work_unit(unit);
            return Err(EngineError::ShutdownInProgress);
        };

        match tx.try_send(Job::Task(unit)) {
            Ok(()) => {
                drop(guard);
                self.shared.memory.register_task(task_id, record);
                self.shared.stats.record_created();
                Ok(task_id)
            }
            Err(TrySendError::Full(Job::Task(unit))) => {
                drop(guard);
                self.shared.memory.release_work_unit(unit);
                self.shared.stats.record_dispatch_failure();
                Err(EngineError::DispatchFailed("dispatch queue is full".into()))
            }
            Err(TrySendError::Disconnected(_)) | Err(TrySendError::Full(Job::Poison)) => {
                drop(guard);
                Err(EngineError::ShutdownInProgress)
            }
        }
    }

    /// Block until the task finishes, or `timeout` elapses if given. A task id unknown
    /// to the table (already released, or never existed) is treated as already
    /// finished, per spec.md §4.1's absent-record sentinel convention.
    #[must_use]
    pub fn await_task(&self, id: u64, timeout: Option<Duration>) -> bool {
        let Some(record) = self.shared.memory.get_task(id) else {
            return true;
        };
        match timeout {
            Some(d) => record.await_timeout(d),
            None => {
                record.await_blocking();
                true
            }
        }
    }

    /// The task's result bytes, or empty if unknown, unfinished, or errored.
    #[must_use]
    pub fn get_result(&self, id: u64) -> Vec<u8> {
        self.shared
            .memory
            .get_task(id)
            .map(|r| r.result())
            .unwrap_or_default()
    }

    /// The task's error string, or the "not found" sentinel if `id` is unknown to the
    /// table, or empty if it finished without an error.
    #[must_use]
    pub fn get_error(&self, id: u64) -> String {
        match self.shared.memory.get_task(id) {
            Some(record) => record.error(),
            None => "Tasklet not found.".to_string(),
        }
    }

    /// Whether the task finished with an error. `false` for unknown or in-flight ids.
    #[must_use]
    pub fn has_error(&self, id: u64) -> bool {
        self.shared
            .memory
            .get_task(id)
            .is_some_and(|r| r.has_error())
    }

    /// Whether the task has finished. Unknown ids read as finished (already released).
    #[must_use]
    pub fn is_finished(&self, id: u64) -> bool {
        self.shared.memory.get_task(id).is_none_or(|r| r.is_finished())
    }

    /// Mark a task's record eligible for reclamation by the Memory Manager's next
    /// sweep once it has finished.
    pub fn release_task(&self, id: u64) {
        self.shared.memory.mark_for_cleanup(id);
    }

    /// Register a callback invoked with each job's duration and outcome right after it
    /// finishes. Used by the Auto-Config Controller to feed its bounded job history
    /// (spec.md §2's "Auto-Config receives the job record for its history"). Replaces
    /// any previously registered observer.
    pub fn set_job_observer<F>(&self, observer: F)
    where
        F: Fn(JobCompletion) + Send + Sync + 'static,
    {
        *self.shared.job_observer.lock().unwrap() = Some(Arc::new(observer));
    }

    /// A snapshot of the pool's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot(self.worker_count())
    }

    /// Resize the pool, clamped to `[1, max_workers]`. `n == 0` clamps up to `1` rather
    /// than erroring. Growing spawns new threads; shrinking sends one poison job per
    /// retired worker so it drains in place and exits cleanly rather than abandoning
    /// whatever it was running (the resolved Open Question on worker shrink — see
    /// DESIGN.md).
    pub fn set_worker_count(&self, n: usize) -> EngineResult<()> {
        let target = n.max(1).min(self.max_workers);
        let current = self.worker_count();

        match target.cmp(&current) {
            std::cmp::Ordering::Greater => {
                for i in current..target {
                    self.spawn_one(i);
                }
            }
            std::cmp::Ordering::Less => {
                let retire = current - target;
                let guard = self.task_tx.lock().unwrap();
                if let Some(tx) = guard.as_ref() {
                    for _ in 0..retire {
                        let _ = tx.send(Job::Poison);
                    }
                }
                self.worker_count.fetch_sub(retire, Ordering::Relaxed);
            }
            std::cmp::Ordering::Equal => {}
        }
        Ok(())
    }

    /// Idempotent. Stops accepting new submissions, closes the dispatch channel, and
    /// joins workers with a bounded grace period, detaching any that are still stuck
    /// in a task — mirrors the teacher's `shutdown` (2 seconds per worker via a helper
    /// thread, so one wedged callable can't hang the whole engine down).
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.task_tx.lock().unwrap().take();

        let handles: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let (done_tx, done_rx) = std::sync::mpsc::channel();
            let thread_name = handle.thread().name().unwrap_or("worker").to_string();
            std::thread::spawn(move || {
                let _ = done_tx.send(handle.join());
            });
            if done_rx.recv_timeout(Duration::from_secs(2)).is_err() {
                warn!(worker = %thread_name, "worker did not exit within shutdown grace period; detaching");
            }
        }
        self.shared.memory.clear_all();
        info!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.task_tx.lock().unwrap().take();
    }
}

fn worker_loop(shared: &Arc<PoolShared>, rx: &Receiver<Job>, cpu: usize) {
    pin_to_cpu(cpu);

    loop {
        let job = match rx.recv() {
            Ok(job) => job,
            Err(_) => {
                debug!("dispatch channel closed; worker exiting");
                return;
            }
        };

        match job {
            Job::Poison => {
                debug!("worker retiring on poison job");
                return;
            }
            Job::Task(mut unit) => {
                let Some(callable) = unit.callable.take() else {
                    continue;
                };
                let Some(record) = shared.memory.get_task(unit.task_id) else {
                    continue;
                };

                record.mark_running();
                let start = Instant::now();
                let outcome = catch_unwind(AssertUnwindSafe(callable)).unwrap_or_else(|panic| {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "task panicked".to_string());
                    Err(message)
                });
                let duration = start.elapsed();

                let succeeded = outcome.is_ok();
                record.mark_finished(outcome);
                let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                shared.stats.record_finished(succeeded, duration_ms);

                if let Some(observer) = shared.job_observer.lock().unwrap().as_ref() {
                    observer(JobCompletion { duration_ms, succeeded });
                }

                shared.memory.release_work_unit(unit);
            }
        }
    }
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn pin_to_cpu(cpu: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        let result = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if result != 0 {
            warn!(cpu, "failed to pin worker thread to cpu; continuing unpinned");
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_cpu(_cpu: usize) {}
