//! The Memory Manager: admission control, the Task Record table, and the Work Unit
//! free list (spec.md §3, §4.3).
//!
//! Grounded on the teacher's `ResourcePool::can_start` capacity gate for the admission
//! check, and on an `other_examples/` `sysinfo`-based memory probe for the system
//! pressure reading. Simplification versus the spec's literal "set of live Task ids":
//! this manager holds the task table itself (id -> `Arc<TaskRecord>`) rather than a
//! bare id set plus a separate table elsewhere, since the table's length already *is*
//! the live-id set and a second copy would just be another thing to keep in sync.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::System;
use tracing::{debug, warn};

use super::task::TaskRecord;
use super::work_unit::WorkUnit;

/// Tunables the Memory Manager needs out of [`crate::config::EngineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Admission is refused once system memory usage exceeds this percent.
    pub max_memory_percent: f64,
    /// Admission is refused once the task table holds this many live records.
    pub max_live_tasks: usize,
    /// Work Unit free list: units pre-populated at construction.
    pub free_list_initial: usize,
    /// Work Unit free list: hard cap; units are destroyed past this on release.
    pub free_list_max: usize,
    /// How often the background sweep runs.
    pub cleanup_interval: Duration,
}

/// Admission control, the shared task table, and the Work Unit free list.
pub struct MemoryManager {
    config: MemoryConfig,
    tasks: Mutex<HashMap<u64, Arc<TaskRecord>>>,
    free_list: Mutex<Vec<WorkUnit>>,
    system: Mutex<System>,
    max_memory_bytes: AtomicU64,
    cleanup_interval_ms: AtomicU64,
    sweep_generation: AtomicU64,
}

impl MemoryManager {
    /// Build a manager with an empty task table, its free list pre-populated with
    /// `config.free_list_initial` idle units.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        let cleanup_interval_ms = u64::try_from(config.cleanup_interval.as_millis()).unwrap_or(u64::MAX);
        let initial = config.free_list_initial.min(config.free_list_max);
        let free_list = (0..initial).map(|_| WorkUnit::empty()).collect();
        Self {
            config,
            tasks: Mutex::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            system: Mutex::new(System::new()),
            max_memory_bytes: AtomicU64::new(0),
            cleanup_interval_ms: AtomicU64::new(cleanup_interval_ms),
            sweep_generation: AtomicU64::new(0),
        }
    }

    /// Change how often the background sweep runs. Takes effect on the sweeper's next
    /// wake-up, without restarting the thread.
    pub fn set_cleanup_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.cleanup_interval_ms.store(ms, Ordering::Relaxed);
    }

    /// Whether a new task may be admitted right now: neither the live-task cap nor the
    /// system memory ceiling is exceeded. Spec.md §4.3: both checks are advisory and
    /// racy by nature — a task admitted a microsecond before a limit is crossed is not
    /// retroactively rejected.
    #[must_use]
    pub fn can_allocate(&self) -> bool {
        if self.live_task_count() >= self.config.max_live_tasks {
            return false;
        }
        self.memory_usage_percent() <= self.config.max_memory_percent
    }

    /// Current system memory usage as a percent of total, refreshed on each call.
    /// Returns `50.0` (deliberately neutral — neither admits nor blocks on its own) if
    /// the platform cannot report total memory.
    #[must_use]
    pub fn memory_usage_percent(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 50.0;
        }
        (system.used_memory() as f64 / total as f64) * 100.0
    }

    /// Number of task records currently in the table, finished-but-unreleased ones
    /// included — matches the spec's framing that memory isn't reclaimed until a
    /// record is both finished and explicitly released.
    #[must_use]
    pub fn live_task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Insert a newly admitted task's record into the shared table.
    pub fn register_task(&self, id: u64, record: Arc<TaskRecord>) {
        self.tasks.lock().insert(id, record);
    }

    /// Look up a task's record by id.
    #[must_use]
    pub fn get_task(&self, id: u64) -> Option<Arc<TaskRecord>> {
        self.tasks.lock().get(&id).cloned()
    }

    /// Signal that a task's record may be reclaimed by the next sweep once it has
    /// finished. A caller that never calls this is opting in to keeping the record
    /// around (and re-retrievable) indefinitely, save for pool shutdown.
    pub fn mark_for_cleanup(&self, id: u64) {
        if let Some(record) = self.tasks.lock().get(&id) {
            record.mark_released();
        }
    }

    /// Remove every `Finished` record that has also been marked released. Returns the
    /// number removed. Safe to call directly in tests without a background thread.
    pub fn sweep(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, record| !(record.is_finished() && record.is_released()));
        let removed = before - tasks.len();
        if removed > 0 {
            debug!(removed, "memory manager swept finished task records");
        }
        removed
    }

    /// Drain every record regardless of state — used on pool shutdown.
    pub fn clear_all(&self) {
        self.tasks.lock().clear();
    }

    /// Take an idle [`WorkUnit`] off the free list, or build a fresh one if empty.
    #[must_use]
    pub fn acquire_work_unit(&self) -> WorkUnit {
        self.free_list.lock().pop().unwrap_or_default()
    }

    /// Return a finished unit to the free list, resetting it first. Dropped instead if
    /// the free list is already at its cap.
    pub fn release_work_unit(&self, mut unit: WorkUnit) {
        unit.reset();
        let mut free_list = self.free_list.lock();
        if free_list.len() < self.config.free_list_max {
            free_list.push(unit);
        }
    }

    /// Override the process-wide memory ceiling used by `get_max_memory_limit`. This is
    /// informational bookkeeping for a host that wants to record its own ceiling
    /// alongside the engine's percent-based check; `can_allocate` itself only consults
    /// `max_memory_percent`.
    pub fn set_max_memory_limit(&self, bytes: u64) {
        self.max_memory_bytes.store(bytes, Ordering::Relaxed);
    }

    /// The ceiling set by `set_max_memory_limit`, or `0` if never set.
    #[must_use]
    pub fn get_max_memory_limit(&self) -> u64 {
        self.max_memory_bytes.load(Ordering::Relaxed)
    }

    /// The configured memory-percent ceiling `can_allocate` checks against.
    #[must_use]
    pub const fn configured_max_memory_percent(&self) -> f64 {
        self.config.max_memory_percent
    }

    /// Spawn the background sweep thread. Returns a handle plus a stop flag the caller
    /// signals to stop it; mirrors the teacher's `start_load_monitor` sampling-thread
    /// shape.
    pub fn start_sweeper(self: &Arc<Self>) -> SweepHandle {
        let stop = Arc::new(StdMutex::new(false));
        let manager = Arc::clone(self);
        let stop_flag = Arc::clone(&stop);
        let generation = self.sweep_generation.fetch_add(1, Ordering::Relaxed) + 1;

        let thread = std::thread::Builder::new()
            .name(format!("memory-sweep-{generation}"))
            .spawn(move || loop {
                let interval_ms = manager.cleanup_interval_ms.load(Ordering::Relaxed);
                std::thread::sleep(Duration::from_millis(interval_ms));
                if *stop_flag.lock().unwrap() {
                    return;
                }
                manager.sweep();
            })
            .ok();

        if thread.is_none() {
            warn!("failed to spawn memory sweep thread; periodic cleanup disabled");
        }

        SweepHandle { stop, thread }
    }
}

/// Controls the lifetime of the background sweep thread started by
/// [`MemoryManager::start_sweeper`].
pub struct SweepHandle {
    stop: Arc<StdMutex<bool>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SweepHandle {
    /// Signal the sweep thread to exit after its current sleep, and join it.
    pub fn stop(self) {
        *self.stop.lock().unwrap() = true;
        if let Some(thread) = self.thread {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MemoryConfig {
        MemoryConfig {
            max_memory_percent: 95.0,
            max_live_tasks: 2,
            free_list_initial: 0,
            free_list_max: 4,
            cleanup_interval: Duration::from_secs(30),
        }
    }

    #[test]
    fn admits_until_live_task_cap() {
        let manager = MemoryManager::new(config());
        assert!(manager.can_allocate());
        manager.register_task(1, Arc::new(TaskRecord::new(1)));
        assert!(manager.can_allocate());
        manager.register_task(2, Arc::new(TaskRecord::new(2)));
        assert!(!manager.can_allocate());
    }

    #[test]
    fn sweep_removes_only_finished_and_released() {
        let manager = MemoryManager::new(config());
        let still_running = Arc::new(TaskRecord::new(1));
        let finished_unreleased = Arc::new(TaskRecord::new(2));
        finished_unreleased.mark_running();
        finished_unreleased.mark_finished(Ok(vec![]));
        let finished_released = Arc::new(TaskRecord::new(3));
        finished_released.mark_running();
        finished_released.mark_finished(Ok(vec![]));
        finished_released.mark_released();

        manager.register_task(1, still_running);
        manager.register_task(2, finished_unreleased);
        manager.register_task(3, finished_released);

        let removed = manager.sweep();
        assert_eq!(removed, 1);
        assert_eq!(manager.live_task_count(), 2);
        assert!(manager.get_task(3).is_none());
    }

    #[test]
    fn free_list_initial_prepopulates() {
        let manager = MemoryManager::new(MemoryConfig { free_list_initial: 3, ..config() });
        assert_eq!(manager.free_list.lock().len(), 3);
        let unit = manager.acquire_work_unit();
        assert!(unit.callable.is_none());
    }

    #[test]
    fn free_list_initial_above_max_is_clamped() {
        let manager = MemoryManager::new(MemoryConfig { free_list_initial: 10, ..config() });
        assert_eq!(manager.free_list.lock().len(), 4);
    }

    #[test]
    fn free_list_recycles_up_to_cap() {
        let manager = MemoryManager::new(config());
        for _ in 0..6 {
            manager.release_work_unit(WorkUnit::empty());
        }
        assert_eq!(manager.free_list.lock().len(), 4);
        let unit = manager.acquire_work_unit();
        assert!(unit.callable.is_none());
    }

    #[test]
    fn max_memory_limit_round_trips() {
        let manager = MemoryManager::new(config());
        assert_eq!(manager.get_max_memory_limit(), 0);
        manager.set_max_memory_limit(1 << 30);
        assert_eq!(manager.get_max_memory_limit(), 1 << 30);
    }
}
