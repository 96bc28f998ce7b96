//! The Task Record: the one piece of state an engine and all its awaiters share for a
//! single submitted task (spec.md §3, §4.1). Grounded on the teacher's
//! `ResultStorage`/`ResultEntry` pair in `worker_pool/native.rs`, collapsed from a
//! registry-of-entries into a single record with its own mutex and condvar, since this
//! engine indexes records by task id through the Memory Manager rather than through a
//! separate results map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Where a task is in its one-shot lifecycle. Transitions are `Pending -> Running ->
/// Finished` only; there is no going back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Accepted onto the dispatch channel, not yet picked up by a worker.
    Pending,
    /// A worker has started the callable.
    Running,
    /// The callable returned or panicked; `result`/`error` below holds the outcome.
    Finished,
}

#[derive(Debug)]
struct TaskInner {
    state: TaskState,
    result: Option<Vec<u8>>,
    error: Option<String>,
}

/// Shared, mutex-guarded state for one task, plus the condvar awaiters block on.
///
/// Jointly owned by the Memory Manager's task table and by every outstanding awaiter
/// holding an `Arc<TaskRecord>` clone — the record outlives any individual caller.
#[derive(Debug)]
pub struct TaskRecord {
    id: u64,
    inner: Mutex<TaskInner>,
    cond: Condvar,
    released: AtomicBool,
}

impl TaskRecord {
    /// A fresh record in the `Pending` state.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            inner: Mutex::new(TaskInner {
                state: TaskState::Pending,
                result: None,
                error: None,
            }),
            cond: Condvar::new(),
            released: AtomicBool::new(false),
        }
    }

    /// The task id this record belongs to.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Transition `Pending -> Running`. Called once by the worker that picks this task
    /// up off the dispatch channel.
    pub fn mark_running(&self) {
        let mut inner = self.inner.lock();
        debug_assert_eq!(inner.state, TaskState::Pending, "double start on task {}", self.id);
        inner.state = TaskState::Running;
    }

    /// Transition `Running -> Finished`, storing the outcome and waking every awaiter.
    /// Called once by the worker after the callable returns or panics.
    pub fn mark_finished(&self, outcome: Result<Vec<u8>, String>) {
        let mut inner = self.inner.lock();
        debug_assert_eq!(inner.state, TaskState::Running, "double finish on task {}", self.id);
        match outcome {
            Ok(bytes) => inner.result = Some(bytes),
            Err(message) => inner.error = Some(message),
        }
        inner.state = TaskState::Finished;
        drop(inner);
        self.cond.notify_all();
    }

    /// Block the calling thread until the task reaches `Finished`.
    pub fn await_blocking(&self) {
        let mut inner = self.inner.lock();
        while inner.state != TaskState::Finished {
            self.cond.wait(&mut inner);
        }
    }

    /// Block up to `timeout`, returning whether the task had finished by then.
    #[must_use]
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == TaskState::Finished {
            return true;
        }
        let result = self.cond.wait_for(&mut inner, timeout);
        !result.timed_out() || inner.state == TaskState::Finished
    }

    /// Whether the task has reached `Finished`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.lock().state == TaskState::Finished
    }

    /// Whether a finished task ended in an error. `false` for tasks still in flight.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.inner.lock().error.is_some()
    }

    /// The task's result bytes, or an empty vector if it hasn't finished, or finished
    /// with an error (spec.md §4.1 unknown/absent-result sentinel).
    #[must_use]
    pub fn result(&self) -> Vec<u8> {
        self.inner.lock().result.clone().unwrap_or_default()
    }

    /// The task's error string, or empty if it hasn't finished, or finished without
    /// one.
    #[must_use]
    pub fn error(&self) -> String {
        self.inner.lock().error.clone().unwrap_or_default()
    }

    /// Mark this record as released by its owning table, eligible for the Memory
    /// Manager's next sweep once finished. Idempotent.
    pub fn mark_released(&self) {
        self.released.store(true, Ordering::Relaxed);
    }

    /// Whether `mark_released` has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fresh_record_is_pending_and_unfinished() {
        let record = TaskRecord::new(1);
        assert!(!record.is_finished());
        assert!(!record.has_error());
        assert!(record.result().is_empty());
    }

    #[test]
    fn finishes_with_result() {
        let record = TaskRecord::new(1);
        record.mark_running();
        record.mark_finished(Ok(vec![1, 2, 3]));
        assert!(record.is_finished());
        assert!(!record.has_error());
        assert_eq!(record.result(), vec![1, 2, 3]);
    }

    #[test]
    fn finishes_with_error() {
        let record = TaskRecord::new(1);
        record.mark_running();
        record.mark_finished(Err("boom".into()));
        assert!(record.is_finished());
        assert!(record.has_error());
        assert_eq!(record.error(), "boom");
        assert!(record.result().is_empty());
    }

    #[test]
    fn await_blocking_wakes_on_finish() {
        let record = Arc::new(TaskRecord::new(1));
        let worker = {
            let record = Arc::clone(&record);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                record.mark_running();
                record.mark_finished(Ok(vec![9]));
            })
        };
        record.await_blocking();
        worker.join().unwrap();
        assert_eq!(record.result(), vec![9]);
    }

    #[test]
    fn await_timeout_reports_unfinished() {
        let record = TaskRecord::new(1);
        assert!(!record.await_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn release_flag_is_observable() {
        let record = TaskRecord::new(1);
        assert!(!record.is_released());
        record.mark_released();
        assert!(record.is_released());
    }
}
