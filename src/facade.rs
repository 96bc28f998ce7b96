//! The Façade: the boundary a host binding talks to (spec.md §4.6, §6).
//!
//! Grounded on the teacher's `runtime::api` request/response shapes, generalized away
//! from mailbox routing: `TaskOutcome`/`BatchOutcome` are the same "resolve to a plain
//! struct" idea, and retry/progress helpers operate on `&Engine` as free functions
//! rather than pool methods, keeping the core ignorant of host-level policy.

use std::time::Duration;

use crate::core::{Callable, EngineError, EngineResult};
use crate::engine::Engine;

/// The outcome of one task, in the shape a host binding hands back to its caller.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Whether the task finished without an error.
    pub success: bool,
    /// Result bytes; empty if the task errored or hasn't finished.
    pub data: Vec<u8>,
    /// Error string; empty if the task succeeded.
    pub error: String,
    /// The task's id.
    pub task_id: u64,
}

/// The outcome of a batch submission, in the shape a host binding hands back.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Every task id in submission order.
    pub task_ids: Vec<u64>,
    /// Result bytes per task, empty for any that errored.
    pub results: Vec<Vec<u8>>,
    /// Error strings per task, empty for any that succeeded.
    pub errors: Vec<String>,
    /// Total tasks in the batch.
    pub count: u32,
    /// Tasks that succeeded.
    pub success_count: u32,
    /// Tasks that errored.
    pub error_count: u32,
}

/// A handle to one in-flight or finished task, returned by [`submit`].
pub struct TaskHandle<'a> {
    engine: &'a Engine,
    task_id: EngineResult<u64>,
}

impl<'a> TaskHandle<'a> {
    /// Block until the task finishes (or admission/dispatch already failed), then
    /// return its outcome.
    #[must_use]
    pub fn await_outcome(self) -> TaskOutcome {
        match self.task_id {
            Ok(id) => {
                let _ = self.engine.await_task(id, None);
                TaskOutcome {
                    success: !self.engine.has_error(id),
                    data: self.engine.get_result(id),
                    error: self.engine.get_error(id),
                    task_id: id,
                }
            }
            Err(err) => TaskOutcome { success: false, data: Vec::new(), error: err.to_string(), task_id: 0 },
        }
    }

    /// Async form of `await_outcome`, using `spawn_blocking` so the condvar wait never
    /// blocks a tokio worker thread — mirrors the teacher's `retrieve_async`.
    #[cfg(feature = "tokio-runtime")]
    pub async fn await_outcome_async(self) -> TaskOutcome
    where
        'a: 'static,
    {
        let Ok(id) = self.task_id else {
            let err = self.task_id.unwrap_err();
            return TaskOutcome { success: false, data: Vec::new(), error: err.to_string(), task_id: 0 };
        };
        let engine = self.engine;
        let id = tokio::task::spawn_blocking(move || {
            let _ = engine.await_task(id, None);
            id
        })
        .await
        .unwrap_or(id);
        TaskOutcome {
            success: !self.engine.has_error(id),
            data: self.engine.get_result(id),
            error: self.engine.get_error(id),
            task_id: id,
        }
    }
}

/// A handle to a batch of in-flight or finished tasks, returned by [`submit_many`].
pub struct BatchHandle<'a> {
    engine: &'a Engine,
    task_ids: Vec<EngineResult<u64>>,
}

impl<'a> BatchHandle<'a> {
    /// Block until every admitted task finishes, then assemble the batch outcome.
    /// Tasks rejected at submission time count as failures with their rejection
    /// message as the error.
    #[must_use]
    pub fn await_outcome(self) -> BatchOutcome {
        let count = self.task_ids.len();
        let mut task_ids = Vec::with_capacity(count);
        let mut results = Vec::with_capacity(count);
        let mut errors = Vec::with_capacity(count);
        let mut success_count = 0u32;
        let mut error_count = 0u32;

        for outcome in self.task_ids {
            match outcome {
                Ok(id) => {
                    let _ = self.engine.await_task(id, None);
                    task_ids.push(id);
                    if self.engine.has_error(id) {
                        error_count += 1;
                        results.push(Vec::new());
                        errors.push(self.engine.get_error(id));
                    } else {
                        success_count += 1;
                        results.push(self.engine.get_result(id));
                        errors.push(String::new());
                    }
                }
                Err(err) => {
                    task_ids.push(0);
                    error_count += 1;
                    results.push(Vec::new());
                    errors.push(err.to_string());
                }
            }
        }

        BatchOutcome {
            task_ids,
            results,
            errors,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            success_count,
            error_count,
        }
    }
}

/// Validate and submit one task, returning a handle that resolves to its outcome.
/// Rejects immediately, before any core state is touched, if `priority` is out of the
/// `[-10, 10]` range the Auto-Config priority bias also uses.
pub fn submit(engine: &Engine, callable: Callable, priority: Option<i32>) -> TaskHandle<'_> {
    let priority = priority.unwrap_or(0);
    let task_id = if !(-10..=10).contains(&priority) {
        Err(EngineError::ArgumentInvalid(format!("priority {priority} out of range [-10, 10]")))
    } else {
        engine.submit_with_priority(callable, priority)
    };
    TaskHandle { engine, task_id }
}

/// Validate and submit a batch of tasks, returning a handle that resolves to the
/// aggregate outcome. Partial acceptance is allowed: a callable that fails admission
/// does not stop the rest of the batch from being submitted.
pub fn submit_many(engine: &Engine, callables: Vec<Callable>) -> BatchHandle<'_> {
    let task_ids = callables.into_iter().map(|c| engine.submit_with_priority(c, 0)).collect();
    BatchHandle { engine, task_ids }
}

/// Retry-with-exponential-backoff: re-invoke `factory` (which builds a fresh callable
/// each attempt, since a `Callable` is one-shot) up to `attempts` times, doubling
/// `base_delay` after each failed attempt. Returns the first successful outcome, or the
/// last failing one if every attempt is exhausted.
pub fn submit_with_retry<F>(engine: &Engine, mut factory: F, attempts: u32, base_delay: Duration) -> TaskOutcome
where
    F: FnMut() -> Callable,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut last = TaskOutcome {
        success: false,
        data: Vec::new(),
        error: "no attempts made".to_string(),
        task_id: 0,
    };

    for attempt in 0..attempts {
        let outcome = submit(engine, factory(), None).await_outcome();
        if outcome.success {
            return outcome;
        }
        last = outcome;
        if attempt + 1 < attempts {
            std::thread::sleep(delay);
            delay *= 2;
        }
    }
    last
}

/// Submit a batch and invoke `on_progress(index, &TaskOutcome)` as each task finishes,
/// in submission order (not completion order — the spec only requires a callback per
/// completion, and in-order reporting is simpler for a host UI to consume).
pub fn submit_with_progress<F>(engine: &Engine, callables: Vec<Callable>, mut on_progress: F) -> BatchOutcome
where
    F: FnMut(usize, &TaskOutcome),
{
    let handle = submit_many(engine, callables);
    let count = handle.task_ids.len();
    let mut task_ids = Vec::with_capacity(count);
    let mut results = Vec::with_capacity(count);
    let mut errors = Vec::with_capacity(count);
    let mut success_count = 0u32;
    let mut error_count = 0u32;

    for (index, outcome) in handle.task_ids.into_iter().enumerate() {
        let task_outcome = match outcome {
            Ok(id) => {
                let _ = engine.await_task(id, None);
                if engine.has_error(id) {
                    TaskOutcome { success: false, data: Vec::new(), error: engine.get_error(id), task_id: id }
                } else {
                    TaskOutcome { success: true, data: engine.get_result(id), error: String::new(), task_id: id }
                }
            }
            Err(err) => TaskOutcome { success: false, data: Vec::new(), error: err.to_string(), task_id: 0 },
        };

        if task_outcome.success {
            success_count += 1;
        } else {
            error_count += 1;
        }
        task_ids.push(task_outcome.task_id);
        results.push(task_outcome.data.clone());
        errors.push(task_outcome.error.clone());

        on_progress(index, &task_outcome);
    }

    BatchOutcome {
        task_ids,
        results,
        errors,
        count: u32::try_from(count).unwrap_or(u32::MAX),
        success_count,
        error_count,
    }
}
