//! The Work Unit: the thing that actually travels across the dispatch channel
//! (spec.md §3, §4.2). Grounded on the teacher's `WorkerTask<P>`, with the mailbox-key
//! routing dropped — this engine routes by task id through the Memory Manager's task
//! table instead of a separate mailbox.

use std::panic::UnwindSafe;
use std::time::Instant;

/// The user's unit of work: a one-shot closure producing raw bytes on success or a
/// string describing the failure. `UnwindSafe` so a worker can `catch_unwind` around
/// the call without the compiler objecting to interior mutability it can't see into.
pub type Callable = Box<dyn FnOnce() -> Result<Vec<u8>, String> + Send + UnwindSafe>;

/// A scheduled unit of work in flight between submission and execution.
pub struct WorkUnit {
    /// Identifies which [`crate::core::task::TaskRecord`] this unit will resolve.
    pub task_id: u64,
    /// The closure to run. `None` only in a unit pulled fresh off the free list before
    /// a submission populates it.
    pub callable: Option<Callable>,
    /// When `submit` accepted this unit onto the dispatch channel.
    pub enqueued_at: Option<Instant>,
}

impl WorkUnit {
    /// A unit with no callable yet, ready to be recycled by the Memory Manager's
    /// free list or filled in by a fresh submission.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            task_id: 0,
            callable: None,
            enqueued_at: None,
        }
    }

    /// Reset a recycled unit back to its pristine state, dropping any stale callable.
    pub fn reset(&mut self) {
        self.task_id = 0;
        self.callable = None;
        self.enqueued_at = None;
    }
}

impl Default for WorkUnit {
    fn default() -> Self {
        Self::empty()
    }
}
