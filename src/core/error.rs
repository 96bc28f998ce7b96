//! Error taxonomy for the engine.
//!
//! Every variant here is one of the six error kinds spec'd for the engine: argument
//! errors, admission denial, dispatch failure, task failure, callback failure, and
//! shutdown-in-progress. Host bindings are expected to map these symbolically rather than
//! by numeric code (the core never assigns one).

use thiserror::Error;

/// Errors produced by the engine's public surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A caller supplied a malformed or out-of-range argument. No core state is touched
    /// before this is returned.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// The Memory Manager refused admission for a new task.
    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    /// The platform refused to enqueue the task onto a worker.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// The user callable panicked or returned an error; captured as a string on the
    /// task record. The pool and other tasks are unaffected.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A registered `Auto-Config` callback panicked or returned an error. Logged at WARN
    /// and swallowed; surfaced here only for tests that want to assert it happened.
    #[error("callback failed: {0}")]
    CallbackFailed(String),

    /// The engine is shutting down; no new submissions are accepted.
    #[error("shutdown in progress")]
    ShutdownInProgress,
}

/// Convenience alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
