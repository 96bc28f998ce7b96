//! # tasklet-engine
//!
//! A self-tuning task execution engine: a bounded worker pool with admission control,
//! a memory-aware task table, a rayon-backed fan-out utility for CPU-bound batch work,
//! and an Auto-Config controller that samples system and throughput metrics to
//! recommend (and, for worker count, apply) runtime adjustments.
//!
//! ## Core Problem Solved
//!
//! Long-running host processes that submit a stream of heterogeneous tasklets need more
//! than a bare thread pool:
//!
//! - **Admission control**: reject new work before memory pressure turns into an OOM.
//! - **Observability without polling**: callers block on a condvar per task rather than
//!   spin-polling a status field.
//! - **Self-tuning**: worker count, timeouts, and batching should track the observed
//!   workload instead of a number picked once at startup.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use tasklet_engine::config::EngineConfig;
//! use tasklet_engine::engine::Engine;
//! use tasklet_engine::facade;
//!
//! let engine = Engine::new(EngineConfig::default()).expect("valid config");
//! let outcome = facade::submit(&engine, Box::new(|| Ok(b"done".to_vec())), None).await_outcome();
//! assert!(outcome.success);
//! engine.shutdown();
//! ```
//!
//! For complete examples, see the integration tests under `tests/`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling primitives: Task Record, Work Unit, Worker Pool, Stats Collector,
/// Memory Manager.
pub mod core;
/// Engine configuration models.
pub mod config;
/// The top-level `Engine` tying every subsystem together.
pub mod engine;
/// The host-facing façade: task/batch handles, retry, and progress helpers.
pub mod facade;
/// Structured logging setup.
pub mod logger;
/// Rayon-backed parallel fan-out utility for CPU-bound batch work.
pub mod multiproc;
/// Periodic metrics collection, workload classification, and self-tuning.
pub mod autoconfig;
/// Shared utilities.
pub mod util;
