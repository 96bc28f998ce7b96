//! Engine configuration: sizing, memory ceilings, and Auto-Config tuning.

pub mod engine;

pub use engine::{max_workers, EngineConfig, Strategy, WorkloadHint};
