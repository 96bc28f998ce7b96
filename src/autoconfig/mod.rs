//! Auto-Config Controller: periodic metrics collection, workload classification, and
//! self-tuning recommendations applied to the Worker Pool (spec.md §4.4).

pub mod controller;
pub mod metrics;
pub mod recommend;

pub use controller::{AdjustmentInfo, AutoConfigController};
pub use metrics::{Complexity, JobHistory, MetricsHistory, MetricsRecord, WorkloadPattern};
pub use recommend::{
    BatchingRecommendation, MemoryCapRecommendation, PriorityBiasRecommendation, Recommendations,
    TimeoutRecommendation, WorkerRecommendation,
};
