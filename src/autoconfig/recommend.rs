//! Recommendation computation for the Auto-Config Controller (spec.md §3, §4.4 Step 4).
//!
//! Kept as a data-driven set of small pure functions rather than one branchy method,
//! per the teacher pack's `AdaptiveThreadPool` recommendation shape and spec.md §9's
//! explicit design note to keep this policy table-driven.

use super::metrics::{MetricsRecord, WorkloadPattern};
use crate::config::Strategy;

/// Recommended change to worker count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerRecommendation {
    /// The recommended worker count, already clamped to `[1, max_workers]`.
    pub recommended: usize,
    /// Whether the controller believes workers should increase.
    pub should_scale_up: bool,
    /// Whether the controller believes workers should decrease.
    pub should_scale_down: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Recommended change to the per-task timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutRecommendation {
    /// Recommended timeout in seconds.
    pub recommended_secs: u64,
    /// Whether the change is large enough to be worth applying.
    pub should_adjust: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Recommended priority bias to apply to newly submitted work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityBiasRecommendation {
    /// Bias value, clamped to `[-10, 10]`.
    pub value: i32,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Recommended batching policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchingRecommendation {
    /// Recommended batch size.
    pub size: usize,
    /// Whether batching is recommended at all.
    pub should_batch: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Recommended change to the memory usage ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryCapRecommendation {
    /// Recommended ceiling, as a percent of total system memory.
    pub percent: f64,
    /// Whether the change is worth applying.
    pub should_adjust: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// The full set of recommendations produced by one analysis tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendations {
    /// Worker count recommendation.
    pub worker: WorkerRecommendation,
    /// Timeout recommendation.
    pub timeout: TimeoutRecommendation,
    /// Priority bias recommendation.
    pub priority_bias: PriorityBiasRecommendation,
    /// Batching recommendation.
    pub batching: BatchingRecommendation,
    /// Memory cap recommendation.
    pub memory_cap: MemoryCapRecommendation,
}

/// Inputs to recommendation computation that aren't already on [`MetricsRecord`].
#[derive(Debug, Clone, Copy)]
pub struct RecommendInputs<'a> {
    /// The tick's combined metrics record.
    pub record: &'a MetricsRecord,
    /// Current worker count.
    pub current_workers: usize,
    /// Hard ceiling on worker count.
    pub max_workers: usize,
    /// Current per-task timeout, seconds.
    pub current_timeout_secs: u64,
    /// Current queue depth.
    pub queue_depth: usize,
    /// Current memory ceiling, percent.
    pub current_memory_percent: f64,
    /// Recent failure rate in `[0, 1]`.
    pub recent_failure_rate: f64,
    /// The delta-magnitude strategy in effect.
    pub strategy: Strategy,
}

fn worker_recommendation(inputs: &RecommendInputs<'_>) -> WorkerRecommendation {
    let m = inputs.strategy.multiplier();
    let workers = inputs.current_workers as i64;
    let max = inputs.max_workers as i64;
    let utilization = inputs.record.worker_utilization;

    if utilization > 0.90 && workers < max {
        let mut raw = 1i64;
        if inputs.record.pattern == WorkloadPattern::CpuBound {
            raw += 1;
        }
        if inputs.record.pattern == WorkloadPattern::IoBound {
            raw += 2;
        }
        let scaled = ((raw as f64) * m).round() as i64;
        let recommended = (workers + scaled.max(1)).clamp(1, max) as usize;
        WorkerRecommendation { recommended, should_scale_up: true, should_scale_down: false, confidence: 0.8 }
    } else if utilization < 0.30 && workers > 1 {
        let mut raw = 1i64;
        if inputs.record.pattern == WorkloadPattern::MemoryBound {
            raw += 1;
        }
        let scaled = ((raw as f64) * m).round() as i64;
        let recommended = (workers - scaled.max(1)).clamp(1, max) as usize;
        WorkerRecommendation { recommended, should_scale_up: false, should_scale_down: true, confidence: 0.7 }
    } else {
        WorkerRecommendation {
            recommended: inputs.current_workers,
            should_scale_up: false,
            should_scale_down: false,
            confidence: 0.0,
        }
    }
}

fn timeout_recommendation(inputs: &RecommendInputs<'_>) -> TimeoutRecommendation {
    let mut baseline = inputs.record.complexity.baseline_timeout_secs() as f64;
    if inputs.recent_failure_rate > 0.10 {
        baseline *= 1.5;
    }
    let recommended_secs = baseline.round() as u64;
    let delta = (recommended_secs as i64 - inputs.current_timeout_secs as i64).abs();
    let confidence = if inputs.record.mean_exec_ms > 0.0 { 0.7 } else { 0.0 };
    TimeoutRecommendation { recommended_secs, should_adjust: delta > 5, confidence }
}

fn priority_bias_recommendation(inputs: &RecommendInputs<'_>) -> PriorityBiasRecommendation {
    let m = inputs.strategy.multiplier();
    let mut raw = match inputs.record.pattern {
        WorkloadPattern::Burst => 10,
        WorkloadPattern::CpuBound => 5,
        WorkloadPattern::IoBound => 3,
        WorkloadPattern::MemoryBound => 1,
        WorkloadPattern::Steady | WorkloadPattern::Mixed => 0,
    };
    if inputs.queue_depth > 100 {
        raw += 2;
    } else if inputs.queue_depth < 10 {
        raw -= 1;
    }
    let scaled = ((raw as f64) * m).round() as i32;
    PriorityBiasRecommendation { value: scaled.clamp(-10, 10), confidence: 0.6 }
}

fn batching_recommendation(inputs: &RecommendInputs<'_>) -> BatchingRecommendation {
    let mean_exec = inputs.record.mean_exec_ms;
    if mean_exec > 0.0 && mean_exec < 10.0 {
        let size = (1000.0 / mean_exec).round().min(50.0).max(1.0) as usize;
        BatchingRecommendation { size, should_batch: size > 5, confidence: 0.5 }
    } else if inputs.record.pattern == WorkloadPattern::Burst {
        BatchingRecommendation { size: 25, should_batch: true, confidence: 0.5 }
    } else if inputs.record.pattern == WorkloadPattern::MemoryBound {
        BatchingRecommendation { size: 5, should_batch: inputs.queue_depth > 20, confidence: 0.5 }
    } else {
        BatchingRecommendation { size: 0, should_batch: false, confidence: 0.5 }
    }
}

fn memory_cap_recommendation(inputs: &RecommendInputs<'_>) -> MemoryCapRecommendation {
    if inputs.record.memory_percent > 80.0 {
        MemoryCapRecommendation { percent: 70.0, should_adjust: true, confidence: 0.9 }
    } else if inputs.record.memory_percent < 30.0 {
        MemoryCapRecommendation { percent: 80.0, should_adjust: true, confidence: 0.7 }
    } else {
        MemoryCapRecommendation {
            percent: inputs.current_memory_percent,
            should_adjust: false,
            confidence: 0.0,
        }
    }
}

/// Compute the full recommendation set for one analysis tick.
#[must_use]
pub fn compute(inputs: &RecommendInputs<'_>) -> Recommendations {
    Recommendations {
        worker: worker_recommendation(inputs),
        timeout: timeout_recommendation(inputs),
        priority_bias: priority_bias_recommendation(inputs),
        batching: batching_recommendation(inputs),
        memory_cap: memory_cap_recommendation(inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoconfig::metrics::estimate_complexity;

    fn record(utilization: f64, pattern: WorkloadPattern, mean_exec_ms: f64, memory_percent: f64) -> MetricsRecord {
        MetricsRecord {
            timestamp_ms: 0,
            cpu_percent: 0.0,
            memory_percent,
            worker_count: 4,
            worker_utilization: utilization,
            throughput_per_sec: 0.0,
            mean_exec_ms,
            success_rate: 1.0,
            pattern,
            complexity: estimate_complexity(mean_exec_ms),
        }
    }

    #[test]
    fn scales_up_under_high_utilization() {
        let record = record(0.95, WorkloadPattern::CpuBound, 50.0, 20.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 4,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 5,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.0,
            strategy: Strategy::Moderate,
        };
        let rec = worker_recommendation(&inputs);
        assert!(rec.should_scale_up);
        assert!(rec.recommended > 4);
        assert!((rec.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn scales_down_under_low_utilization() {
        let record = record(0.10, WorkloadPattern::Steady, 50.0, 20.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 4,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 5,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.0,
            strategy: Strategy::Moderate,
        };
        let rec = worker_recommendation(&inputs);
        assert!(rec.should_scale_down);
        assert!(rec.recommended < 4);
    }

    #[test]
    fn worker_recommendation_respects_max_cap() {
        let record = record(0.95, WorkloadPattern::IoBound, 5.0, 20.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 16,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 5,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.0,
            strategy: Strategy::Aggressive,
        };
        let rec = worker_recommendation(&inputs);
        assert!(!rec.should_scale_up);
        assert_eq!(rec.recommended, 16);
    }

    #[test]
    fn memory_cap_recommends_tighter_ceiling_under_pressure() {
        let record = record(0.5, WorkloadPattern::Mixed, 50.0, 85.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 4,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 5,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.0,
            strategy: Strategy::Moderate,
        };
        let rec = memory_cap_recommendation(&inputs);
        assert!(rec.should_adjust);
        assert!((rec.percent - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn batching_recommends_small_batches_for_fast_tasks() {
        let record = record(0.5, WorkloadPattern::Mixed, 2.0, 20.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 4,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 5,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.0,
            strategy: Strategy::Moderate,
        };
        let rec = batching_recommendation(&inputs);
        assert!(rec.should_batch);
        assert!(rec.size > 5);
    }

    #[test]
    fn all_confidences_are_within_unit_interval() {
        let record = record(0.95, WorkloadPattern::Burst, 2.0, 85.0);
        let inputs = RecommendInputs {
            record: &record,
            current_workers: 4,
            max_workers: 16,
            current_timeout_secs: 15,
            queue_depth: 150,
            current_memory_percent: 95.0,
            recent_failure_rate: 0.2,
            strategy: Strategy::Aggressive,
        };
        let recs = compute(&inputs);
        for confidence in [
            recs.worker.confidence,
            recs.timeout.confidence,
            recs.priority_bias.confidence,
            recs.batching.confidence,
            recs.memory_cap.confidence,
        ] {
            assert!((0.0..=1.0).contains(&confidence));
        }
    }
}
