//! Metrics collection and workload/complexity classification for the Auto-Config
//! Controller (spec.md §3, §4.4 Steps 1–3).

use std::collections::VecDeque;

use crate::util::clock;

/// A coarse classification of recent pool behavior, used to bias recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPattern {
    /// CPU utilization is high and memory is not.
    CpuBound,
    /// Tasks finish fast enough that the bottleneck looks like I/O wait, not CPU.
    IoBound,
    /// Memory usage is high, regardless of CPU.
    MemoryBound,
    /// Throughput jumped sharply versus the previous tick.
    Burst,
    /// Throughput is roughly flat versus the previous tick.
    Steady,
    /// None of the above predicates matched cleanly.
    Mixed,
}

/// A coarse estimate of per-task cost, derived from mean execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    /// Mean execution time under 1 ms.
    Trivial,
    /// Under 10 ms.
    Simple,
    /// Under 100 ms.
    Moderate,
    /// Under 1000 ms.
    Complex,
    /// 1000 ms or more.
    Heavy,
}

impl Complexity {
    /// Baseline timeout in seconds recommended for this complexity tier.
    #[must_use]
    pub const fn baseline_timeout_secs(self) -> u64 {
        match self {
            Self::Trivial => 1,
            Self::Simple => 5,
            Self::Moderate => 15,
            Self::Complex => 60,
            Self::Heavy => 300,
        }
    }
}

/// Derive a [`Complexity`] tier from a mean execution time in milliseconds.
#[must_use]
pub fn estimate_complexity(mean_exec_ms: f64) -> Complexity {
    if mean_exec_ms < 1.0 {
        Complexity::Trivial
    } else if mean_exec_ms < 10.0 {
        Complexity::Simple
    } else if mean_exec_ms < 100.0 {
        Complexity::Moderate
    } else if mean_exec_ms < 1000.0 {
        Complexity::Complex
    } else {
        Complexity::Heavy
    }
}

/// Classify the current tick against the decision table in spec.md §4.4 Step 2. The
/// first matching row wins.
#[must_use]
pub fn classify_workload(
    cpu_percent: f64,
    memory_percent: f64,
    mean_exec_ms: f64,
    throughput_ratio: f64,
) -> WorkloadPattern {
    let cpu_heavy = cpu_percent > 80.0;
    let mem_heavy = memory_percent > 70.0;
    let io_heavy = mean_exec_ms < 10.0;

    if cpu_heavy && !mem_heavy {
        WorkloadPattern::CpuBound
    } else if io_heavy && !cpu_heavy {
        WorkloadPattern::IoBound
    } else if mem_heavy {
        WorkloadPattern::MemoryBound
    } else if throughput_ratio > 1.5 {
        WorkloadPattern::Burst
    } else if (throughput_ratio - 1.0).abs() < 0.2 {
        WorkloadPattern::Steady
    } else {
        WorkloadPattern::Mixed
    }
}

/// One collection tick's combined view of the system, the pool, and recent timing.
#[derive(Debug, Clone, Copy)]
pub struct MetricsRecord {
    /// Wall-clock milliseconds since the Unix epoch when this tick ran.
    pub timestamp_ms: u128,
    /// System-wide CPU utilization percent.
    pub cpu_percent: f64,
    /// System-wide memory usage percent.
    pub memory_percent: f64,
    /// Worker thread count at the time of the tick.
    pub worker_count: usize,
    /// `active / worker_count`, or `0.0` if there are no workers.
    pub worker_utilization: f64,
    /// Jobs completed (success or failure) per second since the previous tick.
    pub throughput_per_sec: f64,
    /// Mean execution time over the retained job history, milliseconds.
    pub mean_exec_ms: f64,
    /// `completed / (completed + failed)` over the Stats Collector's lifetime.
    pub success_rate: f64,
    /// This tick's workload classification.
    pub pattern: WorkloadPattern,
    /// This tick's complexity estimate.
    pub complexity: Complexity,
}

/// Bounded ring buffer of recently completed jobs, feeding the timing probe. Capped at
/// 1,000 entries per spec.md §4.4 Step 1(c).
#[derive(Debug, Default)]
pub struct JobHistory {
    durations_ms: VecDeque<u64>,
}

const JOB_HISTORY_CAP: usize = 1000;

impl JobHistory {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self { durations_ms: VecDeque::with_capacity(JOB_HISTORY_CAP) }
    }

    /// Record one job's duration, evicting the oldest entry if at capacity.
    pub fn push(&mut self, duration_ms: u64) {
        if self.durations_ms.len() >= JOB_HISTORY_CAP {
            self.durations_ms.pop_front();
        }
        self.durations_ms.push_back(duration_ms);
    }

    /// Mean duration across retained entries, or `0.0` if empty.
    #[must_use]
    pub fn mean_ms(&self) -> f64 {
        if self.durations_ms.is_empty() {
            return 0.0;
        }
        self.durations_ms.iter().sum::<u64>() as f64 / self.durations_ms.len() as f64
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }
}

/// Bounded deque of [`MetricsRecord`]s, capped at 100 per spec.md §3.
#[derive(Debug, Default)]
pub struct MetricsHistory {
    records: VecDeque<MetricsRecord>,
}

const METRICS_HISTORY_CAP: usize = 100;

impl MetricsHistory {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self { records: VecDeque::with_capacity(METRICS_HISTORY_CAP) }
    }

    /// Append a record, evicting the oldest if at capacity.
    pub fn push(&mut self, record: MetricsRecord) {
        if self.records.len() >= METRICS_HISTORY_CAP {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The most recently appended record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&MetricsRecord> {
        self.records.back()
    }

    /// All retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<MetricsRecord> {
        self.records.iter().copied().collect()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stamp a record's timestamp with the current wall clock.
#[must_use]
pub fn now_timestamp_ms() -> u128 {
    clock::now_ms()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_tiers_match_thresholds() {
        assert_eq!(estimate_complexity(0.5), Complexity::Trivial);
        assert_eq!(estimate_complexity(5.0), Complexity::Simple);
        assert_eq!(estimate_complexity(50.0), Complexity::Moderate);
        assert_eq!(estimate_complexity(500.0), Complexity::Complex);
        assert_eq!(estimate_complexity(5000.0), Complexity::Heavy);
    }

    #[test]
    fn classification_decision_table() {
        assert_eq!(classify_workload(90.0, 10.0, 50.0, 1.0), WorkloadPattern::CpuBound);
        assert_eq!(classify_workload(10.0, 10.0, 5.0, 1.0), WorkloadPattern::IoBound);
        assert_eq!(classify_workload(10.0, 90.0, 50.0, 1.0), WorkloadPattern::MemoryBound);
        assert_eq!(classify_workload(10.0, 10.0, 50.0, 2.0), WorkloadPattern::Burst);
        assert_eq!(classify_workload(10.0, 10.0, 50.0, 1.05), WorkloadPattern::Steady);
        assert_eq!(classify_workload(10.0, 10.0, 50.0, 0.5), WorkloadPattern::Mixed);
    }

    #[test]
    fn job_history_evicts_oldest_past_cap() {
        let mut history = JobHistory::new();
        for i in 0..(JOB_HISTORY_CAP + 10) {
            history.push(i as u64);
        }
        assert_eq!(history.len(), JOB_HISTORY_CAP);
    }

    #[test]
    fn metrics_history_caps_at_100() {
        let mut history = MetricsHistory::new();
        let sample = MetricsRecord {
            timestamp_ms: 0,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            worker_count: 1,
            worker_utilization: 0.0,
            throughput_per_sec: 0.0,
            mean_exec_ms: 0.0,
            success_rate: 1.0,
            pattern: WorkloadPattern::Steady,
            complexity: Complexity::Trivial,
        };
        for _ in 0..150 {
            history.push(sample);
        }
        assert_eq!(history.len(), METRICS_HISTORY_CAP);
    }
}
