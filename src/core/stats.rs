//! Lock-free counters feeding the Stats Collector snapshot (spec.md §3, §4.1).
//!
//! Every counter is an atomic bumped from whichever thread observes the event — the
//! submitting caller or a worker thread — so `snapshot` never blocks on pool activity.
//! Grounded on the teacher's `PoolCounters`/`PoolStats` pair in `worker_pool.rs`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the pool's counters, derived fields included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Tasks accepted but not yet completed or failed.
    pub active: u64,
    /// Tasks accepted onto the worker pool (dispatch succeeded).
    pub created: u64,
    /// Tasks whose callable returned `Ok`.
    pub completed: u64,
    /// Tasks whose callable panicked or returned `Err`.
    pub failed: u64,
    /// Submissions rejected at the dispatch step (channel full), distinct from `failed`.
    pub dispatch_failures: u64,
    /// Worker OS threads spawned over the pool's lifetime, including ones since retired.
    pub total_threads_created: u64,
    /// Mean wall-clock execution time across all completed and failed tasks, in
    /// milliseconds. `0.0` if none have finished yet.
    pub mean_execution_ms: f64,
    /// `completed / (completed + failed)`, or `1.0` if nothing has finished yet.
    pub success_rate: f64,
    /// Worker thread count in effect when this snapshot was taken.
    pub worker_count: usize,
}

/// Atomic counters backing a [`StatsSnapshot`].
#[derive(Debug, Default)]
pub struct StatsCollector {
    created: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dispatch_failures: AtomicU64,
    total_threads_created: AtomicU64,
    exec_time_sum_ms: AtomicU64,
    exec_time_count: AtomicU64,
}

impl StatsCollector {
    /// A task was accepted onto the dispatch channel.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission was rejected because the dispatch channel was full.
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker OS thread was spawned (initial pool fill or `set_worker_count` growth).
    pub fn record_thread_spawned(&self) {
        self.total_threads_created.fetch_add(1, Ordering::Relaxed);
    }

    /// A task finished, successfully or not, after running for `duration_ms`.
    pub fn record_finished(&self, succeeded: bool, duration_ms: u64) {
        if succeeded {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.exec_time_sum_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.exec_time_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot. Individual atomics may interleave with
    /// concurrent updates; the spec only requires the snapshot be a plausible point in
    /// time, not a linearization point.
    #[must_use]
    pub fn snapshot(&self, worker_count: usize) -> StatsSnapshot {
        let created = self.created.load(Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let dispatch_failures = self.dispatch_failures.load(Ordering::Relaxed);
        let total_threads_created = self.total_threads_created.load(Ordering::Relaxed);
        let exec_count = self.exec_time_count.load(Ordering::Relaxed);
        let exec_sum = self.exec_time_sum_ms.load(Ordering::Relaxed);

        let mean_execution_ms = if exec_count == 0 {
            0.0
        } else {
            exec_sum as f64 / exec_count as f64
        };
        let finished = completed + failed;
        let success_rate = if finished == 0 {
            1.0
        } else {
            completed as f64 / finished as f64
        };

        StatsSnapshot {
            active: created.saturating_sub(finished),
            created,
            completed,
            failed,
            dispatch_failures,
            total_threads_created,
            mean_execution_ms,
            success_rate,
            worker_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_is_neutral() {
        let stats = StatsCollector::default();
        let snap = stats.snapshot(4);
        assert_eq!(snap.created, 0);
        assert!((snap.success_rate - 1.0).abs() < f64::EPSILON);
        assert!((snap.mean_execution_ms - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tracks_active_as_created_minus_finished() {
        let stats = StatsCollector::default();
        stats.record_created();
        stats.record_created();
        stats.record_finished(true, 10);
        let snap = stats.snapshot(1);
        assert_eq!(snap.created, 2);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.active, 1);
    }

    #[test]
    fn success_rate_and_mean_execution() {
        let stats = StatsCollector::default();
        stats.record_created();
        stats.record_created();
        stats.record_finished(true, 10);
        stats.record_finished(false, 30);
        let snap = stats.snapshot(2);
        assert!((snap.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((snap.mean_execution_ms - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dispatch_failures_do_not_count_as_created() {
        let stats = StatsCollector::default();
        stats.record_dispatch_failure();
        let snap = stats.snapshot(1);
        assert_eq!(snap.created, 0);
        assert_eq!(snap.dispatch_failures, 1);
    }
}
