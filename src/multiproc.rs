//! The Multiprocessor: fan-out/fan-in helper used by the Auto-Config Controller (and
//! available to the façade) for parallel metric aggregation, map-reduce, and chunked
//! statistics (spec.md §4.5).
//!
//! `rayon` is not part of the teacher's dependency set; it is pulled in here because
//! both `golem` and `blake3` in the rest of the example pack reach for it to do exactly
//! this fan-out/fan-in shape (see DESIGN.md).

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

/// Aggregate statistics over a slice of numbers, as returned by `statistics_parallel`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Statistics {
    /// Smallest value, or `0.0` for an empty input.
    pub min: f64,
    /// Largest value, or `0.0` for an empty input.
    pub max: f64,
    /// Arithmetic mean, or `0.0` for an empty input.
    pub mean: f64,
    /// Median, or `0.0` for an empty input.
    pub median: f64,
    /// Population variance, or `0.0` for an empty input.
    pub variance: f64,
    /// Population standard deviation, or `0.0` for an empty input.
    pub stddev: f64,
    /// Number of values summarized.
    pub count: usize,
}

/// A pool of helper threads sized to hardware concurrency, used for internal analysis
/// fan-out. Not the Worker Pool — this never runs user callables.
pub struct Multiprocessor {
    pool: ThreadPool,
    threads: usize,
}

impl Multiprocessor {
    /// Build a helper pool sized to `hardware_concurrency` (falling back to 4 if it
    /// cannot be determined).
    #[must_use]
    pub fn new() -> Self {
        let threads = num_cpus::get().max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("multiproc-{i}"))
            .build()
            .unwrap_or_else(|_| {
                warn!("falling back to rayon's global thread pool configuration");
                ThreadPoolBuilder::new().build().expect("default rayon pool")
            });
        Self { pool, threads }
    }

    /// Spec.md §4.5's chunk-size heuristic: below `threads * 10` items, split evenly
    /// across threads; otherwise divide and clamp into `[100, 10_000]`.
    #[must_use]
    pub fn chunk_size(&self, total: usize) -> usize {
        if total == 0 {
            return 1;
        }
        if total < self.threads * 10 {
            (total / self.threads.max(1)).max(1)
        } else {
            (total / self.threads.max(1)).max(1).clamp(100, 10_000)
        }
    }

    /// Apply `f` to every item in parallel, chunked per `chunk_size` (or the computed
    /// heuristic if `None`). Returns an empty vector if any chunk panics.
    pub fn process_parallel<T, R, F>(&self, items: &[T], f: F, chunk_size: Option<usize>) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let chunk = chunk_size.unwrap_or_else(|| self.chunk_size(items.len())).max(1);
        let outcome = self.pool.install(|| {
            catch_unwind(AssertUnwindSafe(|| {
                use rayon::prelude::*;
                items.par_chunks(chunk).flat_map(|c| c.iter().map(&f).collect::<Vec<_>>()).collect()
            }))
        });
        outcome.unwrap_or_else(|_| {
            warn!("process_parallel: a worker panicked; returning empty result");
            Vec::new()
        })
    }

    /// Map every item then fold the mapped values together with `reducer`, starting
    /// from `init`. Falls back to `init` if a worker panics.
    pub fn map_reduce<T, M, R, Map, Reduce>(&self, items: &[T], mapper: Map, reducer: Reduce, init: R) -> R
    where
        T: Sync,
        M: Send,
        R: Send + Clone + Sync,
        Map: Fn(&T) -> M + Sync,
        Reduce: Fn(R, M) -> R + Sync,
    {
        let outcome = self.pool.install(|| {
            catch_unwind(AssertUnwindSafe(|| {
                items.iter().map(&mapper).fold(init.clone(), &reducer)
            }))
        });
        outcome.unwrap_or_else(|_| {
            warn!("map_reduce: a worker panicked; returning the initial value");
            init
        })
    }

    /// Run independent closures concurrently, returning their results in input order.
    /// If any closure panics, the whole batch fails and an empty vector comes back,
    /// matching `process_parallel`/`map_reduce`'s whole-operation-fails policy.
    pub fn execute_parallel<R, F>(&self, closures: Vec<F>) -> Vec<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        let results: Vec<Option<R>> = self.pool.install(|| {
            use rayon::prelude::*;
            closures
                .into_par_iter()
                .map(|f| catch_unwind(AssertUnwindSafe(f)).ok())
                .collect()
        });
        if results.iter().any(Option::is_none) {
            warn!("execute_parallel: a closure panicked; failing the whole batch");
            return Vec::new();
        }
        results.into_iter().flatten().collect()
    }

    /// Compute summary statistics over `numbers`. Returns the zeroed default for an
    /// empty slice.
    #[must_use]
    pub fn statistics_parallel(&self, numbers: &[f64]) -> Statistics {
        if numbers.is_empty() {
            return Statistics::default();
        }
        let count = numbers.len();
        let (min, max, sum) = self.pool.install(|| {
            use rayon::prelude::*;
            numbers
                .par_iter()
                .fold(
                    || (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                    |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
                )
                .reduce(
                    || (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                    |(a_min, a_max, a_sum), (b_min, b_max, b_sum)| {
                        (a_min.min(b_min), a_max.max(b_max), a_sum + b_sum)
                    },
                )
        });
        let mean = sum / count as f64;

        let mut sorted = numbers.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        let variance = numbers.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

        Statistics {
            min,
            max,
            mean,
            median,
            variance,
            stddev: variance.sqrt(),
            count,
        }
    }
}

impl Default for Multiprocessor {
    fn default() -> Self {
        Self::new()
    }
}
