//! S3/S4/S6 and worker-pool-level invariants from spec.md §8.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tasklet_engine::config::EngineConfig;
use tasklet_engine::engine::Engine;
use tasklet_engine::facade;

fn engine_with_workers(workers: usize) -> Engine {
    let mut config = EngineConfig::default();
    config.worker_count = workers;
    config.autoconfig_enabled = false;
    Engine::new(config).expect("valid config")
}

#[test]
fn four_busy_tasks_run_in_parallel_not_serially() {
    let engine = engine_with_workers(4);
    let ids: Vec<u64> = (0..4)
        .map(|_| {
            engine
                .submit(Box::new(|| {
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(Vec::new())
                }))
                .expect("admitted")
        })
        .collect();

    let start = Instant::now();
    assert!(engine.await_all(&ids, Some(Duration::from_secs(2))));
    let elapsed = start.elapsed();

    assert!(elapsed < Duration::from_millis(300), "expected parallel execution, took {elapsed:?}");
    engine.shutdown();
}

#[test]
fn admission_denied_under_memory_pressure() {
    let mut config = EngineConfig::default();
    config.worker_count = 1;
    config.max_memory_percent = 0.0;
    config.autoconfig_enabled = false;
    let engine = Engine::new(config).expect("valid config");

    let rejected = engine.submit(Box::new(|| Ok(Vec::new())));
    assert!(matches!(rejected, Err(tasklet_engine::core::EngineError::AdmissionDenied(_))));
    assert_eq!(engine.stats().created, 0);

    engine.shutdown();
}

#[test]
fn admission_recovers_once_live_task_cap_is_freed() {
    let mut config = EngineConfig::default();
    config.worker_count = 1;
    config.max_live_tasks = 1;
    config.cleanup_interval_ms = 50;
    config.autoconfig_enabled = false;
    let engine = Engine::new(config).expect("valid config");

    let first = engine.submit(Box::new(|| Ok(Vec::new()))).expect("first admitted");
    assert!(engine.submit(Box::new(|| Ok(Vec::new()))).is_err());

    engine.await_task(first, Some(Duration::from_secs(2)));
    engine.release_task(first);
    std::thread::sleep(Duration::from_millis(300));

    let second = engine.submit(Box::new(|| Ok(Vec::new())));
    assert!(second.is_ok());

    engine.shutdown();
}

#[test]
fn set_worker_count_clamps_and_applies() {
    let engine = engine_with_workers(2);
    engine.set_worker_count(5).unwrap();
    assert!(engine.stats().worker_count <= tasklet_engine::config::max_workers());

    engine.set_worker_count(0).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(engine.stats().worker_count, 1);
    engine.shutdown();
}

#[test]
fn shutdown_rejects_further_submissions() {
    let engine = engine_with_workers(2);
    engine.shutdown();
    let result = engine.submit(Box::new(|| Ok(Vec::new())));
    assert!(result.is_err());
}

#[test]
fn batch_with_partial_failure_reports_per_task_outcomes() {
    let engine = engine_with_workers(4);

    let callables: Vec<_> = (0..10)
        .map(|i| -> tasklet_engine::core::Callable {
            Box::new(move || if i == 3 || i == 7 { Err(format!("task {i} failed")) } else { Ok(vec![i as u8]) })
        })
        .collect();

    let outcome = facade::submit_many(&engine, callables).await_outcome();

    assert_eq!(outcome.count, 10);
    assert_eq!(outcome.error_count, 2);
    assert_eq!(outcome.success_count, 8);
    assert!(!outcome.errors[3].is_empty());
    assert!(!outcome.errors[7].is_empty());
    for (i, err) in outcome.errors.iter().enumerate() {
        if i != 3 && i != 7 {
            assert!(err.is_empty());
        }
    }

    let mut unique = outcome.task_ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), outcome.task_ids.len());

    engine.shutdown();
}

#[test]
fn retry_with_backoff_eventually_succeeds() {
    let engine = engine_with_workers(2);
    let attempts = Arc::new(AtomicU32::new(0));

    let outcome = facade::submit_with_retry(
        &engine,
        || {
            let attempts = Arc::clone(&attempts);
            Box::new(move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("not yet".to_string())
                } else {
                    Ok(b"finally".to_vec())
                }
            })
        },
        5,
        Duration::from_millis(1),
    );

    assert!(outcome.success);
    assert_eq!(outcome.data, b"finally");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    engine.shutdown();
}

#[test]
fn progress_callback_fires_once_per_task() {
    let engine = engine_with_workers(2);
    let seen = Arc::new(AtomicU32::new(0));

    let callables: Vec<tasklet_engine::core::Callable> = (0..5).map(|i| -> tasklet_engine::core::Callable { Box::new(move || Ok(vec![i])) }).collect();

    let seen_clone = Arc::clone(&seen);
    let outcome = facade::submit_with_progress(&engine, callables, move |_, _| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(outcome.count, 5);
    assert_eq!(seen.load(Ordering::SeqCst), 5);

    engine.shutdown();
}
