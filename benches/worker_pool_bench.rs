//! Benchmarks for the worker pool and its self-tuning controller.
//!
//! Benchmarks cover:
//! - Submit/await round-trip throughput at varying worker counts
//! - Admission control under queue pressure
//! - Multiprocessor fan-out for internal analysis work
//! - Auto-Config analysis tick cost
//! - End-to-end mixed-priority batch scheduling

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tasklet_engine::config::EngineConfig;
use tasklet_engine::engine::Engine;
use tasklet_engine::facade;
use tasklet_engine::multiproc::Multiprocessor;

fn engine_with(workers: usize, queue_depth: usize) -> Engine {
    let mut config = EngineConfig::default();
    config.worker_count = workers;
    config.max_queue_depth = queue_depth;
    config.autoconfig_enabled = false;
    Engine::new(config).expect("valid config")
}

fn bench_submit_await_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_await_throughput");

    for workers in [1, 4, 8] {
        group.throughput(Throughput::Elements(200));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let engine = engine_with(workers, 4_096);
            b.iter(|| {
                let ids: Vec<u64> =
                    (0..200).map(|i| engine.submit(Box::new(move || Ok(vec![i as u8]))).unwrap()).collect();
                engine.await_all(&ids, Some(Duration::from_secs(5)));
                black_box(&ids);
            });
            engine.shutdown();
        });
    }
    group.finish();
}

fn bench_submission_under_queue_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("submission_under_queue_pressure");

    for queue_depth in [8, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(queue_depth), &queue_depth, |b, &queue_depth| {
            let engine = engine_with(1, queue_depth);
            b.iter(|| {
                let mut accepted = 0u32;
                for _ in 0..queue_depth * 2 {
                    if engine.submit(Box::new(|| Ok(Vec::new()))).is_ok() {
                        accepted += 1;
                    }
                }
                black_box(accepted);
            });
            engine.shutdown();
        });
    }
    group.finish();
}

fn bench_multiprocessor_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiprocessor_fan_out");
    let mp = Multiprocessor::new();

    for size in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let items: Vec<u64> = (0..size as u64).collect();
            b.iter(|| {
                let squared = mp.process_parallel(&items, |&x| x * x, None);
                black_box(squared);
            });
        });
    }
    group.finish();
}

fn bench_autoconfig_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("autoconfig_tick");

    group.bench_function("force_analysis", |b| {
        let engine = engine_with(4, 1_024);
        for _ in 0..20 {
            let _ = engine.submit(Box::new(|| Ok(Vec::new())));
        }
        b.iter(|| {
            engine.force_analysis();
            black_box(engine.recommendations());
        });
        engine.shutdown();
    });
    group.finish();
}

fn bench_end_to_end_mixed_priority_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end_scenario");

    group.bench_function("mixed_priority_batch", |b| {
        let engine = engine_with(8, 2_048);
        b.iter(|| {
            let callables: Vec<tasklet_engine::core::Callable> = (0..150u64)
                .map(|i| -> tasklet_engine::core::Callable { Box::new(move || Ok(vec![(i % 256) as u8])) })
                .collect();
            let priority = |i: u64| -> i32 {
                match i % 10 {
                    0..=1 => -5,
                    2..=4 => -1,
                    5..=7 => 0,
                    _ => 3,
                }
            };
            let ids: Vec<_> = callables
                .into_iter()
                .enumerate()
                .map(|(i, c)| facade::submit(&engine, c, Some(priority(i as u64))).await_outcome())
                .collect();
            black_box(ids);
        });
        engine.shutdown();
    });
    group.finish();
}

criterion_group!(pool_benches, bench_submit_await_throughput, bench_submission_under_queue_pressure);
criterion_group!(analysis_benches, bench_multiprocessor_fan_out, bench_autoconfig_tick);
criterion_group!(scenario_benches, bench_end_to_end_mixed_priority_batch);

criterion_main!(pool_benches, analysis_benches, scenario_benches);
