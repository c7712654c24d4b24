use bounded_workers::{Handlers, Placement, TaskQueue, WaitTimeout, WorkerPool};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::{
    collections::VecDeque,
    hint::black_box,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

fn drain(done: &AtomicU64, expected: u64) {
    while done.load(Ordering::Acquire) < expected {
        thread::yield_now();
    }
}

// Benchmark 1: admission cost without consumers
fn bench_enqueue_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");

    for size in [100u64, 1000, 10000] {
        group.throughput(Throughput::Elements(size));

        group.bench_with_input(BenchmarkId::new("enqueue_then_pop_all", size), &size, |b, &size| {
            let queue = TaskQueue::with_limits(usize::MAX, usize::MAX);
            b.iter(|| {
                for i in 0..size {
                    queue.enqueue(black_box(i), Placement::Back).unwrap();
                }
                black_box(queue.pop_all(WaitTimeout::Poll).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("enqueue_batch_then_pop_all", size), &size, |b, &size| {
            let queue = TaskQueue::with_limits(usize::MAX, usize::MAX);
            b.iter(|| {
                queue.enqueue_batch(0..size, Placement::Back).unwrap();
                black_box(queue.pop_all(WaitTimeout::Poll).unwrap());
            });
        });
    }
    group.finish();
}

// Benchmark 2: end-to-end throughput, single vs batch dispatch
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));
    let workers = num_cpus::get().max(2);

    for size in [1000u64, 10000] {
        group.throughput(Throughput::Elements(size));

        group.bench_with_input(BenchmarkId::new("single", size), &size, |b, &size| {
            let done = Arc::new(AtomicU64::new(0));
            let d = done.clone();
            let mut pool: WorkerPool<u64> = WorkerPool::new();
            pool.set_max_queue_size(usize::MAX);
            pool.init(
                workers,
                Duration::from_millis(50),
                Handlers::new().on_task(move |v: u64| {
                    black_box(v);
                    d.fetch_add(1, Ordering::Release);
                }),
            )
            .unwrap();

            b.iter(|| {
                done.store(0, Ordering::Release);
                for i in 0..size {
                    pool.enqueue(i).unwrap();
                }
                drain(&done, size);
            });
            pool.release();
        });

        group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, &size| {
            let done = Arc::new(AtomicU64::new(0));
            let d = done.clone();
            let mut pool: WorkerPool<u64> = WorkerPool::new();
            pool.set_max_queue_size(usize::MAX);
            pool.init(
                workers,
                Duration::from_millis(50),
                Handlers::new().on_batch(move |batch: &mut VecDeque<u64>| {
                    black_box(&batch);
                    d.fetch_add(batch.len() as u64, Ordering::Release);
                }),
            )
            .unwrap();

            b.iter(|| {
                done.store(0, Ordering::Release);
                for i in 0..size {
                    pool.enqueue(i).unwrap();
                }
                drain(&done, size);
            });
            pool.release();
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enqueue_pop, bench_dispatch);
criterion_main!(benches);
