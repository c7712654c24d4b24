#[cfg(test)]
mod tests {
    use bounded_workers::{
        handle::Handlers,
        model::{Placement, PoolMetrics, WaitTimeout},
        pool::{Config, WorkerPool},
    };
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicU64, AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<F: FnOnce() -> T, T>(name: &str, f: F) -> T {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    fn wait_drained(pool: &WorkerPool<u64>, expected: u64, done: &AtomicU64) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while done.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(done.load(Ordering::SeqCst), expected, "queue left: {}", pool.len());
    }

    #[test]
    fn load_test_1_many_producers_single_mode() {
        println!("\n=== LOAD TEST 1: 4 producers x 25k tasks, single dispatch ===");
        let sum = Arc::new(AtomicU64::new(0));
        let done = Arc::new(AtomicU64::new(0));
        let (s, d) = (sum.clone(), done.clone());

        let mut pool: WorkerPool<u64> = WorkerPool::with_config(Config {
            name: "load1".into(),
            max_queue_size: 4096,
            ..Config::cpu_bound()
        });
        pool.start(Handlers::new().on_task(move |v: u64| {
            s.fetch_add(v, Ordering::Relaxed);
            d.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        measure("100k tasks", || {
            let producers: Vec<_> = (0..4u64)
                .map(|p| {
                    let submitter = pool.submitter();
                    thread::spawn(move || {
                        for i in 0..25_000u64 {
                            let v = p * 25_000 + i + 1;
                            while submitter.enqueue(v).is_err() {
                                thread::yield_now();
                            }
                        }
                    })
                })
                .collect();
            for p in producers {
                p.join().unwrap();
            }
            wait_drained(&pool, 100_000, &done);
        });
        pool.release();

        assert_eq!(sum.load(Ordering::Relaxed), 100_000 * 100_001 / 2);
        let metrics = pool.metrics();
        println!("  Completed: {}, discarded retries: {}", metrics.completed_tasks, metrics.discarded_tasks);
        assert_eq!(metrics.completed_tasks, 100_000);
        assert_eq!(metrics.total_enqueued, 100_000);
    }

    #[test]
    fn load_test_2_batch_mode() {
        println!("\n=== LOAD TEST 2: batch dispatch ===");
        let done = Arc::new(AtomicU64::new(0));
        let largest = Arc::new(AtomicUsize::new(0));
        let (d, l) = (done.clone(), largest.clone());

        let mut pool: WorkerPool<u64> = WorkerPool::new();
        pool.set_max_queue_size(10_000);
        pool.init(
            2,
            Duration::from_millis(20),
            Handlers::new().on_batch(move |batch: &mut VecDeque<u64>| {
                l.fetch_max(batch.len(), Ordering::Relaxed);
                d.fetch_add(batch.len() as u64, Ordering::SeqCst);
            }),
        )
        .unwrap();

        measure("50k tasks in chunks of 500", || {
            for chunk in 0..100u64 {
                let tasks: Vec<u64> = (chunk * 500..(chunk + 1) * 500).collect();
                while pool.enqueue_batch(tasks.clone(), Placement::Back).is_err() {
                    thread::yield_now();
                }
            }
            wait_drained(&pool, 50_000, &done);
        });
        pool.release();

        let metrics = pool.metrics();
        println!("  Batches: {}, largest: {}", metrics.batches, largest.load(Ordering::Relaxed));
        assert!(metrics.batches <= 50_000);
        assert!(largest.load(Ordering::Relaxed) >= 500);
    }

    #[test]
    fn load_test_3_backpressure_under_slow_consumer() {
        println!("\n=== LOAD TEST 3: backpressure ===");
        let discards = Arc::new(AtomicUsize::new(0));
        let dd = discards.clone();

        let mut pool: WorkerPool<u64> = WorkerPool::new();
        pool.set_max_queue_size(16);
        pool.set_monitor(
            move |len, discarded| {
                assert!(len <= 16);
                if discarded > 0 {
                    dd.fetch_add(discarded, Ordering::Relaxed);
                }
            },
            8,
        );
        pool.init(
            1,
            WaitTimeout::from_millis(10),
            Handlers::new().on_task(|_| thread::sleep(Duration::from_millis(1))),
        )
        .unwrap();

        let mut rejected = 0;
        for v in 0..2_000u64 {
            if pool.enqueue(v).is_err() {
                rejected += 1;
            }
            assert!(pool.len() <= 16);
        }
        pool.release();

        println!("  Rejected: {}", rejected);
        assert!(rejected > 0);
        assert_eq!(discards.load(Ordering::Relaxed), rejected);
        assert_eq!(pool.metrics().discarded_tasks, rejected);
    }

    #[tokio::test]
    async fn test_monitoring() {
        println!("\n=== TEST: periodic metrics monitor ===");
        let snapshots: Arc<Mutex<Vec<PoolMetrics>>> = Arc::new(Mutex::new(Vec::new()));
        let s = snapshots.clone();

        let mut pool: WorkerPool<u64> = WorkerPool::new();
        pool.init(2, Duration::from_millis(10), Handlers::new().on_task(|_| {})).unwrap();

        let token = pool.start_monitoring(Duration::from_millis(10), move |metrics| {
            s.lock().push(metrics);
        });
        for v in 0..100 {
            pool.enqueue(v).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        WorkerPool::<u64>::stop_monitoring(token);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let taken = snapshots.lock().len();
        assert!(taken >= 2, "expected several snapshots, got {}", taken);
        assert!(snapshots.lock().iter().all(|m| m.workers == 2));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(snapshots.lock().len(), taken, "monitor kept running after cancel");
        pool.release();
    }

    #[tokio::test]
    async fn test_metrics_stream() {
        let pool: WorkerPool<u64> = WorkerPool::new();
        pool.enqueue_batch(0..5, Placement::Back).unwrap();

        let snapshots: Vec<PoolMetrics> = pool
            .metrics_stream(Duration::from_millis(5))
            .take(3)
            .collect()
            .await;

        assert_eq!(snapshots.len(), 3);
        for m in snapshots {
            assert_eq!(m.queued_tasks, 5);
            assert_eq!(m.workers, 0);
            assert!((m.queue_pressure() - 5.0 / 1024.0).abs() < 1e-9);
        }
    }
}
