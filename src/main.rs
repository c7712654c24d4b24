use bounded_workers::{Config, Handlers, WorkerPool};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bounded_workers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config {
        max_queue_size: 1_000_000,
        monitor_queue_size: 500_000,
        ..Config::from_env()
    };
    info!(?config, "starting demo pool");

    let sum = Arc::new(AtomicU64::new(0));
    let mut pool: WorkerPool<u64> = WorkerPool::with_config(config);
    pool.set_monitor(
        |len, discarded| {
            if discarded > 0 {
                info!(len, discarded, "queue full, tasks rejected");
            } else {
                debug!(len, "queue above watch threshold");
            }
        },
        pool.monitor_queue_size(),
    );

    let acc = Arc::clone(&sum);
    pool.start(Handlers::new().on_task(move |v: u64| {
        acc.fetch_add(v, Ordering::Relaxed);
    }))?;

    let now = Instant::now();
    let submitter = pool.submitter();
    for i in 1..=1_000_000u64 {
        while submitter.enqueue(i).is_err() {
            std::thread::sleep(Duration::from_micros(50));
        }
    }
    while !pool.is_empty() {
        std::thread::sleep(Duration::from_millis(1));
    }
    pool.release();

    info!(
        sum = sum.load(Ordering::Relaxed),
        elapsed = ?now.elapsed(),
        metrics = ?pool.metrics(),
        "demo finished"
    );
    Ok(())
}
