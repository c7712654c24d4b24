use super::{
    errors::{PoolError, PopError},
    handle::{Handlers, MultiTaskHandler, SingleTaskHandler, Submitter},
    model::{DispatchMode, Placement, PoolMetrics, WaitTimeout},
    queue::{TaskQueue, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MONITOR_QUEUE_SIZE},
    result::PoolResult,
};
use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use crossbeam::utils::CachePadded;
use futures::stream::{self, Stream};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};


/// Pool settings applied by `WorkerPool::with_config` and `start`.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub num_threads: usize,
    pub wait_timeout: WaitTimeout,
    pub max_queue_size: usize,
    pub monitor_queue_size: usize,
    /// Worker thread stack size; `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: String::new(),
            num_threads: num_cpus::get(),
            wait_timeout: WaitTimeout::default(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            monitor_queue_size: DEFAULT_MONITOR_QUEUE_SIZE,
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus,
            max_queue_size: num_cpus * 256,
            monitor_queue_size: num_cpus * 64,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            num_threads: num_cpus * 2, // handlers mostly wait on I/O
            max_queue_size: num_cpus * 1024,
            monitor_queue_size: num_cpus * 256,
            ..Default::default()
        }
    }

    /// Overlays `WORKER_POOL_*` environment variables on the defaults.
    /// `WORKER_POOL_THREADS=0` means one thread per CPU.
    pub fn from_env() -> Self {
        fn var<V: std::str::FromStr>(key: &str) -> Option<V> {
            std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
        }

        let mut config = Self::default();
        if let Ok(name) = std::env::var("WORKER_POOL_NAME") {
            config.name = name;
        }
        if let Some(threads) = var::<usize>("WORKER_POOL_THREADS") {
            config.num_threads = if threads == 0 { num_cpus::get() } else { threads };
        }
        if let Some(ms) = var::<i64>("WORKER_POOL_WAIT_TIMEOUT_MS") {
            config.wait_timeout = WaitTimeout::from_millis(ms);
        }
        if let Some(size) = var("WORKER_POOL_MAX_QUEUE") {
            config.max_queue_size = size;
        }
        if let Some(size) = var("WORKER_POOL_MONITOR_QUEUE") {
            config.monitor_queue_size = size;
        }
        config
    }
}


/// Pool whose tasks are shared values rather than owned ones.
pub type SharedPool<U> = WorkerPool<Arc<U>>;

/// State every worker thread observes.
struct WorkerState {
    name: RwLock<String>,
    wait_timeout_nanos: CachePadded<AtomicU64>,
    shutdown: CachePadded<AtomicBool>,
}

impl WorkerState {
    fn wait_timeout(&self) -> WaitTimeout {
        WaitTimeout::from_nanos(self.wait_timeout_nanos.load(Ordering::Relaxed))
    }

    fn set_wait_timeout(&self, timeout: WaitTimeout) {
        self.wait_timeout_nanos.store(timeout.as_nanos(), Ordering::Relaxed);
    }

    #[inline]
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Fixed set of worker threads draining one bounded queue.
///
/// The pool starts with no threads. `init` spawns them, `release` stops and
/// joins them; queued tasks survive a release and are picked up by the next
/// `init`. Dropping the pool releases it.
pub struct WorkerPool<T: Send + 'static> {
    queue: Arc<TaskQueue<T>>,
    state: Arc<WorkerState>,
    handlers: Handlers<T>,
    threads: Vec<JoinHandle<()>>,
    config: Config,
}

impl<T: Send + 'static> Default for WorkerPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(Config {
            name: name.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let queue = TaskQueue::with_limits(config.max_queue_size, config.monitor_queue_size);
        let state = WorkerState {
            name: RwLock::new(config.name.clone()),
            wait_timeout_nanos: CachePadded::new(AtomicU64::new(config.wait_timeout.as_nanos())),
            shutdown: CachePadded::new(AtomicBool::new(false)),
        };
        Self {
            queue: Arc::new(queue),
            state: Arc::new(state),
            handlers: Handlers::new(),
            threads: Vec::new(),
            config,
        }
    }

    /// Inits with the thread count and wait timeout from the pool's config.
    pub fn start(&mut self, handlers: Handlers<T>) -> PoolResult<()> {
        let (num_threads, wait_timeout) = (self.config.num_threads, self.config.wait_timeout);
        self.init(num_threads, wait_timeout, handlers)
    }

    /// Spawns `worker_count` threads consuming the queue with `handlers`.
    ///
    /// An already running pool is released first. If any spawn fails, every
    /// thread started so far is joined and the pool is left not inited.
    pub fn init(
        &mut self,
        worker_count: usize,
        wait_timeout: impl Into<WaitTimeout>,
        handlers: Handlers<T>,
    ) -> PoolResult<()> {
        if worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }
        if self.is_inited() {
            self.release();
        }

        self.state.set_wait_timeout(wait_timeout.into());
        self.handlers = handlers;
        let name = self.name();
        let prefix = if name.is_empty() { "worker".to_string() } else { name.replace('\0', "") };

        self.threads.reserve(worker_count);
        for index in 0..worker_count {
            let worker = Worker {
                index,
                queue: Arc::clone(&self.queue),
                state: Arc::clone(&self.state),
                handlers: self.handlers.clone(),
            };
            let mut builder = thread::Builder::new().name(format!("{}-{}", prefix, index));
            if let Some(size) = self.config.stack_size {
                builder = builder.stack_size(size);
            }
            let spawned = builder.spawn(move || worker.run());

            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(err) => {
                    error!(pool = %name, index, error = %err, "failed to spawn worker thread");
                    self.teardown();
                    return Err(PoolError::Spawn {
                        index,
                        reason: err.to_string(),
                    });
                }
            }
        }

        debug!(
            pool = %name,
            workers = worker_count,
            mode = ?self.handlers.dispatch_mode(),
            wait_timeout = ?self.state.wait_timeout(),
            "worker pool started"
        );
        Ok(())
    }

    /// Stops and joins every worker. Queued tasks are left in place.
    pub fn release(&mut self) {
        if self.is_inited() {
            self.teardown();
            debug!(pool = %self.name(), "worker pool released");
        }
    }

    fn teardown(&mut self) {
        self.state.shutdown.store(true, Ordering::Release);
        self.queue.wake_all();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("worker thread exited with a panic");
            }
        }
        self.state.shutdown.store(false, Ordering::Release);

        self.handlers = Handlers::new();
        self.state.set_wait_timeout(WaitTimeout::default());
    }

    #[inline]
    pub fn is_inited(&self) -> bool {
        !self.threads.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.handlers.dispatch_mode()
    }

    #[inline]
    pub fn enqueue(&self, task: T) -> PoolResult<()> {
        self.queue.enqueue(task, Placement::Back)
    }

    #[inline]
    pub fn enqueue_at(&self, task: T, placement: Placement) -> PoolResult<()> {
        self.queue.enqueue(task, placement)
    }

    pub fn enqueue_batch<I>(&self, tasks: I, placement: Placement) -> PoolResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.queue.enqueue_batch(tasks, placement)
    }

    /// Manual consumption, bypassing the workers.
    pub fn pop_one(&self, timeout: impl Into<WaitTimeout>) -> Result<T, PopError> {
        self.queue.pop_one(timeout.into())
    }

    pub fn pop_all(&self, timeout: impl Into<WaitTimeout>) -> Result<VecDeque<T>, PopError> {
        self.queue.pop_all(timeout.into())
    }

    pub fn submitter(&self) -> Submitter<T> {
        Submitter::new(Arc::clone(&self.queue))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Applies to threads spawned by later `init` calls.
    pub fn set_stack_size(&mut self, size: Option<usize>) {
        self.config.stack_size = size;
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.state.name.write() = name.into();
    }

    pub fn name(&self) -> String {
        self.state.name.read().clone()
    }

    pub fn set_wait_timeout(&self, timeout: impl Into<WaitTimeout>) {
        self.state.set_wait_timeout(timeout.into());
    }

    pub fn wait_timeout(&self) -> WaitTimeout {
        self.state.wait_timeout()
    }

    pub fn set_max_queue_size(&self, size: usize) {
        self.queue.set_max_queue_size(size);
    }

    pub fn max_queue_size(&self) -> usize {
        self.queue.max_queue_size()
    }

    pub fn set_monitor<F>(&self, handler: F, monitor_queue_size: usize)
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.queue.set_monitor(handler, monitor_queue_size);
    }

    pub fn set_monitor_queue_size(&self, size: usize) {
        self.queue.set_monitor_queue_size(size);
    }

    pub fn monitor_queue_size(&self) -> usize {
        self.queue.monitor_queue_size()
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.queue.metrics()
    }

    /// Calls `callback` with a metrics snapshot every `interval`.
    /// Requires a tokio runtime. Cancel the returned token to stop it.
    pub fn start_monitoring<F>(&self, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(PoolMetrics) + Send + 'static,
    {
        let queue = Arc::clone(&self.queue);
        let token = CancellationToken::new();
        let token_clone = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(queue.metrics());
                    }
                    _ = token_clone.cancelled() => {
                        drop(queue);
                        break;
                    }
                }
            }
        });

        token
    }

    /// Stops the monitor task and drops its reference to the queue.
    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }

    /// Yields a metrics snapshot every `interval`.
    pub fn metrics_stream(&self, interval: Duration) -> impl Stream<Item = PoolMetrics> + Send + 'static {
        let queue = Arc::clone(&self.queue);
        stream::unfold(queue, move |queue| async move {
            tokio::time::sleep(interval).await;
            let metrics = queue.metrics();
            Some((metrics, queue))
        })
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.release();
        // A monitor holding a `Submitter` would otherwise keep the queue alive.
        self.queue.clear_monitor();
    }
}


struct Worker<T> {
    index: usize,
    queue: Arc<TaskQueue<T>>,
    state: Arc<WorkerState>,
    handlers: Handlers<T>,
}

impl<T: Send + 'static> Worker<T> {
    fn run(self) {
        let counters = self.queue.counters();
        counters.workers.fetch_add(1, Ordering::Relaxed);
        debug!(worker = self.index, mode = ?self.handlers.dispatch_mode(), "worker started");

        match (self.handlers.multi.clone(), self.handlers.single.clone()) {
            (Some(multi), _) => self.batch_loop(&multi),
            (None, Some(single)) => self.single_loop(&single),
            (None, None) => self.discard_loop(),
        }

        counters.workers.fetch_sub(1, Ordering::Relaxed);
        debug!(worker = self.index, "worker exited");
    }

    fn batch_loop(&self, handler: &MultiTaskHandler<T>) {
        while !self.state.is_shutdown() {
            match self
                .queue
                .pop_all_until(self.state.wait_timeout(), Some(&*self.state.shutdown))
            {
                Ok(mut batch) => {
                    self.queue.counters().batches.fetch_add(1, Ordering::Relaxed);
                    let size = batch.len();
                    self.invoke(size, || handler(&mut batch));
                }
                Err(err) => self.idle(err),
            }
        }
    }

    fn single_loop(&self, handler: &SingleTaskHandler<T>) {
        while !self.state.is_shutdown() {
            match self
                .queue
                .pop_one_until(self.state.wait_timeout(), Some(&*self.state.shutdown))
            {
                Ok(task) => self.invoke(1, || handler(task)),
                Err(err) => self.idle(err),
            }
        }
    }

    fn discard_loop(&self) {
        while !self.state.is_shutdown() {
            match self
                .queue
                .pop_one_until(self.state.wait_timeout(), Some(&*self.state.shutdown))
            {
                Ok(task) => {
                    drop(task);
                    self.queue.counters().completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => self.idle(err),
            }
        }
    }

    /// Runs a handler outside the queue lock, containing any panic.
    fn invoke<F: FnOnce()>(&self, tasks: usize, f: F) {
        let counters = self.queue.counters();
        counters.busy_workers.fetch_add(1, Ordering::Relaxed);
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => {
                counters.completed.fetch_add(tasks, Ordering::Relaxed);
            }
            Err(payload) => {
                counters.failed.fetch_add(tasks, Ordering::Relaxed);
                error!(
                    worker = self.index,
                    tasks,
                    panic = %panic_message(&*payload),
                    "task handler panicked"
                );
            }
        }
        counters.busy_workers.fetch_sub(1, Ordering::Relaxed);
    }

    fn idle(&self, err: PopError) {
        if self.state.is_shutdown() {
            return;
        }
        if err == PopError::Timeout {
            self.queue.counters().timeouts.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(handler) = &self.handlers.timeout {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler())) {
                error!(
                    worker = self.index,
                    panic = %panic_message(&*payload),
                    "timeout handler panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
