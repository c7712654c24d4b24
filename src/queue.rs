use super::{
    errors::{PoolError, PopError},
    handle::MonitorHandler,
    model::{Counters, Placement, PoolMetrics, WaitTimeout},
    result::PoolResult,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use tracing::trace;


pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1024;
pub const DEFAULT_MONITOR_QUEUE_SIZE: usize = 32;

/// Bounded, mutex-protected task queue with a watch threshold.
///
/// Producers never block: admission is decided under one short critical
/// section. Consumers block on a condition variable until a task arrives or
/// the wait timeout elapses. The monitor callback always runs after the lock
/// has been released, on whichever thread made the call.
pub struct TaskQueue<T> {
    tasks: Mutex<VecDeque<T>>,
    ready: Condvar,
    max_queue_size: AtomicUsize,
    monitor_queue_size: AtomicUsize,
    monitor: RwLock<Option<MonitorHandler>>,
    counters: Arc<Counters>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_QUEUE_SIZE, DEFAULT_MONITOR_QUEUE_SIZE)
    }

    pub fn with_limits(max_queue_size: usize, monitor_queue_size: usize) -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            max_queue_size: AtomicUsize::new(max_queue_size),
            monitor_queue_size: AtomicUsize::new(monitor_queue_size),
            monitor: RwLock::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn enqueue(&self, task: T, placement: Placement) -> PoolResult<()> {
        let mut tasks = self.tasks.lock();
        let len = tasks.len();
        if len >= self.max_queue_size() {
            drop(tasks);
            return Err(self.reject(len, 1));
        }

        match placement {
            Placement::Back => tasks.push_back(task),
            Placement::Front => tasks.push_front(task),
        }
        let len = tasks.len();
        self.counters.queued.store(len, Ordering::Relaxed);
        self.ready.notify_all();
        drop(tasks);

        self.counters.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.watch(len);
        Ok(())
    }

    /// All-or-nothing: the batch is admitted only if the whole of it fits.
    pub fn enqueue_batch<I>(&self, batch: I, placement: Placement) -> PoolResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        let mut incoming: VecDeque<T> = batch.into_iter().collect();
        let size = incoming.len();
        if size == 0 {
            return Ok(());
        }

        let mut tasks = self.tasks.lock();
        let len = tasks.len();
        if len.saturating_add(size) > self.max_queue_size() {
            drop(tasks);
            return Err(self.reject(len, size));
        }

        match placement {
            Placement::Back => tasks.append(&mut incoming),
            Placement::Front => {
                for task in incoming.into_iter().rev() {
                    tasks.push_front(task);
                }
            }
        }
        let len = tasks.len();
        self.counters.queued.store(len, Ordering::Relaxed);
        self.ready.notify_all();
        drop(tasks);

        self.counters.total_enqueued.fetch_add(size, Ordering::Relaxed);
        self.watch(len);
        Ok(())
    }

    pub fn pop_one(&self, timeout: WaitTimeout) -> Result<T, PopError> {
        self.pop_one_until(timeout, None)
    }

    /// Takes every queued task in one swap, leaving the queue empty.
    pub fn pop_all(&self, timeout: WaitTimeout) -> Result<VecDeque<T>, PopError> {
        self.pop_all_until(timeout, None)
    }

    pub(crate) fn pop_one_until(
        &self,
        timeout: WaitTimeout,
        stop: Option<&AtomicBool>,
    ) -> Result<T, PopError> {
        let mut tasks = self.wait_ready(timeout, stop)?;
        let task = tasks.pop_front().ok_or(PopError::Empty)?;
        self.counters.queued.store(tasks.len(), Ordering::Relaxed);
        Ok(task)
    }

    pub(crate) fn pop_all_until(
        &self,
        timeout: WaitTimeout,
        stop: Option<&AtomicBool>,
    ) -> Result<VecDeque<T>, PopError> {
        let mut tasks = self.wait_ready(timeout, stop)?;
        let batch = std::mem::take(&mut *tasks);
        self.counters.queued.store(0, Ordering::Relaxed);
        Ok(batch)
    }

    fn wait_ready(
        &self,
        timeout: WaitTimeout,
        stop: Option<&AtomicBool>,
    ) -> Result<MutexGuard<'_, VecDeque<T>>, PopError> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Ok(tasks);
        }

        let stopping = || stop.is_some_and(|s| s.load(Ordering::Acquire));
        let timed_out = match timeout {
            WaitTimeout::Poll => return Err(PopError::Timeout),
            WaitTimeout::Forever => {
                self.ready
                    .wait_while(&mut tasks, |t| t.is_empty() && !stopping());
                false
            }
            WaitTimeout::Bounded(dur) => self
                .ready
                .wait_while_for(&mut tasks, |t| t.is_empty() && !stopping(), dur)
                .timed_out(),
        };

        match (tasks.is_empty(), timed_out) {
            (false, _) => Ok(tasks),
            (true, true) => Err(PopError::Timeout),
            (true, false) => Err(PopError::Empty),
        }
    }

    /// Wakes every blocked consumer so it can re-check its stop flag.
    pub(crate) fn wake_all(&self) {
        let _tasks = self.tasks.lock();
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    pub fn set_max_queue_size(&self, size: usize) {
        self.max_queue_size.store(size, Ordering::Relaxed);
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size.load(Ordering::Relaxed)
    }

    pub fn set_monitor<F>(&self, handler: F, monitor_queue_size: usize)
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        *self.monitor.write() = Some(Arc::new(handler));
        self.set_monitor_queue_size(monitor_queue_size);
    }

    pub fn clear_monitor(&self) {
        *self.monitor.write() = None;
    }

    pub fn set_monitor_queue_size(&self, size: usize) {
        self.monitor_queue_size.store(size, Ordering::Relaxed);
    }

    pub fn monitor_queue_size(&self) -> usize {
        self.monitor_queue_size.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.counters.snapshot(self.max_queue_size())
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    fn reject(&self, len: usize, discarded: usize) -> PoolError {
        self.counters.discarded.fetch_add(discarded, Ordering::Relaxed);
        trace!(len, discarded, "queue full, rejecting submission");
        self.notify_monitor(len, discarded);
        PoolError::QueueFull { len, discarded }
    }

    fn watch(&self, len: usize) {
        if len > self.monitor_queue_size() {
            trace!(len, threshold = self.monitor_queue_size(), "queue above watch threshold");
            self.notify_monitor(len, 0);
        }
    }

    fn notify_monitor(&self, len: usize, discarded: usize) {
        let monitor = self.monitor.read().clone();
        if let Some(monitor) = monitor {
            monitor(len, discarded);
        }
    }
}
