use super::{
    model::{DispatchMode, Placement, PoolMetrics},
    queue::TaskQueue,
    result::PoolResult,
};
use std::{
    collections::VecDeque,
    fmt,
    sync::Arc,
};


pub type SingleTaskHandler<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;
pub type MultiTaskHandler<T> = Arc<dyn Fn(&mut VecDeque<T>) + Send + Sync + 'static>;
pub type TimeoutHandler = Arc<dyn Fn() + Send + Sync + 'static>;
/// Called with `(current_queue_len, discarded)`.
pub type MonitorHandler = Arc<dyn Fn(usize, usize) + Send + Sync + 'static>;


/// Callbacks installed into worker threads at `init`.
///
/// A batch handler takes priority over a single-task handler; with neither,
/// workers pop and drop tasks.
pub struct Handlers<T> {
    pub(crate) single: Option<SingleTaskHandler<T>>,
    pub(crate) multi: Option<MultiTaskHandler<T>>,
    pub(crate) timeout: Option<TimeoutHandler>,
}

impl<T> Handlers<T> {
    pub fn new() -> Self {
        Self {
            single: None,
            multi: None,
            timeout: None,
        }
    }

    pub fn on_task<F>(mut self, handler: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.single = Some(Arc::new(handler));
        self
    }

    pub fn on_batch<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut VecDeque<T>) + Send + Sync + 'static,
    {
        self.multi = Some(Arc::new(handler));
        self
    }

    pub fn on_timeout<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.timeout = Some(Arc::new(handler));
        self
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        match (&self.multi, &self.single) {
            (Some(_), _) => DispatchMode::Batch,
            (None, Some(_)) => DispatchMode::Single,
            (None, None) => DispatchMode::Discard,
        }
    }
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Handlers<T> {
    fn clone(&self) -> Self {
        Self {
            single: self.single.clone(),
            multi: self.multi.clone(),
            timeout: self.timeout.clone(),
        }
    }
}

impl<T> fmt::Debug for Handlers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("mode", &self.dispatch_mode())
            .field("timeout", &self.timeout.is_some())
            .finish()
    }
}


/// Cloneable producer handle onto a pool's queue.
///
/// Handlers can hold one to feed tasks back into the pool that runs them.
pub struct Submitter<T> {
    queue: Arc<TaskQueue<T>>,
}

impl<T> Submitter<T> {
    pub(crate) fn new(queue: Arc<TaskQueue<T>>) -> Self {
        Self { queue }
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

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.queue.metrics()
    }
}

impl<T> Clone for Submitter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}
