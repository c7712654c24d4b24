use crossbeam::utils::CachePadded;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};


/// Which end of the queue a submission lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Back,
    Front,
}

/// Consumption discipline picked once per `init` from the registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Batch,
    Single,
    Discard,
}

/// How long a pop waits for the queue to become non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    Forever,
    Poll,
    Bounded(Duration),
}

impl WaitTimeout {
    pub const DEFAULT_MS: i64 = 200;

    /// Negative waits forever, zero polls, positive waits that many milliseconds.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => WaitTimeout::Forever,
            0 => WaitTimeout::Poll,
            ms => WaitTimeout::Bounded(Duration::from_millis(ms as u64)),
        }
    }

    /// Lossless encoding for atomic storage: `u64::MAX` is `Forever`, zero is `Poll`.
    pub(crate) fn as_nanos(&self) -> u64 {
        match self {
            WaitTimeout::Forever => u64::MAX,
            WaitTimeout::Poll => 0,
            WaitTimeout::Bounded(d) => u64::try_from(d.as_nanos())
                .unwrap_or(u64::MAX - 1)
                .clamp(1, u64::MAX - 1),
        }
    }

    pub(crate) fn from_nanos(nanos: u64) -> Self {
        match nanos {
            u64::MAX => WaitTimeout::Forever,
            0 => WaitTimeout::Poll,
            n => WaitTimeout::Bounded(Duration::from_nanos(n)),
        }
    }

    pub fn as_millis(&self) -> i64 {
        match self {
            WaitTimeout::Forever => -1,
            WaitTimeout::Poll => 0,
            WaitTimeout::Bounded(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

impl Default for WaitTimeout {
    fn default() -> Self {
        WaitTimeout::from_millis(Self::DEFAULT_MS)
    }
}

impl From<Duration> for WaitTimeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            WaitTimeout::Poll
        } else {
            WaitTimeout::Bounded(d)
        }
    }
}

impl From<Option<Duration>> for WaitTimeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(WaitTimeout::Forever, WaitTimeout::from)
    }
}


#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub busy_workers: usize,
    pub queued_tasks: usize,
    pub max_queue_size: usize,
    pub total_enqueued: usize,
    pub discarded_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub batches: usize,
    pub timeouts: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.busy_workers as f64 / self.workers as f64
    }

    /// Queue depth relative to the admission ceiling.
    pub fn queue_pressure(&self) -> f64 {
        if self.max_queue_size == 0 {
            return 1.0;
        }
        self.queued_tasks as f64 / self.max_queue_size as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }

    pub fn discard_rate(&self) -> f64 {
        let offered = self.total_enqueued + self.discarded_tasks;
        if offered == 0 {
            return 0.0;
        }
        self.discarded_tasks as f64 / offered as f64
    }
}


/// Counters shared by producers, workers and monitors.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) workers: CachePadded<AtomicUsize>,
    pub(crate) busy_workers: CachePadded<AtomicUsize>,
    pub(crate) queued: CachePadded<AtomicUsize>,
    pub(crate) total_enqueued: CachePadded<AtomicUsize>,
    pub(crate) discarded: CachePadded<AtomicUsize>,
    pub(crate) completed: CachePadded<AtomicUsize>,
    pub(crate) failed: CachePadded<AtomicUsize>,
    pub(crate) batches: CachePadded<AtomicUsize>,
    pub(crate) timeouts: CachePadded<AtomicUsize>,
}

impl Counters {
    pub(crate) fn snapshot(&self, max_queue_size: usize) -> PoolMetrics {
        PoolMetrics {
            workers: self.workers.load(Ordering::Relaxed),
            busy_workers: self.busy_workers.load(Ordering::Relaxed),
            queued_tasks: self.queued.load(Ordering::Relaxed),
            max_queue_size,
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            discarded_tasks: self.discarded.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}
