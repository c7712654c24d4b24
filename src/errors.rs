/// Failures surfaced by pool lifecycle and submission calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,

    #[error("failed to spawn worker thread {index}: {reason}")]
    Spawn { index: usize, reason: String },

    /// Admission rejected: `len` tasks were queued, `discarded` were refused.
    #[error("queue full ({len} queued), discarded {discarded} task(s)")]
    QueueFull { len: usize, discarded: usize },
}

impl PoolError {
    /// Integer status used by callers that still speak return codes.
    pub fn code(&self) -> i32 {
        match self {
            PoolError::InvalidWorkerCount | PoolError::QueueFull { .. } => -1,
            PoolError::Spawn { .. } => -2,
        }
    }
}

/// Why a pop returned nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopError {
    #[error("no task arrived before the wait timeout")]
    Timeout,

    #[error("woken with an empty queue")]
    Empty,
}

impl PopError {
    pub fn code(&self) -> i32 {
        match self {
            PopError::Timeout => 1,
            PopError::Empty => 2,
        }
    }
}
