//! Worker-thread pool over a bounded task queue
//!
//! # Features
//! - Bounded queue with all-or-nothing batch admission
//! - Single-task or whole-queue batch dispatch, chosen at `init`
//! - Timeout handler for idle periods
//! - Backpressure monitor on overflow and past a watch threshold
//! - Cooperative shutdown; queued tasks survive `release`
//! - Handler panics contained per worker, counted in metrics

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod queue;
pub mod result;

pub use errors::{PoolError, PopError};
pub use handle::{Handlers, Submitter};
pub use model::{DispatchMode, Placement, PoolMetrics, WaitTimeout};
pub use pool::{Config, SharedPool, WorkerPool};
pub use queue::TaskQueue;
pub use result::PoolResult;
