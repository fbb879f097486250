//! taskq - cooperative deferred-work queue
//!
//! A [`TaskQueue`] holds tasks that are run only when the owner calls
//! [`TaskQueue::proceed`]. There are no threads, timers or wakers involved:
//! latency-sensitive code registers continuations cheaply and drains them at
//! a point of its own choosing, typically once per iteration of a poll loop.
//!
//! Each `proceed()` call runs one bounded round: the tasks that were waiting
//! when the call started, in FIFO order. Work scheduled during the round,
//! including a task rescheduling itself, is left for the next call, so a task
//! that keeps rescheduling itself cannot starve the others or stall the
//! caller.
//!
//! # Example
//!
//! ```ignore
//! use taskq::{from_fn, TaskQueue};
//!
//! let mut queue = TaskQueue::new();
//! let mut polls = 0;
//! let id = queue.insert(from_fn(move |cx| {
//!     polls += 1;
//!     if polls < 3 {
//!         cx.reschedule();
//!     }
//!     Ok(())
//! }))?;
//!
//! queue.schedule(id)?;
//! while !queue.is_idle() {
//!     queue.proceed()?;
//! }
//! queue.remove(id)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod config;
mod error;
mod queue;
mod task;

pub use config::QueueConfig;
pub use error::{ConfigError, QueueError, TaskError};
pub use queue::TaskQueue;
pub use task::{from_fn, Context, FromFn, QueueId, Task, TaskId, TaskState};
