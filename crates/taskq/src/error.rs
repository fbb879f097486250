//! Error types for the task queue

use crate::task::{QueueId, TaskId, TaskState};
use thiserror::Error;

/// Errors raised by queue bookkeeping (registration, scheduling, removal)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The handle does not name a live task (never registered, or removed)
    #[error("task {0} is not registered with this queue")]
    UnknownTask(TaskId),

    /// The handle belongs to a different queue
    #[error("task {task} belongs to queue {owner}, not queue {queue}")]
    ForeignTask {
        /// Offending handle
        task: TaskId,
        /// Queue that issued the handle
        owner: QueueId,
        /// Queue the handle was presented to
        queue: QueueId,
    },

    /// A task can only be removed while it is unscheduled
    #[error("task {id} cannot be removed while {state}")]
    StillScheduled {
        /// Task that was asked to be removed
        id: TaskId,
        /// State it was found in
        state: TaskState,
    },

    /// The queue was configured with `max_tasks` and is full
    #[error("queue is full: {0} tasks registered")]
    CapacityExceeded(usize),
}

/// Failure signalled by a task's extension point.
///
/// `TaskQueue::proceed` hands this value back to its caller untouched.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task-defined failure with a message
    #[error("{0}")]
    Failed(String),

    /// Scheduling operation attempted from inside the task failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Any other error raised by the task body
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Shorthand for a [`TaskError::Failed`] with the given message
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

impl From<String> for TaskError {
    fn from(s: String) -> Self {
        TaskError::Failed(s)
    }
}

impl From<&str> for TaskError {
    fn from(s: &str) -> Self {
        TaskError::Failed(s.to_string())
    }
}

/// Errors that can occur while loading a [`QueueConfig`](crate::QueueConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}
