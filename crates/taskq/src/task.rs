//! Task handles, scheduling state and the extension point

use crate::error::{QueueError, TaskError};
use crate::queue::TaskQueue;
use std::fmt;

/// Identifies one [`TaskQueue`] instance.
///
/// Every handle issued by a queue carries its `QueueId`, which is how a task
/// stays bound to the queue it was registered with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct QueueId(pub(crate) u32);

impl QueueId {
    /// Get the numeric ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Handle to a task registered with a [`TaskQueue`].
///
/// Handles are generational: once a task is removed its slot may be reused,
/// and the stale handle is rejected instead of aliasing the new occupant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub(crate) queue: QueueId,
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl TaskId {
    /// Queue this task is bound to
    pub fn queue(self) -> QueueId {
        self.queue
    }

    /// Arena slot index
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/t{}.{}", self.queue, self.index, self.generation)
    }
}

/// Scheduling state of a task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// Not queued; the only state in which a task may be removed
    #[default]
    Unscheduled,
    /// Queued, will run on a future `proceed()`
    Scheduled,
    /// Its extension point is running right now
    Executing,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Unscheduled => "unscheduled",
            TaskState::Scheduled => "scheduled",
            TaskState::Executing => "executing",
        };
        f.write_str(s)
    }
}

/// Deferred unit of work.
///
/// Implementors provide [`perform_task`](Task::perform_task), which the owning
/// queue invokes once per scheduling. The task is not scheduled again unless
/// something calls `schedule` for it, including the task itself through
/// [`Context::reschedule`].
pub trait Task {
    /// Run the deferred work.
    ///
    /// An `Err` aborts the current round and is returned from
    /// [`TaskQueue::proceed`] as is.
    fn perform_task(&mut self, cx: &mut Context<'_>) -> Result<(), TaskError>;

    /// Name used in log events
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn perform_task(&mut self, cx: &mut Context<'_>) -> Result<(), TaskError> {
        (**self).perform_task(cx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Task backed by a closure, see [`from_fn`]
pub struct FromFn<F> {
    f: F,
}

/// Build a task from a closure.
///
/// ```ignore
/// let id = queue.insert(taskq::from_fn(|cx| {
///     cx.reschedule();
///     Ok(())
/// }))?;
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut Context<'_>) -> Result<(), TaskError>,
{
    FromFn { f }
}

impl<F> Task for FromFn<F>
where
    F: FnMut(&mut Context<'_>) -> Result<(), TaskError>,
{
    fn perform_task(&mut self, cx: &mut Context<'_>) -> Result<(), TaskError> {
        (self.f)(cx)
    }

    fn name(&self) -> &str {
        "from_fn"
    }
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

/// View of the owning queue handed to a running task.
///
/// Everything a task may legitimately do to its queue goes through here:
/// scheduling itself or other tasks, registering new tasks and querying
/// state. `proceed()` is not reachable from here, so a running task cannot
/// re-enter the drain loop.
pub struct Context<'a> {
    queue: &'a mut TaskQueue,
    current: TaskId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(queue: &'a mut TaskQueue, current: TaskId) -> Self {
        Self { queue, current }
    }

    /// Handle of the running task
    pub fn id(&self) -> TaskId {
        self.current
    }

    /// Queue the running task belongs to
    pub fn queue_id(&self) -> QueueId {
        self.queue.id()
    }

    /// Schedule the running task again, for the next round.
    ///
    /// Calling this more than once during one execution has no further effect.
    pub fn reschedule(&mut self) {
        self.queue.enqueue(self.current);
    }

    /// True if the running task has rescheduled itself during this execution
    pub fn is_scheduled(&self) -> bool {
        self.queue.is_scheduled(self.current)
    }

    /// Schedule any task of the owning queue (including the running one)
    pub fn schedule(&mut self, id: TaskId) -> Result<(), QueueError> {
        if id == self.current {
            self.reschedule();
            return Ok(());
        }
        self.queue.schedule(id)
    }

    /// Register a new task with the owning queue. It starts unscheduled.
    pub fn insert<T: Task + 'static>(&mut self, task: T) -> Result<TaskId, QueueError> {
        self.queue.insert(task)
    }

    /// State of a task of the owning queue
    pub fn state(&self, id: TaskId) -> Result<TaskState, QueueError> {
        self.queue.state(id)
    }

    /// Number of tasks waiting for a later round
    pub fn outstanding_tasks(&self) -> usize {
        self.queue.outstanding_tasks()
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("queue", &self.queue.id())
            .field("current", &self.current)
            .finish()
    }
}
