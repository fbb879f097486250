//! The task queue and its drain loop

use crate::config::QueueConfig;
use crate::error::{QueueError, TaskError};
use crate::task::{Context, QueueId, Task, TaskId, TaskState};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(1);

/// Arena slot. `entry` is `None` while the slot is free.
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

struct Entry {
    state: TaskState,
    /// Taken out for the duration of `perform_task`
    task: Option<Box<dyn Task>>,
}

/// FIFO queue of deferred tasks, drained one bounded round at a time.
///
/// The queue owns every registered task in an arena and keeps the pending
/// order as a sequence of handles. A handle is in the sequence exactly when
/// its task is [`TaskState::Scheduled`], and at most once.
///
/// Nothing runs until the owner calls [`proceed`](TaskQueue::proceed).
pub struct TaskQueue {
    /// Identity stamped into every handle this queue issues
    id: QueueId,

    /// Task arena, indexed by `TaskId::index`
    slots: Vec<Slot>,

    /// Indices of free slots, reused LIFO
    free: Vec<u32>,

    /// Handles of scheduled tasks, in scheduling order
    tasks: VecDeque<TaskId>,

    /// Number of occupied slots
    registered: usize,

    config: QueueConfig,
}

impl TaskQueue {
    /// Create an empty queue with the default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create an empty queue with the given configuration
    pub fn with_config(config: QueueConfig) -> Self {
        let capacity = config.initial_capacity;
        Self {
            id: QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed)),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            tasks: VecDeque::with_capacity(capacity),
            registered: 0,
            config,
        }
    }

    /// Identity of this queue
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Configuration this queue was built with
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Register a task. It starts [`TaskState::Unscheduled`].
    pub fn insert<T: Task + 'static>(&mut self, task: T) -> Result<TaskId, QueueError> {
        self.insert_boxed(Box::new(task))
    }

    /// Register an already boxed task
    pub fn insert_boxed(&mut self, task: Box<dyn Task>) -> Result<TaskId, QueueError> {
        if let Some(max) = self.config.max_tasks {
            if self.registered >= max {
                return Err(QueueError::CapacityExceeded(self.registered));
            }
        }

        let entry = Entry {
            state: TaskState::Unscheduled,
            task: Some(task),
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].entry = Some(entry);
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                index
            }
        };
        self.registered += 1;

        Ok(TaskId {
            queue: self.id,
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Unregister a task and hand it back.
    ///
    /// Only unscheduled tasks can be removed; a scheduled task would leave a
    /// dangling handle in the pending sequence.
    pub fn remove(&mut self, id: TaskId) -> Result<Box<dyn Task>, QueueError> {
        let state = self.entry(id)?.state;
        if state != TaskState::Unscheduled {
            return Err(QueueError::StillScheduled { id, state });
        }

        let slot = &mut self.slots[id.index as usize];
        let entry = slot.entry.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.registered -= 1;

        match entry.and_then(|e| e.task) {
            Some(task) => Ok(task),
            None => Err(QueueError::UnknownTask(id)),
        }
    }

    /// Schedule a task for the next round.
    ///
    /// Idempotent: a task that is already scheduled keeps its place.
    ///
    /// A panic in a task's extension point is not recoverable for that task:
    /// its object is lost and its slot stays `Executing` for good, even if it
    /// had rescheduled itself before panicking. Scheduling it again is a
    /// no-op and it can never be removed.
    pub fn schedule(&mut self, id: TaskId) -> Result<(), QueueError> {
        if self.entry(id)?.task.is_some() {
            self.enqueue(id);
        }
        Ok(())
    }

    /// Append a validated handle unless it is already queued
    pub(crate) fn enqueue(&mut self, id: TaskId) {
        let Some(entry) = self.slots[id.index as usize].entry.as_mut() else {
            return;
        };
        if entry.state == TaskState::Scheduled {
            return;
        }
        entry.state = TaskState::Scheduled;
        self.tasks.push_back(id);
    }

    /// Current scheduling state of a task
    pub fn state(&self, id: TaskId) -> Result<TaskState, QueueError> {
        Ok(self.entry(id)?.state)
    }

    /// True iff the task is waiting in the queue.
    ///
    /// A task whose extension point is running is not scheduled. Unknown
    /// handles report `false`.
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        matches!(self.state(id), Ok(TaskState::Scheduled))
    }

    /// True iff no task is waiting
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks waiting
    pub fn outstanding_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Number of registered tasks, scheduled or not
    pub fn task_count(&self) -> usize {
        self.registered
    }

    /// Run one round.
    ///
    /// Executes exactly the tasks that were waiting when the call started, in
    /// FIFO order. Anything scheduled while the round runs, including a task
    /// rescheduling itself, waits for the next call. Returns how many tasks
    /// ran.
    ///
    /// If a task fails, its error is returned unchanged and the tasks it
    /// would have been followed by stay queued.
    pub fn proceed(&mut self) -> Result<usize, TaskError> {
        let round = self.tasks.len();
        if round == 0 {
            return Ok(0);
        }
        tracing::debug!(queue = %self.id, round, "proceed");

        let mut executed = 0;
        for _ in 0..round {
            let Some(id) = self.tasks.pop_front() else {
                break;
            };
            let Some(mut task) = self.begin(id) else {
                tracing::warn!(task = %id, "skipping task lost to an earlier panic");
                continue;
            };

            tracing::trace!(task = %id, kind = task.name(), "perform_task");
            let result = task.perform_task(&mut Context::new(self, id));
            self.finish(id, task);
            executed += 1;

            if let Err(err) = result {
                tracing::debug!(
                    task = %id,
                    error = %err,
                    pending = self.tasks.len(),
                    "task failed, round interrupted"
                );
                return Err(err);
            }
        }

        Ok(executed)
    }

    /// Move a dequeued task into `Executing` and take it out of its slot
    fn begin(&mut self, id: TaskId) -> Option<Box<dyn Task>> {
        let entry = self.entry_mut(id).ok()?;
        debug_assert_eq!(entry.state, TaskState::Scheduled);
        entry.state = TaskState::Executing;
        entry.task.take()
    }

    /// Put the task back; it stays scheduled only if it rescheduled itself
    fn finish(&mut self, id: TaskId, task: Box<dyn Task>) {
        if let Ok(entry) = self.entry_mut(id) {
            if entry.state == TaskState::Executing {
                entry.state = TaskState::Unscheduled;
            }
            entry.task = Some(task);
        }
    }

    fn check(&self, id: TaskId) -> Result<(), QueueError> {
        if id.queue != self.id {
            return Err(QueueError::ForeignTask {
                task: id,
                owner: id.queue,
                queue: self.id,
            });
        }
        Ok(())
    }

    fn entry(&self, id: TaskId) -> Result<&Entry, QueueError> {
        self.check(id)?;
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(QueueError::UnknownTask(id))
    }

    fn entry_mut(&mut self, id: TaskId) -> Result<&mut Entry, QueueError> {
        self.check(id)?;
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(QueueError::UnknownTask(id))
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            tracing::warn!(
                queue = %self.id,
                pending = self.tasks.len(),
                "task queue dropped with scheduled tasks"
            );
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("id", &self.id)
            .field("registered", &self.registered)
            .field("pending", &self.tasks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::from_fn;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recorder(log: &Log, name: &'static str) -> impl Task + 'static {
        let log = log.clone();
        from_fn(move |_cx| {
            log.borrow_mut().push(name);
            Ok(())
        })
    }

    /// Scheduled-state count must match the sequence, with no duplicates
    fn assert_consistent(queue: &TaskQueue) {
        let scheduled = queue
            .slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .filter(|entry| entry.state == TaskState::Scheduled)
            .count();
        assert_eq!(scheduled, queue.outstanding_tasks());
        assert_eq!(queue.is_idle(), scheduled == 0);

        let mut seen = queue.tasks.iter().collect::<Vec<_>>();
        seen.sort_by_key(|id| id.index);
        seen.dedup();
        assert_eq!(seen.len(), queue.tasks.len());
    }

    #[test]
    fn test_new_queue_is_idle() {
        let queue = TaskQueue::new();
        assert!(queue.is_idle());
        assert_eq!(queue.outstanding_tasks(), 0);
        assert_eq!(queue.task_count(), 0);
    }

    #[test]
    fn test_queue_ids_are_unique() {
        let a = TaskQueue::new();
        let b = TaskQueue::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_insert_starts_unscheduled() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let id = queue.insert(recorder(&log, "a")).unwrap();

        assert_eq!(queue.state(id).unwrap(), TaskState::Unscheduled);
        assert!(!queue.is_scheduled(id));
        assert!(queue.is_idle());
        assert_eq!(queue.task_count(), 1);
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let id = queue.insert(recorder(&log, "a")).unwrap();

        queue.schedule(id).unwrap();
        queue.schedule(id).unwrap();
        assert_eq!(queue.outstanding_tasks(), 1);
        assert_consistent(&queue);

        assert_eq!(queue.proceed().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_proceed_on_empty_queue() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.proceed().unwrap(), 0);
    }

    #[test]
    fn test_state_is_executing_inside_perform_task() {
        let seen = Rc::new(RefCell::new(None));
        let mut queue = TaskQueue::new();
        let record = seen.clone();
        let id = queue
            .insert(from_fn(move |cx| {
                *record.borrow_mut() = Some((cx.state(cx.id())?, cx.is_scheduled()));
                Ok(())
            }))
            .unwrap();

        queue.schedule(id).unwrap();
        queue.proceed().unwrap();

        assert_eq!(*seen.borrow(), Some((TaskState::Executing, false)));
        assert_eq!(queue.state(id).unwrap(), TaskState::Unscheduled);
    }

    #[test]
    fn test_reschedule_twice_in_one_execution() {
        let mut queue = TaskQueue::new();
        let id = queue
            .insert(from_fn(|cx| {
                cx.reschedule();
                cx.reschedule();
                let me = cx.id();
                cx.schedule(me)?;
                Ok(())
            }))
            .unwrap();

        queue.schedule(id).unwrap();
        assert_eq!(queue.proceed().unwrap(), 1);
        assert_eq!(queue.outstanding_tasks(), 1);
        assert_eq!(queue.state(id).unwrap(), TaskState::Scheduled);
        assert_consistent(&queue);
    }

    #[test]
    fn test_remove_requires_unscheduled() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let id = queue.insert(recorder(&log, "a")).unwrap();
        queue.schedule(id).unwrap();

        let Err(err) = queue.remove(id) else {
            panic!("scheduled task was removed");
        };
        assert_eq!(
            err,
            QueueError::StillScheduled {
                id,
                state: TaskState::Scheduled
            }
        );

        queue.proceed().unwrap();
        assert!(queue.remove(id).is_ok());
        assert_eq!(queue.task_count(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let old = queue.insert(recorder(&log, "old")).unwrap();
        queue.remove(old).unwrap();

        let new = queue.insert(recorder(&log, "new")).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);

        assert_eq!(queue.schedule(old), Err(QueueError::UnknownTask(old)));
        assert!(queue.remove(old).is_err());
        assert!(!queue.is_scheduled(old));

        queue.schedule(new).unwrap();
        queue.proceed().unwrap();
        assert_eq!(*log.borrow(), vec!["new"]);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let log = Log::default();
        let mut first = TaskQueue::new();
        let mut second = TaskQueue::new();
        let id = first.insert(recorder(&log, "a")).unwrap();

        let err = second.schedule(id).unwrap_err();
        assert_eq!(
            err,
            QueueError::ForeignTask {
                task: id,
                owner: first.id(),
                queue: second.id(),
            }
        );
        assert!(second.is_idle());
    }

    #[test]
    fn test_max_tasks_enforced() {
        let log = Log::default();
        let mut queue = TaskQueue::with_config(QueueConfig {
            max_tasks: Some(2),
            ..QueueConfig::default()
        });
        let a = queue.insert(recorder(&log, "a")).unwrap();
        queue.insert(recorder(&log, "b")).unwrap();

        assert_eq!(
            queue.insert(recorder(&log, "c")).unwrap_err(),
            QueueError::CapacityExceeded(2)
        );

        queue.remove(a).unwrap();
        assert!(queue.insert(recorder(&log, "c")).is_ok());
    }

    #[test]
    fn test_task_inserted_during_round_runs_next_round() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let inner_log = log.clone();
        let spawner = queue
            .insert(from_fn(move |cx| {
                inner_log.borrow_mut().push("spawner");
                let child = cx.insert(recorder(&inner_log, "child"))?;
                cx.schedule(child)?;
                Ok(())
            }))
            .unwrap();

        queue.schedule(spawner).unwrap();
        assert_eq!(queue.proceed().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["spawner"]);
        assert_eq!(queue.outstanding_tasks(), 1);
        assert_eq!(queue.task_count(), 2);

        assert_eq!(queue.proceed().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["spawner", "child"]);
        assert_consistent(&queue);
    }

    #[test]
    fn test_failure_keeps_rest_of_round_queued() {
        let log = Log::default();
        let mut queue = TaskQueue::new();
        let a = queue.insert(recorder(&log, "a")).unwrap();
        let bad = queue
            .insert(from_fn(|_cx| Err(TaskError::failed("boom"))))
            .unwrap();
        let c = queue.insert(recorder(&log, "c")).unwrap();
        for id in [a, bad, c] {
            queue.schedule(id).unwrap();
        }

        let err = queue.proceed().unwrap_err();
        assert!(matches!(err, TaskError::Failed(ref msg) if msg == "boom"));
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(queue.state(bad).unwrap(), TaskState::Unscheduled);
        assert!(queue.is_scheduled(c));
        assert_consistent(&queue);

        assert_eq!(queue.proceed().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["a", "c"]);
    }

    #[test]
    fn test_task_lost_to_panic_after_reschedule() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut queue = TaskQueue::new();
        let id = queue
            .insert(from_fn(|cx| {
                cx.reschedule();
                panic!("task blew up");
            }))
            .unwrap();
        let other = queue.insert(from_fn(|_cx| Ok(()))).unwrap();

        queue.schedule(id).unwrap();
        assert!(catch_unwind(AssertUnwindSafe(|| queue.proceed())).is_err());
        assert_eq!(queue.outstanding_tasks(), 1);

        queue.schedule(other).unwrap();
        assert_eq!(queue.proceed().unwrap(), 1);
        assert!(queue.is_idle());
        assert_eq!(queue.state(id).unwrap(), TaskState::Executing);

        queue.schedule(id).unwrap();
        assert!(queue.is_idle());
        assert!(matches!(
            queue.remove(id),
            Err(QueueError::StillScheduled { .. })
        ));
    }
}
