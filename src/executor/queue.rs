//! Task queue and admission policy.
//!
//! A FIFO queue shared between many producers and the single worker.
//! Submission order is execution order, laziness included; the lazy tag
//! only changes the wake discipline: a non-lazy push signals the worker's
//! condvar, a lazy push does not, so an idle worker is never woken solely
//! for a lazy task. Shutdown raises an explicit wake signal the take loop
//! observes even when the queue is empty.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::task::{Task, TaskId};
use crate::error::{ExecutorError, Result};

/// Result of a blocking take.
#[derive(Debug)]
pub enum Take {
    /// A task was dequeued.
    Task(Task),
    /// A wake signal was observed with no task available.
    Signal,
    /// The deadline passed with no task and no signal.
    TimedOut,
}

struct QueueInner {
    deque: VecDeque<Task>,
    /// Pending wake signal (raised by shutdown).
    signal: bool,
    /// Set once the executor stops admitting work; unblocks producers
    /// parked in `push_blocking`.
    closed: bool,
}

/// Multi-producer, single-consumer FIFO task queue with an optional bound.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    /// Signalled when a non-lazy task or a wake signal becomes available.
    available: Condvar,
    /// Signalled when a slot frees up in a bounded queue.
    vacancy: Condvar,
    capacity: Option<usize>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl TaskQueue {
    /// Create a queue, unbounded when `capacity` is `None`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                deque: VecDeque::new(),
                signal: false,
                closed: false,
            }),
            available: Condvar::new(),
            vacancy: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a task, or hand it back when the queue is full.
    pub fn offer(
        &self,
        task: Task,
    ) -> std::result::Result<(), Task> {
        let mut inner = self.inner.lock();
        if let Some(cap) = self.capacity {
            if inner.deque.len() >= cap {
                return Err(task);
            }
        }
        let lazy = task.is_lazy();
        inner.deque.push_back(task);
        if !lazy {
            self.available.notify_one();
        }
        Ok(())
    }

    /// Enqueue a task, blocking the caller until a slot frees up.
    /// Returns `false` if the queue closed while waiting.
    pub fn push_blocking(
        &self,
        task: Task,
    ) -> bool {
        let mut inner = self.inner.lock();
        if let Some(cap) = self.capacity {
            while inner.deque.len() >= cap {
                if inner.closed {
                    return false;
                }
                self.vacancy.wait(&mut inner);
            }
        }
        if inner.closed {
            return false;
        }
        let lazy = task.is_lazy();
        inner.deque.push_back(task);
        if !lazy {
            self.available.notify_one();
        }
        true
    }

    /// Dequeue the next task, blocking until one is available, a wake
    /// signal is raised, or the optional `timeout` elapses.
    pub fn take(
        &self,
        timeout: Option<Duration>,
    ) -> Take {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock();
        loop {
            if let Some(task) = inner.deque.pop_front() {
                self.vacancy.notify_one();
                return Take::Task(task);
            }
            if inner.signal {
                inner.signal = false;
                return Take::Signal;
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .available
                        .wait_until(&mut inner, deadline)
                        .timed_out()
                    {
                        return Take::TimedOut;
                    }
                }
                None => self.available.wait(&mut inner),
            }
        }
    }

    /// Dequeue the next task without blocking.
    pub fn poll(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let task = inner.deque.pop_front();
        if task.is_some() {
            self.vacancy.notify_one();
        }
        task
    }

    /// Remove a queued task by ID. Used to revoke a submission that raced
    /// with the shutdown transition.
    pub fn remove(
        &self,
        id: TaskId,
    ) -> bool {
        let mut inner = self.inner.lock();
        if let Some(index) = inner.deque.iter().position(|task| task.id() == id) {
            inner.deque.remove(index);
            self.vacancy.notify_one();
            true
        } else {
            false
        }
    }

    /// Raise the wake signal and unblock the worker and any parked
    /// producers. Called when shutdown is requested.
    pub fn wake(&self) {
        let mut inner = self.inner.lock();
        inner.signal = true;
        inner.closed = true;
        self.available.notify_all();
        self.vacancy.notify_all();
    }

    /// Drop all remaining tasks, returning how many there were. Their
    /// promises complete with an abandonment error as they drop.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.deque.len();
        inner.deque.clear();
        if dropped > 0 {
            self.vacancy.notify_all();
        }
        dropped
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().deque.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().deque.is_empty()
    }

    /// The configured bound, if any.
    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// What became of a task handed to a [`RejectionPolicy`].
#[derive(Debug)]
pub enum Admitted {
    /// The policy found room in the queue after all.
    Queued,
    /// The task must run inline on the submitting thread.
    RunOnCaller(Task),
}

/// Decides the fate of a task submitted while the queue is full.
pub trait RejectionPolicy: Send + Sync {
    /// Called with the rejected task and the full queue.
    fn on_full(
        &self,
        task: Task,
        queue: &TaskQueue,
    ) -> Result<Admitted>;
}

/// Fail the submission immediately with `RejectedExecution`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortPolicy;

impl RejectionPolicy for AbortPolicy {
    fn on_full(
        &self,
        _task: Task,
        queue: &TaskQueue,
    ) -> Result<Admitted> {
        Err(ExecutorError::rejected(format!(
            "task queue full ({} pending)",
            queue.len()
        )))
    }
}

/// Block the submitting thread until a slot frees up.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockPolicy;

impl RejectionPolicy for BlockPolicy {
    fn on_full(
        &self,
        task: Task,
        queue: &TaskQueue,
    ) -> Result<Admitted> {
        if queue.push_blocking(task) {
            Ok(Admitted::Queued)
        } else {
            Err(ExecutorError::rejected("executor is shutting down"))
        }
    }
}

/// Run the task inline on the submitting thread as a fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerRunsPolicy;

impl RejectionPolicy for CallerRunsPolicy {
    fn on_full(
        &self,
        task: Task,
        _queue: &TaskQueue,
    ) -> Result<Admitted> {
        Ok(Admitted::RunOnCaller(task))
    }
}
