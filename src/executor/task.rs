//! Task definitions for the executor.
//!
//! A task is a boxed unit of work plus an identity and a lazy tag. The
//! queue owns it after enqueue; the worker owns it after dequeue; the
//! executor never mutates it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Thread-safe generator for task IDs.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new generator starting at zero.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// A unit of work queued for serial execution.
///
/// The lazy tag marks a task that need not wake an idle worker on its own;
/// it still runs exactly once, either when a non-lazy task wakes the worker
/// or when shutdown drains the queue.
pub struct Task {
    /// Unique task ID.
    id: TaskId,
    /// Whether this task may wait for a non-lazy wakeup.
    lazy: bool,
    /// The actual work to execute.
    body: Box<dyn FnOnce() + Send>,
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("lazy", &self.lazy)
            .finish()
    }
}

impl Task {
    /// Create a new non-lazy task.
    pub fn new<F>(
        id: TaskId,
        body: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_laziness(id, false, body)
    }

    /// Create a task with an explicit lazy tag.
    pub fn with_laziness<F>(
        id: TaskId,
        lazy: bool,
        body: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            lazy,
            body: Box::new(body),
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether this task carries the lazy tag.
    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Run the task to completion, consuming it.
    #[inline]
    pub fn run(self) {
        (self.body)();
    }
}
