//! Promise/Future pair for asynchronous task outcomes.
//!
//! [`Promise`] is the write half: the worker completes it exactly once with
//! a value or an error. [`Future`] is the read half: any number of observers
//! may block on it, poll it or attach listeners, and all of them see the
//! same outcome. The outcome itself lives in a write-once cell; the condvar
//! only coordinates blocked waiters and pending listeners.

pub mod progress;

pub use progress::ProgressivePromise;

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::error::{ExecutorError, Result};

/// Outcome of one task: its value or the error that felled it.
pub type Outcome<T> = std::result::Result<T, ExecutorError>;

type Listener<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

/// State shared between the two halves and all future clones.
struct Shared<T> {
    /// Write-once terminal outcome.
    outcome: OnceCell<Outcome<T>>,
    /// Listeners registered before completion.
    listeners: Mutex<SmallVec<[Listener<T>; 2]>>,
    /// Wakes threads blocked in `wait`.
    done: Condvar,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Self {
            outcome: OnceCell::new(),
            listeners: Mutex::new(SmallVec::new()),
            done: Condvar::new(),
        }
    }

    fn with_outcome(outcome: Outcome<T>) -> Self {
        Self {
            outcome: OnceCell::with_value(outcome),
            listeners: Mutex::new(SmallVec::new()),
            done: Condvar::new(),
        }
    }

    /// Install the terminal outcome, wake waiters and run listeners on the
    /// calling thread. Fails if a terminal outcome is already set.
    fn finish(
        &self,
        outcome: Outcome<T>,
    ) -> Result<()> {
        if self.outcome.set(outcome).is_err() {
            return Err(ExecutorError::illegal_state("promise already completed"));
        }
        let pending = {
            let mut listeners = self.listeners.lock();
            self.done.notify_all();
            std::mem::take(&mut *listeners)
        };
        if let Some(outcome) = self.outcome.get() {
            for listener in pending {
                listener(outcome);
            }
        }
        Ok(())
    }
}

/// Write half of a task outcome. Completing twice is a caller bug and
/// fails with [`ExecutorError::IllegalState`].
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Create a new, pending promise.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Obtain a read half observing this promise.
    pub fn future(&self) -> Future<T> {
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Complete with a value. Listeners run on the calling thread.
    pub fn complete(
        &self,
        value: T,
    ) -> Result<()> {
        self.shared.finish(Ok(value))
    }

    /// Complete with an error. Listeners run on the calling thread.
    pub fn complete_err(
        &self,
        error: ExecutorError,
    ) -> Result<()> {
        self.shared.finish(Err(error))
    }

    /// Whether a terminal outcome has been set.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.outcome.get().is_some()
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        // A promise abandoned without completion would strand its waiters;
        // surface the abandonment as an error instead.
        if !self.is_done() {
            let _ = self
                .shared
                .finish(Err(ExecutorError::illegal_state(
                    "promise dropped before completion",
                )));
        }
    }
}

/// Read half of a task outcome. Cheap to clone; all clones observe the
/// same outcome.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Future<T> {
    /// An already-succeeded future holding `value`.
    pub fn succeeded(value: T) -> Self {
        Self {
            shared: Arc::new(Shared::with_outcome(Ok(value))),
        }
    }

    /// An already-failed future holding `error`.
    pub fn failed(error: ExecutorError) -> Self {
        Self {
            shared: Arc::new(Shared::with_outcome(Err(error))),
        }
    }

    /// Whether a terminal outcome has been set.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.shared.outcome.get().is_some()
    }

    /// The outcome, if terminal. Never blocks.
    #[inline]
    pub fn result(&self) -> Option<&Outcome<T>> {
        self.shared.outcome.get()
    }

    /// Block until the outcome is terminal and return it.
    pub fn wait(&self) -> &Outcome<T> {
        if let Some(outcome) = self.shared.outcome.get() {
            return outcome;
        }
        let mut listeners = self.shared.listeners.lock();
        loop {
            if let Some(outcome) = self.shared.outcome.get() {
                return outcome;
            }
            self.shared.done.wait(&mut listeners);
        }
    }

    /// Block for at most `timeout`; `None` if still pending afterwards.
    pub fn wait_timeout(
        &self,
        timeout: Duration,
    ) -> Option<&Outcome<T>> {
        if let Some(outcome) = self.shared.outcome.get() {
            return Some(outcome);
        }
        let deadline = Instant::now() + timeout;
        let mut listeners = self.shared.listeners.lock();
        loop {
            if let Some(outcome) = self.shared.outcome.get() {
                return Some(outcome);
            }
            if self
                .shared
                .done
                .wait_until(&mut listeners, deadline)
                .timed_out()
            {
                return self.shared.outcome.get();
            }
        }
    }

    /// Register a callback invoked exactly once with the outcome.
    ///
    /// If the future is already terminal the callback runs inline on the
    /// calling thread; otherwise it runs on the thread that completes the
    /// promise, after the outcome is visible.
    pub fn add_listener<F>(
        &self,
        listener: F,
    ) where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let mut listeners = self.shared.listeners.lock();
        if let Some(outcome) = self.shared.outcome.get() {
            drop(listeners);
            listener(outcome);
            return;
        }
        listeners.push(Box::new(listener));
    }

    /// Whether `self` and `other` observe the same underlying promise.
    #[inline]
    pub fn ptr_eq(
        &self,
        other: &Future<T>,
    ) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests;
