//! Progressive promise: intermediate progress before the terminal outcome.
//!
//! Progress is a `(done, total)` pair. Values are non-decreasing and can
//! never be reported after the promise reached a terminal state.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::{Future, Promise};
use crate::error::{ExecutorError, Result};

type ProgressListener = Box<dyn FnMut(u64, u64) + Send>;

/// Mutable progress state behind one lock.
struct ProgressState {
    done: u64,
    total: u64,
    listeners: SmallVec<[ProgressListener; 2]>,
}

/// A [`Promise`] that additionally reports monotonic progress events.
pub struct ProgressivePromise<T> {
    promise: Promise<T>,
    progress: Arc<Mutex<ProgressState>>,
}

impl<T> ProgressivePromise<T> {
    /// Create a new, pending progressive promise.
    pub fn new() -> Self {
        Self {
            promise: Promise::new(),
            progress: Arc::new(Mutex::new(ProgressState {
                done: 0,
                total: 0,
                listeners: SmallVec::new(),
            })),
        }
    }

    /// Obtain a read half observing the terminal outcome.
    pub fn future(&self) -> Future<T> {
        self.promise.future()
    }

    /// Report progress. `done` must not decrease, must not exceed `total`,
    /// and must not arrive after a terminal state has been set.
    pub fn set_progress(
        &self,
        done: u64,
        total: u64,
    ) -> Result<()> {
        if self.promise.is_done() {
            return Err(ExecutorError::illegal_state(
                "progress reported after completion",
            ));
        }
        if done > total {
            return Err(ExecutorError::illegal_state(format!(
                "progress {done} exceeds total {total}"
            )));
        }
        let mut state = self.progress.lock();
        if done < state.done {
            return Err(ExecutorError::illegal_state(format!(
                "progress went backwards: {done} < {}",
                state.done
            )));
        }
        state.done = done;
        state.total = total;
        // Notify under the lock so events are observed in order.
        let ProgressState {
            done,
            total,
            listeners,
        } = &mut *state;
        for listener in listeners.iter_mut() {
            listener(*done, *total);
        }
        Ok(())
    }

    /// Current `(done, total)` progress.
    pub fn progress(&self) -> (u64, u64) {
        let state = self.progress.lock();
        (state.done, state.total)
    }

    /// Register a callback invoked for every subsequent progress event.
    pub fn add_progress_listener<F>(
        &self,
        listener: F,
    ) where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.progress.lock().listeners.push(Box::new(listener));
    }

    /// Complete with a value. See [`Promise::complete`].
    pub fn complete(
        &self,
        value: T,
    ) -> Result<()> {
        self.promise.complete(value)
    }

    /// Complete with an error. See [`Promise::complete_err`].
    pub fn complete_err(
        &self,
        error: ExecutorError,
    ) -> Result<()> {
        self.promise.complete_err(error)
    }

    /// Whether a terminal outcome has been set.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.promise.is_done()
    }
}

impl<T> Default for ProgressivePromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ProgressivePromise<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let (done, total) = self.progress();
        f.debug_struct("ProgressivePromise")
            .field("done", &self.is_done())
            .field("progress", &format_args!("{done}/{total}"))
            .finish()
    }
}
