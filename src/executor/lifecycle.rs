//! Executor lifecycle state machine.
//!
//! Phases advance strictly forward:
//! `NotStarted -> Started -> ShuttingDown -> Shutdown -> Terminated`.
//! The current phase is stored in an atomic so producers, shutdown callers
//! and the worker observe a single consistent value without locking.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of an executor.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    /// No worker running; tasks may still be accepted and queued.
    NotStarted = 1,
    /// Worker loop is active and draining the queue.
    Started = 2,
    /// Graceful shutdown accepted; new submissions are rejected.
    ShuttingDown = 3,
    /// Worker stopped accepting work and is performing final cleanup.
    Shutdown = 4,
    /// Terminal: worker exited, all resources released.
    Terminated = 5,
}

impl Lifecycle {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            1 => Lifecycle::NotStarted,
            2 => Lifecycle::Started,
            3 => Lifecycle::ShuttingDown,
            4 => Lifecycle::Shutdown,
            _ => Lifecycle::Terminated,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Lifecycle::NotStarted => "not-started",
            Lifecycle::Started => "started",
            Lifecycle::ShuttingDown => "shutting-down",
            Lifecycle::Shutdown => "shutdown",
            Lifecycle::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding the current [`Lifecycle`] phase.
///
/// Transitions only move forward; `advance` loses cleanly when another
/// thread has already reached (or passed) the target phase.
#[derive(Debug)]
pub struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    /// Create a new cell in the `NotStarted` phase.
    #[inline]
    pub fn new() -> Self {
        Self(AtomicU8::new(Lifecycle::NotStarted as u8))
    }

    /// Get the current phase.
    #[inline]
    pub fn load(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Advance to `target`, returning `true` if this call performed the
    /// transition. Returns `false` when the cell is already at or past
    /// `target`; skipping backward is impossible by construction.
    pub fn advance(
        &self,
        target: Lifecycle,
    ) -> bool {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if current >= target.as_u8() {
                return false;
            }
            match self.0.compare_exchange(
                current,
                target.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Whether the phase is at least `Started`.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.load() >= Lifecycle::Started
    }

    /// Whether the phase is at least `ShuttingDown`.
    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.load() >= Lifecycle::ShuttingDown
    }

    /// Whether the phase is at least `Shutdown`.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.load() >= Lifecycle::Shutdown
    }

    /// Whether the terminal phase has been reached.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.load() == Lifecycle::Terminated
    }
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}
