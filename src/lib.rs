//! DanXian (单线) — a single-threaded serial task executor
//!
//! Every executor owns exactly one worker thread. All submitted work runs
//! on it serially, in submission order; each submission can yield a
//! [`Future`] for its outcome, and shutdown is graceful and time-bounded
//! (quiet period + timeout).
//!
//! # Example
//!
//! ```
//! use danxian::{SingleThreadExecutor, TaskExecutor};
//!
//! let executor = SingleThreadExecutor::new();
//! let future = executor.submit(|| 6 * 7).unwrap();
//! assert_eq!(future.wait().as_ref().ok(), Some(&42));
//!
//! let termination = executor.shutdown_gracefully_default().unwrap();
//! termination.wait();
//! assert!(executor.is_terminated());
//! ```

#![doc(html_root_url = "https://docs.rs/danxian")]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod executor;
pub mod promise;

// Utility modules
pub mod util;

// Re-exports
pub use error::{ExecutorError, Result};
pub use executor::{
    DefaultThreadFactory, ExecutorConfig, ExecutorGroup, FailureLogger, Lifecycle,
    SingleThreadExecutor, TaskExecutor, ThreadFactory, TracingFailureLogger,
};
pub use executor::{AbortPolicy, BlockPolicy, CallerRunsPolicy, RejectionPolicy};
pub use promise::{Future, Outcome, ProgressivePromise, Promise};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
