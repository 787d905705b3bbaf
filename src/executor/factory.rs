//! Thread factory collaborator.
//!
//! The core only needs "create and start a thread that calls my run loop";
//! everything else about the thread (naming, stack size) belongs to the
//! factory.

use std::io;
use std::thread;

/// Creates the dedicated worker thread for an executor.
pub trait ThreadFactory: Send + Sync {
    /// Spawn a thread named `name` running `body` to completion.
    fn spawn_worker(
        &self,
        name: &str,
        body: Box<dyn FnOnce() + Send>,
    ) -> io::Result<thread::JoinHandle<()>>;
}

/// Default factory backed by [`std::thread::Builder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultThreadFactory {
    /// Worker stack size in bytes; `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl DefaultThreadFactory {
    /// Create a factory with the platform default stack size.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory spawning workers with the given stack size.
    #[inline]
    pub fn with_stack_size(stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
        }
    }
}

impl ThreadFactory for DefaultThreadFactory {
    fn spawn_worker(
        &self,
        name: &str,
        body: Box<dyn FnOnce() + Send>,
    ) -> io::Result<thread::JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(body)
    }
}
