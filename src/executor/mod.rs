//! Single-threaded serial task executor.
//!
//! All submitted work runs on one dedicated worker thread, in submission
//! order. Every task can report its outcome through a [`Promise`]/[`Future`]
//! pair, and shutdown is graceful: once requested, the worker keeps draining
//! tasks until a full quiet period passes without an execution, bounded by
//! an overall timeout.
//!
//! # Example
//!
//! ```
//! use danxian::executor::SingleThreadExecutor;
//!
//! let executor = SingleThreadExecutor::new();
//! let future = executor.submit(|| 2 + 2).unwrap();
//! assert_eq!(future.wait().as_ref().ok(), Some(&4));
//! let termination = executor.shutdown_gracefully_default().unwrap();
//! termination.wait();
//! ```

pub mod factory;
pub mod lifecycle;
pub mod queue;
pub mod task;

pub use factory::{DefaultThreadFactory, ThreadFactory};
pub use lifecycle::{Lifecycle, LifecycleCell};
pub use queue::{AbortPolicy, Admitted, BlockPolicy, CallerRunsPolicy, RejectionPolicy, TaskQueue};
pub use task::{Task, TaskId, TaskIdGenerator};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ExecutorError, Result};
use crate::promise::{Future, Promise};
use queue::Take;

/// Default quiet period for [`SingleThreadExecutor::shutdown_gracefully_default`].
pub const DEFAULT_SHUTDOWN_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// Default timeout for [`SingleThreadExecutor::shutdown_gracefully_default`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// How long the worker sleeps between drain checks while shutting down.
const SHUTDOWN_POLL_TICK: Duration = Duration::from_millis(100);

/// Sequence for default executor names.
static EXECUTOR_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Identity-only back reference to a grouping collaborator.
///
/// The core never calls into the group except to report identity.
pub trait ExecutorGroup: Send + Sync {
    /// Name of the group.
    fn name(&self) -> &str;
}

/// Receives `(task, error)` whenever a task body raises an unexpected
/// failure. Injected at construction; the process-wide default logs
/// through `tracing`.
pub trait FailureLogger: Send + Sync {
    /// Called on the worker thread after the failing task was caught.
    fn task_failed(
        &self,
        task: TaskId,
        error: &ExecutorError,
    );
}

/// Default [`FailureLogger`] backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureLogger;

impl FailureLogger for TracingFailureLogger {
    fn task_failed(
        &self,
        task: TaskId,
        error: &ExecutorError,
    ) {
        warn!(%task, %error, "a task raised an unexpected failure");
    }
}

/// Executor configuration.
pub struct ExecutorConfig {
    /// Executor name; also the worker thread's name.
    pub name: String,
    /// Maximum queued tasks; `None` means unbounded.
    pub max_pending_tasks: Option<usize>,
    /// Default quiet period for graceful shutdown.
    pub quiet_period: Duration,
    /// Default overall timeout for graceful shutdown.
    pub timeout: Duration,
    rejection: Arc<dyn RejectionPolicy>,
    factory: Arc<dyn ThreadFactory>,
    logger: Arc<dyn FailureLogger>,
    parent: Option<Weak<dyn ExecutorGroup>>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let seq = EXECUTOR_SEQ.fetch_add(1, Ordering::SeqCst);
        Self {
            name: format!("danxian-worker-{seq}"),
            max_pending_tasks: None,
            quiet_period: DEFAULT_SHUTDOWN_QUIET_PERIOD,
            timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            rejection: Arc::new(AbortPolicy),
            factory: Arc::new(DefaultThreadFactory::new()),
            logger: Arc::new(TracingFailureLogger),
            parent: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a config with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executor name.
    pub fn with_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = name.into();
        self
    }

    /// Bound the task queue.
    pub fn with_max_pending_tasks(
        mut self,
        max: usize,
    ) -> Self {
        self.max_pending_tasks = Some(max);
        self
    }

    /// Set the default graceful-shutdown durations.
    pub fn with_shutdown_defaults(
        mut self,
        quiet_period: Duration,
        timeout: Duration,
    ) -> Self {
        self.quiet_period = quiet_period;
        self.timeout = timeout;
        self
    }

    /// Set the policy applied when the queue is full.
    pub fn with_rejection_policy(
        mut self,
        policy: impl RejectionPolicy + 'static,
    ) -> Self {
        self.rejection = Arc::new(policy);
        self
    }

    /// Set the thread factory creating the worker.
    pub fn with_thread_factory(
        mut self,
        factory: impl ThreadFactory + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Set the failure-logging collaborator.
    pub fn with_failure_logger(
        mut self,
        logger: impl FailureLogger + 'static,
    ) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Attach a grouping collaborator as a weak back reference.
    pub fn with_parent(
        mut self,
        parent: Weak<dyn ExecutorGroup>,
    ) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("name", &self.name)
            .field("max_pending_tasks", &self.max_pending_tasks)
            .field("quiet_period", &self.quiet_period)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fixed capability surface of a task executor.
pub trait TaskExecutor {
    /// Submit a fire-and-forget task.
    fn execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    /// Submit a task that need not wake an idle worker on its own.
    fn lazy_execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    /// Submit a computation and obtain a future for its result.
    fn submit<F, T>(
        &self,
        f: F,
    ) -> Result<Future<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + Sync + 'static;

    /// Request a graceful shutdown; the future completes at `Terminated`.
    fn shutdown_gracefully(
        &self,
        quiet_period: Duration,
        timeout: Duration,
    ) -> Result<Future<()>>;

    /// Whether the calling thread is the executor's worker thread.
    fn in_event_loop(&self) -> bool;
}

/// State shared between the facade and the worker thread.
struct Inner {
    name: String,
    lifecycle: LifecycleCell,
    queue: TaskQueue,
    ids: TaskIdGenerator,
    /// Monotonic epoch all executor timestamps are measured against.
    epoch: Instant,
    /// Nanos since epoch of the most recent task execution.
    last_execution: AtomicU64,
    /// Nanos since epoch when the shutdown drain began; 0 until then.
    shutdown_start: AtomicU64,
    /// Durations accepted with the shutdown request, in nanos.
    shutdown_cfg: Mutex<Option<(u64, u64)>>,
    default_quiet: Duration,
    default_timeout: Duration,
    termination: Promise<()>,
    termination_future: Future<()>,
    worker_thread: OnceCell<ThreadId>,
    failure_logger: Arc<dyn FailureLogger>,
}

impl Inner {
    #[inline]
    fn nanos_since_epoch(&self) -> u64 {
        duration_nanos(self.epoch.elapsed())
    }

    #[inline]
    fn update_last_execution(&self) {
        self.last_execution
            .store(self.nanos_since_epoch(), Ordering::SeqCst);
    }

    fn shutdown_durations(&self) -> (u64, u64) {
        let cfg = *self.shutdown_cfg.lock();
        cfg.unwrap_or((
            duration_nanos(self.default_quiet),
            duration_nanos(self.default_timeout),
        ))
    }
}

#[inline]
fn duration_nanos(duration: Duration) -> u64 {
    duration.as_nanos().min(u64::MAX as u128) as u64
}

/// The single-worker serial executor facade.
///
/// Safe to share across any number of producer threads; only enqueuing and
/// future observation are concurrent, task execution never is.
pub struct SingleThreadExecutor {
    inner: Arc<Inner>,
    join: Mutex<Option<JoinHandle<()>>>,
    rejection: Arc<dyn RejectionPolicy>,
    factory: Arc<dyn ThreadFactory>,
    parent: Option<Weak<dyn ExecutorGroup>>,
}

impl SingleThreadExecutor {
    /// Create an executor with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create an executor from an explicit configuration.
    pub fn with_config(config: ExecutorConfig) -> Self {
        let termination = Promise::new();
        let termination_future = termination.future();
        let inner = Arc::new(Inner {
            name: config.name,
            lifecycle: LifecycleCell::new(),
            queue: TaskQueue::new(config.max_pending_tasks),
            ids: TaskIdGenerator::new(),
            epoch: Instant::now(),
            last_execution: AtomicU64::new(0),
            shutdown_start: AtomicU64::new(0),
            shutdown_cfg: Mutex::new(None),
            default_quiet: config.quiet_period,
            default_timeout: config.timeout,
            termination,
            termination_future,
            worker_thread: OnceCell::new(),
            failure_logger: config.logger,
        });
        Self {
            inner,
            join: Mutex::new(None),
            rejection: config.rejection,
            factory: config.factory,
            parent: config.parent,
        }
    }

    /// Executor name; also the worker thread's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The grouping collaborator this executor belongs to, if it is still
    /// alive. Identity only.
    pub fn parent(&self) -> Option<Arc<dyn ExecutorGroup>> {
        self.parent.as_ref()?.upgrade()
    }

    /// The executor is its own chooser.
    #[inline]
    pub fn next(&self) -> &Self {
        self
    }

    /// Current lifecycle phase.
    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.load()
    }

    /// Whether a graceful shutdown has been accepted.
    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.lifecycle.is_shutting_down()
    }

    /// Whether the worker has stopped accepting any further work.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.inner.lifecycle.is_shutdown()
    }

    /// Whether the terminal phase has been reached.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.inner.lifecycle.is_terminated()
    }

    /// Number of tasks waiting in the queue.
    #[inline]
    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether the calling thread is the worker thread.
    pub fn in_event_loop(&self) -> bool {
        self.inner
            .worker_thread
            .get()
            .is_some_and(|id| *id == thread::current().id())
    }

    /// Submit a fire-and-forget task.
    pub fn execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(false, f)
    }

    /// Submit a fire-and-forget task that need not wake an idle worker;
    /// it runs once a non-lazy task wakes the worker or shutdown drains
    /// the queue.
    pub fn lazy_execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(true, f)
    }

    /// Submit a computation and obtain a [`Future`] for its result.
    ///
    /// A panic inside `f` is reported through the future as
    /// [`ExecutorError::TaskPanicked`] and never unwinds the worker.
    pub fn submit<F, T>(
        &self,
        f: F,
    ) -> Result<Future<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + Sync + 'static,
    {
        let promise = Promise::new();
        let future = promise.future();
        self.enqueue(false, move || match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = promise.complete(value);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let _ = promise.complete_err(ExecutorError::TaskPanicked(message));
                // Hand the panic back to the worker so the failure logger
                // sees it; the promise is already settled.
                panic::resume_unwind(payload);
            }
        })?;
        Ok(future)
    }

    /// Delayed scheduling is a capability of a timer-aware executor kind.
    pub fn schedule<F, T>(
        &self,
        _delay: Duration,
        _f: F,
    ) -> Result<Future<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + Sync + 'static,
    {
        Err(ExecutorError::UnsupportedOperation(
            "delayed scheduling on a single-thread serial executor",
        ))
    }

    /// Periodic scheduling is a capability of a timer-aware executor kind.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        _initial_delay: Duration,
        _period: Duration,
        _f: F,
    ) -> Result<Future<()>>
    where
        F: FnMut() + Send + 'static,
    {
        Err(ExecutorError::UnsupportedOperation(
            "periodic scheduling on a single-thread serial executor",
        ))
    }

    /// Periodic scheduling is a capability of a timer-aware executor kind.
    pub fn schedule_with_fixed_delay<F>(
        &self,
        _initial_delay: Duration,
        _delay: Duration,
        _f: F,
    ) -> Result<Future<()>>
    where
        F: FnMut() + Send + 'static,
    {
        Err(ExecutorError::UnsupportedOperation(
            "periodic scheduling on a single-thread serial executor",
        ))
    }

    /// Request a graceful shutdown with the configured default durations.
    pub fn shutdown_gracefully_default(&self) -> Result<Future<()>> {
        self.shutdown_gracefully(self.inner.default_quiet, self.inner.default_timeout)
    }

    /// Request a graceful shutdown.
    ///
    /// From this point on every submission is rejected. The worker keeps
    /// draining tasks until none has run for `quiet_period`, or until
    /// `timeout` has elapsed since the request, whichever comes first. The
    /// returned future completes once `Terminated` is reached. Idempotent:
    /// repeated and concurrent calls all receive the same future.
    pub fn shutdown_gracefully(
        &self,
        quiet_period: Duration,
        timeout: Duration,
    ) -> Result<Future<()>> {
        if timeout < quiet_period {
            return Err(ExecutorError::illegal_state(format!(
                "shutdown timeout {timeout:?} is shorter than the quiet period {quiet_period:?}"
            )));
        }
        {
            let mut cfg = self.inner.shutdown_cfg.lock();
            if !self.inner.lifecycle.is_shutting_down() {
                // Make sure a worker exists to drive the state machine to
                // its terminal phase, even if nothing was ever submitted.
                self.start_worker()?;
                *cfg = Some((duration_nanos(quiet_period), duration_nanos(timeout)));
                self.inner.lifecycle.advance(Lifecycle::ShuttingDown);
                debug!(executor = %self.inner.name, "graceful shutdown requested");
            }
        }
        self.inner.queue.wake();
        Ok(self.termination_future())
    }

    /// The future completing at `Terminated`, without requesting shutdown.
    #[inline]
    pub fn termination_future(&self) -> Future<()> {
        self.inner.termination_future.clone()
    }

    /// Block until the executor terminates or `timeout` elapses; returns
    /// whether termination was reached. Fails when called from the worker
    /// thread, which can never outwait itself.
    pub fn await_termination(
        &self,
        timeout: Duration,
    ) -> Result<bool> {
        if self.in_event_loop() {
            return Err(ExecutorError::illegal_state(
                "cannot await termination from the worker thread",
            ));
        }
        if self.inner.termination_future.wait_timeout(timeout).is_none() {
            return Ok(false);
        }
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.join();
        }
        Ok(true)
    }

    /// Admission path shared by all submission flavors.
    fn enqueue<F>(
        &self,
        lazy: bool,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.lifecycle.is_shutting_down() {
            return Err(ExecutorError::rejected("executor is shutting down"));
        }
        let task = Task::with_laziness(self.inner.ids.next(), lazy, body);
        let id = task.id();
        match self.inner.queue.offer(task) {
            Ok(()) => {}
            Err(task) => match self.rejection.on_full(task, &self.inner.queue)? {
                Admitted::Queued => {}
                Admitted::RunOnCaller(task) => {
                    safe_execute(task, &*self.inner.failure_logger);
                    return Ok(());
                }
            },
        }
        // A shutdown request may have slipped in between the phase check
        // and the enqueue; revoke the task if it is still in the queue.
        if self.inner.lifecycle.is_shutting_down() && self.inner.queue.remove(id) {
            return Err(ExecutorError::rejected("executor is shutting down"));
        }
        self.start_worker()
    }

    /// Move `NotStarted -> Started` and spawn the worker, exactly once.
    fn start_worker(&self) -> Result<()> {
        if self.inner.lifecycle.load() != Lifecycle::NotStarted {
            return Ok(());
        }
        if !self.inner.lifecycle.advance(Lifecycle::Started) {
            return Ok(());
        }
        let inner = self.inner.clone();
        let handle = self
            .factory
            .spawn_worker(&self.inner.name, Box::new(move || worker_main(inner)))
            .map_err(|e| {
                ExecutorError::illegal_state(format!("failed to spawn worker thread: {e}"))
            })?;
        *self.join.lock() = Some(handle);
        Ok(())
    }
}

impl Default for SingleThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for SingleThreadExecutor {
    fn execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        SingleThreadExecutor::execute(self, f)
    }

    fn lazy_execute<F>(
        &self,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        SingleThreadExecutor::lazy_execute(self, f)
    }

    fn submit<F, T>(
        &self,
        f: F,
    ) -> Result<Future<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + Sync + 'static,
    {
        SingleThreadExecutor::submit(self, f)
    }

    fn shutdown_gracefully(
        &self,
        quiet_period: Duration,
        timeout: Duration,
    ) -> Result<Future<()>> {
        SingleThreadExecutor::shutdown_gracefully(self, quiet_period, timeout)
    }

    fn in_event_loop(&self) -> bool {
        SingleThreadExecutor::in_event_loop(self)
    }
}

impl std::fmt::Debug for SingleThreadExecutor {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SingleThreadExecutor")
            .field("name", &self.inner.name)
            .field("lifecycle", &self.inner.lifecycle.load())
            .field("pending_tasks", &self.inner.queue.len())
            .finish()
    }
}

impl Drop for SingleThreadExecutor {
    fn drop(&mut self) {
        if self.inner.lifecycle.load() == Lifecycle::NotStarted {
            // No worker ever ran; settle the termination future inline.
            self.inner.lifecycle.advance(Lifecycle::ShuttingDown);
            self.inner.lifecycle.advance(Lifecycle::Shutdown);
            let dropped = self.inner.queue.clear();
            if dropped > 0 {
                warn!(
                    executor = %self.inner.name,
                    dropped,
                    "executor dropped with tasks still queued"
                );
            }
            self.inner.lifecycle.advance(Lifecycle::Terminated);
            let _ = self.inner.termination.complete(());
        } else if !self.inner.lifecycle.is_shutting_down() {
            // Last handle going away: stop admitting and let the worker
            // drain what is already queued. Never joins.
            let _ = self.shutdown_gracefully(Duration::ZERO, self.inner.default_timeout);
        }
    }
}

/// Worker thread entry point: dequeue, run, check the exit condition.
fn worker_main(inner: Arc<Inner>) {
    let _ = inner.worker_thread.set(thread::current().id());
    inner.update_last_execution();
    debug!(executor = %inner.name, "worker loop started");

    loop {
        let taken = if inner.lifecycle.is_shutting_down() {
            inner.queue.take(Some(SHUTDOWN_POLL_TICK))
        } else {
            inner.queue.take(None)
        };
        if let Take::Task(task) = taken {
            run_task(&inner, task);
        }
        if confirm_shutdown(&inner) {
            break;
        }
    }

    inner.lifecycle.advance(Lifecycle::Shutdown);
    // Final drain: anything still queued (lazy tasks included) runs now.
    run_all_tasks(&inner);
    let dropped = inner.queue.clear();
    if dropped > 0 {
        warn!(
            executor = %inner.name,
            dropped,
            "worker terminated with tasks still queued"
        );
    }
    inner.lifecycle.advance(Lifecycle::Terminated);
    debug!(executor = %inner.name, "worker loop terminated");
    let _ = inner.termination.complete(());
}

/// Whether the worker may exit. Only returns `true` once the executor is
/// shutting down, the queue has been drained, and either the quiet period
/// has elapsed since the last execution or the overall timeout is up.
fn confirm_shutdown(inner: &Inner) -> bool {
    if !inner.lifecycle.is_shutting_down() {
        return false;
    }
    let (quiet, timeout) = inner.shutdown_durations();
    let now = inner.nanos_since_epoch();
    let start = {
        let recorded = inner.shutdown_start.load(Ordering::SeqCst);
        if recorded == 0 {
            let start = now.max(1);
            inner.shutdown_start.store(start, Ordering::SeqCst);
            start
        } else {
            recorded
        }
    };
    if run_all_tasks(inner) {
        if quiet == 0 {
            return true;
        }
        // Something ran; the quiet timer was reset, keep draining.
        return false;
    }
    let now = inner.nanos_since_epoch();
    if now.saturating_sub(start) >= timeout {
        return true;
    }
    if now.saturating_sub(inner.last_execution.load(Ordering::SeqCst)) <= quiet {
        // Within the quiet window; the caller's bounded take supplies the
        // poll pause before the next check.
        return false;
    }
    true
}

/// Drain and run everything currently queued. Returns whether any task ran.
fn run_all_tasks(inner: &Inner) -> bool {
    let mut ran = false;
    while let Some(task) = inner.queue.poll() {
        run_task(inner, task);
        ran = true;
    }
    ran
}

fn run_task(
    inner: &Inner,
    task: Task,
) {
    safe_execute(task, &*inner.failure_logger);
    inner.update_last_execution();
}

/// Run a task, catching and reporting any panic instead of propagating it.
/// Task failures are reported through the task's own promise; the loop's
/// control flow never depends on them.
pub(crate) fn safe_execute(
    task: Task,
    logger: &dyn FailureLogger,
) {
    let id = task.id();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        let error = ExecutorError::TaskPanicked(panic_message(payload.as_ref()));
        logger.task_failed(id, &error);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests;
