//! Facade behavior tests: ordering, futures, collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use crate::error::ExecutorError;
use crate::executor::{
    ExecutorConfig, ExecutorGroup, FailureLogger, SingleThreadExecutor, TaskId,
};

#[test]
fn test_multi_producer_admission_order_is_execution_order() {
    let executor = Arc::new(SingleThreadExecutor::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(4));

    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let executor = executor.clone();
            let log = log.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..25 {
                    let log = log.clone();
                    executor
                        .execute(move || log.lock().push((producer, i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(10))
        .unwrap();
    termination.wait();

    let log = log.lock();
    assert_eq!(log.len(), 100);
    // Each producer's submissions ran in its own submission order.
    for producer in 0..4 {
        let sequence: Vec<_> = log
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(sequence, (0..25).collect::<Vec<_>>());
    }
}

/// A, B, C submitted in order: three distinct futures resolve with
/// matching values, observed in that order by listeners.
#[test]
fn test_submission_order_and_listener_order() {
    let executor = SingleThreadExecutor::new();

    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    executor
        .execute(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
    started_rx.recv().unwrap();

    let observed = Arc::new(Mutex::new(Vec::new()));
    let futures: Vec<_> = [1, 2, 3]
        .into_iter()
        .map(|value| {
            let future = executor.submit(move || value).unwrap();
            let observed = observed.clone();
            future.add_listener(move |outcome| {
                observed.lock().push(*outcome.as_ref().unwrap());
            });
            future
        })
        .collect();

    gate_tx.send(()).unwrap();
    for (index, future) in futures.iter().enumerate() {
        assert_eq!(future.wait().as_ref().ok(), Some(&(index as i32 + 1)));
    }
    assert_eq!(*observed.lock(), vec![1, 2, 3]);

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}

#[test]
fn test_in_event_loop() {
    let executor = Arc::new(SingleThreadExecutor::new());
    assert!(!executor.in_event_loop());

    let exec = executor.clone();
    let inside = executor.submit(move || exec.in_event_loop()).unwrap();
    assert_eq!(inside.wait().as_ref().ok(), Some(&true));

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}

#[test]
fn test_await_termination_from_worker_is_illegal() {
    let executor = Arc::new(SingleThreadExecutor::new());
    let exec = executor.clone();
    let result = executor
        .submit(move || exec.await_termination(Duration::from_millis(1)).is_err())
        .unwrap();
    assert_eq!(result.wait().as_ref().ok(), Some(&true));

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}

struct TestGroup {
    name: String,
}

impl ExecutorGroup for TestGroup {
    fn name(&self) -> &str {
        &self.name
    }
}

#[test]
fn test_parent_is_a_weak_identity_reference() {
    let group: Arc<dyn ExecutorGroup> = Arc::new(TestGroup {
        name: "group-a".to_string(),
    });
    let executor = SingleThreadExecutor::with_config(
        ExecutorConfig::new().with_parent(Arc::downgrade(&group)),
    );

    assert_eq!(executor.parent().unwrap().name(), "group-a");
    assert!(std::ptr::eq(executor.next(), &executor));

    drop(group);
    assert!(executor.parent().is_none());
}

#[test]
fn test_schedule_variants_are_unsupported() {
    let executor = SingleThreadExecutor::new();
    let delay = Duration::from_millis(10);

    let err = executor.schedule(delay, || 1).unwrap_err();
    assert!(matches!(err, ExecutorError::UnsupportedOperation(_)));

    let err = executor.schedule_at_fixed_rate(delay, delay, || {}).unwrap_err();
    assert!(matches!(err, ExecutorError::UnsupportedOperation(_)));

    let err = executor
        .schedule_with_fixed_delay(delay, delay, || {})
        .unwrap_err();
    assert!(matches!(err, ExecutorError::UnsupportedOperation(_)));
}

#[derive(Clone, Default)]
struct RecordingLogger {
    failures: Arc<Mutex<Vec<(TaskId, String)>>>,
}

impl FailureLogger for RecordingLogger {
    fn task_failed(
        &self,
        task: TaskId,
        error: &ExecutorError,
    ) {
        self.failures.lock().push((task, error.to_string()));
    }
}

#[test]
fn test_task_panic_is_reported_and_not_fatal() {
    let logger = RecordingLogger::default();
    let executor = SingleThreadExecutor::with_config(
        ExecutorConfig::new().with_failure_logger(logger.clone()),
    );

    let failed = executor.submit(|| -> u32 { panic!("exploded") }).unwrap();
    assert!(matches!(
        failed.wait(),
        Err(ExecutorError::TaskPanicked(message)) if message.contains("exploded")
    ));

    // The worker survived and keeps executing.
    let ok = executor.submit(|| 7).unwrap();
    assert_eq!(ok.wait().as_ref().ok(), Some(&7));

    {
        let failures = logger.failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].1.contains("exploded"));
    }

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}

#[test]
fn test_pending_tasks_reports_queue_depth() {
    let executor = SingleThreadExecutor::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    executor
        .execute(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
    started_rx.recv().unwrap();

    assert_eq!(executor.pending_tasks(), 0);
    executor.execute(|| {}).unwrap();
    executor.execute(|| {}).unwrap();
    assert_eq!(executor.pending_tasks(), 2);

    gate_tx.send(()).unwrap();
    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
    assert_eq!(executor.pending_tasks(), 0);
}

#[test]
fn test_execute_is_fire_and_forget() {
    let executor = SingleThreadExecutor::new();
    let ran = Arc::new(AtomicBool::new(false));
    {
        let ran = ran.clone();
        executor
            .execute(move || ran.store(true, Ordering::SeqCst))
            .unwrap();
    }

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
    assert!(ran.load(Ordering::SeqCst));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any interleaving of lazy and non-lazy submissions executes in
    /// admission order once the queue is drained.
    #[test]
    fn prop_submissions_run_in_admission_order(
        lazy_flags in proptest::collection::vec(any::<bool>(), 0..16)
    ) {
        let executor = SingleThreadExecutor::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (index, lazy) in lazy_flags.iter().copied().enumerate() {
            let log = log.clone();
            let body = move || log.lock().push(index);
            if lazy {
                executor.lazy_execute(body).unwrap();
            } else {
                executor.execute(body).unwrap();
            }
        }

        let termination = executor
            .shutdown_gracefully(Duration::ZERO, Duration::from_secs(10))
            .unwrap();
        termination.wait();

        prop_assert_eq!(&*log.lock(), &(0..lazy_flags.len()).collect::<Vec<_>>());
    }
}
