//! End-to-end graceful shutdown through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use danxian::{
    AbortPolicy, ExecutorConfig, ExecutorError, Lifecycle, SingleThreadExecutor,
};

#[test]
fn shutdown_drains_then_terminates() {
    let executor = SingleThreadExecutor::with_config(
        ExecutorConfig::new().with_name("it-shutdown"),
    );
    assert_eq!(executor.name(), "it-shutdown");

    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    executor
        .execute(move || {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        })
        .unwrap();
    started_rx.recv().unwrap();

    let drained = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let drained = drained.clone();
        executor
            .execute(move || {
                drained.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(10))
        .unwrap();
    assert!(executor.is_shutting_down());
    assert!(!executor.is_terminated());

    // New work is refused while the backlog still drains.
    assert!(matches!(
        executor.execute(|| {}),
        Err(ExecutorError::RejectedExecution(_))
    ));

    gate_tx.send(()).unwrap();
    assert!(termination.wait_timeout(Duration::from_secs(10)).is_some());

    assert_eq!(drained.load(Ordering::SeqCst), 10);
    assert_eq!(executor.lifecycle(), Lifecycle::Terminated);
    assert_eq!(executor.pending_tasks(), 0);
}

#[test]
fn repeated_requests_share_one_termination() {
    let executor = SingleThreadExecutor::new();
    executor.execute(|| {}).unwrap();

    let first = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    let second = executor.shutdown_gracefully_default().unwrap();
    assert!(first.ptr_eq(&second));

    first.wait();
    assert!(executor.await_termination(Duration::from_secs(1)).unwrap());
}

#[test]
fn bounded_executor_round_trip() {
    let executor = SingleThreadExecutor::with_config(
        ExecutorConfig::new()
            .with_max_pending_tasks(4)
            .with_rejection_policy(AbortPolicy),
    );

    let futures: Vec<_> = (0..4u32)
        .map(|i| executor.submit(move || i * i).unwrap())
        .collect();
    for (i, future) in futures.iter().enumerate() {
        let expected = (i * i) as u32;
        assert_eq!(future.wait().as_ref().ok(), Some(&expected));
    }

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}
