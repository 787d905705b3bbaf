//! End-to-end serial execution through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use danxian::{ExecutorError, Future, SingleThreadExecutor, TaskExecutor};

fn double_on<E: TaskExecutor>(
    executor: &E,
    value: u32,
) -> Future<u32> {
    executor.submit(move || value * 2).unwrap()
}

#[test]
fn capability_trait_surface() {
    let executor = SingleThreadExecutor::new();
    assert!(!TaskExecutor::in_event_loop(&executor));

    let future = double_on(&executor, 21);
    assert_eq!(future.wait().as_ref().ok(), Some(&42));

    let termination =
        TaskExecutor::shutdown_gracefully(&executor, Duration::ZERO, Duration::from_secs(5))
            .unwrap();
    termination.wait();
    assert!(executor.is_terminated());
}

#[test]
fn tasks_from_many_threads_run_serially() {
    let executor = Arc::new(SingleThreadExecutor::new());
    let in_task = Arc::new(AtomicUsize::new(0));
    let max_in_task = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let producers: Vec<_> = (0..8)
        .map(|_| {
            let executor = executor.clone();
            let in_task = in_task.clone();
            let max_in_task = max_in_task.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    let in_task = in_task.clone();
                    let max_in_task = max_in_task.clone();
                    executor
                        .execute(move || {
                            let current = in_task.fetch_add(1, Ordering::SeqCst) + 1;
                            max_in_task.fetch_max(current, Ordering::SeqCst);
                            thread::sleep(Duration::from_micros(200));
                            in_task.fetch_sub(1, Ordering::SeqCst);
                        })
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

    // No two task bodies ever overlapped.
    assert_eq!(max_in_task.load(Ordering::SeqCst), 1);
}

#[test]
fn submit_reports_values_and_listener_order() {
    let executor = SingleThreadExecutor::new();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|tag| {
            let future = executor.submit(move || tag.to_string()).unwrap();
            let observed = observed.clone();
            future.add_listener(move |outcome| {
                observed
                    .lock()
                    .unwrap()
                    .push(outcome.as_ref().unwrap().clone());
            });
            future
        })
        .collect();

    for future in &futures {
        assert!(future.wait().is_ok());
    }
    assert_eq!(*observed.lock().unwrap(), vec!["a", "b", "c"]);

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}

#[test]
fn panicking_task_fails_its_future_only() {
    let executor = SingleThreadExecutor::new();

    let failed = executor.submit(|| -> u32 { panic!("kaboom") }).unwrap();
    let ok = executor.submit(|| 1u32).unwrap();

    assert!(matches!(
        failed.wait(),
        Err(ExecutorError::TaskPanicked(_))
    ));
    assert_eq!(ok.wait().as_ref().ok(), Some(&1));

    let termination = executor
        .shutdown_gracefully(Duration::ZERO, Duration::from_secs(5))
        .unwrap();
    termination.wait();
}
