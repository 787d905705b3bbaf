//! Tests for the progressive promise variant.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ExecutorError;
use crate::promise::ProgressivePromise;

#[test]
fn test_progress_events_arrive_in_order() {
    let promise = ProgressivePromise::<()>::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        promise.add_progress_listener(move |done, total| {
            events.lock().push((done, total));
        });
    }

    promise.set_progress(1, 3).unwrap();
    promise.set_progress(2, 3).unwrap();
    promise.set_progress(3, 3).unwrap();

    assert_eq!(*events.lock(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(promise.progress(), (3, 3));
}

#[test]
fn test_progress_must_not_decrease() {
    let promise = ProgressivePromise::<()>::new();
    promise.set_progress(2, 5).unwrap();

    let err = promise.set_progress(1, 5).unwrap_err();
    assert!(matches!(err, ExecutorError::IllegalState(_)));
    assert_eq!(promise.progress(), (2, 5));
}

#[test]
fn test_progress_cannot_exceed_total() {
    let promise = ProgressivePromise::<()>::new();
    let err = promise.set_progress(4, 3).unwrap_err();
    assert!(matches!(err, ExecutorError::IllegalState(_)));
}

#[test]
fn test_progress_after_completion_is_illegal() {
    let promise = ProgressivePromise::new();
    promise.set_progress(1, 2).unwrap();
    promise.complete(42).unwrap();

    let err = promise.set_progress(2, 2).unwrap_err();
    assert!(matches!(err, ExecutorError::IllegalState(_)));
}

#[test]
fn test_completion_reaches_the_future() {
    let promise = ProgressivePromise::new();
    let future = promise.future();

    promise.set_progress(1, 1).unwrap();
    promise.complete(7).unwrap();

    assert!(promise.is_done());
    assert_eq!(future.wait().as_ref().ok(), Some(&7));

    let err = promise.complete(8).unwrap_err();
    assert!(matches!(err, ExecutorError::IllegalState(_)));
}
