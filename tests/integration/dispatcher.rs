//! Dispatcher integration tests
//!
//! Tests the main-thread task queue on its own and as the context's
//! deferred-work channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripieno::prelude::*;
use ripieno::{MainThreadDispatcher, TaskKey, ThreadScheduler};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

const KEY: TaskKey = TaskKey::new("test", 0);

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
    let count = Arc::new(AtomicUsize::new(0));
    let make = {
        let count = count.clone();
        move || -> Box<dyn FnOnce() + Send> {
            let count = count.clone();
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        }
    };
    (count, make)
}

#[test]
fn test_calls_run_in_order_on_dispatch() {
    let dispatcher = MainThreadDispatcher::new(Arc::new(ThreadScheduler::new()));
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..3 {
        let order = order.clone();
        dispatcher.call_on_main_thread(KEY, move || order.lock().unwrap().push(i));
    }
    assert_eq!(dispatcher.pending(), 3);
    assert_eq!(dispatcher.dispatch_functions_from_main_thread(), 3);
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_cancel_removes_matching_calls() {
    let dispatcher = MainThreadDispatcher::new(Arc::new(ThreadScheduler::new()));
    let (count, make) = counter();
    let other = TaskKey::new("other", 0);
    dispatcher.call_on_main_thread(KEY, make());
    dispatcher.call_on_main_thread(other, make());
    dispatcher.call_on_main_thread(KEY, make());

    assert_eq!(dispatcher.cancel_call_on_main_thread(KEY), 2);
    dispatcher.dispatch_functions_from_main_thread();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_paused_dispatch_runs_nothing() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let dispatcher = MainThreadDispatcher::new(scheduler.clone());
    let (count, make) = counter();
    dispatcher.set_callbacks_paused(true);
    dispatcher.call_on_main_thread(KEY, make());
    assert_eq!(dispatcher.dispatch_functions_from_main_thread(), 0);

    let requests = scheduler.requests();
    dispatcher.set_callbacks_paused(false);
    assert!(scheduler.requests() > requests);
    assert_eq!(dispatcher.dispatch_functions_from_main_thread(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_budget_bounds_one_pass() {
    let scheduler = Arc::new(ThreadScheduler::new());
    let dispatcher = MainThreadDispatcher::with_budget(scheduler.clone(), Duration::ZERO);
    let (count, make) = counter();
    for _ in 0..3 {
        let job = make();
        dispatcher.call_on_main_thread(KEY, move || {
            std::thread::sleep(Duration::from_millis(1));
            job();
        });
    }
    assert_eq!(dispatcher.dispatch_functions_from_main_thread(), 1);
    assert_eq!(dispatcher.pending(), 2);
    while dispatcher.pending() > 0 {
        dispatcher.dispatch_functions_from_main_thread();
    }
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_call_and_wait_from_worker() {
    let dispatcher = Arc::new(MainThreadDispatcher::new(Arc::new(ThreadScheduler::new())));
    let (count, make) = counter();

    let worker = {
        let dispatcher = dispatcher.clone();
        let job = make();
        std::thread::spawn(move || dispatcher.call_on_main_thread_and_wait(KEY, job))
    };
    while dispatcher.pending() == 0 {
        std::thread::yield_now();
    }
    // Waiting calls survive cancellation.
    assert_eq!(dispatcher.cancel_call_on_main_thread(KEY), 0);
    dispatcher.dispatch_functions_from_main_thread();
    worker.join().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// The context routes node finalization through its dispatcher.
#[test]
fn test_context_uses_shared_dispatcher() {
    let dispatcher = Arc::new(MainThreadDispatcher::new(Arc::new(ThreadScheduler::new())));
    let context = AudioContext::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .dispatcher(dispatcher.clone())
        .build()
        .unwrap();
    let baseline = context.node_count();

    drop(GainNode::new(&context, 1.0).unwrap());
    assert!(dispatcher.pending() >= 1);
    assert_eq!(context.node_count(), baseline + 1);

    dispatcher.dispatch_functions_from_main_thread();
    assert_eq!(context.node_count(), baseline);
}
