//! Deferred work marshalled onto the host's control ("main") thread.
//!
//! The render thread never frees node memory or reallocates buses itself;
//! it queues that work here. The host supplies a [`MainThreadScheduler`]
//! that arranges for [`MainThreadDispatcher::dispatch_functions_from_main_thread`]
//! to run soon on its main thread.

use core::fmt;
use std::collections::VecDeque;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::compat::{Arc, AtomicBool, AtomicUsize, Condvar, Mutex, Ordering};

/// Host hook for waking the main thread.
pub trait MainThreadScheduler: Send + Sync {
    /// Arrange for `dispatch_functions_from_main_thread` to be called.
    fn schedule_dispatch(&self);

    fn is_main_thread(&self) -> bool;
}

/// Scheduler that treats one fixed thread as main and counts wake-up
/// requests. Hosts with an event loop poll [`requests`](Self::requests) or
/// simply dispatch periodically.
#[derive(Debug)]
pub struct ThreadScheduler {
    main: ThreadId,
    requests: AtomicUsize,
}

impl ThreadScheduler {
    /// Treats the calling thread as main.
    pub fn new() -> Self {
        Self::for_thread(thread::current().id())
    }

    pub fn for_thread(main: ThreadId) -> Self {
        Self {
            main,
            requests: AtomicUsize::new(0),
        }
    }

    /// Wake-ups requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Acquire)
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadScheduler for ThreadScheduler {
    fn schedule_dispatch(&self) {
        self.requests.fetch_add(1, Ordering::AcqRel);
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main
    }
}

/// Identifies a queued call for cancellation: what it does and which
/// context it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub tag: &'static str,
    pub context: u64,
}

impl TaskKey {
    pub const fn new(tag: &'static str, context: u64) -> Self {
        Self { tag, context }
    }
}

struct SyncSignal {
    done: Mutex<bool>,
    cond: Condvar,
}

impl SyncSignal {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn notify(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }
}

struct Task {
    key: TaskKey,
    job: Box<dyn FnOnce() + Send>,
    sync: Option<Arc<SyncSignal>>,
}

/// FIFO of callbacks to run on the main thread.
pub struct MainThreadDispatcher {
    queue: Mutex<VecDeque<Task>>,
    scheduler: Arc<dyn MainThreadScheduler>,
    paused: AtomicBool,
    budget: Duration,
}

impl fmt::Debug for MainThreadDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadDispatcher")
            .field("pending", &self.pending())
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .field("budget", &self.budget)
            .finish()
    }
}

impl MainThreadDispatcher {
    pub fn new(scheduler: Arc<dyn MainThreadScheduler>) -> Self {
        Self::with_budget(scheduler, Duration::from_millis(50))
    }

    /// `budget` bounds the wall-clock time of one dispatch pass.
    pub fn with_budget(scheduler: Arc<dyn MainThreadScheduler>, budget: Duration) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            scheduler,
            paused: AtomicBool::new(false),
            budget,
        }
    }

    pub fn scheduler(&self) -> &Arc<dyn MainThreadScheduler> {
        &self.scheduler
    }

    pub fn is_main_thread(&self) -> bool {
        self.scheduler.is_main_thread()
    }

    fn push(&self, task: Task) -> usize {
        let mut queue = self.queue.lock();
        queue.push_back(task);
        queue.len()
    }

    /// Queues `job`; wakes the main thread if the queue was empty.
    pub fn call_on_main_thread(&self, key: TaskKey, job: impl FnOnce() + Send + 'static) {
        let len = self.push(Task {
            key,
            job: Box::new(job),
            sync: None,
        });
        if len == 1 {
            self.scheduler.schedule_dispatch();
        }
    }

    /// Runs `job` on the main thread and blocks until it has run. Runs
    /// inline when already on the main thread.
    pub fn call_on_main_thread_and_wait(&self, key: TaskKey, job: impl FnOnce() + Send + 'static) {
        if self.scheduler.is_main_thread() {
            job();
            return;
        }
        let signal = Arc::new(SyncSignal::new());
        let len = self.push(Task {
            key,
            job: Box::new(job),
            sync: Some(signal.clone()),
        });
        if len == 1 {
            self.scheduler.schedule_dispatch();
        }
        signal.wait();
    }

    /// Drops every queued asynchronous call matching `key`. Calls with a
    /// waiting caller are left in place. Returns how many were removed.
    pub fn cancel_call_on_main_thread(&self, key: TaskKey) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|t| t.key != key || t.sync.is_some());
        before - queue.len()
    }

    /// Runs queued calls in FIFO order until the queue empties, callbacks
    /// are paused, or the budget runs out. Returns how many ran.
    pub fn dispatch_functions_from_main_thread(&self) -> usize {
        debug_assert!(self.is_main_thread(), "dispatch called off the main thread");
        let start = Instant::now();
        let mut ran = 0;

        loop {
            if self.paused.load(Ordering::Acquire) {
                break;
            }
            let Some(task) = self.queue.lock().pop_front() else {
                break;
            };
            (task.job)();
            if let Some(signal) = task.sync {
                signal.notify();
            }
            ran += 1;

            if start.elapsed() > self.budget {
                if self.pending() > 0 {
                    tracing::debug!(ran, budget = ?self.budget, "main-thread budget exceeded, rescheduling");
                    self.scheduler.schedule_dispatch();
                }
                break;
            }
        }
        ran
    }

    /// While paused, dispatch passes run nothing. Unpausing wakes the main
    /// thread if calls are waiting.
    pub fn set_callbacks_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        if !paused && self.pending() > 0 {
            self.scheduler.schedule_dispatch();
        }
    }

    pub fn callbacks_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Queued calls.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}
