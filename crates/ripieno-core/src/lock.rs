//! The two context locks and the tokens proving they are held.
//!
//! Control threads take graph then render. The render thread takes render,
//! then only ever *tries* graph. Debug builds track what the current thread
//! holds and assert against the orderings that could deadlock, and against
//! taking the graph lock from inside a processor.

use core::cell::Cell;
use core::ops::{Deref, DerefMut};

use crate::compat::{Mutex, MutexGuard};
use crate::graph::GraphState;
use crate::render::RenderState;

const GRAPH: u8 = 1;
const RENDER: u8 = 1 << 1;
const PROCESS: u8 = 1 << 2;

thread_local! {
    static HELD: Cell<u8> = const { Cell::new(0) };
}

fn held(bit: u8) -> bool {
    HELD.with(|h| h.get() & bit != 0)
}

fn set_held(bit: u8, on: bool) {
    HELD.with(|h| {
        let v = h.get();
        h.set(if on { v | bit } else { v & !bit });
    });
}

/// Proof that the graph lock is held. Topology and refcount transitions
/// require one.
pub struct GraphLock<'a> {
    guard: MutexGuard<'a, GraphState>,
}

impl<'a> GraphLock<'a> {
    pub(crate) fn acquire(mutex: &'a Mutex<GraphState>) -> Self {
        debug_assert!(!held(GRAPH), "graph lock is not reentrant");
        debug_assert!(!held(RENDER), "graph lock taken after render lock");
        debug_assert!(!held(PROCESS), "graph lock taken inside process()");
        let guard = mutex.lock();
        set_held(GRAPH, true);
        Self { guard }
    }

    /// Returns `None` if another thread holds the lock, or this one does.
    pub(crate) fn try_acquire(mutex: &'a Mutex<GraphState>) -> Option<Self> {
        if held(GRAPH) || held(PROCESS) {
            return None;
        }
        let guard = mutex.try_lock()?;
        set_held(GRAPH, true);
        Some(Self { guard })
    }
}

impl Drop for GraphLock<'_> {
    fn drop(&mut self) {
        set_held(GRAPH, false);
    }
}

impl Deref for GraphLock<'_> {
    type Target = GraphState;

    fn deref(&self) -> &GraphState {
        &self.guard
    }
}

impl DerefMut for GraphLock<'_> {
    fn deref_mut(&mut self) -> &mut GraphState {
        &mut self.guard
    }
}

/// Proof that the render lock is held. Bus widths, render-side port state
/// and processors require one.
pub struct RenderLock<'a> {
    guard: MutexGuard<'a, RenderState>,
}

impl<'a> RenderLock<'a> {
    pub(crate) fn acquire(mutex: &'a Mutex<RenderState>) -> Self {
        debug_assert!(!held(RENDER), "render lock is not reentrant");
        let guard = mutex.lock();
        set_held(RENDER, true);
        Self { guard }
    }
}

impl Drop for RenderLock<'_> {
    fn drop(&mut self) {
        set_held(RENDER, false);
    }
}

impl Deref for RenderLock<'_> {
    type Target = RenderState;

    fn deref(&self) -> &RenderState {
        &self.guard
    }
}

impl DerefMut for RenderLock<'_> {
    fn deref_mut(&mut self) -> &mut RenderState {
        &mut self.guard
    }
}

/// Marks the current thread as inside a processor callback.
pub(crate) struct ProcessScope;

impl ProcessScope {
    pub(crate) fn enter() -> Self {
        set_held(PROCESS, true);
        ProcessScope
    }
}

impl Drop for ProcessScope {
    fn drop(&mut self) {
        set_held(PROCESS, false);
    }
}
