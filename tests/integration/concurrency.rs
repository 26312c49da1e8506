//! Concurrency integration tests
//!
//! Control threads edit the graph while a render thread pulls it.

use ripieno::prelude::*;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use ripieno::{ParamAutomation, RenderThread};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

const THREADS: usize = 8;
const PAIRS_PER_THREAD: usize = 125;

/// 1000 connect/disconnect pairs racing the render thread leave no
/// connections behind.
#[test]
fn test_connect_disconnect_storm_leaves_empty_graph() {
    let context = test_context();
    let gain = GainNode::new(&context, 1.0).unwrap();
    let sources: Vec<ConstantSourceNode> = (0..THREADS)
        .map(|_| ConstantSourceNode::new(&context, 0.25).unwrap())
        .collect();
    for source in &sources {
        source.start(0.0).unwrap();
    }

    let mut render = RenderThread::spawn(&context, Pacing::Freewheel).unwrap();
    std::thread::scope(|scope| {
        for source in &sources {
            let gain = &gain;
            scope.spawn(move || {
                for _ in 0..PAIRS_PER_THREAD {
                    source.connect_to(gain).unwrap();
                    source.disconnect(0).unwrap();
                }
            });
        }
    });
    context.flush_pending();
    render.stop();
    assert!(render.quanta_rendered() > 0);

    assert_eq!(context.connection_count(), 0);
    assert_eq!(gain.connection_ref_count(), 0);
    for source in &sources {
        assert!(source.output_consumers(0).unwrap().is_empty());
    }
    // One more quantum syncs render state with the settled topology.
    render_channel(&context, 1, 0);
    let input = gain.input_ref(0).unwrap();
    assert!(context.with_render_lock(|r| r.rendering_outputs(input)).is_empty());
}

/// Handles dropped on other threads are finalized by the main thread.
#[test]
fn test_release_from_other_threads() {
    let context = test_context();
    let baseline = context.node_count();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let context = &context;
            scope.spawn(move || {
                let gain = GainNode::new(context, 1.0).unwrap();
                let dc = ConstantSourceNode::new(context, 1.0).unwrap();
                dc.connect_to(&gain).unwrap();
                dc.start(0.0).unwrap();
            });
        }
    });

    let mut bus = context.create_render_bus();
    for _ in 0..3 {
        context.render(&mut bus);
        context.dispatch_main_thread();
    }
    assert_eq!(context.node_count(), baseline);
    assert_eq!(context.connection_count(), 0);
}

/// Parameter writes from a control thread are seen by the render thread.
#[test]
fn test_param_writes_across_threads() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 0.0).unwrap();
    dc.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();

    let offset = dc.offset().clone();
    std::thread::spawn(move || offset.set_value(0.75).unwrap())
        .join()
        .unwrap();

    let out = render_channel(&context, 1, 0);
    assert!(out.iter().all(|&s| s == 0.75));
}

/// Holds a constant value and records the thread it is dropped on.
struct TracedCurve {
    value: f32,
    dropped_on: Arc<Mutex<Option<ThreadId>>>,
}

impl ParamAutomation for TracedCurve {
    fn fill(&mut self, _start_time: f64, _sample_rate: f64, values: &mut [f32]) -> bool {
        values.fill(self.value);
        true
    }
}

impl Drop for TracedCurve {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.dropped_on.lock() {
            *slot = Some(thread::current().id());
        }
    }
}

fn render_on_worker(context: &AudioContext) -> Vec<f32> {
    let context = context.clone();
    thread::spawn(move || render_channel(&context, 1, 0))
        .join()
        .unwrap()
}

/// A curve replaced on the render thread is released on the main thread.
#[test]
fn test_replaced_curve_released_on_main_thread() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 0.0).unwrap();
    dc.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();

    let dropped_on = Arc::new(Mutex::new(None));
    dc.offset()
        .set_automation(TracedCurve {
            value: 0.25,
            dropped_on: dropped_on.clone(),
        })
        .unwrap();
    assert!(render_on_worker(&context).iter().all(|&s| s == 0.25));

    dc.offset()
        .set_automation(TracedCurve {
            value: 0.5,
            dropped_on: Arc::new(Mutex::new(None)),
        })
        .unwrap();
    assert!(render_on_worker(&context).iter().all(|&s| s == 0.5));
    assert_eq!(*dropped_on.lock().unwrap(), None);

    context.dispatch_main_thread();
    assert_eq!(*dropped_on.lock().unwrap(), Some(thread::current().id()));
}
