//! Node lifecycle integration tests
//!
//! Tests handle release, deferred deletion on the main thread, and
//! initialization state.

use std::sync::atomic::Ordering;

use ripieno::core::Error;
use ripieno::prelude::*;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::tolerances::*;
use helpers::*;

/// A node without handles stays alive while something feeds it.
#[test]
fn test_connected_node_outlives_handle() {
    let context = test_context();
    let (src, _) = counting_source(&context, 0.5);
    let gain = GainNode::new(&context, 1.0).unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    drop(gain);
    let out = render_channel(&context, 2, 0);
    assert!(out.iter().all(|&s| s == 0.5));
    context.dispatch_main_thread();
    assert_eq!(context.node_count(), 3);
}

/// Releasing the last handle of a source tears down the chain it fed.
#[test]
fn test_release_cascades_through_chain() {
    let context = test_context();
    let (src, _) = counting_source(&context, 0.5);
    let gain = GainNode::new(&context, 1.0).unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    drop(gain);
    drop(src);
    let flags = render_silence_flags(&context, 2);
    assert!(flags.iter().all(|&silent| silent));

    context.dispatch_main_thread();
    assert_eq!(context.node_count(), 1);
    assert_eq!(context.connection_count(), 0);
    assert_eq!(context.destination().connection_ref_count(), 0);
}

/// Deletion happens on the main thread, never inside render.
#[test]
fn test_finalization_waits_for_dispatch() {
    let context = test_context();
    let (src, _) = counting_source(&context, 1.0);
    drop(src);

    render_channel(&context, 1, 0);
    assert_eq!(context.node_count(), 2);
    assert!(context.dispatcher().pending() >= 1);

    context.dispatch_main_thread();
    assert_eq!(context.node_count(), 1);
}

/// Parameters of a released node reject changes.
#[test]
fn test_released_node_rejects_param_changes() {
    let context = test_context();
    let gain = GainNode::new(&context, 1.0).unwrap();
    let param = gain.gain().clone();
    drop(gain);
    assert!(matches!(param.set_value(0.5), Err(Error::InvalidState(_))));
}

/// Nodes initialize lazily on first connection.
#[test]
fn test_lazy_initialization() {
    let context = test_context();
    let gain = GainNode::new(&context, 1.0).unwrap();
    assert!(!gain.is_initialized());
    gain.connect_to(context.destination()).unwrap();
    assert!(gain.is_initialized());
    assert!(context.destination().is_initialized());
}

/// An uninitialized node renders silence even while connected.
#[test]
fn test_uninitialized_node_is_silent() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 1.0).unwrap();
    dc.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();
    dc.uninitialize();

    let out = render_channel(&context, 1, 0);
    assert_silence(&out, 0.0);

    dc.initialize().unwrap();
    let out = render_channel(&context, 1, 0);
    assert!(out.iter().all(|&s| s == 1.0));
}

/// Resetting a delay clears its history.
#[test]
fn test_reset_clears_delay_line() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 1.0).unwrap();
    let delay = DelayNode::new(&context, ripieno::DelayOptions::new(0.1)).unwrap();
    delay.delay_time().set_value(0.05).unwrap();
    dc.connect_to(&delay).unwrap();
    delay.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();

    let out = render_channel(&context, 30, 0);
    assert_eq!(out[out.len() - 1], 1.0);

    dc.disconnect(0).unwrap();
    delay.reset();
    let out = render_channel(&context, 10, 0);
    assert_silence(&out, 0.0);
}

/// A closed context refuses new nodes and renders silence.
#[test]
fn test_closed_context() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 1.0).unwrap();
    dc.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();
    context.close();

    assert!(context.is_closed());
    assert!(GainNode::new(&context, 1.0).is_err());
    let flags = render_silence_flags(&context, 2);
    assert!(flags.iter().all(|&silent| silent));
}

/// A node whose last input connection goes away is disabled and no longer
/// pulled; reconnecting it resumes processing.
#[test]
fn test_dormant_node_is_not_processed() {
    let context = test_context();
    let (src, _) = counting_source(&context, 0.5);
    let (pass, calls) = counting_pass_through(&context);
    src.connect_to(&pass).unwrap();
    pass.connect_to(context.destination()).unwrap();

    render_channel(&context, 2, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    src.disconnect(0).unwrap();
    let out = render_channel(&context, 4, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(pass.is_disabled());
    assert_silence(&out, SILENCE_THRESHOLD);

    src.connect_to(&pass).unwrap();
    let out = render_channel(&context, 2, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(!pass.is_disabled());
    assert!(out.iter().all(|&s| s == 0.5));
}
