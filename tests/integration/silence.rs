//! Silence propagation integration tests
//!
//! Tests that silent inputs skip processing and that tail time keeps a
//! node rendering after its input stops.

use std::sync::atomic::Ordering;

use ripieno::prelude::*;
use ripieno::DelayOptions;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::tolerances::*;
use helpers::*;

/// An empty graph renders silence with the silent flag set.
#[test]
fn test_empty_graph_is_silent() {
    let context = test_context();
    let flags = render_silence_flags(&context, 4);
    assert!(flags.iter().all(|&silent| silent));
}

/// Silent source -> gain -> destination reports silence from the first
/// quantum on.
#[test]
fn test_silent_chain_sets_silent_flag() {
    let context = test_context();
    let osc = OscillatorNode::new(&context, Waveform::Sine, 440.0).unwrap();
    let gain = GainNode::new(&context, 1.0).unwrap();
    osc.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    let flags = render_silence_flags(&context, 3);
    assert_eq!(flags, vec![true, true, true]);

    let output = gain.output_ref(0).unwrap();
    let gain_silent = context.with_render_lock(|r| r.output_bus(output).map(|b| b.is_silent()));
    assert_eq!(gain_silent, Some(true));
}

/// Silence stops once the source starts and resumes after it stops.
#[test]
fn test_silence_follows_source_schedule() {
    let context = test_context();
    let osc = OscillatorNode::new(&context, Waveform::Sine, 440.0).unwrap();
    osc.connect_to(context.destination()).unwrap();
    osc.start(128.0 / TEST_SAMPLE_RATE).unwrap();
    osc.stop(256.0 / TEST_SAMPLE_RATE).unwrap();

    let flags = render_silence_flags(&context, 4);
    assert_eq!(flags, vec![true, false, false, true]);
}

/// A delay with a 0.5 s tail keeps producing non-silent output for at
/// least 0.5 s after its source disconnects, then goes silent.
#[test]
fn test_delay_tail_outlives_source() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 1.0).unwrap();
    let delay = DelayNode::new(&context, DelayOptions::new(0.5)).unwrap();
    delay.delay_time().set_value(0.1).unwrap();
    dc.connect_to(&delay).unwrap();
    delay.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();

    render_channel(&context, 40, 0);
    let disconnected_at = context.current_time();
    dc.disconnect(0).unwrap();

    let tail_quanta = (0.5 * TEST_SAMPLE_RATE / TEST_QUANTUM as f64).ceil() as usize;
    let mut bus = context.create_render_bus();
    for _ in 0..tail_quanta {
        context.render(&mut bus);
        assert!(
            !bus.is_silent(),
            "silent at {:.4}s, {:.4}s after disconnect",
            context.current_time(),
            context.current_time() - disconnected_at
        );
    }
    assert!(context.current_time() - disconnected_at >= 0.5);

    // Past the tail the delay propagates silence again.
    let flags = render_silence_flags(&context, 4);
    assert!(flags[flags.len() - 1]);
}

/// The delayed signal itself ends one delay time after the input.
#[test]
fn test_delay_output_drains() {
    let context = test_context();
    let dc = ConstantSourceNode::new(&context, 1.0).unwrap();
    let delay = DelayNode::new(&context, DelayOptions::new(0.5)).unwrap();
    delay.delay_time().set_value(0.1).unwrap();
    dc.connect_to(&delay).unwrap();
    delay.connect_to(context.destination()).unwrap();
    dc.start(0.0).unwrap();

    render_channel(&context, 40, 0);
    dc.disconnect(0).unwrap();

    let out = render_channel(&context, 60, 0);
    let delay_frames = (0.1 * TEST_SAMPLE_RATE) as usize;
    assert_has_audio(&out[..delay_frames - 1], 0.5);
    assert_silence(&out[delay_frames + 1..], SILENCE_THRESHOLD);
}

/// A node with silent inputs and no tail is visited but not processed.
#[test]
fn test_silent_inputs_skip_processing() {
    let context = test_context();
    let (src, calls) = counting_source(&context, 0.5);
    let gain = GainNode::new(&context, 1.0).unwrap();
    gain.connect_to(context.destination()).unwrap();
    src.connect_to(context.destination()).unwrap();

    render_channel(&context, 2, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(gain.last_processing_time(), TEST_QUANTUM as f64 / TEST_SAMPLE_RATE);
    assert_eq!(gain.last_non_silent_time(), -1.0);
}
