//! Channel negotiation integration tests
//!
//! Tests channel-count modes, speaker up/down mixing, the merger and
//! splitter nodes, and deferred bus growth.

use approx::assert_relative_eq;
use ripieno::core::Error;
use ripieno::prelude::*;
use ripieno::{ChannelConfig, ChannelCountMode, ChannelInterpretation};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::tolerances::*;
use helpers::*;

fn output_width(context: &AudioContext, node: &AudioNode) -> Option<usize> {
    let output = node.output_ref(0).ok()?;
    context.with_render_lock(|r| r.output_bus(output).map(|b| b.number_of_channels()))
}

/// Two mono sources into a merger give stereo with ch0 = A and ch1 = B.
#[test]
fn test_merger_two_mono_sources() {
    let context = test_context();
    let a = OscillatorNode::new(&context, Waveform::Sine, 440.0).unwrap();
    let b = ConstantSourceNode::new(&context, 0.5).unwrap();
    let merger = ChannelMergerNode::new(&context, 2).unwrap();
    a.connect(0, &merger, 0).unwrap();
    b.connect(0, &merger, 1).unwrap();
    merger.connect_to(context.destination()).unwrap();
    a.start(0.0).unwrap();
    b.start(0.0).unwrap();

    let mut bus = context.create_render_bus();
    let mut left = Vec::new();
    let mut right = Vec::new();
    for _ in 0..2 {
        context.render(&mut bus);
        left.extend_from_slice(bus.channel(0));
        right.extend_from_slice(bus.channel(1));
    }

    assert_eq!(output_width(&context, &merger), Some(2));
    let expected = generate_sine(440.0, TEST_SAMPLE_RATE, 256);
    assert!(signals_approx_equal(&left, &expected, FLOAT_EPSILON));
    assert!(right.iter().all(|&s| s == 0.5));
}

/// Disconnecting a merger input narrows the output.
#[test]
fn test_merger_width_follows_connections() {
    let context = test_context();
    let a = ConstantSourceNode::new(&context, 1.0).unwrap();
    let b = indexed_source(&context, 2);
    let merger = ChannelMergerNode::new(&context, 2).unwrap();
    a.connect(0, &merger, 0).unwrap();
    b.connect(0, &merger, 1).unwrap();
    merger.connect_to(context.destination()).unwrap();

    render_channel(&context, 1, 0);
    assert_eq!(output_width(&context, &merger), Some(3));

    b.disconnect(0).unwrap();
    render_channel(&context, 1, 0);
    assert_eq!(output_width(&context, &merger), Some(1));
}

/// The splitter exposes each input channel on its own output.
#[test]
fn test_splitter_outputs() {
    let context = test_context();
    let src = indexed_source(&context, 2);
    let splitter = ChannelSplitterNode::new(&context, 2).unwrap();
    let right = GainNode::new(&context, 1.0).unwrap();
    src.connect_to(&splitter).unwrap();
    splitter.connect(1, &right, 0).unwrap();
    right.connect_to(context.destination()).unwrap();

    let out = render_channel(&context, 1, 0);
    assert!(out.iter().all(|&s| s == 2.0));
}

/// Max mode takes the widest input; gain passes it through.
#[test]
fn test_gain_widens_to_stereo() {
    let context = test_context();
    let src = indexed_source(&context, 2);
    let gain = GainNode::new(&context, 0.5).unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    let mut bus = context.create_render_bus();
    context.render(&mut bus);
    assert_eq!(output_width(&context, &gain), Some(2));
    assert!(bus.channel(0).iter().all(|&s| s == 0.5));
    assert!(bus.channel(1).iter().all(|&s| s == 1.0));
}

/// Explicit mono speakers mode down-mixes stereo to (L + R) / 2.
#[test]
fn test_explicit_mono_downmix() {
    let context = test_context();
    let src = indexed_source(&context, 2);
    let gain = GainNode::new(&context, 1.0).unwrap();
    gain.set_channel_config(ChannelConfig::explicit(1, ChannelInterpretation::Speakers))
        .unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    let out = render_channel(&context, 1, 0);
    assert_eq!(output_width(&context, &gain), Some(1));
    for &s in &out {
        assert_relative_eq!(s, 1.5, epsilon = FLOAT_EPSILON);
    }
}

/// Discrete interpretation drops channels that do not fit.
#[test]
fn test_discrete_downmix_drops_channels() {
    let context = test_context();
    let src = indexed_source(&context, 2);
    let gain = GainNode::new(&context, 1.0).unwrap();
    gain.set_channel_config(ChannelConfig::new(
        1,
        ChannelCountMode::ClampedMax,
        ChannelInterpretation::Discrete,
    ))
    .unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    let out = render_channel(&context, 1, 0);
    assert!(out.iter().all(|&s| s == 1.0));
}

/// Fixed configurations and out-of-range counts are rejected.
#[test]
fn test_channel_config_rejections() {
    let context = test_context();
    assert!(matches!(
        context.destination().set_channel_count(4),
        Err(Error::NotSupported(_))
    ));
    let gain = GainNode::new(&context, 1.0).unwrap();
    assert!(matches!(gain.set_channel_count(0), Err(Error::NotSupported(_))));
    assert!(matches!(gain.set_channel_count(33), Err(Error::NotSupported(_))));
    assert_eq!(gain.channel_count(), 2);

    gain.set_channel_count_mode(ChannelCountMode::Explicit).unwrap();
    assert_eq!(gain.channel_count_mode(), ChannelCountMode::Explicit);
}

/// Widths beyond the preallocated capacity grow on the main thread; the
/// render thread keeps the old width until then.
#[test]
fn test_wide_input_grows_after_dispatch() {
    let context = test_context();
    let src = indexed_source(&context, 10);
    let gain = GainNode::new(&context, 1.0).unwrap();
    src.connect_to(&gain).unwrap();
    gain.connect_to(context.destination()).unwrap();

    render_channel(&context, 1, 0);
    assert_ne!(output_width(&context, &gain), Some(10));

    for _ in 0..4 {
        context.dispatch_main_thread();
        render_channel(&context, 1, 0);
    }
    assert_eq!(output_width(&context, &gain), Some(10));
    let input = gain.input_ref(0).unwrap();
    assert_eq!(context.with_render_lock(|r| r.input_channels(input)), Some(10));

    // Unknown layouts mix discretely into the stereo destination.
    let mut bus = context.create_render_bus();
    context.render(&mut bus);
    assert!(bus.channel(0).iter().all(|&s| s == 1.0));
    assert!(bus.channel(1).iter().all(|&s| s == 2.0));
}
