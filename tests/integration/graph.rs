//! Audio graph integration tests
//!
//! Tests connection semantics, pull memoization and reference counts.

use std::sync::atomic::Ordering;

use ripieno::core::{Error, PortKind};
use proptest::prelude::*;
use ripieno::prelude::*;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// A source feeding two consumers is processed once per quantum.
#[test]
fn test_fan_out_processes_source_once() {
    let context = test_context();
    let (src, calls) = counting_source(&context, 0.5);
    let a = gain_node(&context, 1.0);
    let b = gain_node(&context, 1.0);
    src.connect_to(&a).unwrap();
    src.connect_to(&b).unwrap();
    a.connect_to(context.destination()).unwrap();
    b.connect_to(context.destination()).unwrap();

    let out = render_channel(&context, 1, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Both paths sum at the destination.
    assert!(out.iter().all(|&s| s == 1.0));

    render_channel(&context, 3, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Connecting the same pair twice leaves one edge and one reference.
#[test]
fn test_connect_is_idempotent() {
    let context = test_context();
    let (src, _) = counting_source(&context, 1.0);
    let gain = gain_node(&context, 1.0);
    src.connect_to(&gain).unwrap();
    src.connect_to(&gain).unwrap();

    assert_eq!(context.connection_count(), 1);
    assert_eq!(gain.connection_ref_count(), 1);
    assert_eq!(src.output_consumers(0).unwrap().len(), 1);
}

/// Disconnecting twice is harmless and references return to zero.
#[test]
fn test_disconnect_is_idempotent() {
    let context = test_context();
    let (src, _) = counting_source(&context, 1.0);
    let gain = gain_node(&context, 1.0);
    src.connect_to(&gain).unwrap();
    src.disconnect(0).unwrap();
    src.disconnect(0).unwrap();

    assert_eq!(context.connection_count(), 0);
    assert_eq!(gain.connection_ref_count(), 0);
    assert!(!gain.input_is_connected(0).unwrap());
}

/// Out-of-range ports are rejected with the port kind and bounds.
#[test]
fn test_port_index_errors() {
    let context = test_context();
    let (src, _) = counting_source(&context, 1.0);
    let gain = gain_node(&context, 1.0);

    match src.connect(1, &gain, 0) {
        Err(Error::IndexOutOfRange { kind, index, count }) => {
            assert_eq!(kind, PortKind::Output);
            assert_eq!(index, 1);
            assert_eq!(count, 1);
        }
        other => panic!("expected IndexOutOfRange, got {:?}", other),
    }
    assert!(matches!(
        src.connect(0, &gain, 3),
        Err(Error::IndexOutOfRange { kind: PortKind::Input, .. })
    ));
    assert!(matches!(
        gain.param(2),
        Err(Error::IndexOutOfRange { kind: PortKind::Param, .. })
    ));
    assert_eq!(context.connection_count(), 0);
}

/// Nodes from different contexts cannot be connected.
#[test]
fn test_cross_context_connect_rejected() {
    let a = test_context();
    let b = test_context();
    let (src, _) = counting_source(&a, 1.0);
    assert!(matches!(
        src.connect_to(b.destination()),
        Err(Error::InvalidArgument(_))
    ));
}

/// A feedback loop renders without hanging; the loop edge reads silence.
#[test]
fn test_cycle_terminates() {
    let context = test_context();
    let (src, calls) = counting_source(&context, 0.25);
    let a = gain_node(&context, 1.0);
    let b = gain_node(&context, 1.0);
    src.connect_to(&a).unwrap();
    a.connect_to(&b).unwrap();
    b.connect_to(&a).unwrap();
    a.connect_to(context.destination()).unwrap();

    let out = render_channel(&context, 2, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(out.iter().all(|s| s.is_finite()));
}

/// Connection references count incoming edges.
#[test]
fn test_connection_refs_count_incoming_edges() {
    let context = test_context();
    let merger = ChannelMergerNode::new(&context, 3).unwrap();
    let sources: Vec<_> = (0..3).map(|_| counting_source(&context, 1.0).0).collect();
    for (i, src) in sources.iter().enumerate() {
        src.connect(0, &merger, i).unwrap();
    }
    assert_eq!(merger.connection_ref_count(), 3);
    assert_eq!(merger.normal_ref_count(), 1);

    sources[1].disconnect(0).unwrap();
    assert_eq!(merger.connection_ref_count(), 2);
    assert!(merger.input_is_connected(0).unwrap());
    assert!(!merger.input_is_connected(1).unwrap());
}

/// Cloned handles add normal references.
#[test]
fn test_handle_clone_refs() {
    let context = test_context();
    let gain = gain_node(&context, 1.0);
    let copy = gain.node().clone();
    assert_eq!(gain.normal_ref_count(), 2);
    assert_eq!(copy, *gain.node());
    drop(copy);
    assert_eq!(gain.normal_ref_count(), 1);
}

/// The live-node census groups nodes by type.
#[test]
fn test_node_counts_by_type() {
    let context = test_context();
    let _a = gain_node(&context, 1.0);
    let _b = gain_node(&context, 1.0);
    let _osc = OscillatorNode::new(&context, Waveform::Sine, 220.0).unwrap();
    let counts = context.node_counts();
    assert_eq!(counts.get("gain"), Some(&2));
    assert_eq!(counts.get("oscillator"), Some(&1));
    assert_eq!(context.node_count(), 4);
}

proptest! {
    /// Any sequence of connects and disconnects leaves one connection ref
    /// per connected source.
    #[test]
    fn test_random_edits_keep_refcounts(ops in prop::collection::vec((0usize..4, any::<bool>()), 1..40)) {
        let context = test_context();
        let gain = gain_node(&context, 1.0);
        let sources: Vec<ConstantSourceNode> = (0..4)
            .map(|_| ConstantSourceNode::new(&context, 1.0).unwrap())
            .collect();
        let mut connected = [false; 4];
        for (index, connect) in ops {
            if connect {
                sources[index].connect_to(&gain).unwrap();
            } else {
                sources[index].disconnect(0).unwrap();
            }
            connected[index] = connect;
        }
        context.flush_pending();

        let expected = connected.iter().filter(|&&c| c).count();
        prop_assert_eq!(gain.connection_ref_count(), expected);
        prop_assert_eq!(context.connection_count(), expected);
    }
}

fn gain_node(context: &AudioContext, gain: f32) -> GainNode {
    GainNode::new(context, gain).expect("Failed to create gain")
}
