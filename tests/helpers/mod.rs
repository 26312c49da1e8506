//! Test helpers and fixtures for ripieno integration tests
//!
//! Every test drives rendering by hand, one quantum at a time, so results
//! are deterministic and no audio device is needed.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `DSP_EPSILON` (1e-4): DSP processing (interpolation, detune)
//! - `PERCEPTUAL_EPSILON` (0.001): Perceptual equivalence (-60dB)
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ripieno::prelude::*;
use ripieno::RenderQuantum;

/// Sample rate used by every fixture.
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Frames per render quantum.
pub const TEST_QUANTUM: usize = 128;

/// Create a basic test engine: 44.1 kHz, 128-frame quanta, stereo.
pub fn test_engine() -> RipienoEngine {
    RipienoEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .render_quantum(TEST_QUANTUM)
        .build()
        .expect("Failed to create test engine")
}

/// Create a bare context with the test settings.
pub fn test_context() -> AudioContext {
    AudioContext::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .render_quantum(TEST_QUANTUM)
        .build()
        .expect("Failed to create test context")
}

/// Render `quanta` quanta and return channel `channel` concatenated.
pub fn render_channel(context: &AudioContext, quanta: usize, channel: usize) -> Vec<f32> {
    let mut bus = context.create_render_bus();
    let mut out = Vec::with_capacity(quanta * bus.length());
    for _ in 0..quanta {
        context.render(&mut bus);
        out.extend_from_slice(bus.channel(channel));
    }
    out
}

/// Render `quanta` quanta and return the silent flag of each.
pub fn render_silence_flags(context: &AudioContext, quanta: usize) -> Vec<bool> {
    let mut bus = context.create_render_bus();
    (0..quanta)
        .map(|_| {
            context.render(&mut bus);
            bus.is_silent()
        })
        .collect()
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Check if two signals are approximately equal within tolerance.
pub fn signals_approx_equal(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tolerance)
}

/// Largest absolute difference between two equal-length signals.
pub fn max_difference(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f32, f32::max)
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

// =============================================================================
// Probe processors
// =============================================================================

/// Source that always plays `value` and counts how often it is processed.
pub struct CountingSource {
    pub value: f32,
    pub calls: Arc<AtomicUsize>,
}

impl AudioProcessor for CountingSource {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(bus) = ctx.outputs.bus_mut(0) {
            bus.channel_mut(0).fill(self.value);
        }
    }

    fn propagates_silence(&self, _quantum: &RenderQuantum, _last_non_silent_time: f64) -> bool {
        false
    }
}

/// Create a mono [`CountingSource`] and its call counter.
pub fn counting_source(context: &AudioContext, value: f32) -> (AudioNode, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let node = context
        .create_node(
            NodeInfo::new(NodeType::Custom).output(1),
            CountingSource {
                value,
                calls: calls.clone(),
            },
        )
        .expect("Failed to create counting source");
    (node, calls)
}

/// Mono pass-through that counts its `process` calls and never skips on
/// silence.
pub struct CountingPassThrough {
    pub calls: Arc<AtomicUsize>,
}

impl AudioProcessor for CountingPassThrough {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input = ctx.inputs.bus(0);
        if let Some(out) = ctx.outputs.bus_mut(0) {
            match input {
                Some(bus) => out.channel_mut(0).copy_from_slice(bus.channel(0)),
                None => out.zero(),
            }
        }
    }

    fn propagates_silence(&self, _quantum: &RenderQuantum, _last_non_silent_time: f64) -> bool {
        false
    }
}

pub fn counting_pass_through(context: &AudioContext) -> (AudioNode, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let node = context
        .create_node(
            NodeInfo::new(NodeType::Custom).inputs(1).output(1),
            CountingPassThrough {
                calls: calls.clone(),
            },
        )
        .expect("Failed to create pass-through");
    (node, calls)
}

/// Source whose output channel `i` carries the constant `i + 1`.
pub struct IndexedSource;

impl AudioProcessor for IndexedSource {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        if let Some(bus) = ctx.outputs.bus_mut(0) {
            for ch in 0..bus.number_of_channels() {
                bus.channel_mut(ch).fill((ch + 1) as f32);
            }
        }
    }

    fn propagates_silence(&self, _quantum: &RenderQuantum, _last_non_silent_time: f64) -> bool {
        false
    }
}

pub fn indexed_source(context: &AudioContext, channels: usize) -> AudioNode {
    context
        .create_node(NodeInfo::new(NodeType::Custom).output(channels), IndexedSource)
        .expect("Failed to create indexed source")
}
