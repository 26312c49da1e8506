//! Renders two seconds of a 440 Hz sine with a fade-in to a WAV file.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example offline_sine -- out.wav
//! ```

use ripieno::prelude::*;
use tracing_subscriber::EnvFilter;

const SECONDS: f64 = 2.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "offline_sine.wav".into());
    let engine = RipienoEngine::builder().sample_rate(44100.0).build()?;

    let osc = engine.oscillator(Waveform::Sine, 440.0)?;
    let fade = engine.gain(0.0)?;
    osc.connect_to(&fade)?;
    fade.connect_to(engine.destination())?;
    osc.start(0.0)?;

    let sample_rate = engine.sample_rate();
    fade.gain().set_automation(|start: f64, sr: f64, values: &mut [f32]| {
        let ramp = 0.5 * sr;
        let first = (start * sr).round();
        for (i, v) in values.iter_mut().enumerate() {
            *v = 0.5 * ((first + i as f64).min(ramp) / ramp) as f32;
        }
        true
    })?;

    let frames = (SECONDS * sample_rate) as usize;
    let channels = engine.render_offline(frames);
    tracing::info!(frames, channels = channels.len(), "rendered");

    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;
    tracing::info!(path = %path, "wrote wav");
    Ok(())
}
