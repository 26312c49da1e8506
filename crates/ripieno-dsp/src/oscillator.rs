//! Periodic waveform source.

use std::ops::Deref;

use ripieno_core::{
    Arc, AtomicU8, AudioContext, AudioNode, AudioParam, AudioProcessor, NodeInfo, NodeType,
    Ordering, ParamDescriptor, ProcessContext, RenderQuantum,
};
use serde::{Deserialize, Serialize};

use crate::scheduled::Schedule;
use crate::Result;

const FREQUENCY: usize = 0;
const DETUNE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Value at `phase` in cycles, `0.0..1.0`.
    #[inline]
    pub fn evaluate(&self, phase: f64) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f64::consts::TAU).sin() as f32,
            Waveform::Triangle => {
                let p = phase * 4.0;
                let v = if p < 1.0 {
                    p
                } else if p < 3.0 {
                    2.0 - p
                } else {
                    p - 4.0
                };
                v as f32
            }
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => (phase * 2.0 - 1.0) as f32,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Sawtooth => "Sawtooth",
            Waveform::Triangle => "Triangle",
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Waveform::Square,
            2 => Waveform::Sawtooth,
            3 => Waveform::Triangle,
            _ => Waveform::Sine,
        }
    }
}

pub(crate) struct OscillatorProcessor {
    schedule: Arc<Schedule>,
    waveform: Arc<AtomicU8>,
    phase: f64,
    sample_rate: f64,
}

impl AudioProcessor for OscillatorProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let Some(bus) = ctx.outputs.bus_mut(0) else {
            return;
        };
        let Some((begin, end)) = self.schedule.active_frames(&ctx.quantum) else {
            bus.zero();
            return;
        };

        let waveform = Waveform::from_u8(self.waveform.load(Ordering::Relaxed));
        let detune = 2f64.powf(ctx.params.value(DETUNE, 0) as f64 / 1200.0);
        let frequency = ctx.params.values(FREQUENCY);
        let out = bus.channel_mut(0);

        out[..begin].fill(0.0);
        for (frame, sample) in out.iter_mut().enumerate().take(end).skip(begin) {
            *sample = waveform.evaluate(self.phase);
            let hz = frequency.get(frame).copied().unwrap_or(0.0) as f64 * detune;
            self.phase += hz / self.sample_rate;
            self.phase -= self.phase.floor();
        }
        out[end..].fill(0.0);
    }

    fn initialize(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.phase = 0.0;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn propagates_silence(&self, quantum: &RenderQuantum, _last_non_silent_time: f64) -> bool {
        !self.schedule.is_playing(quantum)
    }
}

/// Client handle for an oscillator: a mono source with `frequency` (a-rate,
/// Hz) and `detune` (k-rate, cents) parameters.
#[derive(Debug, Clone)]
pub struct OscillatorNode {
    node: AudioNode,
    frequency: AudioParam,
    detune: AudioParam,
    schedule: Arc<Schedule>,
    waveform: Arc<AtomicU8>,
}

impl OscillatorNode {
    pub fn new(context: &AudioContext, waveform: Waveform, frequency: f32) -> Result<Self> {
        let nyquist = (context.sample_rate() / 2.0) as f32;
        let info = NodeInfo::new(NodeType::Oscillator)
            .output(1)
            .param(ParamDescriptor::new("frequency", frequency).range(-nyquist, nyquist))
            .param(ParamDescriptor::new("detune", 0.0).range(-153600.0, 153600.0).k_rate());

        let schedule = Schedule::shared();
        let shape = Arc::new(AtomicU8::new(waveform.to_u8()));
        let node = context.create_node(
            info,
            OscillatorProcessor {
                schedule: schedule.clone(),
                waveform: shape.clone(),
                phase: 0.0,
                sample_rate: context.sample_rate(),
            },
        )?;
        Ok(Self {
            frequency: node.param(FREQUENCY)?,
            detune: node.param(DETUNE)?,
            node,
            schedule,
            waveform: shape,
        })
    }

    pub fn frequency(&self) -> &AudioParam {
        &self.frequency
    }

    pub fn detune(&self) -> &AudioParam {
        &self.detune
    }

    pub fn waveform(&self) -> Waveform {
        Waveform::from_u8(self.waveform.load(Ordering::Relaxed))
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.waveform.store(waveform.to_u8(), Ordering::Relaxed);
    }

    /// Starts playback at context time `when`, rounded up to a frame.
    pub fn start(&self, when: f64) -> Result<()> {
        self.schedule.start(when)
    }

    pub fn stop(&self, when: f64) -> Result<()> {
        self.schedule.stop(when)
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for OscillatorNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
