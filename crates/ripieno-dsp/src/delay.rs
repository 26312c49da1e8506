//! Variable delay line with linear interpolation.

use std::ops::Deref;

use ripieno_core::{
    AudioContext, AudioNode, AudioParam, AudioProcessor, ChannelNegotiation, NodeInfo, NodeType,
    ParamDescriptor, ProcessContext, MAX_CHANNELS,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DELAY_TIME: usize = 0;

/// Longest delay a node may be created with, in seconds.
pub const MAX_DELAY_TIME: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayOptions {
    /// Upper bound of `delay_time`, in seconds. Also the node's tail time.
    pub max_delay_time: f64,
    /// Channels with their own delay line. Wider inputs output zeros on
    /// the extra channels.
    pub channels: usize,
}

impl Default for DelayOptions {
    fn default() -> Self {
        Self {
            max_delay_time: 1.0,
            channels: 2,
        }
    }
}

impl DelayOptions {
    pub fn new(max_delay_time: f64) -> Self {
        Self {
            max_delay_time,
            ..Self::default()
        }
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_delay_time > 0.0 && self.max_delay_time < MAX_DELAY_TIME) {
            return Err(Error::InvalidParameter(format!(
                "max delay time {} must be in (0, {MAX_DELAY_TIME})",
                self.max_delay_time
            )));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(Error::InvalidChannelCount(format!(
                "{} delay lines (allowed 1..={MAX_CHANNELS})",
                self.channels
            )));
        }
        Ok(())
    }
}

pub(crate) struct DelayProcessor {
    options: DelayOptions,
    rings: Vec<Vec<f32>>,
    write: usize,
    sample_rate: f64,
}

impl DelayProcessor {
    fn new(options: DelayOptions) -> Self {
        Self {
            options,
            rings: Vec::new(),
            write: 0,
            sample_rate: 0.0,
        }
    }

    #[inline]
    fn read(ring: &[f32], write: usize, delay_frames: f64) -> f32 {
        let len = ring.len();
        let mut pos = write as f64 - delay_frames;
        if pos < 0.0 {
            pos += len as f64;
        }
        let i0 = pos.floor() as usize % len;
        let i1 = (i0 + 1) % len;
        let frac = (pos - pos.floor()) as f32;
        ring[i0] + (ring[i1] - ring[i0]) * frac
    }
}

impl AudioProcessor for DelayProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let Some(out) = ctx.outputs.bus_mut(0) else {
            return;
        };
        if self.rings.is_empty() {
            out.zero();
            return;
        }
        let input = ctx.inputs.bus(0).filter(|bus| !bus.is_silent());
        let delay = ctx.params.values(DELAY_TIME);
        let frames = out.length();
        let len = self.rings[0].len();
        let max_frames = (len - 2) as f64;

        for ch in self.rings.len()..out.number_of_channels() {
            out.channel_mut(ch).fill(0.0);
        }

        let start = self.write;
        for (ch, ring) in self.rings.iter_mut().enumerate() {
            let src = input.map_or(&[][..], |bus| bus.channel(ch));
            let mut write = start;
            for frame in 0..frames {
                ring[write] = src.get(frame).copied().unwrap_or(0.0);
                if ch < out.number_of_channels() {
                    let seconds = delay.get(frame).copied().unwrap_or(0.0) as f64;
                    let delay_frames = (seconds * self.sample_rate).clamp(0.0, max_frames);
                    out.channel_mut(ch)[frame] = Self::read(ring, write, delay_frames);
                }
                write = (write + 1) % len;
            }
        }
        self.write = (start + frames) % len;
    }

    fn initialize(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        let len = (self.options.max_delay_time * sample_rate).ceil() as usize + 2;
        self.rings = vec![vec![0.0; len]; self.options.channels];
        self.write = 0;
    }

    fn uninitialize(&mut self) {
        self.rings = Vec::new();
    }

    fn reset(&mut self) {
        for ring in &mut self.rings {
            ring.fill(0.0);
        }
        self.write = 0;
    }

    fn tail_time(&self) -> f64 {
        self.options.max_delay_time
    }

    fn check_number_of_channels_for_input(&mut self, negotiation: &mut ChannelNegotiation<'_>, input: usize) {
        negotiation.update_input(input);
        let channels = negotiation.input_channels(input);
        negotiation.set_output_channels(0, channels);
    }
}

/// Delays its input by the a-rate `delay_time` parameter (seconds).
#[derive(Debug, Clone)]
pub struct DelayNode {
    node: AudioNode,
    delay_time: AudioParam,
    options: DelayOptions,
}

impl DelayNode {
    pub fn new(context: &AudioContext, options: DelayOptions) -> Result<Self> {
        options.validate()?;
        let info = NodeInfo::new(NodeType::Delay).inputs(1).output(1).param(
            ParamDescriptor::new("delay_time", 0.0).range(0.0, options.max_delay_time as f32),
        );
        let node = context.create_node(info, DelayProcessor::new(options))?;
        tracing::debug!(
            node = %node.id(),
            max_delay_time = options.max_delay_time,
            channels = options.channels,
            "delay node created"
        );
        Ok(Self {
            delay_time: node.param(DELAY_TIME)?,
            node,
            options,
        })
    }

    pub fn delay_time(&self) -> &AudioParam {
        &self.delay_time
    }

    pub fn max_delay_time(&self) -> f64 {
        self.options.max_delay_time
    }

    pub fn options(&self) -> &DelayOptions {
        &self.options
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for DelayNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
