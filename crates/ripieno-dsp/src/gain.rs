//! Per-sample gain.

use std::ops::Deref;

use ripieno_core::{
    AudioContext, AudioNode, AudioParam, AudioProcessor, ChannelNegotiation, NodeInfo, NodeType,
    ParamDescriptor, ProcessContext,
};

use crate::Result;

const GAIN: usize = 0;

/// Multiplies the input by the a-rate `gain` parameter. The output has as
/// many channels as the mixed input.
pub(crate) struct GainProcessor;

impl AudioProcessor for GainProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let Some(out) = ctx.outputs.bus_mut(0) else {
            return;
        };
        let Some(input) = ctx.inputs.bus(0) else {
            out.zero();
            return;
        };
        if input.is_silent() {
            out.zero();
            return;
        }

        let gain = ctx.params.values(GAIN);
        for ch in 0..out.number_of_channels() {
            let src = input.channel(ch);
            let dst = out.channel_mut(ch);
            if src.is_empty() {
                dst.fill(0.0);
                continue;
            }
            for ((d, s), g) in dst.iter_mut().zip(src).zip(gain) {
                *d = s * g;
            }
        }
    }

    fn check_number_of_channels_for_input(&mut self, negotiation: &mut ChannelNegotiation<'_>, input: usize) {
        negotiation.update_input(input);
        let channels = negotiation.input_channels(input);
        negotiation.set_output_channels(0, channels);
    }
}

#[derive(Debug, Clone)]
pub struct GainNode {
    node: AudioNode,
    gain: AudioParam,
}

impl GainNode {
    pub fn new(context: &AudioContext, gain: f32) -> Result<Self> {
        let info = NodeInfo::new(NodeType::Gain)
            .inputs(1)
            .output(1)
            .param(ParamDescriptor::new("gain", gain));
        let node = context.create_node(info, GainProcessor)?;
        Ok(Self {
            gain: node.param(GAIN)?,
            node,
        })
    }

    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for GainNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
