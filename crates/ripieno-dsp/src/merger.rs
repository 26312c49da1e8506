//! Combines several inputs into one multi-channel output.

use std::ops::Deref;

use ripieno_core::{
    AudioContext, AudioNode, AudioProcessor, ChannelConfig, ChannelCountMode, ChannelInterpretation,
    ChannelNegotiation, NodeInfo, NodeType, ProcessContext, MAX_NODE_INPUTS,
};

use crate::{Error, Result};

/// Output channels are the channels of each connected input, in input
/// order. While a wider output bus is being allocated the node outputs
/// silence.
pub(crate) struct MergerProcessor;

impl AudioProcessor for MergerProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let desired = ctx.outputs.desired_channels(0);
        let Some(out) = ctx.outputs.bus_mut(0) else {
            return;
        };
        if desired != out.number_of_channels() {
            out.zero();
            return;
        }

        let mut channel = 0;
        for index in 0..ctx.inputs.len() {
            let Some(input) = ctx.inputs.bus(index) else {
                continue;
            };
            for ch in 0..input.number_of_channels() {
                if channel >= out.number_of_channels() {
                    return;
                }
                out.channel_mut(channel).copy_from_slice(input.channel(ch));
                channel += 1;
            }
        }
        for ch in channel..out.number_of_channels() {
            out.channel_mut(ch).fill(0.0);
        }
    }

    fn check_number_of_channels_for_input(&mut self, negotiation: &mut ChannelNegotiation<'_>, input: usize) {
        negotiation.update_input(input);
        let total: usize = (0..negotiation.number_of_inputs())
            .filter(|&i| negotiation.is_input_connected(i))
            .map(|i| negotiation.input_channels(i))
            .sum();
        let channels = total.clamp(1, negotiation.max_channels());
        negotiation.set_output_channels(0, channels);
    }
}

/// Channel merger with `inputs` inputs, each taking whatever width its
/// sources have.
#[derive(Debug, Clone)]
pub struct ChannelMergerNode {
    node: AudioNode,
}

impl ChannelMergerNode {
    pub fn new(context: &AudioContext, inputs: usize) -> Result<Self> {
        if inputs == 0 || inputs > MAX_NODE_INPUTS {
            tracing::warn!(inputs = inputs, "rejected channel count");
            return Err(Error::InvalidChannelCount(format!(
                "merger with {inputs} inputs (allowed 1..={MAX_NODE_INPUTS})"
            )));
        }
        let info = NodeInfo::new(NodeType::ChannelMerger)
            .inputs(inputs)
            .output(1)
            .channel_config(ChannelConfig::new(
                1,
                ChannelCountMode::Max,
                ChannelInterpretation::Speakers,
            ))
            .fixed_channel_config();
        Ok(Self {
            node: context.create_node(info, MergerProcessor)?,
        })
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for ChannelMergerNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
