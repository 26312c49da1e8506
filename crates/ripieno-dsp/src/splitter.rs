//! Splits one input into mono outputs.

use std::ops::Deref;

use ripieno_core::{
    AudioContext, AudioNode, AudioProcessor, ChannelConfig, ChannelInterpretation, NodeInfo,
    NodeType, ProcessContext, MAX_NODE_OUTPUTS,
};

use crate::{Error, Result};

/// Output `i` carries input channel `i`. The input is always mixed to
/// exactly one channel per output.
pub(crate) struct SplitterProcessor;

impl AudioProcessor for SplitterProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let input = ctx.inputs.bus(0);
        for index in 0..ctx.outputs.len() {
            let Some(out) = ctx.outputs.bus_mut(index) else {
                continue;
            };
            match input {
                Some(bus) if index < bus.number_of_channels() => {
                    out.channel_mut(0).copy_from_slice(bus.channel(index));
                }
                _ => out.zero(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelSplitterNode {
    node: AudioNode,
    outputs: usize,
}

impl ChannelSplitterNode {
    pub fn new(context: &AudioContext, outputs: usize) -> Result<Self> {
        if outputs == 0 || outputs > MAX_NODE_OUTPUTS || outputs > context.config().max_channels {
            tracing::warn!(outputs = outputs, "rejected channel count");
            return Err(Error::InvalidChannelCount(format!(
                "splitter with {outputs} outputs (allowed 1..={MAX_NODE_OUTPUTS})"
            )));
        }
        let info = NodeInfo::new(NodeType::ChannelSplitter)
            .inputs(1)
            .outputs(outputs, 1)
            .channel_config(ChannelConfig::explicit(outputs, ChannelInterpretation::Discrete))
            .fixed_channel_config();
        Ok(Self {
            node: context.create_node(info, SplitterProcessor)?,
            outputs,
        })
    }

    pub fn number_of_splits(&self) -> usize {
        self.outputs
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for ChannelSplitterNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
