//! The node every context renders from.

use crate::channel::{ChannelConfig, ChannelInterpretation};
use crate::node::{NodeInfo, NodeType};
use crate::processor::{AudioProcessor, ProcessContext};

/// Declaration of a destination with `channels` outputs. Its input always
/// mixes to exactly that width.
pub(crate) fn destination_info(channels: usize) -> NodeInfo {
    NodeInfo::new(NodeType::Destination)
        .inputs(1)
        .output(channels)
        .channel_config(ChannelConfig::explicit(channels, ChannelInterpretation::Speakers))
        .fixed_channel_config()
}

/// Copies the mixed input to the output the context hands to the host.
#[derive(Debug, Default)]
pub(crate) struct DestinationProcessor;

impl AudioProcessor for DestinationProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let input = ctx.inputs.bus(0);
        let Some(output) = ctx.outputs.bus_mut(0) else {
            return;
        };
        match input {
            Some(bus) => output.copy_from(bus, ChannelInterpretation::Speakers),
            None => output.zero(),
        }
    }
}
