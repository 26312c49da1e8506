//! Factory handle for creating the standard nodes in a context.

use ripieno_core::AudioContext;

use crate::{
    ChannelMergerNode, ChannelSplitterNode, ConstantSourceNode, DelayNode, DelayOptions, GainNode,
    OscillatorNode, Result, Waveform,
};

pub struct DspHandle<'a> {
    context: &'a AudioContext,
}

impl<'a> DspHandle<'a> {
    pub fn new(context: &'a AudioContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a AudioContext {
        self.context
    }

    pub fn oscillator(&self, waveform: Waveform, frequency: f32) -> Result<OscillatorNode> {
        OscillatorNode::new(self.context, waveform, frequency)
    }

    pub fn constant(&self, offset: f32) -> Result<ConstantSourceNode> {
        ConstantSourceNode::new(self.context, offset)
    }

    pub fn gain(&self, gain: f32) -> Result<GainNode> {
        GainNode::new(self.context, gain)
    }

    pub fn delay(&self, max_delay_time: f64) -> Result<DelayNode> {
        DelayNode::new(self.context, DelayOptions::new(max_delay_time))
    }

    pub fn delay_with(&self, options: DelayOptions) -> Result<DelayNode> {
        DelayNode::new(self.context, options)
    }

    pub fn merger(&self, inputs: usize) -> Result<ChannelMergerNode> {
        ChannelMergerNode::new(self.context, inputs)
    }

    pub fn splitter(&self, outputs: usize) -> Result<ChannelSplitterNode> {
        ChannelSplitterNode::new(self.context, outputs)
    }
}
