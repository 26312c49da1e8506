//! The processing contract implemented by every node kind.

use crate::bus::AudioBus;
use crate::channel::ChannelConfig;
use crate::input::AudioNodeInput;
use crate::node::NodeId;
use crate::output::AudioNodeOutput;
use crate::param::ParamRender;
use crate::render::{output_bus, GrowthRequests, GrowthTarget, NodePorts, NodeSlots, PortGrowth};

/// Timing of the quantum being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderQuantum {
    /// Frame index of the first frame in the quantum.
    pub sample_frame: u64,
    pub frames: usize,
    pub sample_rate: f64,
}

impl RenderQuantum {
    /// Context time at the start of the quantum, in seconds.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.sample_frame as f64 / self.sample_rate
    }

    /// Context time just past the last frame of the quantum.
    #[inline]
    pub fn end_time(&self) -> f64 {
        (self.sample_frame + self.frames as u64) as f64 / self.sample_rate
    }

    /// Context time of frame `frame` within the quantum.
    #[inline]
    pub fn time_of_frame(&self, frame: usize) -> f64 {
        (self.sample_frame + frame as u64) as f64 / self.sample_rate
    }
}

/// Signal processing for one node.
///
/// Runs on the render thread with the render lock held. Implementations must
/// not block, allocate or touch the graph lock from [`process`](Self::process).
pub trait AudioProcessor: Send {
    /// Reads the node's inputs and parameters, writes its outputs.
    fn process(&mut self, ctx: &mut ProcessContext<'_>);

    /// Allocates DSP state. Called once before the first render, on a
    /// control thread.
    fn initialize(&mut self, _sample_rate: f64) {}

    fn uninitialize(&mut self) {}

    /// Clears internal history such as delay lines.
    fn reset(&mut self) {}

    /// Seconds of output produced after the input goes silent.
    fn tail_time(&self) -> f64 {
        0.0
    }

    /// Seconds between input and corresponding output.
    fn latency_time(&self) -> f64 {
        0.0
    }

    /// Whether silent inputs imply silent outputs for this quantum.
    /// Sources override this to report whether they are playing.
    fn propagates_silence(&self, quantum: &RenderQuantum, last_non_silent_time: f64) -> bool {
        last_non_silent_time + self.latency_time() + self.tail_time() < quantum.current_time()
    }

    /// Recomputes channel counts after input `input` changed. Nodes whose
    /// output width depends on their inputs override this.
    fn check_number_of_channels_for_input(&mut self, negotiation: &mut ChannelNegotiation<'_>, input: usize) {
        negotiation.update_input(input);
    }
}

/// Everything a processor sees during one [`AudioProcessor::process`] call.
pub struct ProcessContext<'a> {
    pub quantum: RenderQuantum,
    pub inputs: Inputs<'a>,
    pub outputs: Outputs<'a>,
    pub params: Params<'a>,
}

/// Mixed input buses for the current quantum.
pub struct Inputs<'a> {
    pub(crate) ports: &'a [AudioNodeInput],
    pub(crate) slots: &'a NodeSlots,
}

impl<'a> Inputs<'a> {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.ports.get(index).is_some_and(AudioNodeInput::is_connected)
    }

    /// The mixed bus of input `index`, or `None` when nothing feeds it.
    pub fn bus(&self, index: usize) -> Option<&'a AudioBus> {
        let port = self.ports.get(index)?;
        if !port.is_connected() {
            return None;
        }
        Some(port.bus(self.slots))
    }

    pub fn number_of_channels(&self, index: usize) -> usize {
        self.ports.get(index).map_or(0, AudioNodeInput::number_of_channels)
    }
}

/// Output buses to write this quantum.
pub struct Outputs<'a> {
    pub(crate) ports: &'a mut [AudioNodeOutput],
}

impl Outputs<'_> {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn bus(&self, index: usize) -> Option<&AudioBus> {
        self.ports.get(index).map(AudioNodeOutput::bus)
    }

    pub fn bus_mut(&mut self, index: usize) -> Option<&mut AudioBus> {
        self.ports.get_mut(index).map(AudioNodeOutput::bus_mut)
    }

    /// Width last requested for output `index`; differs from the bus width
    /// while a reallocation is pending.
    pub fn desired_channels(&self, index: usize) -> usize {
        self.ports.get(index).map_or(0, AudioNodeOutput::desired_channels)
    }
}

/// Parameter blocks for this quantum.
pub struct Params<'a> {
    pub(crate) params: &'a [ParamRender],
}

impl<'a> Params<'a> {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// One value per frame; k-rate parameters repeat a single value.
    pub fn values(&self, index: usize) -> &'a [f32] {
        match self.params.get(index) {
            Some(param) => param.values(),
            None => &[],
        }
    }

    pub fn value(&self, index: usize, frame: usize) -> f32 {
        self.values(index).get(frame).copied().unwrap_or(0.0)
    }
}

/// Channel-count negotiation for one node, under the render lock.
///
/// Width changes that fit the existing buses apply immediately. Anything
/// larger is recorded and applied later off the render thread; until then
/// the bus keeps its previous width.
pub struct ChannelNegotiation<'a> {
    pub(crate) node: NodeId,
    pub(crate) ports: &'a mut NodePorts,
    pub(crate) slots: &'a NodeSlots,
    pub(crate) max_channels: usize,
    pub(crate) growth: &'a mut GrowthRequests,
}

impl ChannelNegotiation<'_> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn channel_config(&self) -> ChannelConfig {
        self.ports.state.channel_config()
    }

    pub fn number_of_inputs(&self) -> usize {
        self.ports.inputs.len()
    }

    pub fn number_of_outputs(&self) -> usize {
        self.ports.outputs.len()
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn is_input_connected(&self, input: usize) -> bool {
        self.ports.inputs.get(input).is_some_and(AudioNodeInput::is_connected)
    }

    /// Widest enabled upstream output feeding `input`, 0 when unconnected.
    pub fn max_upstream_channels(&self, input: usize) -> usize {
        let Some(port) = self.ports.inputs.get(input) else {
            return 0;
        };
        port.rendering_outputs
            .iter()
            .filter_map(|src| {
                if src.node == self.node {
                    self.ports.outputs.get(src.index).map(AudioNodeOutput::number_of_channels)
                } else {
                    output_bus(self.slots, *src).map(AudioBus::number_of_channels)
                }
            })
            .max()
            .unwrap_or(0)
    }

    /// Mix width `input` should have under the node's channel configuration.
    pub fn computed_input_channels(&self, input: usize) -> usize {
        self.channel_config()
            .computed_channels(self.max_upstream_channels(input))
            .min(self.max_channels)
    }

    /// Current mix width of `input`.
    pub fn input_channels(&self, input: usize) -> usize {
        self.ports.inputs.get(input).map_or(0, AudioNodeInput::number_of_channels)
    }

    /// Resizes `input`'s summing bus to its computed width.
    pub fn update_input(&mut self, input: usize) {
        let channels = self.computed_input_channels(input);
        let Some(port) = self.ports.inputs.get_mut(input) else {
            return;
        };
        if !port.update_internal_bus(channels) {
            self.growth.push(PortGrowth {
                node: self.node,
                target: GrowthTarget::Input(input),
                size: channels,
            });
        }
    }

    pub fn output_channels(&self, output: usize) -> usize {
        self.ports.outputs.get(output).map_or(0, AudioNodeOutput::number_of_channels)
    }

    /// Requests a new width for `output`. Returns `false` if `channels` is
    /// 0 or above the context maximum.
    pub fn set_output_channels(&mut self, output: usize, channels: usize) -> bool {
        if channels == 0 || channels > self.max_channels {
            return false;
        }
        let Some(port) = self.ports.outputs.get_mut(output) else {
            return false;
        };
        if !port.set_number_of_channels(channels) {
            self.growth.push(PortGrowth {
                node: self.node,
                target: GrowthTarget::Output(output),
                size: channels,
            });
        }
        true
    }
}
