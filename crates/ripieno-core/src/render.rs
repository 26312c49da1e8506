//! Render state under the render lock, and the per-quantum pull.

use std::collections::VecDeque;

use crate::bus::AudioBus;
use crate::compat::{Arc, HashMap};
use crate::graph::GraphState;
use crate::input::AudioNodeInput;
use crate::lock::ProcessScope;
use crate::node::{InputRef, NodeId, NodeState, OutputRef, ParamRef};
use crate::output::AudioNodeOutput;
use crate::param::{ParamAutomation, ParamRender};
use crate::processor::{AudioProcessor, ChannelNegotiation, Inputs, Outputs, Params, ProcessContext, RenderQuantum};

/// Render nodes by id. A slot is empty while its node is being processed or
/// negotiated, so re-entering it through a cycle reads silence.
pub(crate) type NodeSlots = HashMap<NodeId, Option<Box<RenderNode>>>;

/// The bus of `output`, if its node is present and not mid-process.
pub(crate) fn output_bus(slots: &NodeSlots, output: OutputRef) -> Option<&AudioBus> {
    slots
        .get(&output.node)?
        .as_deref()?
        .ports
        .outputs
        .get(output.index)
        .map(AudioNodeOutput::bus)
}

/// Render-side port state of one node.
pub(crate) struct NodePorts {
    pub state: Arc<NodeState>,
    pub inputs: Vec<AudioNodeInput>,
    pub outputs: Vec<AudioNodeOutput>,
    pub params: Vec<ParamRender>,
}

pub(crate) struct RenderNode {
    pub processor: Box<dyn AudioProcessor>,
    pub ports: NodePorts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrowthTarget {
    /// Summing bus of an input.
    Input(usize),
    /// Bus of an output.
    Output(usize),
    /// Edge list of an input.
    InputEdges(usize),
    /// Edge list of a parameter.
    ParamEdges(usize),
}

/// A port buffer that must be reallocated before it can hold `size`
/// channels or edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PortGrowth {
    pub node: NodeId,
    pub target: GrowthTarget,
    pub size: usize,
}

const GROWTH_CAPACITY: usize = 64;
const RETIRED_CAPACITY: usize = 16;
const EDGE_CAPACITY: usize = 8;

/// Growth requests recorded on the render thread. Storage is preallocated;
/// requests past it only set `overflowed`, which renegotiates every node.
#[derive(Debug)]
pub(crate) struct GrowthRequests {
    pending: Vec<PortGrowth>,
    overflowed: bool,
}

impl GrowthRequests {
    fn new() -> Self {
        Self {
            pending: Vec::with_capacity(GROWTH_CAPACITY),
            overflowed: false,
        }
    }

    pub fn push(&mut self, request: PortGrowth) {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|r| r.node == request.node && r.target == request.target)
        {
            existing.size = existing.size.max(request.size);
        } else if self.pending.len() < self.pending.capacity() {
            self.pending.push(request);
        } else {
            self.overflowed = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && !self.overflowed
    }
}

/// Everything guarded by the render lock.
pub struct RenderState {
    pub(crate) nodes: NodeSlots,
    pub(crate) automatic_pull: Vec<NodeId>,
    pub(crate) frames: usize,
    pub(crate) sample_rate: f64,
    pub(crate) max_channels: usize,
    pub(crate) growth: GrowthRequests,
    /// Replaced automation curves, released by the dispatcher.
    retired: Vec<Box<dyn ParamAutomation>>,
    negotiation: VecDeque<InputRef>,
    widths: Vec<usize>,
}

impl RenderState {
    pub(crate) fn new(frames: usize, sample_rate: f64, max_channels: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            automatic_pull: Vec::new(),
            frames,
            sample_rate,
            max_channels,
            growth: GrowthRequests::new(),
            retired: Vec::with_capacity(RETIRED_CAPACITY),
            negotiation: VecDeque::with_capacity(64),
            widths: Vec::with_capacity(crate::node::MAX_NODE_OUTPUTS),
        }
    }

    pub(crate) fn insert(&mut self, node: RenderNode) {
        self.nodes.insert(node.ports.state.id, Some(Box::new(node)));
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Box<RenderNode>> {
        self.automatic_pull.retain(|n| *n != id);
        self.nodes.remove(&id).flatten()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(&id)?.as_deref_mut()
    }

    fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(&id)?.as_deref()
    }

    /// Runs the processor's `initialize` once. Control threads only.
    pub(crate) fn initialize_node(&mut self, id: NodeId) {
        let sample_rate = self.sample_rate;
        if let Some(node) = self.node_mut(id) {
            if !node.ports.state.initialized.get() {
                node.processor.initialize(sample_rate);
                node.ports.state.initialized.set(true);
            }
        }
    }

    pub(crate) fn uninitialize_node(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            if node.ports.state.initialized.get() {
                node.ports.state.initialized.set(false);
                node.processor.uninitialize();
            }
        }
    }

    pub(crate) fn reset_node(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.processor.reset();
            for output in &mut node.ports.outputs {
                output.bus_mut().zero();
            }
        }
    }

    pub(crate) fn uninitialize_all(&mut self) {
        for node in self.nodes.values_mut().flatten() {
            if node.ports.state.initialized.get() {
                node.ports.state.initialized.set(false);
                node.processor.uninitialize();
            }
        }
    }

    /// Bus of `output` as of the last render.
    pub fn output_bus(&self, output: OutputRef) -> Option<&AudioBus> {
        output_bus(&self.nodes, output)
    }

    /// Mix width of `input` as of the last negotiation.
    pub fn input_channels(&self, input: InputRef) -> Option<usize> {
        self.node(input.node)?
            .ports
            .inputs
            .get(input.index)
            .map(AudioNodeInput::number_of_channels)
    }

    /// Enabled upstream outputs the render thread currently sums into `input`.
    pub fn rendering_outputs(&self, input: InputRef) -> Vec<OutputRef> {
        self.node(input.node)
            .and_then(|n| n.ports.inputs.get(input.index))
            .map(|i| i.rendering_outputs().to_vec())
            .unwrap_or_default()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Pulls the destination, then every automatic-pull node.
    pub(crate) fn pull_graph(&mut self, quantum: &RenderQuantum) {
        self.process_if_necessary(NodeId::DESTINATION, quantum);
        for i in 0..self.automatic_pull.len() {
            let id = self.automatic_pull[i];
            self.process_if_necessary(id, quantum);
        }
    }

    /// Processes `id` at most once per quantum, pulling its upstream first.
    pub(crate) fn process_if_necessary(&mut self, id: NodeId, quantum: &RenderQuantum) {
        let Some(mut node) = self.nodes.get_mut(&id).and_then(Option::take) else {
            return;
        };
        self.process_node(&mut node, quantum);
        if let Some(slot) = self.nodes.get_mut(&id) {
            *slot = Some(node);
        }
    }

    fn process_node(&mut self, node: &mut RenderNode, quantum: &RenderQuantum) {
        let RenderNode { processor, ports } = node;
        let state = &ports.state;

        if !state.initialized.get() {
            for output in &mut ports.outputs {
                output.bus_mut().zero();
            }
            return;
        }

        let now = quantum.current_time();
        if state.last_processing_time.get() == now {
            return;
        }
        state.last_processing_time.set(now);

        for input in &ports.inputs {
            for src in &input.rendering_outputs {
                self.process_if_necessary(src.node, quantum);
            }
        }
        for param in &ports.params {
            for src in &param.rendering_outputs {
                self.process_if_necessary(src.node, quantum);
            }
        }

        let interpretation = state.channel_config().interpretation;
        for input in &mut ports.inputs {
            input.sum_connections(&self.nodes, interpretation);
        }
        for param in &mut ports.params {
            param.compute(quantum, &self.nodes);
        }

        let silent_inputs = ports.inputs.iter().all(|i| i.is_silent(&self.nodes));
        if !silent_inputs {
            state.last_non_silent_time.set(quantum.end_time());
        }

        let propagates_silence =
            processor.propagates_silence(quantum, state.last_non_silent_time.get());
        if silent_inputs && propagates_silence {
            for output in &mut ports.outputs {
                output.bus_mut().zero();
            }
            return;
        }

        let mut ctx = ProcessContext {
            quantum: *quantum,
            inputs: Inputs {
                ports: &ports.inputs,
                slots: &self.nodes,
            },
            outputs: Outputs {
                ports: &mut ports.outputs,
            },
            params: Params {
                params: &ports.params,
            },
        };
        {
            let _scope = ProcessScope::enter();
            processor.process(&mut ctx);
        }
        for output in &mut ports.outputs {
            output.bus_mut().clear_silent_flag();
        }
    }

    /// Copies topology changes into render ports and renegotiates channel
    /// counts. Needs both locks.
    ///
    /// Runs on the render thread, so nothing here frees memory: edge lists
    /// that outgrow their capacity stay dirty until the dispatcher grows
    /// them, and replaced automation curves are retired.
    pub(crate) fn sync_topology(&mut self, graph: &mut GraphState) {
        let mut dirty = core::mem::take(&mut graph.dirty_inputs);
        dirty.retain(|input_ref| {
            let active = graph.active_outputs(*input_ref);
            let Some(node) = self.node_mut(input_ref.node) else {
                return false;
            };
            let Some(input) = node.ports.inputs.get_mut(input_ref.index) else {
                return false;
            };
            if active.len() > input.rendering_outputs.capacity() {
                self.growth.push(PortGrowth {
                    node: input_ref.node,
                    target: GrowthTarget::InputEdges(input_ref.index),
                    size: active.len(),
                });
                return true;
            }
            input.rendering_outputs.clear();
            input.rendering_outputs.extend_from_slice(active);
            self.negotiation.push_back(*input_ref);
            false
        });
        graph.dirty_inputs = dirty;

        let mut dirty = core::mem::take(&mut graph.dirty_params);
        dirty.retain(|param_ref| {
            let active = graph.param_outputs(*param_ref);
            let Some(param) = self
                .node_mut(param_ref.node)
                .and_then(|n| n.ports.params.get_mut(param_ref.index))
            else {
                return false;
            };
            if active.len() > param.rendering_outputs.capacity() {
                self.growth.push(PortGrowth {
                    node: param_ref.node,
                    target: GrowthTarget::ParamEdges(param_ref.index),
                    size: active.len(),
                });
                return true;
            }
            param.rendering_outputs.clear();
            param.rendering_outputs.extend_from_slice(active);
            false
        });
        graph.dirty_params = dirty;

        // Each swap may retire the old curve and, for a vanished node, the
        // new one.
        while self.retired.capacity() - self.retired.len() >= 2
            && !graph.pending_automation.is_empty()
        {
            let (param_ref, automation) = graph.pending_automation.remove(0);
            let param = self
                .node_mut(param_ref.node)
                .and_then(|n| n.ports.params.get_mut(param_ref.index));
            let old = match param {
                Some(param) => param.set_automation(automation),
                None => automation,
            };
            if let Some(old) = old {
                self.retired.push(old);
            }
        }

        for id in graph.dirty_channels.drain(..) {
            if let Some(node) = self.nodes.get(&id).and_then(Option::as_deref) {
                for index in 0..node.ports.inputs.len() {
                    self.negotiation.push_back(InputRef { node: id, index });
                }
            }
        }

        self.negotiate(graph);
    }

    /// Drains the negotiation worklist. An output whose width changes
    /// queues every input it feeds.
    fn negotiate(&mut self, graph: &GraphState) {
        let mut budget = 8 * self.nodes.len() + 64;
        while let Some(input_ref) = self.negotiation.pop_front() {
            if budget == 0 {
                self.negotiation.clear();
                break;
            }
            budget -= 1;

            let Some(mut node) = self.nodes.get_mut(&input_ref.node).and_then(Option::take) else {
                continue;
            };
            if input_ref.index < node.ports.inputs.len() {
                self.widths.clear();
                self.widths
                    .extend(node.ports.outputs.iter().map(AudioNodeOutput::number_of_channels));

                let RenderNode { processor, ports } = &mut *node;
                let mut negotiation = ChannelNegotiation {
                    node: input_ref.node,
                    ports: &mut *ports,
                    slots: &self.nodes,
                    max_channels: self.max_channels,
                    growth: &mut self.growth,
                };
                processor.check_number_of_channels_for_input(&mut negotiation, input_ref.index);

                for (index, before) in self.widths.iter().enumerate() {
                    if ports.outputs[index].number_of_channels() != *before {
                        let output = OutputRef {
                            node: input_ref.node,
                            index,
                        };
                        self.negotiation.extend(graph.consumers(output).iter().copied());
                    }
                }
            }
            if let Some(slot) = self.nodes.get_mut(&input_ref.node) {
                *slot = Some(node);
            }
        }
    }

    /// Reallocates buses and edge lists the render thread could not resize
    /// in place, then resyncs. Allocates; control threads only, both locks
    /// held.
    pub(crate) fn apply_growth(&mut self, graph: &mut GraphState) {
        if core::mem::take(&mut self.growth.overflowed) {
            let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
            for node in ids {
                let inputs = self.node(node).map_or(0, |n| n.ports.inputs.len());
                self.negotiation.extend((0..inputs).map(|index| InputRef { node, index }));
            }
        }

        let requests: Vec<PortGrowth> = self.growth.pending.drain(..).collect();
        for request in requests {
            let Some(node) = self.node_mut(request.node) else {
                continue;
            };
            match request.target {
                GrowthTarget::Input(index) => {
                    if let Some(input) = node.ports.inputs.get_mut(index) {
                        input.grow(request.size);
                    }
                }
                GrowthTarget::Output(index) => {
                    if let Some(output) = node.ports.outputs.get_mut(index) {
                        output.grow(request.size);
                    }
                    let output = OutputRef {
                        node: request.node,
                        index,
                    };
                    self.negotiation.extend(graph.consumers(output).iter().copied());
                }
                GrowthTarget::InputEdges(index) => {
                    if let Some(input) = node.ports.inputs.get_mut(index) {
                        reserve_edges(&mut input.rendering_outputs, request.size);
                    }
                    graph.mark_input_dirty(InputRef {
                        node: request.node,
                        index,
                    });
                }
                GrowthTarget::ParamEdges(index) => {
                    if let Some(param) = node.ports.params.get_mut(index) {
                        reserve_edges(&mut param.rendering_outputs, request.size);
                    }
                    graph.mark_param_dirty(ParamRef {
                        node: request.node,
                        index,
                    });
                }
            }
            if matches!(request.target, GrowthTarget::Input(_) | GrowthTarget::Output(_)) {
                let inputs = self
                    .node(request.node)
                    .map_or(0, |n| n.ports.inputs.len());
                for index in 0..inputs {
                    self.negotiation.push_back(InputRef {
                        node: request.node,
                        index,
                    });
                }
            }
            tracing::debug!(node = %request.node, target = ?request.target, size = request.size, "port grown");
        }
        self.sync_topology(graph);
    }

    pub(crate) fn has_growth(&self) -> bool {
        !self.growth.is_empty()
    }

    pub(crate) fn has_retired(&self) -> bool {
        !self.retired.is_empty()
    }

    /// Moves retired curves out, keeping the preallocated storage. The
    /// caller drops them after releasing the render lock.
    pub(crate) fn take_retired(&mut self) -> Vec<Box<dyn ParamAutomation>> {
        self.retired.drain(..).collect()
    }
}

/// Edge-list capacity for a fresh port.
pub(crate) fn edge_list() -> Vec<OutputRef> {
    Vec::with_capacity(EDGE_CAPACITY)
}

fn reserve_edges(edges: &mut Vec<OutputRef>, size: usize) {
    let target = size.max(edges.capacity() * 2);
    edges.reserve(target - edges.len());
}
