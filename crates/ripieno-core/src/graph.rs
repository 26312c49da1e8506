//! Topology under the graph lock.
//!
//! Edges are recorded at both endpoints by id. Every change that render
//! state must observe marks the affected input or parameter dirty; the
//! render thread copies dirty entries into its own port state at the next
//! quantum boundary it manages to take the graph lock.

use crate::compat::{Arc, HashMap};
use crate::node::{InputRef, NodeId, NodeState, OutputRef, ParamRef, RefType};
use crate::param::ParamAutomation;

#[derive(Debug, Default)]
pub(crate) struct InputEdges {
    /// Enabled upstream outputs.
    pub outputs: Vec<OutputRef>,
    /// Upstream outputs that are connected but dormant.
    pub disabled_outputs: Vec<OutputRef>,
}

impl InputEdges {
    fn contains(&self, output: OutputRef) -> bool {
        self.outputs.contains(&output) || self.disabled_outputs.contains(&output)
    }
}

#[derive(Debug)]
pub(crate) struct OutputEdges {
    pub inputs: Vec<InputRef>,
    pub params: Vec<ParamRef>,
    pub enabled: bool,
}

impl Default for OutputEdges {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            params: Vec::new(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ParamEdges {
    pub outputs: Vec<OutputRef>,
}

/// Topology of one node.
#[derive(Debug)]
pub(crate) struct GraphNode {
    pub state: Arc<NodeState>,
    pub inputs: Vec<InputEdges>,
    pub outputs: Vec<OutputEdges>,
    pub params: Vec<ParamEdges>,
}

impl GraphNode {
    pub fn new(state: Arc<NodeState>) -> Self {
        let inputs = (0..state.number_of_inputs).map(|_| InputEdges::default()).collect();
        let outputs = (0..state.number_of_outputs).map(|_| OutputEdges::default()).collect();
        let params = state.params.iter().map(|_| ParamEdges::default()).collect();
        Self {
            state,
            inputs,
            outputs,
            params,
        }
    }
}

/// Everything guarded by the graph lock.
#[derive(Default)]
pub struct GraphState {
    pub(crate) nodes: HashMap<NodeId, GraphNode>,
    pub(crate) dirty_inputs: Vec<InputRef>,
    pub(crate) dirty_params: Vec<ParamRef>,
    /// Nodes whose channel configuration changed since the last sync.
    pub(crate) dirty_channels: Vec<NodeId>,
    pub(crate) pending_automation: Vec<(ParamRef, Option<Box<dyn ParamAutomation>>)>,
    /// Marked for deletion, not yet handed to the dispatcher.
    pub(crate) marked: Vec<NodeId>,
    /// Handed to the dispatcher, awaiting removal.
    pub(crate) finalizing: Vec<NodeId>,
}

impl GraphState {
    pub(crate) fn insert(&mut self, node: GraphNode) {
        self.nodes.insert(node.state.id, node);
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<&Arc<NodeState>> {
        self.nodes.get(&id).map(|n| &n.state)
    }

    pub(crate) fn mark_input_dirty(&mut self, input: InputRef) {
        if !self.dirty_inputs.contains(&input) {
            self.dirty_inputs.push(input);
        }
    }

    pub(crate) fn mark_param_dirty(&mut self, param: ParamRef) {
        if !self.dirty_params.contains(&param) {
            self.dirty_params.push(param);
        }
    }

    pub(crate) fn mark_channels_dirty(&mut self, node: NodeId) {
        if !self.dirty_channels.contains(&node) {
            self.dirty_channels.push(node);
        }
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| !n.state.is_marked_for_deletion())
    }

    /// Adds `from → to`. Reconnecting an existing pair is a no-op. Returns
    /// whether an edge was added.
    pub(crate) fn connect(&mut self, from: OutputRef, to: InputRef) -> bool {
        if !self.is_live(from.node) || !self.is_live(to.node) {
            tracing::trace!(?from, ?to, "connect skipped, endpoint gone");
            return false;
        }
        let Some(enabled) = self.output_edges(from).map(|o| o.enabled) else {
            return false;
        };
        let Some(input) = self.input_edges_mut(to) else {
            return false;
        };
        if input.contains(from) {
            return false;
        }
        if enabled {
            input.outputs.push(from);
        } else {
            input.disabled_outputs.push(from);
        }
        if let Some(output) = self.output_edges_mut(from) {
            output.inputs.push(to);
        }
        self.mark_input_dirty(to);
        tracing::trace!(?from, ?to, enabled, "connected");
        self.ref_node(to.node, RefType::Connection);
        true
    }

    /// Adds `from → param`. Parameter edges do not count as connection
    /// references.
    pub(crate) fn connect_param(&mut self, from: OutputRef, param: ParamRef) -> bool {
        if !self.is_live(from.node) || !self.is_live(param.node) {
            return false;
        }
        let Some(edges) = self
            .nodes
            .get_mut(&param.node)
            .and_then(|n| n.params.get_mut(param.index))
        else {
            return false;
        };
        if edges.outputs.contains(&from) {
            return false;
        }
        edges.outputs.push(from);
        if let Some(output) = self.output_edges_mut(from) {
            output.params.push(param);
        }
        self.mark_param_dirty(param);
        tracing::trace!(?from, ?param, "connected param");
        true
    }

    /// Removes every edge leaving `from`, dereferencing each destination.
    pub(crate) fn disconnect_output(&mut self, from: OutputRef) {
        let Some(output) = self.output_edges_mut(from) else {
            return;
        };
        let inputs = core::mem::take(&mut output.inputs);
        let params = core::mem::take(&mut output.params);

        for param in params {
            if let Some(edges) = self
                .nodes
                .get_mut(&param.node)
                .and_then(|n| n.params.get_mut(param.index))
            {
                edges.outputs.retain(|o| *o != from);
            }
            self.mark_param_dirty(param);
        }

        for to in inputs {
            let removed = match self.input_edges_mut(to) {
                Some(input) => {
                    let before = input.outputs.len() + input.disabled_outputs.len();
                    input.outputs.retain(|o| *o != from);
                    input.disabled_outputs.retain(|o| *o != from);
                    before != input.outputs.len() + input.disabled_outputs.len()
                }
                None => false,
            };
            if removed {
                self.mark_input_dirty(to);
                tracing::trace!(?from, ?to, "disconnected");
                self.deref_node(to.node, RefType::Connection);
            }
        }
    }

    pub(crate) fn ref_node(&mut self, id: NodeId, ref_type: RefType) {
        let Some(state) = self.state(id).cloned() else {
            return;
        };
        state.add_ref(ref_type);
        if ref_type == RefType::Connection {
            self.enable_outputs_if_necessary(id);
        }
    }

    /// Drops one reference. A node left with neither kind is disconnected
    /// and marked for deletion; a node left with client handles but no
    /// connections goes dormant.
    pub(crate) fn deref_node(&mut self, id: NodeId, ref_type: RefType) {
        let Some(state) = self.state(id).cloned() else {
            return;
        };
        state.release_ref(ref_type);

        if state.connection_ref_count() != 0 {
            return;
        }
        if state.normal_ref_count() == 0 {
            if !state.marked_for_deletion.get() {
                for index in 0..state.number_of_outputs {
                    self.disconnect_output(OutputRef { node: id, index });
                }
                state.marked_for_deletion.set(true);
                self.marked.push(id);
                tracing::debug!(node = %id, node_type = state.node_type.name(), "marked for deletion");
            }
        } else if ref_type == RefType::Connection {
            self.disable_outputs_if_necessary(id);
        }
    }

    /// Puts `id` to sleep if it has at most one connection left, unless it
    /// has a tail to drain.
    pub(crate) fn disable_outputs_if_necessary(&mut self, id: NodeId) {
        let Some(state) = self.state(id).cloned() else {
            return;
        };
        if state.connection_ref_count() > 1 || state.disabled.get() {
            return;
        }
        if state.requires_tail_processing {
            return;
        }
        state.disabled.set(true);
        tracing::trace!(node = %id, "disabled");
        for index in 0..state.number_of_outputs {
            self.disable_output(OutputRef { node: id, index });
        }
    }

    pub(crate) fn enable_outputs_if_necessary(&mut self, id: NodeId) {
        let Some(state) = self.state(id).cloned() else {
            return;
        };
        if !state.disabled.get() || state.connection_ref_count() == 0 {
            return;
        }
        state.disabled.set(false);
        tracing::trace!(node = %id, "enabled");
        for index in 0..state.number_of_outputs {
            self.enable_output(OutputRef { node: id, index });
        }
    }

    fn disable_output(&mut self, from: OutputRef) {
        let consumers = match self.output_edges_mut(from) {
            Some(output) if output.enabled => {
                output.enabled = false;
                output.inputs.clone()
            }
            _ => return,
        };
        for to in consumers {
            let moved = match self.input_edges_mut(to) {
                Some(input) => match input.outputs.iter().position(|o| *o == from) {
                    Some(pos) => {
                        input.outputs.swap_remove(pos);
                        input.disabled_outputs.push(from);
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if moved {
                self.mark_input_dirty(to);
                self.disable_outputs_if_necessary(to.node);
            }
        }
    }

    fn enable_output(&mut self, from: OutputRef) {
        let consumers = match self.output_edges_mut(from) {
            Some(output) if !output.enabled => {
                output.enabled = true;
                output.inputs.clone()
            }
            _ => return,
        };
        for to in consumers {
            let moved = match self.input_edges_mut(to) {
                Some(input) => match input.disabled_outputs.iter().position(|o| *o == from) {
                    Some(pos) => {
                        input.disabled_outputs.swap_remove(pos);
                        input.outputs.push(from);
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if moved {
                self.mark_input_dirty(to);
                self.enable_outputs_if_necessary(to.node);
            }
        }
    }

    /// Forgets a finalized node. Its outgoing edges are already gone; this
    /// drops edges other nodes' params still hold to it and any dirty
    /// entries naming it.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let node = self.nodes.remove(&id)?;
        for (index, param) in node.params.iter().enumerate() {
            let param_ref = ParamRef { node: id, index };
            for from in &param.outputs {
                if let Some(output) = self.output_edges_mut(*from) {
                    output.params.retain(|p| *p != param_ref);
                }
            }
        }
        for (index, input) in node.inputs.iter().enumerate() {
            let input_ref = InputRef { node: id, index };
            for from in input.outputs.iter().chain(&input.disabled_outputs) {
                if let Some(output) = self.output_edges_mut(*from) {
                    output.inputs.retain(|i| *i != input_ref);
                }
            }
        }
        self.dirty_inputs.retain(|i| i.node != id);
        self.dirty_params.retain(|p| p.node != id);
        self.dirty_channels.retain(|n| *n != id);
        self.pending_automation.retain(|(p, _)| p.node != id);
        Some(node)
    }

    fn input_edges_mut(&mut self, input: InputRef) -> Option<&mut InputEdges> {
        self.nodes.get_mut(&input.node)?.inputs.get_mut(input.index)
    }

    fn output_edges(&self, output: OutputRef) -> Option<&OutputEdges> {
        self.nodes.get(&output.node)?.outputs.get(output.index)
    }

    fn output_edges_mut(&mut self, output: OutputRef) -> Option<&mut OutputEdges> {
        self.nodes.get_mut(&output.node)?.outputs.get_mut(output.index)
    }

    /// Inputs fed by `output`, enabled or not.
    pub(crate) fn consumers(&self, output: OutputRef) -> &[InputRef] {
        self.output_edges(output).map_or(&[], |o| o.inputs.as_slice())
    }

    /// Enabled upstream outputs of `input`.
    pub(crate) fn active_outputs(&self, input: InputRef) -> &[OutputRef] {
        self.nodes
            .get(&input.node)
            .and_then(|n| n.inputs.get(input.index))
            .map_or(&[], |i| i.outputs.as_slice())
    }

    pub(crate) fn param_outputs(&self, param: ParamRef) -> &[OutputRef] {
        self.nodes
            .get(&param.node)
            .and_then(|n| n.params.get(param.index))
            .map_or(&[], |p| p.outputs.as_slice())
    }

    /// True when any output, enabled or dormant, feeds `input`.
    pub fn is_input_connected(&self, input: InputRef) -> bool {
        self.nodes
            .get(&input.node)
            .and_then(|n| n.inputs.get(input.index))
            .is_some_and(|i| !i.outputs.is_empty() || !i.disabled_outputs.is_empty())
    }

    /// Inputs fed by `output`.
    pub fn output_consumers(&self, output: OutputRef) -> Vec<InputRef> {
        self.consumers(output).to_vec()
    }

    /// Outputs driving `param`.
    pub fn param_drivers(&self, param: ParamRef) -> Vec<OutputRef> {
        self.param_outputs(param).to_vec()
    }

    /// Live nodes, destination included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node→input edges, dormant ones included.
    pub fn connection_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.inputs.iter())
            .map(|i| i.outputs.len() + i.disabled_outputs.len())
            .sum()
    }

    /// Live nodes per type name.
    pub fn node_counts(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.state.node_type.name()).or_insert(0) += 1;
        }
        counts
    }
}
