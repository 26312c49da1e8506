//! Client handle to a node.

use core::fmt;

use crate::channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};
use crate::compat::Arc;
use crate::context::{ContextShared, PendingChange};
use crate::error::PortKind;
use crate::lock::GraphLock;
use crate::node::{InputRef, NodeId, NodeState, NodeType, OutputRef, ParamRef, RefType};
use crate::param::AudioParam;
use crate::{Error, Result};

/// A client reference to a node.
///
/// Each handle holds one normal reference. Cloning adds one; dropping
/// queues its release. A node with no handles stays alive while it has
/// incoming connections, and is deleted once it has neither.
pub struct AudioNode {
    pub(crate) context: Arc<ContextShared>,
    pub(crate) state: Arc<NodeState>,
}

impl AudioNode {
    pub(crate) fn new(context: Arc<ContextShared>, state: Arc<NodeState>) -> Self {
        Self { context, state }
    }

    pub fn id(&self) -> NodeId {
        self.state.id
    }

    pub fn node_type(&self) -> NodeType {
        self.state.node_type
    }

    pub fn sample_rate(&self) -> f64 {
        self.state.sample_rate
    }

    pub fn number_of_inputs(&self) -> usize {
        self.state.number_of_inputs
    }

    pub fn number_of_outputs(&self) -> usize {
        self.state.number_of_outputs
    }

    /// Id of the owning context.
    pub fn context_id(&self) -> u64 {
        self.context.id
    }

    pub fn output_ref(&self, index: usize) -> Result<OutputRef> {
        check_index(PortKind::Output, index, self.number_of_outputs())?;
        Ok(OutputRef {
            node: self.id(),
            index,
        })
    }

    pub fn input_ref(&self, index: usize) -> Result<InputRef> {
        check_index(PortKind::Input, index, self.number_of_inputs())?;
        Ok(InputRef {
            node: self.id(),
            index,
        })
    }

    fn check_live(&self) -> Result<()> {
        self.context.check_open()?;
        if self.state.is_marked_for_deletion() {
            return Err(Error::InvalidState(format!(
                "{} is marked for deletion",
                self.id()
            )));
        }
        Ok(())
    }

    /// Connects output `output` to `destination`'s input `input`.
    ///
    /// Takes effect at the next quantum boundary at the latest.
    /// Connecting an already connected pair does nothing.
    pub fn connect(&self, output: usize, destination: &AudioNode, input: usize) -> Result<()> {
        self.check_live()?;
        if !Arc::ptr_eq(&self.context, &destination.context) {
            return Err(Error::InvalidArgument(format!(
                "{} and {} belong to different contexts",
                self.id(),
                destination.id()
            )));
        }
        let from = self.output_ref(output)?;
        let to = destination.input_ref(input)?;
        destination.check_live()?;

        self.lazy_initialize();
        destination.lazy_initialize();
        self.context.enqueue(PendingChange::Connect { from, to })
    }

    /// Connects output 0 to `destination`'s input 0.
    pub fn connect_to(&self, destination: &AudioNode) -> Result<()> {
        self.connect(0, destination, 0)
    }

    /// Drives `param` with output `output`.
    pub fn connect_param(&self, output: usize, param: &AudioParam) -> Result<()> {
        self.check_live()?;
        if !Arc::ptr_eq(&self.context, &param.context) {
            return Err(Error::InvalidArgument(format!(
                "param {} belongs to a different context than {}",
                param.name(),
                self.id()
            )));
        }
        let from = self.output_ref(output)?;
        if param.node.is_marked_for_deletion() {
            return Err(Error::InvalidState(format!(
                "param {} belongs to a node marked for deletion",
                param.name()
            )));
        }
        self.lazy_initialize();
        self.context.enqueue(PendingChange::ConnectParam {
            from,
            to: param.param_ref(),
        })
    }

    /// Removes every connection leaving output `output`.
    pub fn disconnect(&self, output: usize) -> Result<()> {
        self.context.check_open()?;
        let from = self.output_ref(output)?;
        self.context.enqueue(PendingChange::Disconnect { from })
    }

    /// Removes every connection leaving any output.
    pub fn disconnect_all(&self) -> Result<()> {
        for output in 0..self.number_of_outputs() {
            self.disconnect(output)?;
        }
        Ok(())
    }

    /// Lets the processor allocate and makes the node eligible for
    /// rendering. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        self.check_live()?;
        self.context.initialize_node(&self.state);
        Ok(())
    }

    pub fn uninitialize(&self) {
        self.context.uninitialize_node(&self.state);
    }

    fn lazy_initialize(&self) {
        if !self.state.initialized.get() {
            self.context.initialize_node(&self.state);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized.get()
    }

    /// Clears processor history and silences the outputs.
    pub fn reset(&self) {
        self.context.reset_node(&self.state);
    }

    pub fn channel_config(&self) -> ChannelConfig {
        self.state.channel_config()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_config().count
    }

    pub fn channel_count_mode(&self) -> ChannelCountMode {
        self.channel_config().mode
    }

    pub fn channel_interpretation(&self) -> ChannelInterpretation {
        self.channel_config().interpretation
    }

    /// Sets the input channel configuration, renegotiated next quantum.
    pub fn set_channel_config(&self, config: ChannelConfig) -> Result<()> {
        self.check_live()?;
        if self.state.fixed_channel_config {
            tracing::warn!(node = %self.id(), node_type = self.node_type().name(), "channel configuration is fixed");
            return Err(Error::NotSupported(format!(
                "{} has a fixed channel configuration",
                self.node_type().name()
            )));
        }
        let max = self.context.config.max_channels;
        if config.count == 0 || config.count > max {
            tracing::warn!(node = %self.id(), count = config.count, "rejected channel count");
            return Err(Error::NotSupported(format!(
                "channel count {} (must be 1-{})",
                config.count, max
            )));
        }
        self.context.enqueue(PendingChange::ChannelConfig {
            node: self.id(),
            config,
        })
    }

    pub fn set_channel_count(&self, count: usize) -> Result<()> {
        self.set_channel_config(ChannelConfig {
            count,
            ..self.channel_config()
        })
    }

    pub fn set_channel_count_mode(&self, mode: ChannelCountMode) -> Result<()> {
        self.set_channel_config(ChannelConfig {
            mode,
            ..self.channel_config()
        })
    }

    pub fn set_channel_interpretation(&self, interpretation: ChannelInterpretation) -> Result<()> {
        self.set_channel_config(ChannelConfig {
            interpretation,
            ..self.channel_config()
        })
    }

    pub fn number_of_params(&self) -> usize {
        self.state.params.len()
    }

    pub fn param(&self, index: usize) -> Result<AudioParam> {
        let shared = self.state.params.get(index).ok_or(Error::IndexOutOfRange {
            kind: PortKind::Param,
            index,
            count: self.state.params.len(),
        })?;
        Ok(AudioParam {
            shared: shared.clone(),
            node: self.state.clone(),
            param: ParamRef {
                node: self.id(),
                index,
            },
            context: self.context.clone(),
        })
    }

    pub fn param_by_name(&self, name: &str) -> Option<AudioParam> {
        let index = self
            .state
            .params
            .iter()
            .position(|p| p.descriptor.name == name)?;
        self.param(index).ok()
    }

    pub fn params(&self) -> Vec<AudioParam> {
        (0..self.number_of_params())
            .filter_map(|i| self.param(i).ok())
            .collect()
    }

    pub fn normal_ref_count(&self) -> usize {
        self.state.normal_ref_count()
    }

    pub fn connection_ref_count(&self) -> usize {
        self.state.connection_ref_count()
    }

    /// Dormant: outputs detached from processing, topology kept.
    pub fn is_disabled(&self) -> bool {
        self.state.disabled.get()
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.state.is_marked_for_deletion()
    }

    /// Start time of the last quantum this node processed, or -1.
    pub fn last_processing_time(&self) -> f64 {
        self.state.last_processing_time.get()
    }

    /// End time of the last quantum with non-silent input, or -1.
    pub fn last_non_silent_time(&self) -> f64 {
        self.state.last_non_silent_time.get()
    }

    /// Whether any output, enabled or dormant, feeds input `input`.
    pub fn input_is_connected(&self, input: usize) -> Result<bool> {
        let input = self.input_ref(input)?;
        let graph = GraphLock::acquire(&self.context.graph);
        Ok(graph.is_input_connected(input))
    }

    /// Inputs fed by output `output`.
    pub fn output_consumers(&self, output: usize) -> Result<Vec<InputRef>> {
        let output = self.output_ref(output)?;
        let graph = GraphLock::acquire(&self.context.graph);
        Ok(graph.output_consumers(output))
    }
}

fn check_index(kind: PortKind, index: usize, count: usize) -> Result<()> {
    if index >= count {
        return Err(Error::IndexOutOfRange { kind, index, count });
    }
    Ok(())
}

impl Clone for AudioNode {
    fn clone(&self) -> Self {
        self.state.add_ref(RefType::Normal);
        Self {
            context: self.context.clone(),
            state: self.state.clone(),
        }
    }
}

impl Drop for AudioNode {
    fn drop(&mut self) {
        let _ = self
            .context
            .enqueue(PendingChange::Release { node: self.state.id });
    }
}

impl PartialEq for AudioNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for AudioNode {}

impl fmt::Debug for AudioNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioNode")
            .field("id", &self.id())
            .field("type", &self.node_type())
            .field("normal_refs", &self.normal_ref_count())
            .field("connection_refs", &self.connection_ref_count())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
