//! Node identity, declaration and shared state.
//!
//! A node exists in three places at once: its [`NodeState`] (atomics shared
//! by every side), its topology entry under the graph lock, and its render
//! state (processor, buses) under the render lock. All three are keyed by
//! [`NodeId`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};
use crate::compat::{Arc, AtomicU8, AtomicUsize, Ordering};
use crate::lockfree::{AtomicDouble, AtomicFlag};
use crate::param::{ParamDescriptor, ParamShared};

/// Upper bound on inputs per node.
pub const MAX_NODE_INPUTS: usize = 32;
/// Upper bound on outputs per node.
pub const MAX_NODE_OUTPUTS: usize = 32;

/// Identifies a node within one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Every context's destination.
    pub const DESTINATION: NodeId = NodeId(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An output port: `node`'s output number `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub index: usize,
}

/// An input port: `node`'s input number `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub node: NodeId,
    pub index: usize,
}

/// A parameter: `node`'s parameter number `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub node: NodeId,
    pub index: usize,
}

/// Node-type tag, used for diagnostics and the live-node census.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Destination,
    Oscillator,
    ConstantSource,
    Gain,
    Delay,
    Convolver,
    ChannelMerger,
    ChannelSplitter,
    Analyser,
    Custom,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Destination => "destination",
            NodeType::Oscillator => "oscillator",
            NodeType::ConstantSource => "constant-source",
            NodeType::Gain => "gain",
            NodeType::Delay => "delay",
            NodeType::Convolver => "convolver",
            NodeType::ChannelMerger => "channel-merger",
            NodeType::ChannelSplitter => "channel-splitter",
            NodeType::Analyser => "analyser",
            NodeType::Custom => "custom",
        }
    }
}

/// Which of the two reference counts an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefType {
    /// Client handles.
    Normal,
    /// Incoming graph edges.
    Connection,
}

/// Static declaration of a node's ports, parameters and channel policy.
///
/// ```
/// use ripieno_core::{NodeInfo, NodeType, ParamDescriptor};
///
/// let info = NodeInfo::new(NodeType::Gain)
///     .inputs(1)
///     .output(1)
///     .param(ParamDescriptor::new("gain", 1.0));
/// assert_eq!(info.number_of_inputs(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub(crate) node_type: NodeType,
    pub(crate) inputs: usize,
    pub(crate) outputs: Vec<usize>,
    pub(crate) params: Vec<ParamDescriptor>,
    pub(crate) channel_config: ChannelConfig,
    pub(crate) fixed_channel_config: bool,
}

impl NodeInfo {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            inputs: 0,
            outputs: Vec::new(),
            params: Vec::new(),
            channel_config: ChannelConfig::default(),
            fixed_channel_config: false,
        }
    }

    pub fn inputs(mut self, count: usize) -> Self {
        self.inputs = count;
        self
    }

    /// Adds one output with an initial width of `channels`.
    pub fn output(mut self, channels: usize) -> Self {
        self.outputs.push(channels);
        self
    }

    /// Adds `count` outputs of `channels` each.
    pub fn outputs(mut self, count: usize, channels: usize) -> Self {
        self.outputs.extend(core::iter::repeat(channels).take(count));
        self
    }

    pub fn param(mut self, descriptor: ParamDescriptor) -> Self {
        self.params.push(descriptor);
        self
    }

    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Rejects later channel-configuration changes with `NotSupported`.
    pub fn fixed_channel_config(mut self) -> Self {
        self.fixed_channel_config = true;
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn number_of_inputs(&self) -> usize {
        self.inputs
    }

    pub fn number_of_outputs(&self) -> usize {
        self.outputs.len()
    }
}

/// Atomics shared by a node's client handles, graph entry and render state.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub id: NodeId,
    pub node_type: NodeType,
    pub sample_rate: f64,
    pub number_of_inputs: usize,
    pub number_of_outputs: usize,
    /// Tail or latency is non-zero; never put to sleep by the dormant rule.
    pub requires_tail_processing: bool,
    pub fixed_channel_config: bool,
    pub params: Vec<Arc<ParamShared>>,

    normal_refs: AtomicUsize,
    connection_refs: AtomicUsize,
    pub marked_for_deletion: AtomicFlag,
    pub disabled: AtomicFlag,
    pub initialized: AtomicFlag,

    channel_count: AtomicUsize,
    channel_mode: AtomicU8,
    channel_interpretation: AtomicU8,

    pub last_processing_time: AtomicDouble,
    pub last_non_silent_time: AtomicDouble,
}

impl NodeState {
    pub fn new(id: NodeId, info: &NodeInfo, sample_rate: f64, requires_tail_processing: bool) -> Self {
        let config = info.channel_config;
        Self {
            id,
            node_type: info.node_type,
            sample_rate,
            number_of_inputs: info.inputs,
            number_of_outputs: info.outputs.len(),
            requires_tail_processing,
            fixed_channel_config: info.fixed_channel_config,
            params: info
                .params
                .iter()
                .map(|d| Arc::new(ParamShared::new(d.clone())))
                .collect(),
            normal_refs: AtomicUsize::new(1),
            connection_refs: AtomicUsize::new(0),
            marked_for_deletion: AtomicFlag::new(false),
            disabled: AtomicFlag::new(false),
            initialized: AtomicFlag::new(false),
            channel_count: AtomicUsize::new(config.count),
            channel_mode: AtomicU8::new(config.mode.to_u8()),
            channel_interpretation: AtomicU8::new(config.interpretation.to_u8()),
            last_processing_time: AtomicDouble::new(-1.0),
            last_non_silent_time: AtomicDouble::new(-1.0),
        }
    }

    fn counter(&self, ref_type: RefType) -> &AtomicUsize {
        match ref_type {
            RefType::Normal => &self.normal_refs,
            RefType::Connection => &self.connection_refs,
        }
    }

    /// Increments a count, returning the new value.
    pub fn add_ref(&self, ref_type: RefType) -> usize {
        self.counter(ref_type).fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements a count, returning the new value. Never goes below zero.
    pub fn release_ref(&self, ref_type: RefType) -> usize {
        let prev = self
            .counter(ref_type)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(n) => n - 1,
            Err(_) => {
                debug_assert!(false, "{:?} refcount underflow on {}", ref_type, self.id);
                0
            }
        }
    }

    pub fn normal_ref_count(&self) -> usize {
        self.normal_refs.load(Ordering::Acquire)
    }

    pub fn connection_ref_count(&self) -> usize {
        self.connection_refs.load(Ordering::Acquire)
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion.get()
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            count: self.channel_count.load(Ordering::Acquire),
            mode: ChannelCountMode::from_u8(self.channel_mode.load(Ordering::Acquire)),
            interpretation: ChannelInterpretation::from_u8(
                self.channel_interpretation.load(Ordering::Acquire),
            ),
        }
    }

    pub fn set_channel_config(&self, config: ChannelConfig) {
        self.channel_count.store(config.count, Ordering::Release);
        self.channel_mode.store(config.mode.to_u8(), Ordering::Release);
        self.channel_interpretation
            .store(config.interpretation.to_u8(), Ordering::Release);
    }
}
