//! Pull-based audio graph runtime.
//!
//! Client threads build a graph of nodes and connect them; a render thread
//! asks the context for one quantum at a time and the context pulls samples
//! from the destination back through the graph, processing each node at
//! most once per quantum.
//!
//! # Primary API
//!
//! - [`AudioContext`] / [`AudioContextBuilder`]: Graph owner and render loop
//! - [`AudioNode`]: Client handle (connect, disconnect, channel config, params)
//! - [`AudioProcessor`]: The per-node processing contract
//! - [`AudioParam`]: Parameter handle with optional [`ParamAutomation`]
//! - [`MainThreadDispatcher`]: Deferred work for the host's main thread
//! - [`RenderThread`]: Render driver for hosts without a device callback
//!
//! # Example
//!
//! ```ignore
//! use ripieno_core::*;
//!
//! let context = AudioContext::builder().sample_rate(48000.0).build()?;
//! let node = context.create_node(
//!     NodeInfo::new(NodeType::Custom).output(1),
//!     MySource::default(),
//! )?;
//! node.connect_to(context.destination())?;
//!
//! let mut bus = context.create_render_bus();
//! context.render(&mut bus);
//! ```

pub mod error;
pub use error::{Error, PortKind, Result};

mod config;
pub use config::{ContextConfig, DEFAULT_RENDER_QUANTUM, MAX_CHANNELS, MAX_RENDER_QUANTUM};

pub mod compat;
pub use compat::{Arc, AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

mod bus;
pub use bus::{AudioBus, DEFAULT_CHANNEL_CAPACITY};

mod mixing;

mod channel;
pub use channel::{ChannelConfig, ChannelCountMode, ChannelInterpretation};

mod node;
pub use node::{
    InputRef, NodeId, NodeInfo, NodeType, OutputRef, ParamRef, RefType, MAX_NODE_INPUTS,
    MAX_NODE_OUTPUTS,
};

mod param;
pub use param::{AudioParam, AutomationRate, ParamAutomation, ParamDescriptor};

mod input;
pub use input::AudioNodeInput;

mod output;
pub use output::AudioNodeOutput;

mod processor;
pub use processor::{
    AudioProcessor, ChannelNegotiation, Inputs, Outputs, Params, ProcessContext, RenderQuantum,
};

mod lock;
pub use lock::{GraphLock, RenderLock};

mod graph;
pub use graph::GraphState;

mod render;
pub use render::RenderState;

mod destination;

pub mod dispatcher;
pub use dispatcher::{MainThreadDispatcher, MainThreadScheduler, TaskKey, ThreadScheduler};

mod context;
pub use context::{AudioContext, AudioContextBuilder};

mod handle;
pub use handle::AudioNode;

mod driver;
pub use driver::{InterleavedOutput, Pacing, RenderThread};
