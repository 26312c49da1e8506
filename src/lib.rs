//! # Ripieno - Pull-based Audio Graph Engine
//!
//! Umbrella crate over:
//! - **ripieno-core** - Graph runtime (context, nodes, ports, params, locks, dispatcher)
//! - **ripieno-dsp** - Standard nodes (oscillator, constant source, gain, delay, merger, splitter)
//!
//! ## Quick Start
//!
//! ```ignore
//! use ripieno::prelude::*;
//!
//! let engine = RipienoEngine::builder()
//!     .sample_rate(44100.0)
//!     .build()?;
//!
//! let osc = engine.oscillator(Waveform::Sine, 440.0)?;
//! let gain = engine.gain(0.5)?;
//! osc.connect_to(&gain)?;
//! gain.connect_to(engine.destination())?;
//! osc.start(0.0)?;
//!
//! let audio = engine.render_offline(44100);
//! ```

/// Re-export of ripieno-core for direct access
pub use ripieno_core as core;

/// Re-export of ripieno-dsp for direct access
pub use ripieno_dsp as dsp_nodes;

// Graph runtime
pub use ripieno_core::{
    AudioBus, AudioContext, AudioContextBuilder, AudioNode, AudioParam, AudioProcessor,
    AutomationRate, ChannelConfig, ChannelCountMode, ChannelInterpretation, ChannelNegotiation,
    ContextConfig, MainThreadDispatcher, MainThreadScheduler, NodeId, NodeInfo, NodeType, Pacing,
    ParamAutomation, ParamDescriptor, ProcessContext, RenderQuantum, RenderThread, TaskKey,
    ThreadScheduler,
};

// Lock-free primitives
pub use ripieno_core::{AtomicDouble, AtomicFlag, AtomicFloat};

// Standard nodes
pub use ripieno_dsp::{
    ChannelMergerNode, ChannelSplitterNode, ConstantSourceNode, DelayNode, DelayOptions, DspHandle,
    GainNode, OscillatorNode, Schedule, Waveform,
};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::RipienoEngineBuilder;
pub use engine::RipienoEngine;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{RipienoEngine, RipienoEngineBuilder};

    // Graph
    pub use crate::core::{
        AudioBus, AudioContext, AudioNode, AudioParam, AudioProcessor, NodeInfo, NodeType, Pacing,
        ProcessContext,
    };

    // Nodes
    pub use crate::dsp_nodes::{
        ChannelMergerNode, ChannelSplitterNode, ConstantSourceNode, DelayNode, GainNode,
        OscillatorNode, Waveform,
    };
}
