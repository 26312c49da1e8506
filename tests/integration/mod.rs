//! Integration test modules for ripieno
//!
//! - engine: Engine builder, offline rendering, render thread
//! - graph: Connections, fan-out, cycles, refcounts
//! - lifecycle: Handle release and deferred deletion
//! - silence: Silence propagation and tails
//! - channels: Channel negotiation and routing nodes
//! - concurrency: Graph edits racing the render thread
//! - dispatcher: Main-thread task queue

pub mod channels;
pub mod concurrency;
pub mod dispatcher;
pub mod graph;
pub mod lifecycle;
pub mod silence;
