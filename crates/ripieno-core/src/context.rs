//! Audio context - owns the graph, the render loop and deferred work.

use core::fmt;
use core::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::bus::AudioBus;
use crate::channel::{ChannelConfig, ChannelInterpretation};
use crate::compat::{Arc, AtomicU32, AtomicU64, HashMap, Mutex, Ordering, Weak};
use crate::config::ContextConfig;
use crate::destination::{destination_info, DestinationProcessor};
use crate::dispatcher::{MainThreadDispatcher, TaskKey, ThreadScheduler};
use crate::driver::InterleavedOutput;
use crate::graph::{GraphNode, GraphState};
use crate::handle::AudioNode;
use crate::input::AudioNodeInput;
use crate::lock::{GraphLock, RenderLock};
use crate::lockfree::AtomicFlag;
use crate::node::{
    InputRef, NodeId, NodeInfo, NodeState, OutputRef, ParamRef, RefType, MAX_NODE_INPUTS,
    MAX_NODE_OUTPUTS,
};
use crate::output::AudioNodeOutput;
use crate::param::{ParamAutomation, ParamRender};
use crate::processor::{AudioProcessor, RenderQuantum};
use crate::render::{NodePorts, RenderNode, RenderState};
use crate::{Error, Result};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

const FINALIZE_TASK: &str = "finalize_nodes";
const GROW_TASK: &str = "grow_buses";
const RELEASE_TASK: &str = "release_curves";

/// A topology change queued by a control thread.
pub(crate) enum PendingChange {
    Connect { from: OutputRef, to: InputRef },
    ConnectParam { from: OutputRef, to: ParamRef },
    Disconnect { from: OutputRef },
    Release { node: NodeId },
    ChannelConfig { node: NodeId, config: ChannelConfig },
    Automation {
        param: ParamRef,
        automation: Option<Box<dyn ParamAutomation>>,
    },
}

/// State shared by a context, its node handles and its dispatcher tasks.
pub(crate) struct ContextShared {
    pub id: u64,
    pub config: ContextConfig,
    pub graph: Mutex<GraphState>,
    pub render: Mutex<RenderState>,
    pub dispatcher: Arc<MainThreadDispatcher>,
    pending_tx: Sender<PendingChange>,
    pending_rx: Receiver<PendingChange>,
    sample_frame: AtomicU64,
    next_node_id: AtomicU32,
    closed: AtomicFlag,
    finalize_scheduled: AtomicFlag,
    growth_scheduled: AtomicFlag,
    release_scheduled: AtomicFlag,
    interleaved: Mutex<InterleavedOutput>,
    this: Weak<ContextShared>,
}

impl ContextShared {
    fn new(config: ContextConfig, dispatcher: Arc<MainThreadDispatcher>) -> Arc<Self> {
        let (pending_tx, pending_rx) = unbounded();
        let frames = config.render_quantum_frames;
        let channels = config.destination_channels;
        Arc::new_cyclic(|this| Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            graph: Mutex::new(GraphState::default()),
            render: Mutex::new(RenderState::new(frames, config.sample_rate, config.max_channels)),
            dispatcher,
            pending_tx,
            pending_rx,
            sample_frame: AtomicU64::new(0),
            next_node_id: AtomicU32::new(NodeId::DESTINATION.0),
            closed: AtomicFlag::new(false),
            finalize_scheduled: AtomicFlag::new(false),
            growth_scheduled: AtomicFlag::new(false),
            release_scheduled: AtomicFlag::new(false),
            interleaved: Mutex::new(InterleavedOutput::new(channels, frames)),
            this: this.clone(),
            config,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState(format!("context {} is closed", self.id)));
        }
        Ok(())
    }

    pub fn current_sample_frame(&self) -> u64 {
        self.sample_frame.load(Ordering::Acquire)
    }

    /// Queues `change` and applies the queue at once if the graph lock is
    /// free. Otherwise the render thread applies it next quantum.
    pub fn enqueue(&self, change: PendingChange) -> Result<()> {
        self.pending_tx
            .send(change)
            .map_err(|_| Error::InvalidState("pending change queue disconnected".into()))?;
        if let Some(mut graph) = GraphLock::try_acquire(&self.graph) {
            self.drain_pending(&mut graph);
            self.hand_off_marked(&mut graph);
        }
        Ok(())
    }

    fn drain_pending(&self, graph: &mut GraphState) {
        while let Ok(change) = self.pending_rx.try_recv() {
            match change {
                PendingChange::Connect { from, to } => {
                    graph.connect(from, to);
                }
                PendingChange::ConnectParam { from, to } => {
                    graph.connect_param(from, to);
                }
                PendingChange::Disconnect { from } => graph.disconnect_output(from),
                PendingChange::Release { node } => graph.deref_node(node, RefType::Normal),
                PendingChange::ChannelConfig { node, config } => {
                    if let Some(state) = graph.state(node).cloned() {
                        state.set_channel_config(config);
                        graph.mark_channels_dirty(node);
                    }
                }
                PendingChange::Automation { param, automation } => {
                    graph.pending_automation.push((param, automation));
                }
            }
        }
    }

    /// Moves newly marked nodes to the finalization list and schedules a
    /// dispatcher pass for them.
    fn hand_off_marked(&self, graph: &mut GraphState) {
        if graph.marked.is_empty() {
            return;
        }
        let marked = core::mem::take(&mut graph.marked);
        graph.finalizing.extend(marked);
        if self.finalize_scheduled.raise() {
            let this = self.this.clone();
            self.dispatcher
                .call_on_main_thread(TaskKey::new(FINALIZE_TASK, self.id), move || {
                    if let Some(shared) = this.upgrade() {
                        shared.finalize_marked_nodes();
                    }
                });
        }
    }

    fn schedule_growth(&self) {
        if self.growth_scheduled.raise() {
            let this = self.this.clone();
            self.dispatcher
                .call_on_main_thread(TaskKey::new(GROW_TASK, self.id), move || {
                    if let Some(shared) = this.upgrade() {
                        shared.apply_bus_growth();
                    }
                });
        }
    }

    fn schedule_release(&self) {
        if self.release_scheduled.raise() {
            let this = self.this.clone();
            self.dispatcher
                .call_on_main_thread(TaskKey::new(RELEASE_TASK, self.id), move || {
                    if let Some(shared) = this.upgrade() {
                        shared.release_retired_curves();
                    }
                });
        }
    }

    /// Drops automation curves the render thread replaced.
    pub fn release_retired_curves(&self) {
        self.release_scheduled.set(false);
        let retired = RenderLock::acquire(&self.render).take_retired();
        if !retired.is_empty() {
            tracing::trace!(count = retired.len(), "automation curves released");
        }
    }

    /// Removes every node handed off for deletion. Node memory is released
    /// after both locks are dropped.
    pub fn finalize_marked_nodes(&self) {
        self.finalize_scheduled.set(false);
        let (removed, _retired) = {
            let mut graph = GraphLock::acquire(&self.graph);
            self.drain_pending(&mut graph);
            let marked = core::mem::take(&mut graph.marked);
            graph.finalizing.extend(marked);
            let ids = core::mem::take(&mut graph.finalizing);

            let mut render = RenderLock::acquire(&self.render);
            render.sync_topology(&mut graph);
            let mut removed = Vec::with_capacity(ids.len());
            for id in ids {
                graph.remove_node(id);
                if let Some(node) = render.remove(id) {
                    removed.push(node);
                }
            }
            (removed, render.take_retired())
        };

        for mut node in removed {
            if node.ports.state.initialized.get() {
                node.ports.state.initialized.set(false);
                node.processor.uninitialize();
            }
            tracing::debug!(node = %node.ports.state.id, node_type = node.ports.state.node_type.name(), "node finalized");
        }
    }

    pub fn apply_bus_growth(&self) {
        self.growth_scheduled.set(false);
        let _retired = {
            let mut graph = GraphLock::acquire(&self.graph);
            let mut render = RenderLock::acquire(&self.render);
            render.apply_growth(&mut graph);
            render.take_retired()
        };
    }

    /// Applies queued changes and syncs render state if the graph lock is
    /// free. Called with the render lock held, on the render thread.
    fn handle_render_tasks(&self, render: &mut RenderState) {
        if let Some(mut graph) = GraphLock::try_acquire(&self.graph) {
            self.drain_pending(&mut graph);
            render.sync_topology(&mut graph);
            self.hand_off_marked(&mut graph);
        }
        if render.has_growth() {
            self.schedule_growth();
        }
        if render.has_retired() {
            self.schedule_release();
        }
    }

    /// Renders one quantum into `out`.
    pub fn render(&self, out: &mut AudioBus) {
        let mut render = RenderLock::acquire(&self.render);
        debug_assert_eq!(out.length(), render.frames, "render bus length must equal the quantum");
        if self.is_closed() {
            out.zero();
            return;
        }

        self.handle_render_tasks(&mut render);

        let quantum = RenderQuantum {
            sample_frame: self.current_sample_frame(),
            frames: render.frames,
            sample_rate: self.config.sample_rate,
        };
        render.pull_graph(&quantum);

        let destination = OutputRef {
            node: NodeId::DESTINATION,
            index: 0,
        };
        match render.output_bus(destination) {
            Some(bus) if !bus.is_silent() => out.copy_from(bus, ChannelInterpretation::Speakers),
            _ => out.zero(),
        }

        self.sample_frame
            .fetch_add(quantum.frames as u64, Ordering::AcqRel);

        self.handle_render_tasks(&mut render);
    }

    fn validate_info(&self, info: &NodeInfo) -> Result<()> {
        let max = self.config.max_channels;
        if info.inputs > MAX_NODE_INPUTS {
            return Err(Error::InvalidArgument(format!(
                "{} inputs exceeds the limit of {}",
                info.inputs, MAX_NODE_INPUTS
            )));
        }
        if info.outputs.len() > MAX_NODE_OUTPUTS {
            return Err(Error::InvalidArgument(format!(
                "{} outputs exceeds the limit of {}",
                info.outputs.len(),
                MAX_NODE_OUTPUTS
            )));
        }
        if let Some(&channels) = info.outputs.iter().find(|&&c| c == 0 || c > max) {
            return Err(Error::NotSupported(format!(
                "output channel count {} (must be 1-{})",
                channels, max
            )));
        }
        let count = info.channel_config.count;
        if count == 0 || count > max {
            return Err(Error::NotSupported(format!(
                "channel count {} (must be 1-{})",
                count, max
            )));
        }
        Ok(())
    }

    pub fn create_node(&self, info: NodeInfo, processor: Box<dyn AudioProcessor>) -> Result<AudioNode> {
        self.check_open()?;
        self.validate_info(&info)?;
        let shared = self
            .this
            .upgrade()
            .ok_or_else(|| Error::InvalidState("context dropped".into()))?;

        let id = NodeId(self.next_node_id.fetch_add(1, Ordering::AcqRel));
        let requires_tail_processing = processor.tail_time() + processor.latency_time() > 0.0;
        let state = Arc::new(NodeState::new(
            id,
            &info,
            self.config.sample_rate,
            requires_tail_processing,
        ));

        let frames = self.config.render_quantum_frames;
        let input_channels = info.channel_config.computed_channels(0);
        let ports = NodePorts {
            state: state.clone(),
            inputs: (0..info.inputs)
                .map(|_| AudioNodeInput::new(input_channels, frames))
                .collect(),
            outputs: info
                .outputs
                .iter()
                .map(|&channels| AudioNodeOutput::new(channels, frames))
                .collect(),
            params: state
                .params
                .iter()
                .map(|p| ParamRender::new(p.clone(), frames))
                .collect(),
        };

        {
            let mut graph = GraphLock::acquire(&self.graph);
            let mut render = RenderLock::acquire(&self.render);
            graph.insert(GraphNode::new(state.clone()));
            render.insert(RenderNode { processor, ports });
        }

        tracing::debug!(
            node = %id,
            node_type = info.node_type.name(),
            inputs = info.inputs,
            outputs = info.outputs.len(),
            "node created"
        );
        Ok(AudioNode::new(shared, state))
    }

    /// Runs a node's `initialize` under the render lock. Idempotent.
    pub fn initialize_node(&self, state: &NodeState) {
        if state.initialized.get() {
            return;
        }
        let mut render = RenderLock::acquire(&self.render);
        render.initialize_node(state.id);
    }

    pub fn uninitialize_node(&self, state: &NodeState) {
        let mut render = RenderLock::acquire(&self.render);
        render.uninitialize_node(state.id);
    }

    pub fn reset_node(&self, state: &NodeState) {
        let mut render = RenderLock::acquire(&self.render);
        render.reset_node(state.id);
    }

    pub fn close(&self) {
        if !self.closed.raise() {
            return;
        }
        let mut render = RenderLock::acquire(&self.render);
        render.uninitialize_all();
        tracing::debug!(context = self.id, "context closed");
    }
}

/// A graph of audio nodes rendered one quantum at a time.
///
/// Cloning shares the same context.
///
/// # Example
/// ```ignore
/// let context = AudioContext::builder().sample_rate(48000.0).build()?;
/// let mut bus = context.create_render_bus();
/// context.render(&mut bus);
/// ```
#[derive(Clone)]
pub struct AudioContext {
    shared: Arc<ContextShared>,
    destination: AudioNode,
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("id", &self.shared.id)
            .field("sample_rate", &self.shared.config.sample_rate)
            .field("current_sample_frame", &self.current_sample_frame())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AudioContext {
    /// Create a new context builder.
    pub fn builder() -> AudioContextBuilder {
        AudioContextBuilder::default()
    }

    /// Context whose dispatcher treats the calling thread as main.
    pub fn new(config: ContextConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = Arc::new(ThreadScheduler::new());
        let dispatcher = Arc::new(MainThreadDispatcher::with_budget(
            scheduler,
            config.main_thread_budget,
        ));
        Self::with_dispatcher(config, dispatcher)
    }

    pub fn with_dispatcher(config: ContextConfig, dispatcher: Arc<MainThreadDispatcher>) -> Result<Self> {
        config.validate()?;
        let channels = config.destination_channels;
        let shared = ContextShared::new(config, dispatcher);
        let destination = shared.create_node(destination_info(channels), Box::new(DestinationProcessor))?;
        debug_assert_eq!(destination.id(), NodeId::DESTINATION);
        shared.initialize_node(&destination.state);
        tracing::debug!(context = shared.id, sample_rate = shared.sample_rate(), channels, "context created");
        Ok(Self { shared, destination })
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.shared.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.shared.config.sample_rate
    }

    pub fn render_quantum_frames(&self) -> usize {
        self.shared.config.render_quantum_frames
    }

    /// Seconds rendered so far.
    pub fn current_time(&self) -> f64 {
        self.current_sample_frame() as f64 / self.sample_rate()
    }

    pub fn current_sample_frame(&self) -> u64 {
        self.shared.current_sample_frame()
    }

    pub fn destination(&self) -> &AudioNode {
        &self.destination
    }

    pub fn dispatcher(&self) -> &Arc<MainThreadDispatcher> {
        &self.shared.dispatcher
    }

    /// Runs deferred work queued for the main thread. Convenience for
    /// hosts using the default scheduler.
    pub fn dispatch_main_thread(&self) -> usize {
        self.shared.dispatcher.dispatch_functions_from_main_thread()
    }

    /// Adds a node running `processor`, declared by `info`.
    pub fn create_node(&self, info: NodeInfo, processor: impl AudioProcessor + 'static) -> Result<AudioNode> {
        self.shared.create_node(info, Box::new(processor))
    }

    /// A bus shaped like the destination output.
    pub fn create_render_bus(&self) -> AudioBus {
        AudioBus::new(
            self.shared.config.destination_channels,
            self.shared.config.render_quantum_frames,
        )
    }

    /// Renders one quantum into `out`, which must be
    /// [`render_quantum_frames`](Self::render_quantum_frames) long.
    /// Called from the audio thread.
    pub fn render(&self, out: &mut AudioBus) {
        self.shared.render(out);
    }

    /// Fills an interleaved host buffer of any length, rendering quanta as
    /// needed and keeping the unread remainder for the next call.
    pub fn render_interleaved(&self, out: &mut [f32]) {
        let mut interleaved = self.shared.interleaved.lock();
        interleaved.fill(out, |bus| self.shared.render(bus));
    }

    /// Pulls `node` every quantum even if nothing downstream reads it.
    pub fn add_automatic_pull_node(&self, node: &AudioNode) -> Result<()> {
        self.check_same_context(node)?;
        self.shared.initialize_node(&node.state);
        let mut render = RenderLock::acquire(&self.shared.render);
        if !render.automatic_pull.contains(&node.id()) {
            render.automatic_pull.push(node.id());
        }
        Ok(())
    }

    pub fn remove_automatic_pull_node(&self, node: &AudioNode) {
        let mut render = RenderLock::acquire(&self.shared.render);
        render.automatic_pull.retain(|n| *n != node.id());
    }

    fn check_same_context(&self, node: &AudioNode) -> Result<()> {
        if !Arc::ptr_eq(&self.shared, &node.context) {
            return Err(Error::InvalidArgument(format!(
                "{} belongs to a different context",
                node.id()
            )));
        }
        Ok(())
    }

    /// Uninitializes every node. Rendering then produces silence and
    /// graph mutations fail with `InvalidState`.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Applies queued changes now, waiting for the graph lock.
    pub fn flush_pending(&self) {
        let mut graph = GraphLock::acquire(&self.shared.graph);
        self.shared.drain_pending(&mut graph);
        self.shared.hand_off_marked(&mut graph);
    }

    /// Inspects topology under the graph lock.
    pub fn with_graph_lock<R>(&self, f: impl FnOnce(&GraphState) -> R) -> R {
        let graph = GraphLock::acquire(&self.shared.graph);
        f(&graph)
    }

    /// Inspects render state under the render lock.
    pub fn with_render_lock<R>(&self, f: impl FnOnce(&RenderState) -> R) -> R {
        let render = RenderLock::acquire(&self.shared.render);
        f(&render)
    }

    /// Live nodes, destination and not-yet-finalized nodes included.
    pub fn node_count(&self) -> usize {
        self.with_graph_lock(GraphState::node_count)
    }

    pub fn connection_count(&self) -> usize {
        self.with_graph_lock(GraphState::connection_count)
    }

    /// Live nodes per type name.
    pub fn node_counts(&self) -> HashMap<&'static str, usize> {
        self.with_graph_lock(GraphState::node_counts)
    }
}

/// Builder for [`AudioContext`].
#[derive(Default)]
pub struct AudioContextBuilder {
    config: ContextConfig,
    dispatcher: Option<Arc<MainThreadDispatcher>>,
}

impl AudioContextBuilder {
    /// Set sample rate (default: 44100 Hz).
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Set frames per render quantum (default: 128).
    pub fn render_quantum(mut self, frames: usize) -> Self {
        self.config.render_quantum_frames = frames;
        self
    }

    /// Set destination channel count (default: 2).
    pub fn channels(mut self, channels: usize) -> Self {
        self.config.destination_channels = channels;
        self
    }

    pub fn max_channels(mut self, channels: usize) -> Self {
        self.config.max_channels = channels;
        self
    }

    /// Soft budget for one dispatch pass of the default dispatcher.
    pub fn main_thread_budget(mut self, budget: Duration) -> Self {
        self.config.main_thread_budget = budget;
        self
    }

    /// Use a host-provided dispatcher instead of the default one.
    pub fn dispatcher(mut self, dispatcher: Arc<MainThreadDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AudioContext> {
        match self.dispatcher {
            Some(dispatcher) => AudioContext::with_dispatcher(self.config, dispatcher),
            None => AudioContext::new(self.config),
        }
    }
}
