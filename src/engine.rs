//! RipienoEngine: an audio context plus node factories and render drivers.

use ripieno_core::compat::Mutex;
use ripieno_core::{Arc, AudioContext, AudioNode, MainThreadDispatcher, Pacing, RenderThread};
use ripieno_dsp::{
    ChannelMergerNode, ChannelSplitterNode, ConstantSourceNode, DelayNode, DelayOptions, DspHandle,
    GainNode, OscillatorNode, Waveform,
};

use crate::{Error, Result};

/// Main engine object.
///
/// Owns an [`AudioContext`] and optionally a [`RenderThread`] driving it.
/// Without a running render thread the host drives rendering itself, either
/// through [`context()`](Self::context) or with
/// [`render_offline`](Self::render_offline).
///
/// # Example
///
/// ```ignore
/// use ripieno::prelude::*;
///
/// let engine = RipienoEngine::builder().build()?;
/// let osc = engine.oscillator(Waveform::Sine, 440.0)?;
/// osc.connect_to(engine.destination())?;
/// osc.start(0.0)?;
///
/// let channels = engine.render_offline(44100);
/// ```
pub struct RipienoEngine {
    context: AudioContext,
    render_thread: Mutex<Option<RenderThread>>,
}

impl RipienoEngine {
    pub fn builder() -> crate::RipienoEngineBuilder {
        crate::RipienoEngineBuilder::default()
    }

    pub(crate) fn from_context(context: AudioContext) -> Self {
        tracing::info!(
            context = context.id(),
            sample_rate = context.sample_rate(),
            channels = context.config().destination_channels,
            "engine created"
        );
        Self {
            context,
            render_thread: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn sample_rate(&self) -> f64 {
        self.context.sample_rate()
    }

    /// Destination channel count.
    pub fn channels(&self) -> usize {
        self.context.config().destination_channels
    }

    pub fn current_time(&self) -> f64 {
        self.context.current_time()
    }

    pub fn destination(&self) -> &AudioNode {
        self.context.destination()
    }

    /// Node factory handle.
    pub fn dsp(&self) -> DspHandle<'_> {
        DspHandle::new(&self.context)
    }

    // =========================================================================
    // Node factories
    // =========================================================================

    pub fn oscillator(&self, waveform: Waveform, frequency: f32) -> Result<OscillatorNode> {
        Ok(self.dsp().oscillator(waveform, frequency)?)
    }

    pub fn constant(&self, offset: f32) -> Result<ConstantSourceNode> {
        Ok(self.dsp().constant(offset)?)
    }

    pub fn gain(&self, gain: f32) -> Result<GainNode> {
        Ok(self.dsp().gain(gain)?)
    }

    /// Delay node whose `delay_time` may range up to `max_delay_time` seconds.
    pub fn delay(&self, max_delay_time: f64) -> Result<DelayNode> {
        Ok(self.dsp().delay_with(DelayOptions::new(max_delay_time))?)
    }

    pub fn merger(&self, inputs: usize) -> Result<ChannelMergerNode> {
        Ok(self.dsp().merger(inputs)?)
    }

    pub fn splitter(&self, outputs: usize) -> Result<ChannelSplitterNode> {
        Ok(self.dsp().splitter(outputs)?)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Renders `frames` frames on the calling thread and returns one buffer
    /// per destination channel.
    ///
    /// Shares the context clock with any running render thread; stop it
    /// first for a contiguous result.
    pub fn render_offline(&self, frames: usize) -> Vec<Vec<f32>> {
        if self.is_running() {
            tracing::warn!("offline render while the render thread is running");
        }
        let mut bus = self.context.create_render_bus();
        let quantum = bus.length();
        let mut channels = vec![Vec::with_capacity(frames); bus.number_of_channels()];

        let mut remaining = frames;
        while remaining > 0 {
            self.context.render(&mut bus);
            let take = remaining.min(quantum);
            for (ch, out) in channels.iter_mut().enumerate() {
                out.extend_from_slice(&bus.channel(ch)[..take]);
            }
            remaining -= take;
        }
        channels
    }

    /// Starts a render thread. Fails if one is already running.
    pub fn start(&self, pacing: Pacing) -> Result<&Self> {
        let mut slot = self.render_thread.lock();
        if slot.as_ref().is_some_and(RenderThread::is_running) {
            return Err(Error::Engine("render thread already running".into()));
        }
        *slot = Some(RenderThread::spawn(&self.context, pacing)?);
        Ok(self)
    }

    /// Stops the render thread, if any. Returns the number of quanta it
    /// rendered.
    pub fn stop(&self) -> u64 {
        match self.render_thread.lock().take() {
            Some(mut thread) => {
                thread.stop();
                thread.quanta_rendered()
            }
            None => 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.render_thread
            .lock()
            .as_ref()
            .is_some_and(RenderThread::is_running)
    }

    // =========================================================================
    // Main thread and lifecycle
    // =========================================================================

    pub fn dispatcher(&self) -> &Arc<MainThreadDispatcher> {
        self.context.dispatcher()
    }

    /// Runs deferred main-thread work such as node finalization. Call
    /// periodically from the thread that built the engine.
    pub fn dispatch_main_thread(&self) -> usize {
        self.context.dispatch_main_thread()
    }

    pub fn node_count(&self) -> usize {
        self.context.node_count()
    }

    /// Stops rendering and closes the context.
    pub fn close(&self) {
        self.stop();
        self.context.close();
    }

    pub fn is_closed(&self) -> bool {
        self.context.is_closed()
    }
}

impl Drop for RipienoEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
