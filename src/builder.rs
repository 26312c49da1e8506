//! Builder for configuring and constructing a `RipienoEngine`.

use std::time::Duration;

use ripieno_core::{Arc, AudioContextBuilder, ContextConfig, MainThreadDispatcher};

use crate::{Result, RipienoEngine};

/// Mirrors [`AudioContextBuilder`]; every setting is forwarded to the
/// engine's context.
///
/// # Example
///
/// ```ignore
/// use ripieno::prelude::*;
///
/// let engine = RipienoEngine::builder()
///     .sample_rate(48000.0)
///     .channels(2)
///     .build()?;
/// ```
#[derive(Default)]
pub struct RipienoEngineBuilder {
    context: AudioContextBuilder,
}

impl RipienoEngineBuilder {
    /// Default: 44100
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.context = self.context.sample_rate(rate);
        self
    }

    /// Frames per quantum. Default: 128
    pub fn render_quantum(mut self, frames: usize) -> Self {
        self.context = self.context.render_quantum(frames);
        self
    }

    /// Destination channels. Default: 2
    pub fn channels(mut self, channels: usize) -> Self {
        self.context = self.context.channels(channels);
        self
    }

    pub fn max_channels(mut self, channels: usize) -> Self {
        self.context = self.context.max_channels(channels);
        self
    }

    /// Time budget for one main-thread dispatch pass.
    pub fn main_thread_budget(mut self, budget: Duration) -> Self {
        self.context = self.context.main_thread_budget(budget);
        self
    }

    /// Uses a dispatcher owned by the host instead of one bound to the
    /// building thread.
    pub fn dispatcher(mut self, dispatcher: Arc<MainThreadDispatcher>) -> Self {
        self.context = self.context.dispatcher(dispatcher);
        self
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.context = self.context.config(config);
        self
    }

    pub fn build(self) -> Result<RipienoEngine> {
        let context = self.context.build()?;
        Ok(RipienoEngine::from_context(context))
    }
}
