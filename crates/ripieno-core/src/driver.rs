//! Host-side drivers for hosts without an audio device callback.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::bus::AudioBus;
use crate::compat::{Arc, AtomicBool, AtomicU64, Ordering};
use crate::context::AudioContext;
use crate::Result;

/// Adapts quantum-sized renders to interleaved host buffers of any size.
#[derive(Debug)]
pub struct InterleavedOutput {
    bus: AudioBus,
    scratch: Vec<f32>,
    cursor: usize,
}

impl InterleavedOutput {
    pub fn new(channels: usize, frames: usize) -> Self {
        let scratch = vec![0.0; channels * frames];
        Self {
            bus: AudioBus::new(channels, frames),
            cursor: scratch.len(),
            scratch,
        }
    }

    /// Samples rendered but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.scratch.len() - self.cursor
    }

    /// Fills `out`, calling `render` for each new quantum needed.
    pub fn fill(&mut self, out: &mut [f32], mut render: impl FnMut(&mut AudioBus)) {
        let mut written = 0;
        while written < out.len() {
            if self.cursor >= self.scratch.len() {
                render(&mut self.bus);
                self.bus.copy_to_interleaved(&mut self.scratch);
                self.cursor = 0;
            }
            let n = (self.scratch.len() - self.cursor).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.scratch[self.cursor..self.cursor + n]);
            self.cursor += n;
            written += n;
        }
    }
}

/// How a [`RenderThread`] schedules quanta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// One quantum per quantum duration of wall-clock time.
    #[default]
    Realtime,
    /// As fast as possible.
    Freewheel,
}

/// Calls [`AudioContext::render`] on a dedicated thread until stopped.
#[derive(Debug)]
pub struct RenderThread {
    running: Arc<AtomicBool>,
    quanta: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Renders and discards the output.
    pub fn spawn(context: &AudioContext, pacing: Pacing) -> Result<Self> {
        Self::spawn_with_sink(context, pacing, |_| {})
    }

    /// Renders and hands every quantum to `sink`.
    pub fn spawn_with_sink<F>(context: &AudioContext, pacing: Pacing, mut sink: F) -> Result<Self>
    where
        F: FnMut(&AudioBus) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let quanta = Arc::new(AtomicU64::new(0));
        let context = context.clone();
        let quantum = Duration::from_secs_f64(context.render_quantum_frames() as f64 / context.sample_rate());

        let handle = {
            let running = running.clone();
            let quanta = quanta.clone();
            thread::Builder::new()
                .name("ripieno-render".into())
                .spawn(move || {
                    let mut bus = context.create_render_bus();
                    let start = Instant::now();
                    let mut rendered: u32 = 0;
                    while running.load(Ordering::Acquire) {
                        context.render(&mut bus);
                        sink(&bus);
                        rendered = rendered.wrapping_add(1);
                        quanta.fetch_add(1, Ordering::Release);
                        match pacing {
                            Pacing::Realtime => {
                                let due = start + quantum * rendered;
                                if let Some(wait) = due.checked_duration_since(Instant::now()) {
                                    thread::sleep(wait);
                                }
                            }
                            Pacing::Freewheel => thread::yield_now(),
                        }
                    }
                })?
        };
        tracing::debug!(?pacing, "render thread started");

        Ok(Self {
            running,
            quanta,
            handle: Some(handle),
        })
    }

    pub fn quanta_rendered(&self) -> u64 {
        self.quanta.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops rendering and joins the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("render thread panicked");
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}
