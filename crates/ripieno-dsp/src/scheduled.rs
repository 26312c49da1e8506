//! Start/stop scheduling shared by source nodes.

use ripieno_core::{Arc, AtomicDouble, RenderQuantum};

use crate::{Error, Result};

/// Start and stop times in context seconds, shared between a source's
/// client handle and its processor.
///
/// The start time is `NaN` until [`start`](Schedule::start) is called and the
/// stop time is infinite until [`stop`](Schedule::stop).
#[derive(Debug)]
pub struct Schedule {
    start: AtomicDouble,
    stop: AtomicDouble,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            start: AtomicDouble::new(f64::NAN),
            stop: AtomicDouble::new(f64::INFINITY),
        }
    }
}

impl Schedule {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_time(&self) -> Option<f64> {
        let t = self.start.get();
        (!t.is_nan()).then_some(t)
    }

    pub fn stop_time(&self) -> f64 {
        self.stop.get()
    }

    pub fn is_started(&self) -> bool {
        self.start_time().is_some()
    }

    /// Schedules playback from `when`. A source starts at most once.
    pub fn start(&self, when: f64) -> Result<()> {
        if !when.is_finite() || when < 0.0 {
            return Err(Error::InvalidParameter(format!("start time {when} must be a non-negative finite number")));
        }
        if self.is_started() {
            return Err(Error::InvalidState("source already started".into()));
        }
        self.start.set(when);
        Ok(())
    }

    /// Schedules the end of playback at `when`. Later calls replace earlier
    /// ones until the stop time passes.
    pub fn stop(&self, when: f64) -> Result<()> {
        if !when.is_finite() || when < 0.0 {
            return Err(Error::InvalidParameter(format!("stop time {when} must be a non-negative finite number")));
        }
        if !self.is_started() {
            return Err(Error::InvalidState("stop called before start".into()));
        }
        self.stop.set(when);
        Ok(())
    }

    /// Frames `[begin, end)` of `quantum` during which the source plays.
    /// `None` when it is silent for the whole quantum.
    pub fn active_frames(&self, quantum: &RenderQuantum) -> Option<(usize, usize)> {
        let start = self.start_time()?;
        let first = quantum.sample_frame;
        let last = first + quantum.frames as u64;

        let start_frame = frame_at(start, quantum.sample_rate);
        let stop_frame = frame_at(self.stop_time(), quantum.sample_rate);
        if start_frame >= last || stop_frame <= first || stop_frame <= start_frame {
            return None;
        }
        let begin = start_frame.saturating_sub(first) as usize;
        let end = (stop_frame.min(last) - first) as usize;
        Some((begin, end))
    }

    /// Whether the source renders anything during `quantum`.
    pub fn is_playing(&self, quantum: &RenderQuantum) -> bool {
        self.active_frames(quantum).is_some()
    }

    /// Frame at which playback starts, if scheduled.
    pub fn start_frame(&self, sample_rate: f64) -> Option<u64> {
        self.start_time().map(|t| frame_at(t, sample_rate))
    }
}

/// First frame at or after `time`.
#[inline]
fn frame_at(time: f64, sample_rate: f64) -> u64 {
    if time.is_infinite() {
        return u64::MAX;
    }
    let exact = time * sample_rate;
    let nearest = exact.round();
    let frame = if (exact - nearest).abs() < 1e-6 { nearest } else { exact.ceil() };
    frame.max(0.0) as u64
}
