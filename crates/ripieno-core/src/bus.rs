//! Multichannel sample buffers.

use crate::channel::ChannelInterpretation;
use crate::mixing;

/// Channels a bus can hold without reallocating, unless created wider.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// A fixed-length multichannel buffer with a logical silence flag.
///
/// Storage is planar and flat: channel `i` occupies
/// `data[i * length..(i + 1) * length]`. Width can change between 1 and the
/// allocated capacity without touching the allocator; growing past the
/// capacity goes through [`grow`](Self::grow), which allocates and therefore
/// never runs on the render thread.
///
/// A silent bus may hold stale samples. Readers check [`is_silent`](Self::is_silent)
/// first; any writer that produces signal must call
/// [`clear_silent_flag`](Self::clear_silent_flag).
#[derive(Debug, Clone)]
pub struct AudioBus {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
    length: usize,
    silent: bool,
}

impl AudioBus {
    /// A silent bus of `channels` × `length` frames.
    pub fn new(channels: usize, length: usize) -> Self {
        Self::with_capacity(channels, length, channels.max(DEFAULT_CHANNEL_CAPACITY))
    }

    pub fn with_capacity(channels: usize, length: usize, capacity: usize) -> Self {
        let capacity = capacity.max(channels).max(1);
        Self {
            data: vec![0.0; capacity * length],
            channels,
            capacity,
            length,
            silent: true,
        }
    }

    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples of channel `index`, or an empty slice when out of range.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        if index >= self.channels {
            return &[];
        }
        let start = index * self.length;
        &self.data[start..start + self.length]
    }

    /// Mutable samples of channel `index`, or an empty slice when out of range.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        if index >= self.channels {
            return &mut [];
        }
        let start = index * self.length;
        &mut self.data[start..start + self.length]
    }

    /// Copies channel `from` over channel `to` within this bus.
    pub fn copy_channel(&mut self, from: usize, to: usize) {
        if from == to || from >= self.channels || to >= self.channels {
            return;
        }
        let src = from * self.length;
        self.data
            .copy_within(src..src + self.length, to * self.length);
    }

    #[inline]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    #[inline]
    pub fn set_silent(&mut self) {
        self.silent = true;
    }

    #[inline]
    pub fn clear_silent_flag(&mut self) {
        self.silent = false;
    }

    /// Zeroes the active channels and marks the bus silent.
    pub fn zero(&mut self) {
        let end = self.channels * self.length;
        self.data[..end].fill(0.0);
        self.silent = true;
    }

    /// Changes the width without allocating. Returns `false` and leaves the
    /// bus untouched when `channels` is 0 or exceeds the capacity.
    pub fn set_number_of_channels(&mut self, channels: usize) -> bool {
        if channels == 0 || channels > self.capacity {
            return false;
        }
        if channels > self.channels {
            let start = self.channels * self.length;
            self.data[start..channels * self.length].fill(0.0);
        }
        self.channels = channels;
        true
    }

    /// Reallocates so `channels` fit, then sets the width. Allocates; control
    /// threads only.
    pub fn grow(&mut self, channels: usize) {
        if channels > self.capacity {
            self.data.resize(channels * self.length, 0.0);
            self.capacity = channels;
        }
        self.set_number_of_channels(channels.max(1));
    }

    /// Replaces the contents with `src`, up/down-mixed to this bus's width.
    pub fn copy_from(&mut self, src: &AudioBus, interpretation: ChannelInterpretation) {
        self.zero();
        self.sum_from(src, interpretation);
    }

    /// Adds `src`, up/down-mixed to this bus's width. A silent source
    /// contributes nothing and leaves the flag alone.
    pub fn sum_from(&mut self, src: &AudioBus, interpretation: ChannelInterpretation) {
        if src.is_silent() {
            return;
        }
        debug_assert_eq!(src.length, self.length, "bus length mismatch");
        mixing::sum_into(src, self, interpretation);
        self.silent = false;
    }

    /// Multiplies every active sample by `gain`.
    pub fn scale(&mut self, gain: f32) {
        if self.silent {
            return;
        }
        let end = self.channels * self.length;
        for s in &mut self.data[..end] {
            *s *= gain;
        }
    }

    /// Peak absolute sample across active channels; 0 when silent.
    pub fn max_abs(&self) -> f32 {
        if self.silent {
            return 0.0;
        }
        self.data[..self.channels * self.length]
            .iter()
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Writes frames interleaved into `out`, returning the frame count
    /// written. Stops at whichever of `out` or the bus runs out first.
    pub fn copy_to_interleaved(&self, out: &mut [f32]) -> usize {
        let channels = self.channels.max(1);
        let frames = (out.len() / channels).min(self.length);
        if self.silent {
            out[..frames * channels].fill(0.0);
            return frames;
        }
        for (frame, chunk) in out.chunks_exact_mut(channels).take(frames).enumerate() {
            for (ch, sample) in chunk.iter_mut().enumerate() {
                *sample = self.data[ch * self.length + frame];
            }
        }
        frames
    }
}
