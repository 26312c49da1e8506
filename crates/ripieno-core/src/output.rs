//! Render-side output port.

use crate::bus::AudioBus;

/// One output port's render state: the bus its node writes into.
///
/// Which inputs the output feeds, and whether it is enabled, is topology
/// and lives under the graph lock.
#[derive(Debug)]
pub struct AudioNodeOutput {
    bus: AudioBus,
    desired_channels: usize,
}

impl AudioNodeOutput {
    pub(crate) fn new(channels: usize, frames: usize) -> Self {
        Self {
            bus: AudioBus::new(channels, frames),
            desired_channels: channels,
        }
    }

    #[inline]
    pub fn bus(&self) -> &AudioBus {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut AudioBus {
        &mut self.bus
    }

    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.bus.number_of_channels()
    }

    /// Width most recently requested, which differs from the bus width while
    /// a reallocation is pending.
    #[inline]
    pub fn desired_channels(&self) -> usize {
        self.desired_channels
    }

    /// Applies `channels` if the bus can hold it without allocating.
    /// Returns `false` when a reallocation is required.
    pub(crate) fn set_number_of_channels(&mut self, channels: usize) -> bool {
        self.desired_channels = channels;
        self.bus.set_number_of_channels(channels)
    }

    /// Reallocates to the desired width. Control threads only.
    pub(crate) fn grow(&mut self, channels: usize) {
        self.desired_channels = channels;
        self.bus.grow(channels);
    }
}
