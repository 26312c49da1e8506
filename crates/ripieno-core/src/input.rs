//! Render-side input port.

use crate::bus::AudioBus;
use crate::channel::ChannelInterpretation;
use crate::node::OutputRef;
use crate::render::{edge_list, output_bus, NodeSlots};

/// One input port's render state.
///
/// `rendering_outputs` is the set of enabled upstream outputs as of the last
/// topology sync. When exactly one of them feeds the input at the input's own
/// width, the input reads that output's bus in place; otherwise everything is
/// summed into `summing_bus`.
#[derive(Debug)]
pub struct AudioNodeInput {
    pub(crate) rendering_outputs: Vec<OutputRef>,
    summing_bus: AudioBus,
    in_place: Option<OutputRef>,
    channels: usize,
}

impl AudioNodeInput {
    pub(crate) fn new(channels: usize, frames: usize) -> Self {
        Self {
            rendering_outputs: edge_list(),
            summing_bus: AudioBus::new(channels, frames),
            in_place: None,
            channels,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.rendering_outputs.is_empty()
    }

    /// Mix width computed at the last negotiation.
    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.channels
    }

    /// Upstream outputs summed into this input.
    pub fn rendering_outputs(&self) -> &[OutputRef] {
        &self.rendering_outputs
    }

    /// Resizes the summing bus to `channels`. Returns `false` when the bus
    /// must be reallocated first; the previous width is kept until then.
    pub(crate) fn update_internal_bus(&mut self, channels: usize) -> bool {
        if channels == self.channels {
            return true;
        }
        if self.summing_bus.set_number_of_channels(channels) {
            self.channels = channels;
            true
        } else {
            false
        }
    }

    /// Reallocates the summing bus. Control threads only.
    pub(crate) fn grow(&mut self, channels: usize) {
        self.summing_bus.grow(channels);
        self.channels = channels;
    }

    /// Gathers upstream output buses, already processed for this quantum,
    /// into the bus [`bus`](Self::bus) will return.
    pub(crate) fn sum_connections(&mut self, slots: &NodeSlots, interpretation: ChannelInterpretation) {
        self.in_place = None;

        if let [only] = self.rendering_outputs.as_slice() {
            if let Some(src) = output_bus(slots, *only) {
                if src.number_of_channels() == self.channels {
                    self.in_place = Some(*only);
                    return;
                }
            }
        }

        self.summing_bus.zero();
        for src in &self.rendering_outputs {
            if let Some(bus) = output_bus(slots, *src) {
                self.summing_bus.sum_from(bus, interpretation);
            }
        }
    }

    /// The mixed bus for this quantum.
    pub(crate) fn bus<'a>(&'a self, slots: &'a NodeSlots) -> &'a AudioBus {
        self.in_place
            .and_then(|src| output_bus(slots, src))
            .unwrap_or(&self.summing_bus)
    }

    pub(crate) fn is_silent(&self, slots: &NodeSlots) -> bool {
        self.bus(slots).is_silent()
    }
}
