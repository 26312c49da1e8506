//! Channel count policy and interpretation.

use serde::{Deserialize, Serialize};

/// How an input derives its mix width from the outputs feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelCountMode {
    /// Widest connected output.
    #[default]
    Max,
    /// Widest connected output, capped at the node's channel count.
    ClampedMax,
    /// Always the node's channel count.
    Explicit,
}

/// How buses of different widths are mixed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelInterpretation {
    /// Standard up/down-mix matrices for mono, stereo, quad and 5.1.
    #[default]
    Speakers,
    /// Index-aligned, truncating or zero-padding.
    Discrete,
}

impl ChannelCountMode {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ChannelCountMode::Max => 0,
            ChannelCountMode::ClampedMax => 1,
            ChannelCountMode::Explicit => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => ChannelCountMode::ClampedMax,
            2 => ChannelCountMode::Explicit,
            _ => ChannelCountMode::Max,
        }
    }
}

impl ChannelInterpretation {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ChannelInterpretation::Speakers => 0,
            ChannelInterpretation::Discrete => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => ChannelInterpretation::Discrete,
            _ => ChannelInterpretation::Speakers,
        }
    }
}

/// Per-node channel configuration applied to every input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub count: usize,
    pub mode: ChannelCountMode,
    pub interpretation: ChannelInterpretation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            count: 2,
            mode: ChannelCountMode::Max,
            interpretation: ChannelInterpretation::Speakers,
        }
    }
}

impl ChannelConfig {
    pub fn new(count: usize, mode: ChannelCountMode, interpretation: ChannelInterpretation) -> Self {
        Self {
            count,
            mode,
            interpretation,
        }
    }

    /// Explicit width with the given interpretation.
    pub fn explicit(count: usize, interpretation: ChannelInterpretation) -> Self {
        Self::new(count, ChannelCountMode::Explicit, interpretation)
    }

    /// Mix width for an input whose widest connected output has
    /// `max_upstream` channels. An unconnected input counts as mono.
    pub fn computed_channels(&self, max_upstream: usize) -> usize {
        let upstream = max_upstream.max(1);
        match self.mode {
            ChannelCountMode::Max => upstream,
            ChannelCountMode::ClampedMax => upstream.min(self.count.max(1)),
            ChannelCountMode::Explicit => self.count.max(1),
        }
    }
}
