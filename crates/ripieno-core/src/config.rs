//! Audio context configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Frames rendered per quantum unless configured otherwise.
pub const DEFAULT_RENDER_QUANTUM: usize = 128;

/// Upper bound on the render quantum.
pub const MAX_RENDER_QUANTUM: usize = 4096;

/// Widest bus any node may declare.
pub const MAX_CHANNELS: usize = 32;

/// Configuration for an [`AudioContext`](crate::AudioContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub sample_rate: f64,
    /// Fixed for the lifetime of the context.
    pub render_quantum_frames: usize,
    pub destination_channels: usize,
    pub max_channels: usize,
    /// Soft wall-clock budget for one main-thread dispatch pass.
    pub main_thread_budget: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            render_quantum_frames: DEFAULT_RENDER_QUANTUM,
            destination_channels: 2,
            max_channels: MAX_CHANNELS,
            main_thread_budget: Duration::from_millis(50),
        }
    }
}

impl ContextConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.render_quantum_frames == 0 || self.render_quantum_frames > MAX_RENDER_QUANTUM {
            return Err(Error::InvalidConfig(format!(
                "render_quantum_frames {} out of range (1-{})",
                self.render_quantum_frames, MAX_RENDER_QUANTUM
            )));
        }
        if self.max_channels == 0 || self.max_channels > MAX_CHANNELS {
            return Err(Error::InvalidConfig(format!(
                "max_channels {} out of range (1-{})",
                self.max_channels, MAX_CHANNELS
            )));
        }
        if self.destination_channels == 0 || self.destination_channels > self.max_channels {
            return Err(Error::InvalidConfig(format!(
                "destination_channels {} out of range (1-{})",
                self.destination_channels, self.max_channels
            )));
        }
        Ok(())
    }
}
