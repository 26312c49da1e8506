//! Error types for ripieno-dsp

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Core(#[from] ripieno_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
