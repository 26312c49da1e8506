//! Centralized error type for the ripieno umbrella crate.
//!
//! Wraps the runtime and node errors so `?` propagates across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ripieno_core::Error),

    #[error("DSP: {0}")]
    Dsp(#[from] ripieno_dsp::Error),

    #[error("Engine: {0}")]
    Engine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
