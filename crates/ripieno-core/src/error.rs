//! Error types for ripieno-core.

use core::fmt;
use thiserror::Error;

/// The kind of port an out-of-range index referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
    Param,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Input => f.write_str("input"),
            PortKind::Output => f.write_str("output"),
            PortKind::Param => f.write_str("param"),
        }
    }
}

/// Error type for ripieno-core operations.
///
/// The render callback never returns these; they are surfaced to control
/// threads from graph mutation and configuration calls.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} index {index} out of range (node has {count})")]
    IndexOutOfRange {
        kind: PortKind,
        index: usize,
        count: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
