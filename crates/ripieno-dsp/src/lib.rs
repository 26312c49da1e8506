//! Standard node kinds for the ripieno audio graph: scheduled sources,
//! gain, delay and channel routing.

mod error;
pub use error::{Error, Result};

mod scheduled;
pub use scheduled::Schedule;

mod oscillator;
pub use oscillator::{OscillatorNode, Waveform};

mod constant;
pub use constant::ConstantSourceNode;

mod gain;
pub use gain::GainNode;

mod delay;
pub use delay::{DelayNode, DelayOptions, MAX_DELAY_TIME};

mod merger;
pub use merger::ChannelMergerNode;

mod splitter;
pub use splitter::ChannelSplitterNode;

mod handles;
pub use handles::DspHandle;
