//! Audio effect nodes (processors with audio inputs and outputs)

mod gain;
mod mixer;

pub use gain::{GainMessage, RampedGain};
pub use mixer::Mixer;
