//! Built-in audio nodes
//!
//! Every source in a running session is one chain through these:
//! `LoopPlayer -> RampedGain -> Mixer -> sink`.
//! - `source`: looping clip playback
//! - `effect`: per-source gain ramps and the summing mixer
//! - `sink`: device output or a ring buffer for headless use

pub mod effect;
pub mod sink;
pub mod source;

pub use effect::{GainMessage, Mixer, RampedGain};
pub use sink::RtrbSink;
pub use source::{LoopPlayer, PlayerMessage};

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
