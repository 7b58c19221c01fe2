//! Audio output path.
//!
//! The engine only ever talks to audio through [`AudioBackend`]: it allocates
//! one gain per source, decodes the source's clip, starts it looping through
//! that gain and hands everything back if startup has to be unwound.
//! [`GraphBackend`] is the in-crate implementation on top of the node graph.

mod graph;

pub use graph::{GraphBackend, GraphGain, GraphPlayback};

use crate::error::Result;
use crate::ramp::GainParam;

/// Playback resources the engine needs per source.
pub trait AudioBackend {
    /// Per-source gain control, driven through [`crate::ramp::apply`].
    type Gain: GainParam;
    /// A decoded clip ready to be played.
    type Clip;
    /// A clip that is playing.
    type Playback;

    /// Allocate a gain stage. It starts at zero.
    fn create_gain(&mut self) -> Result<Self::Gain>;

    /// Decode a payload's bytes into a playable clip.
    fn decode(&mut self, bytes: Vec<u8>) -> Result<Self::Clip>;

    /// Start `clip` looping forever through `gain`.
    fn play_looped(&mut self, clip: Self::Clip, gain: &Self::Gain) -> Result<Self::Playback>;

    /// Stop playback (if any) and take the gain stage out of the mix.
    fn release(&mut self, gain: Self::Gain, playback: Option<Self::Playback>);

    /// Render whatever audio is due. Backends with their own clock ignore it.
    fn pump(&mut self) {}
}
