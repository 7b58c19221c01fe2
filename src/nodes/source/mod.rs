//! Audio source nodes (generators with no audio inputs)

mod player;

pub use player::{LoopPlayer, PlayerMessage};
