//! Looping clip player

use std::sync::Arc;

use dasp_graph::{Buffer, Input};

use crate::decode::DecodedClip;
use crate::node::{AudioNode, ProcessContext};

/// Messages to control a [`LoopPlayer`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerMessage {
    /// Stop for good; the player outputs silence from here on
    Stop,
}

/// Plays a decoded clip in an endless loop.
///
/// Clips keep their own sample rate; the player steps through them at
/// `clip_rate / graph_rate` frames per output sample and interpolates
/// linearly between neighbouring frames, wrapping at the loop point.
/// Clip data is shared, so several players can loop the same clip.
pub struct LoopPlayer {
    clip: Arc<DecodedClip>,
    /// Fractional frame position
    position: f64,
    playing: bool,
}

impl LoopPlayer {
    pub fn new(clip: Arc<DecodedClip>) -> Self {
        Self {
            clip,
            position: 0.0,
            playing: true,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.clip.channels
    }

    #[inline]
    fn frame_sample(&self, frame: usize, ch: usize) -> f32 {
        let channels = self.clip.channels;
        self.clip.samples[frame * channels + ch.min(channels - 1)]
    }
}

impl AudioNode for LoopPlayer {
    type Message = PlayerMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = PlayerMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            match msg {
                PlayerMessage::Stop => self.playing = false,
            }
        }

        let frames = self.clip.frames();
        if !self.playing || frames == 0 {
            for buffer in outputs.iter_mut() {
                buffer.iter_mut().for_each(|s| *s = 0.0);
            }
            return;
        }

        let step = self.clip.sample_rate as f64 / ctx.sample_rate.max(1) as f64;
        let len = frames as f64;
        let buffer_len = outputs.first().map(|b| b.len()).unwrap_or(0);

        for i in 0..buffer_len {
            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;
            let next = if index + 1 >= frames { 0 } else { index + 1 };

            for (ch, buffer) in outputs.iter_mut().enumerate() {
                let a = self.frame_sample(index, ch);
                let b = self.frame_sample(next, ch);
                buffer[i] = a + (b - a) * frac;
            }

            self.position += step;
            if self.position >= len {
                self.position %= len;
            }
        }
    }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.clip.channels
    }
}
