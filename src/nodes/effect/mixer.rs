//! Mixer effect - sums every source into one bus

use dasp_graph::{Buffer, Input};

use crate::node::{AudioNode, ProcessContext};

/// Sums all inputs with equal weight.
///
/// Overlapping sources simply add; each has already been scaled by its own
/// gain stage. Mono inputs are spread to every output channel, inputs with
/// more channels than the mixer have the extras dropped.
pub struct Mixer {
    channels: usize,
}

impl Mixer {
    pub fn new(channels: usize) -> Self {
        Self { channels: channels.clamp(1, 2) }
    }

    pub fn stereo() -> Self {
        Self::new(2)
    }

    pub fn mono() -> Self {
        Self::new(1)
    }
}

impl AudioNode for Mixer {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        output: &mut [Buffer],
    ) {
        for buf in output.iter_mut() {
            buf.iter_mut().for_each(|s| *s = 0.0);
        }

        for input in inputs {
            let in_buffers = input.buffers();
            if in_buffers.is_empty() {
                continue;
            }

            for (out_ch, out_buf) in output.iter_mut().enumerate() {
                let in_buf = &in_buffers[out_ch.min(in_buffers.len() - 1)];
                for (out_sample, in_sample) in out_buf.iter_mut().zip(in_buf.iter()) {
                    *out_sample += *in_sample;
                }
            }
        }
    }

    fn num_inputs(&self) -> usize {
        usize::MAX
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}
