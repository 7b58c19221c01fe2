//! Ring buffer sink - hands the mix to another thread

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use crate::node::{AudioNode, ProcessContext};

/// Pushes the mix into an rtrb ring buffer as interleaved samples.
///
/// Used for headless rendering and for tests: whoever owns the consumer reads
/// exactly what a device would have played. A block that doesn't fit whole is
/// dropped and counted.
pub struct RtrbSink {
    producer: Producer<f32>,
    channels: usize,
    dropped_blocks: u64,
}

impl RtrbSink {
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            dropped_blocks: 0,
        }
    }

    pub fn mono(producer: Producer<f32>) -> Self {
        Self::new(producer, 1)
    }

    pub fn stereo(producer: Producer<f32>) -> Self {
        Self::new(producer, 2)
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Blocks thrown away because the consumer fell behind.
    #[inline]
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks
    }
}

impl AudioNode for RtrbSink {
    type Message = ();

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = ()>,
        inputs: &[Input],
        _outputs: &mut [Buffer],
    ) {
        let Some(buffers) = inputs.first().map(|i| i.buffers()).filter(|b| !b.is_empty()) else {
            return;
        };

        let frames = buffers[0].len();
        let channels = self.channels;
        let Ok(chunk) = self.producer.write_chunk_uninit(frames * channels) else {
            self.dropped_blocks += 1;
            return;
        };

        let interleaved = (0..frames).flat_map(|i| {
            (0..channels).map(move |ch| buffers[ch.min(buffers.len() - 1)][i])
        });
        chunk.fill_from_iter(interleaved);
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 0 }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rtrb::RingBuffer;

    use super::*;
    use crate::decode::DecodedClip;
    use crate::graph::AudioGraph;
    use crate::node::BLOCK_SIZE;
    use crate::nodes::LoopPlayer;

    #[test]
    fn interleaves_and_drops_blocks_that_dont_fit() {
        let (producer, mut consumer) = RingBuffer::new(BLOCK_SIZE * 2 + 1);
        let mut graph = AudioGraph::new(48_000);
        let source = graph
            .add(LoopPlayer::new(Arc::new(DecodedClip {
                samples: vec![0.5; BLOCK_SIZE],
                channels: 1,
                sample_rate: 48_000,
            })))
            .id();
        let sink = graph.add(RtrbSink::stereo(producer)).id();
        graph.connect(source, sink);
        graph.set_terminal(sink);

        graph.process();
        graph.process();

        // the second block found one free slot and was skipped whole
        assert_eq!(consumer.slots(), BLOCK_SIZE * 2);
        // mono input lands on both channels
        assert!((0..BLOCK_SIZE * 2).all(|_| consumer.pop() == Ok(0.5)));
    }

    #[test]
    fn unconnected_sink_writes_nothing() {
        let (producer, consumer) = RingBuffer::<f32>::new(BLOCK_SIZE * 2);
        let mut graph = AudioGraph::new(48_000);
        let sink = graph.add(RtrbSink::stereo(producer)).id();
        graph.set_terminal(sink);

        graph.process();

        assert_eq!(consumer.slots(), 0);
    }
}
