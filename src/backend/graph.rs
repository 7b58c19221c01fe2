//! Graph backend - renders every source through the node graph
//!
//! Each started source becomes `LoopPlayer -> RampedGain -> Mixer`, and the
//! mixer feeds a single output sink. Gain and player handles keep the send
//! side of their node's message queue, so the control side never touches
//! audio state directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rtrb::Producer;
use tracing::{debug, trace, warn};

use crate::backend::AudioBackend;
use crate::decode::{decode_clip, DecodedClip};
use crate::error::Result;
use crate::graph::AudioGraph;
use crate::node::{AudioNode, NodeId, BLOCK_SIZE};
use crate::nodes::{GainMessage, LoopPlayer, Mixer, PlayerMessage, RampedGain};
use crate::ramp::GainParam;

#[cfg(feature = "cpal_sink")]
use crate::device::CpalDevice;
#[cfg(feature = "cpal_sink")]
use crate::error::Error;

/// How far ahead of the wall clock [`GraphBackend::pump`] renders.
const PUMP_LOOKAHEAD: Duration = Duration::from_millis(50);

/// Falling further behind than this skips ahead instead of catching up.
const MAX_CATCH_UP: Duration = Duration::from_millis(500);

/// Control handle for one source's gain stage
pub struct GraphGain {
    id: NodeId,
    sender: Producer<GainMessage>,
}

impl GraphGain {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn send(&mut self, msg: GainMessage) {
        if let Err(rtrb::PushError::Full(msg)) = self.sender.push(msg) {
            warn!(node = ?self.id, ?msg, "gain queue full, dropping message");
        }
    }
}

impl GainParam for GraphGain {
    fn cancel_scheduled(&mut self) {
        self.send(GainMessage::CancelScheduled);
    }

    fn set_immediately(&mut self, value: f32) {
        self.send(GainMessage::SetValue(value));
    }

    fn approach(&mut self, target: f32, time_constant: f32) {
        self.send(GainMessage::SetTarget { target, time_constant });
    }
}

/// A looping player wired into the graph
pub struct GraphPlayback {
    id: NodeId,
    sender: Producer<PlayerMessage>,
}

impl GraphPlayback {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Silence the player while leaving it wired up.
    pub fn stop(&mut self) {
        if self.sender.push(PlayerMessage::Stop).is_err() {
            warn!(node = ?self.id, "player queue full, stop dropped");
        }
    }
}

/// [`AudioBackend`] over an [`AudioGraph`].
///
/// ```no_run
/// use klangort::backend::GraphBackend;
/// use klangort::nodes::RtrbSink;
///
/// let (producer, _consumer) = rtrb::RingBuffer::new(48_000);
/// let backend = GraphBackend::new(48_000).with_output(RtrbSink::stereo(producer));
/// ```
pub struct GraphBackend {
    graph: AudioGraph,
    mixer: NodeId,
    sink: Option<NodeId>,
    channels: usize,
    clock: Option<(Instant, u64)>,
}

impl GraphBackend {
    /// A stereo graph at `sample_rate` with nowhere to send its output yet.
    ///
    /// Use `with_output()` to attach a sink, or `default_output()` instead.
    pub fn new(sample_rate: u32) -> Self {
        let mut graph = AudioGraph::new(sample_rate);
        let mixer = graph.add(Mixer::stereo()).id();
        graph.set_terminal(mixer);

        Self {
            graph,
            mixer,
            sink: None,
            channels: 2,
            clock: None,
        }
    }

    /// Open the default cpal output device and play through it.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Result<Self> {
        let device = CpalDevice::default_output()
            .ok_or_else(|| Error::Backend("no default output device".into()))?;
        let sink = device.create_sink()?;
        Ok(Self::new(device.sample_rate()).with_output(sink))
    }

    /// Send the mix to `sink`.
    pub fn with_output<S: AudioNode<Message = ()>>(mut self, sink: S) -> Self {
        let sink = self.graph.add(sink).id();
        self.graph.connect(self.mixer, sink);
        self.graph.set_terminal(sink);
        self.sink = Some(sink);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn has_output(&self) -> bool {
        self.sink.is_some()
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    /// Nodes in the graph, counting the mixer and sink.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether `gain` is currently feeding the mixer.
    pub fn is_mixing(&self, gain: &GraphGain) -> bool {
        self.graph.is_connected(gain.id, self.mixer)
    }

    /// Render one block, regardless of the wall clock.
    pub fn process_block(&mut self) {
        self.graph.process();
    }

    /// Render `n` blocks back to back.
    pub fn process_blocks(&mut self, n: usize) {
        for _ in 0..n {
            self.graph.process();
        }
    }

    fn blocks_for(&self, elapsed: Duration) -> u64 {
        (elapsed.as_secs_f64() * self.sample_rate() as f64 / BLOCK_SIZE as f64).ceil() as u64
    }
}

impl AudioBackend for GraphBackend {
    type Gain = GraphGain;
    type Clip = Arc<DecodedClip>;
    type Playback = GraphPlayback;

    fn create_gain(&mut self) -> Result<GraphGain> {
        let handle = self.graph.add(RampedGain::silent());
        self.graph.connect(handle.id, self.mixer);
        trace!(node = ?handle.id, "gain stage added");
        Ok(GraphGain {
            id: handle.id,
            sender: handle.sender,
        })
    }

    fn decode(&mut self, bytes: Vec<u8>) -> Result<Arc<DecodedClip>> {
        decode_clip(bytes).map(Arc::new)
    }

    fn play_looped(&mut self, clip: Arc<DecodedClip>, gain: &GraphGain) -> Result<GraphPlayback> {
        if clip.sample_rate != self.sample_rate() {
            debug!(
                clip_rate = clip.sample_rate,
                output_rate = self.sample_rate(),
                "clip will be rate-converted"
            );
        }
        let handle = self.graph.add(LoopPlayer::new(clip));
        self.graph.connect(handle.id, gain.id);
        Ok(GraphPlayback {
            id: handle.id,
            sender: handle.sender,
        })
    }

    fn release(&mut self, gain: GraphGain, playback: Option<GraphPlayback>) {
        if let Some(playback) = playback {
            self.graph.remove(playback.id);
        }
        self.graph.remove(gain.id);
        trace!(node = ?gain.id, "gain stage released");
    }

    /// Render up to the wall clock plus a little lookahead.
    fn pump(&mut self) {
        let now = Instant::now();
        let (started, base) = *self
            .clock
            .get_or_insert((now, self.graph.blocks_processed()));

        let due = base + self.blocks_for(now.duration_since(started) + PUMP_LOOKAHEAD);
        let done = self.graph.blocks_processed();
        if due <= done {
            return;
        }

        let behind = due - done;
        if behind > self.blocks_for(MAX_CATCH_UP) {
            warn!(blocks = behind, "audio fell behind, skipping ahead");
            self.clock = Some((now, done));
            let catch_up = self.blocks_for(PUMP_LOOKAHEAD);
            self.process_blocks(catch_up as usize);
            return;
        }
        self.process_blocks(behind as usize);
    }
}
