//! Core node trait and context types.

use dasp_graph::{Buffer, Input};

/// Samples per processing block (fixed by `dasp_graph`).
pub const BLOCK_SIZE: usize = Buffer::LEN;

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per buffer, always [`BLOCK_SIZE`]
    pub buffer_size: usize,
}

impl ProcessContext {
    /// Per-sample coefficient of a one-pole smoother with the given time constant.
    ///
    /// After `seconds`, a smoother using this coefficient has covered ~63% of
    /// the way to its target. Zero or negative time constants mean "jump".
    #[inline]
    pub fn smoothing_coeff(&self, seconds: f32) -> f64 {
        let samples = seconds as f64 * self.sample_rate as f64;
        if samples > 0.0 && samples.is_finite() {
            (-1.0 / samples).exp()
        } else {
            0.0
        }
    }
}

/// Unique identifier for a node within a graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

/// The core trait for audio processing nodes.
///
/// Nodes are one of:
/// - **Sources**: generate audio (0 inputs) - the looping clip player
/// - **Effects**: process audio - per-source gain, the mixer
/// - **Sinks**: consume audio (0 outputs) - device output, ring buffers
///
/// # Message-Based Parameters
///
/// Nodes live on the audio side of the graph and never share mutable state
/// with the control side. Parameter changes arrive as messages, drained at the
/// start of each block:
///
/// ```
/// use klangort::{AudioNode, ProcessContext};
/// use dasp_graph::{Buffer, Input};
///
/// enum TrimMessage {
///     SetLevel(f32),
/// }
///
/// struct Trim {
///     level: f32,
/// }
///
/// impl AudioNode for Trim {
///     type Message = TrimMessage;
///
///     fn process(
///         &mut self,
///         _ctx: &ProcessContext,
///         messages: impl Iterator<Item = TrimMessage>,
///         inputs: &[Input],
///         outputs: &mut [Buffer],
///     ) {
///         for msg in messages {
///             match msg {
///                 TrimMessage::SetLevel(l) => self.level = l,
///             }
///         }
///
///         let Some(input) = inputs.first() else { return };
///         for (out, inp) in outputs.iter_mut().zip(input.buffers()) {
///             for (o, i) in out.iter_mut().zip(inp.iter()) {
///                 *o = *i * self.level;
///             }
///         }
///     }
///
///     fn num_inputs(&self) -> usize { 1 }
/// }
/// ```
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates (`()` if there are none).
    type Message: Send + 'static;

    /// Process one block of audio.
    ///
    /// 1. Drain and handle all pending messages
    /// 2. Read from `inputs` (if any)
    /// 3. Write to `outputs`
    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    );

    /// Number of audio input channels (0 for sources).
    fn num_inputs(&self) -> usize { 0 }

    /// Number of audio output channels.
    fn num_outputs(&self) -> usize { 1 }
}
