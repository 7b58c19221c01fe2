//! Per-source gain with scheduled ramps

use dasp_graph::{Buffer, Input};

use crate::node::{AudioNode, ProcessContext};

/// Messages to control a [`RampedGain`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GainMessage {
    /// Stop any ramp in progress, holding the current value
    CancelScheduled,
    /// Jump to a value right away
    SetValue(f32),
    /// Approach `target` exponentially with the given time constant (seconds)
    SetTarget { target: f32, time_constant: f32 },
}

/// A gain stage whose level follows one-pole ramps.
///
/// Ramps run per sample on the audio side, so the control side only ever
/// states where the gain should head. Messages within a block apply in order;
/// the last one wins.
pub struct RampedGain {
    // f64 so slow ramps don't stall a few ulps short of the target
    current: f64,
    target: f64,
    /// 0.0 = jump, closer to 1.0 = slower approach
    coeff: f64,
}

impl RampedGain {
    /// Create a gain stage resting at `value`
    pub fn new(value: f32) -> Self {
        Self {
            current: value as f64,
            target: value as f64,
            coeff: 0.0,
        }
    }

    /// A gain stage that starts muted
    pub fn silent() -> Self {
        Self::new(0.0)
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current as f32
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target as f32
    }

    fn handle(&mut self, ctx: &ProcessContext, msg: GainMessage) {
        match msg {
            GainMessage::CancelScheduled => {
                self.target = self.current;
            }
            GainMessage::SetValue(v) => {
                self.current = v as f64;
                self.target = v as f64;
            }
            GainMessage::SetTarget { target, time_constant } => {
                self.target = target as f64;
                self.coeff = ctx.smoothing_coeff(time_constant);
            }
        }
    }
}

impl AudioNode for RampedGain {
    type Message = GainMessage;

    fn process(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = GainMessage>,
        inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        for msg in messages {
            self.handle(ctx, msg);
        }

        let in_buffers = inputs.first().map(|i| i.buffers()).unwrap_or(&[]);

        let target = self.target;
        let coeff = self.coeff;
        let start = self.current;
        let mut end = start;

        for (ch, out_buffer) in outputs.iter_mut().enumerate() {
            let in_buffer = match in_buffers.get(ch).or_else(|| in_buffers.last()) {
                Some(b) => b,
                None => {
                    // nothing plugged in yet, the ramp still advances
                    out_buffer.iter_mut().for_each(|s| *s = 0.0);
                    let mut gain = start;
                    for _ in 0..out_buffer.len() {
                        gain = target + coeff * (gain - target);
                    }
                    end = gain;
                    continue;
                }
            };

            // every channel walks the same ramp
            let mut gain = start;
            for (out_sample, &in_sample) in out_buffer.iter_mut().zip(in_buffer.iter()) {
                gain = target + coeff * (gain - target);
                *out_sample = in_sample * gain as f32;
            }
            end = gain;
        }

        // settle once the gap is inaudible
        if (end - target).abs() < 1e-6 {
            end = target;
        }
        self.current = end;
    }

    #[inline]
    fn num_inputs(&self) -> usize { 1 }

    #[inline]
    fn num_outputs(&self) -> usize { 2 }
}
