//! Click-free gain control.
//!
//! Position updates arrive at whatever rate the listener moves, but gain must
//! change smoothly or every update becomes an audible click. [`apply`] turns a
//! target volume into a ramp on a [`GainParam`]: an exponential approach toward
//! the target, or an immediate cut to zero when the target is effectively
//! silent. Each call replaces whatever ramp was still in flight.

use crate::attenuation::clamp_volume;

/// Targets at or below this are cut to zero instead of ramped.
///
/// An exponential approach never quite reaches zero; without the cut a fast
/// move out of range would leave a faint tail playing.
pub const GAIN_SNAP_THRESHOLD: f64 = 0.001;

/// Time constant of the exponential approach, in seconds.
pub const RAMP_TIME_CONSTANT: f64 = 0.12;

/// A gain parameter that can be scheduled the way an audio backend schedules it.
pub trait GainParam {
    /// Drop any ramp still in progress, holding the current value.
    fn cancel_scheduled(&mut self);

    /// Jump to `value` right away.
    fn set_immediately(&mut self, value: f32);

    /// Move exponentially from the current value toward `target`.
    ///
    /// After `time_constant` seconds about 63% of the distance is covered.
    fn approach(&mut self, target: f32, time_constant: f32);
}

impl<G: GainParam + ?Sized> GainParam for &mut G {
    fn cancel_scheduled(&mut self) {
        (**self).cancel_scheduled()
    }

    fn set_immediately(&mut self, value: f32) {
        (**self).set_immediately(value)
    }

    fn approach(&mut self, target: f32, time_constant: f32) {
        (**self).approach(target, time_constant)
    }
}

/// Drive `gain` toward `target` volume.
pub fn apply<G: GainParam + ?Sized>(gain: &mut G, target: f64) {
    let target = clamp_volume(target);

    gain.cancel_scheduled();
    if target <= GAIN_SNAP_THRESHOLD {
        gain.set_immediately(0.0);
        return;
    }
    gain.approach(target as f32, RAMP_TIME_CONSTANT as f32);
}
