//! Distance → volume attenuation.
//!
//! Every source has a full-volume core (`min_distance`), a silence boundary
//! (`max_distance`) and a falloff exponent shaping the curve in between:
//!
//! ```text
//! volume
//!   1 ┤━━━━━━━╮
//!     │        ╲
//!     │         ╲__
//!   0 ┤            ╰━━━━━━━
//!     └───────┬──────┬──── distance
//!            min    max
//! ```
//!
//! An exponent of 1.0 is linear, above 1.0 the tail drops off sooner and below
//! 1.0 it lingers.

/// Falloff exponent used when a source doesn't specify one.
pub const DEFAULT_FALLOFF_EXPONENT: f64 = 1.8;

/// Substituted for a missing or non-finite `min_distance`.
pub const MIN_DISTANCE_FALLBACK: f64 = 0.0;

/// Substituted for a missing or non-finite `max_distance`.
pub const MAX_DISTANCE_FALLBACK: f64 = 0.0;

#[inline]
fn finite_or(x: f64, fallback: f64) -> f64 {
    if x.is_finite() { x } else { fallback }
}

/// Clamp to `[0, 1]`, mapping non-finite values to silence.
#[inline]
pub fn clamp_volume(v: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// Volume in `[0, 1]` for a listener `distance` meters from a source.
///
/// Non-finite inputs are replaced before evaluation: distance by +∞ (silent),
/// `min_distance` and `max_distance` by 0, `exponent` by
/// [`DEFAULT_FALLOFF_EXPONENT`]. A source whose `max_distance` is not beyond
/// its `min_distance` is never audible.
pub fn attenuation(distance: f64, min_distance: f64, max_distance: f64, exponent: f64) -> f64 {
    let d = if distance.is_nan() { f64::INFINITY } else { distance };
    let min_d = finite_or(min_distance, MIN_DISTANCE_FALLBACK);
    let max_d = finite_or(max_distance, MAX_DISTANCE_FALLBACK);
    let exponent = finite_or(exponent, DEFAULT_FALLOFF_EXPONENT);

    if !d.is_finite() {
        return 0.0;
    }
    if max_d <= min_d {
        return 0.0;
    }
    if d <= min_d {
        return 1.0;
    }
    if d >= max_d {
        return 0.0;
    }

    let t = (d - min_d) / (max_d - min_d);
    clamp_volume((1.0 - t).powf(exponent))
}

/// The attenuation parameters of one source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Falloff {
    pub min_distance: f64,
    pub max_distance: f64,
    pub exponent: f64,
}

impl Falloff {
    pub fn new(min_distance: f64, max_distance: f64) -> Self {
        Self {
            min_distance,
            max_distance,
            exponent: DEFAULT_FALLOFF_EXPONENT,
        }
    }

    pub fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    /// Build from optional configuration values, substituting fallbacks.
    pub fn from_config(min: Option<f64>, max: Option<f64>, exponent: Option<f64>) -> Self {
        Self {
            min_distance: min.unwrap_or(MIN_DISTANCE_FALLBACK),
            max_distance: max.unwrap_or(MAX_DISTANCE_FALLBACK),
            exponent: exponent.unwrap_or(DEFAULT_FALLOFF_EXPONENT),
        }
    }

    #[inline]
    pub fn volume_at(&self, distance: f64) -> f64 {
        attenuation(distance, self.min_distance, self.max_distance, self.exponent)
    }

    /// Whether the source can ever be heard.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        let min_d = finite_or(self.min_distance, MIN_DISTANCE_FALLBACK);
        let max_d = finite_or(self.max_distance, MAX_DISTANCE_FALLBACK);
        max_d <= min_d
    }
}
