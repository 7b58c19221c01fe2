//! Geographic coordinates and great-circle distance.

use core::fmt;

/// Mean earth radius in meters, the same sphere web map libraries measure on.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Haversine distance to `other` in meters.
    ///
    /// Returns `f64::INFINITY` if either coordinate is non-finite, so a broken
    /// fix reads as "infinitely far away" rather than poisoning the mix.
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        if !self.is_finite() || !other.is_finite() {
            return f64::INFINITY;
        }

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();

        let sin_lat = (d_lat / 2.0).sin();
        let sin_lng = (d_lng / 2.0).sin();
        let a = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        let d = EARTH_RADIUS_M * c;
        if d.is_finite() { d } else { f64::INFINITY }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}
