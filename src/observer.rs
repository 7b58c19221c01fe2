//! Presentation collaborators.
//!
//! The engine computes; rendering is somebody else's job. A session pushes
//! every [`MixResult`] through a [`MapView`] (marker and circles) and a
//! [`StatusSink`] (text).

use tracing::info;

use crate::engine::{CircleStyle, MixResult};
use crate::geo::LatLng;

/// The map the sources are drawn on.
pub trait MapView {
    /// Move the listener marker.
    fn move_listener(&mut self, position: LatLng);

    /// Restyle the circle drawn around a source.
    fn set_source_style(&mut self, source_id: &str, style: CircleStyle);
}

/// Where status text goes.
pub trait StatusSink {
    /// A full report after an update.
    fn report(&mut self, result: &MixResult);

    /// A one-off message (startup progress, failures).
    fn notice(&mut self, text: &str);

    /// Whether the start control should accept presses.
    fn set_start_enabled(&mut self, _enabled: bool) {}
}

/// Push one update's result to both collaborators.
pub fn render(result: &MixResult, map: &mut impl MapView, status: &mut impl StatusSink) {
    map.move_listener(result.listener.position);
    for source in &result.sources {
        map.set_source_style(&source.id, source.style);
    }
    status.report(result);
}

/// Writes status text to the log; for headless runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn report(&mut self, result: &MixResult) {
        info!(
            audible = result.audible_count,
            classification = ?result.classification,
            "\n{result}"
        );
    }

    fn notice(&mut self, text: &str) {
        info!("{text}");
    }
}

/// A map that isn't drawn anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMap;

impl MapView for NoMap {
    fn move_listener(&mut self, _position: LatLng) {}

    fn set_source_style(&mut self, _source_id: &str, _style: CircleStyle) {}
}
