//! The mixing engine.
//!
//! Every listener update recomputes every source from scratch: distance,
//! volume, gain ramp (once audio runs), circle styling and the overall
//! audibility verdict. Nothing is carried over between updates except the
//! listener's latest position, so the same position always yields the same
//! [`MixResult`].

use core::fmt;

use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use crate::attenuation::clamp_volume;
use crate::backend::AudioBackend;
use crate::config::LoadMode;
use crate::error::{Error, Result};
use crate::geo::LatLng;
use crate::payload::load_payload;
use crate::ramp;
use crate::registry::{RuntimeTable, SourceIndex, SourceRegistry, SourceRuntime};

/// Volumes above this count as audible.
pub const AUDIBLE_THRESHOLD: f64 = 0.02;

/// Lifecycle of a session's audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnginePhase {
    /// Sources not loaded yet; no engine exists.
    Uninitialized,
    /// Sources loaded; updates restyle the map but nothing plays.
    Ready,
    /// Every source is looping and follows the listener.
    Active,
}

/// Where the listener's position came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provenance {
    Gps,
    Simulated,
    /// A simulated position while tracking is live.
    SimulatedOverride,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provenance::Gps => "GPS",
            Provenance::Simulated => "SIM",
            Provenance::SimulatedOverride => "SIM (override)",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ListenerState {
    pub position: LatLng,
    pub provenance: Provenance,
}

/// How many sources can be heard at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    None,
    Single,
    Overlap,
}

impl Classification {
    pub fn from_audible_count(count: usize) -> Self {
        match count {
            0 => Classification::None,
            1 => Classification::Single,
            _ => Classification::Overlap,
        }
    }

    /// The verdict line shown under the per-source lines.
    pub fn status_line(self) -> &'static str {
        match self {
            Classification::Overlap => "✅ OVERLAP AREA: you are hearing multiple sources at once",
            Classification::Single => "ℹ️ You are hearing 1 source",
            Classification::None => "🔇 No source audible here",
        }
    }
}

/// Circle styling for a source at a given volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleStyle {
    pub fill_opacity: f64,
    pub stroke_opacity: f64,
}

impl CircleStyle {
    pub fn for_volume(volume: f64) -> Self {
        let v = clamp_volume(volume);
        Self {
            fill_opacity: 0.04 + 0.30 * v,
            stroke_opacity: 0.45 + 0.45 * v,
        }
    }
}

/// One source's share of an update.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMix {
    pub index: SourceIndex,
    pub id: String,
    pub label: String,
    pub icon: String,
    /// Meters; infinite when the position is unusable.
    pub distance: f64,
    pub volume: f64,
    pub audible: bool,
    pub style: CircleStyle,
}

/// Outcome of one update pass.
#[derive(Clone, Debug, PartialEq)]
pub struct MixResult {
    pub sources: Vec<SourceMix>,
    pub audible_count: usize,
    pub classification: Classification,
    pub listener: ListenerState,
    pub mode: LoadMode,
}

impl fmt::Display for MixResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] (mode={})", self.listener.provenance, self.mode)?;
        let lines = self.sources.iter().format_with("\n", |s, f| {
            f(&format_args!(
                "{} {}: d={}m vol={:.2}",
                s.icon,
                s.label,
                WholeMeters(s.distance),
                s.volume
            ))
        });
        writeln!(f, "{lines}")?;
        writeln!(f)?;
        f.write_str(self.classification.status_line())
    }
}

/// Rounds to whole meters; an unreachable source reads `Infinity`.
struct WholeMeters(f64);

impl fmt::Display for WholeMeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_infinite() {
            f.write_str(if self.0 > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            write!(f, "{:.0}", self.0)
        }
    }
}

/// Owns the registry and, once started, the per-source playback handles.
pub struct MixingEngine<B: AudioBackend> {
    registry: SourceRegistry,
    runtime: Option<RuntimeTable<B>>,
    listener: Option<ListenerState>,
}

impl<B: AudioBackend> MixingEngine<B> {
    pub fn new(registry: SourceRegistry) -> Self {
        info!(sources = registry.len(), mode = %registry.mode(), "mixing engine ready");
        Self {
            registry,
            runtime: None,
            listener: None,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        if self.runtime.is_some() {
            EnginePhase::Active
        } else {
            EnginePhase::Ready
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The last position passed to [`update`](Self::update).
    pub fn listener(&self) -> Option<ListenerState> {
        self.listener
    }

    /// Recompute everything for a new listener position.
    pub fn update(&mut self, position: LatLng, provenance: Provenance) -> MixResult {
        let listener = ListenerState { position, provenance };
        self.listener = Some(listener);

        let mut sources = Vec::with_capacity(self.registry.len());
        for (index, source) in self.registry.iter() {
            let distance = position.distance_to(&source.position());
            let volume = source.falloff().volume_at(distance);

            if let Some(runtime) = self.runtime.as_mut().and_then(|r| r.get_mut(index)) {
                ramp::apply(&mut runtime.gain, volume);
            }

            sources.push(SourceMix {
                index,
                id: source.id.clone(),
                label: source.label.clone(),
                icon: source.icon.clone(),
                distance,
                volume,
                audible: volume > AUDIBLE_THRESHOLD,
                style: CircleStyle::for_volume(volume),
            });
        }

        let audible_count = sources.iter().filter(|s| s.audible).count();
        let classification = Classification::from_audible_count(audible_count);
        debug!(%position, %provenance, audible = audible_count, ?classification, "mix updated");

        MixResult {
            sources,
            audible_count,
            classification,
            listener,
            mode: self.registry.mode(),
        }
    }

    /// Re-run the last update, if there was one.
    pub fn refresh(&mut self) -> Option<MixResult> {
        let ListenerState { position, provenance } = self.listener?;
        Some(self.update(position, provenance))
    }

    /// Bring every source up, in order, looping silently.
    ///
    /// All or nothing: if any source fails, whatever was set up for the
    /// sources before it is released and the engine stays [`EnginePhase::Ready`].
    #[instrument(skip_all, fields(sources = self.registry.len()))]
    pub async fn start(&mut self, backend: &mut B) -> Result<()> {
        if self.runtime.is_some() {
            return Err(Error::AlreadyActive);
        }

        let mut table = RuntimeTable::with_capacity(self.registry.len());
        for (index, source) in self.registry.iter() {
            match start_source(backend, &self.registry, index).await {
                Ok(runtime) => {
                    table.push(runtime);
                }
                Err(cause) => {
                    warn!(source = %source.id, error = %cause, "start aborted, releasing {} sources", table.len());
                    table.release_all(backend);
                    return Err(Error::StartAborted {
                        label: source.label.clone(),
                        cause: Box::new(cause),
                    });
                }
            }
        }

        info!("audio started");
        self.runtime = Some(table);
        Ok(())
    }

    /// Stop everything and hand the playback handles back to `backend`.
    pub fn shutdown(mut self, backend: &mut B) {
        if let Some(table) = self.runtime.take() {
            table.release_all(backend);
            info!("audio stopped");
        }
    }
}

async fn start_source<B: AudioBackend>(
    backend: &mut B,
    registry: &SourceRegistry,
    index: SourceIndex,
) -> Result<SourceRuntime<B>> {
    let Some(source) = registry.get(index) else {
        return Err(Error::Config(format!("no source at index {}", index.get())));
    };

    let gain = backend.create_gain()?;
    let playback = async {
        let bytes = load_payload(&source.audio, registry.base_dir()).await?;
        let clip = backend.decode(bytes)?;
        backend.play_looped(clip, &gain)
    }
    .await;

    match playback {
        Ok(playback) => {
            debug!(source = %source.id, "source looping");
            Ok(SourceRuntime { gain, playback })
        }
        Err(e) => {
            backend.release(gain, None);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_counts() {
        assert_eq!(Classification::from_audible_count(0), Classification::None);
        assert_eq!(Classification::from_audible_count(1), Classification::Single);
        assert_eq!(Classification::from_audible_count(2), Classification::Overlap);
        assert_eq!(Classification::from_audible_count(9), Classification::Overlap);
    }

    #[test]
    fn circle_style_range() {
        assert_eq!(
            CircleStyle::for_volume(0.0),
            CircleStyle { fill_opacity: 0.04, stroke_opacity: 0.45 }
        );
        let full = CircleStyle::for_volume(1.0);
        assert!((full.fill_opacity - 0.34).abs() < 1e-12);
        assert!((full.stroke_opacity - 0.90).abs() < 1e-12);
        assert_eq!(CircleStyle::for_volume(f64::NAN), CircleStyle::for_volume(0.0));
    }

    #[test]
    fn provenance_labels() {
        assert_eq!(Provenance::Gps.to_string(), "GPS");
        assert_eq!(Provenance::Simulated.to_string(), "SIM");
        assert_eq!(Provenance::SimulatedOverride.to_string(), "SIM (override)");
    }
}
