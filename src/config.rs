//! Source configuration: schema, payload references and loading strategy.
//!
//! A source list is JSON, either a bare array or wrapped as
//! `{"sources": [...]}`:
//!
//! ```json
//! {
//!   "sources": [{
//!     "id": "fountain", "label": "Fountain", "icon": "💧",
//!     "lat": 48.8566, "lng": 2.3522,
//!     "minDistance": 40, "maxDistance": 300, "falloffExponent": 1.8,
//!     "fillColor": "#38bdf8",
//!     "audio": "audio/fountain.wav"
//!   }]
//! }
//! ```
//!
//! `audio` is either a path (relative to the list file) or a base64 `data:`
//! URI. Numeric fields are parsed leniently: numbers and numeric strings are
//! accepted, anything else counts as missing and falls back the same way the
//! attenuation model falls back for non-finite input.

use core::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::attenuation::Falloff;
use crate::error::{Error, Result};
use crate::geo::LatLng;
use crate::registry::SourceRegistry;

/// The dataset compiled into the crate.
pub static EMBEDDED_SOURCES: &str = include_str!("../assets/embedded_sources.json");

/// Where a source's audio comes from.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AudioPayload {
    /// A file path, resolved against the directory the list was loaded from.
    Path(String),
    /// An inline `data:` URI.
    Inline(String),
}

impl From<String> for AudioPayload {
    fn from(s: String) -> Self {
        if s.trim_start().starts_with("data:") {
            AudioPayload::Inline(s)
        } else {
            AudioPayload::Path(s)
        }
    }
}

impl fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioPayload::Path(p) => f.debug_tuple("Path").field(p).finish(),
            // inline clips run to kilobytes
            AudioPayload::Inline(uri) => write!(f, "Inline({} bytes)", uri.len()),
        }
    }
}

/// Immutable description of one emitter.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSourceConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub icon: String,
    /// NaN when missing or unreadable; such a source is never audible.
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lat: f64,
    #[serde(default = "missing_coordinate", deserialize_with = "lenient_coordinate")]
    pub lng: f64,
    #[serde(default, alias = "minD", deserialize_with = "lenient_f64")]
    pub min_distance: Option<f64>,
    #[serde(default, alias = "maxD", deserialize_with = "lenient_f64")]
    pub max_distance: Option<f64>,
    #[serde(default, alias = "exponent", deserialize_with = "lenient_f64")]
    pub falloff_exponent: Option<f64>,
    #[serde(default = "default_fill")]
    pub fill_color: String,
    #[serde(alias = "audioUri")]
    pub audio: AudioPayload,
}

fn default_fill() -> String {
    "#3388ff".to_string()
}

impl AudioSourceConfig {
    #[inline]
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn falloff(&self) -> Falloff {
        Falloff::from_config(self.min_distance, self.max_distance, self.falloff_exponent)
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> core::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite()))
}

fn lenient_coordinate<'de, D>(deserializer: D) -> core::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.unwrap_or_else(missing_coordinate))
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

/// Parse a JSON source list.
pub fn parse_sources(json: &str) -> Result<Vec<AudioSourceConfig>> {
    let list = match serde_json::from_str::<Value>(json)? {
        Value::Object(mut wrapper) => wrapper
            .remove("sources")
            .ok_or_else(|| Error::Config("expected a `sources` array".into()))?,
        bare => bare,
    };
    Ok(serde_json::from_value(list)?)
}

/// How the source list is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Read the list from `path`; on any failure use the embedded dataset.
    FetchWithFallback { path: PathBuf },
    /// Always use the embedded dataset.
    EmbeddedOnly,
}

/// Which dataset the session ended up with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadMode {
    Fetched,
    Embedded,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Fetched => f.write_str("fetch"),
            LoadMode::Embedded => f.write_str("embedded"),
        }
    }
}

/// Outcome of [`load_sources`].
#[derive(Debug)]
pub struct LoadedSources {
    pub registry: SourceRegistry,
    /// Set when the preferred dataset couldn't be used.
    pub degraded: Option<String>,
}

/// Resolve the session's source list. Runs once, before the engine exists.
pub async fn load_sources(strategy: &LoadStrategy) -> Result<LoadedSources> {
    match strategy {
        LoadStrategy::EmbeddedOnly => Ok(LoadedSources {
            registry: embedded_registry()?,
            degraded: None,
        }),
        LoadStrategy::FetchWithFallback { path } => match fetch_registry(path).await {
            Ok(registry) => {
                info!(path = %path.display(), sources = registry.len(), "loaded source list");
                Ok(LoadedSources {
                    registry,
                    degraded: None,
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "falling back to embedded sources");
                Ok(LoadedSources {
                    registry: embedded_registry()?,
                    degraded: Some(format!("Using embedded sources ({e})")),
                })
            }
        },
    }
}

async fn fetch_registry(path: &Path) -> Result<SourceRegistry> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let sources = parse_sources(&json)?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    SourceRegistry::new(sources, LoadMode::Fetched, base_dir)
}

/// The compiled-in dataset as a registry.
pub fn embedded_registry() -> Result<SourceRegistry> {
    let sources = parse_sources(EMBEDDED_SOURCES)?;
    SourceRegistry::new(sources, LoadMode::Embedded, PathBuf::new())
}
