//! Klangort - proximity audio mixing
//!
//! Sound emitters sit at fixed points on a map, each audible within its own
//! radius. As a listener moves, every source's volume follows its distance,
//! overlapping sources mix, and each update reports what can be heard.
//!
//! Design principles:
//! - Distance to volume is a pure function ([`attenuation`])
//! - Gain changes are always ramped on the audio clock ([`ramp`])
//! - Configuration and playback handles live in separate tables ([`registry`])
//! - Audio runs through a node graph; nodes take parameters as messages
//! - Presentation is a pair of traits ([`observer`])
//!
//! ```no_run
//! use klangort::{GraphBackend, LoadStrategy, LogStatus, NoMap, Session, Fix, LatLng};
//! use klangort::nodes::RtrbSink;
//!
//! # async fn demo() -> klangort::Result<()> {
//! let (producer, _consumer) = rtrb::RingBuffer::new(48_000);
//! let backend = GraphBackend::new(48_000).with_output(RtrbSink::stereo(producer));
//!
//! let (mut session, handle) =
//!     Session::new(backend, NoMap, LogStatus, None::<tokio::sync::mpsc::Receiver<Fix>>);
//! session.load(&LoadStrategy::EmbeddedOnly).await?;
//!
//! let listener = async {
//!     handle.start().await;
//!     handle.click(LatLng::new(48.8566, 2.3522)).await;
//!     handle.shutdown().await;
//! };
//! let (_finished, ()) = tokio::join!(session.run(), listener);
//! # Ok(())
//! # }
//! ```

pub mod attenuation;
pub mod backend;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod geo;
pub mod nodes;
pub mod observer;
pub mod payload;
pub mod ramp;
pub mod registry;
pub mod session;

mod graph;
mod node;

#[cfg(feature = "cpal_sink")]
mod device;

pub use attenuation::{attenuation, Falloff, DEFAULT_FALLOFF_EXPONENT};
pub use backend::{AudioBackend, GraphBackend};
pub use config::{load_sources, AudioPayload, AudioSourceConfig, LoadMode, LoadStrategy};
pub use engine::{
    Classification, CircleStyle, EnginePhase, ListenerState, MixResult, MixingEngine, Provenance,
    SourceMix, AUDIBLE_THRESHOLD,
};
pub use error::{Error, Result};
pub use geo::LatLng;
pub use node::{AudioNode, NodeId, ProcessContext, BLOCK_SIZE};
pub use observer::{LogStatus, MapView, NoMap, StatusSink};
pub use ramp::GainParam;
pub use registry::{SourceIndex, SourceRegistry};
pub use session::{Fix, PositionError, PositionSource, Session, SessionEvent, SessionHandle};

#[cfg(feature = "cpal_sink")]
pub use device::CpalDevice;
