//! Session driver.
//!
//! A [`Session`] owns the engine, the audio backend and the presentation
//! collaborators, and runs one loop that takes map clicks, start requests and
//! position fixes one at a time. Position tracking runs as its own task and
//! only talks to the loop through a channel.

use core::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::AudioBackend;
use crate::config::{load_sources, LoadStrategy};
use crate::engine::{EnginePhase, MixingEngine, Provenance};
use crate::error::Result;
use crate::geo::LatLng;
use crate::observer::{render, MapView, StatusSink};

pub const NOTICE_READY: &str = "Ready. Press “Start audio”, then tap/click the map.";
pub const NOTICE_LOADING: &str = "Loading audio… (first time only)";
pub const NOTICE_GPS_WAITING: &str = "Audio started. GPS enabled: waiting for position…";
pub const NOTICE_SIMULATE: &str = "Tap/click the map to simulate your position.";
pub const NOTICE_NO_SOURCES: &str = "No sources found (both fetch and embedded failed).";

/// How often the backend is pumped by default.
pub const DEFAULT_PUMP_PERIOD: Duration = Duration::from_millis(10);

const EVENT_QUEUE_SIZE: usize = 32;
const FIX_QUEUE_SIZE: usize = 16;

/// Why a position fix couldn't be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("timeout expired")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

pub type Fix = core::result::Result<LatLng, PositionError>;

/// A stream of listener positions, e.g. from a GPS receiver.
pub trait PositionSource: Send + 'static {
    /// The next fix or failure; `None` once the source has shut down.
    fn next_fix(&mut self) -> impl Future<Output = Option<Fix>> + Send;
}

impl PositionSource for mpsc::Receiver<Fix> {
    fn next_fix(&mut self) -> impl Future<Output = Option<Fix>> + Send {
        self.recv()
    }
}

/// Input to the session loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionEvent {
    /// The map was clicked: simulate the listener there.
    MapClick(LatLng),
    /// The start control was pressed.
    Start,
    /// End the session.
    Shutdown,
}

/// Cloneable sender side of a session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Queue an event. `false` once the session has ended.
    pub async fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub async fn click(&self, position: LatLng) -> bool {
        self.send(SessionEvent::MapClick(position)).await
    }

    pub async fn start(&self) -> bool {
        self.send(SessionEvent::Start).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown).await
    }
}

/// What's left once [`Session::run`] returns.
pub struct Finished<B, M, S> {
    pub backend: B,
    pub map: M,
    pub status: S,
}

pub struct Session<B, M, S, P>
where
    B: AudioBackend,
    M: MapView,
    S: StatusSink,
    P: PositionSource,
{
    engine: Option<MixingEngine<B>>,
    backend: B,
    map: M,
    status: S,
    tracking: Option<P>,
    using_gps: bool,
    events: mpsc::Receiver<SessionEvent>,
    pump_period: Duration,
}

impl<B, M, S, P> Session<B, M, S, P>
where
    B: AudioBackend,
    M: MapView,
    S: StatusSink,
    P: PositionSource,
{
    /// A session with no sources yet. `tracking`, if given, is started
    /// together with audio.
    pub fn new(backend: B, map: M, status: S, tracking: Option<P>) -> (Self, SessionHandle) {
        let (tx, events) = mpsc::channel(EVENT_QUEUE_SIZE);
        let session = Self {
            engine: None,
            backend,
            map,
            status,
            tracking,
            using_gps: false,
            events,
            pump_period: DEFAULT_PUMP_PERIOD,
        };
        (session, SessionHandle { tx })
    }

    pub fn with_pump_period(mut self, period: Duration) -> Self {
        self.pump_period = period;
        self
    }

    pub fn phase(&self) -> EnginePhase {
        self.engine
            .as_ref()
            .map_or(EnginePhase::Uninitialized, MixingEngine::phase)
    }

    pub fn engine(&self) -> Option<&MixingEngine<B>> {
        self.engine.as_ref()
    }

    pub fn using_gps(&self) -> bool {
        self.using_gps
    }

    /// Resolve the source list and build the engine.
    pub async fn load(&mut self, strategy: &LoadStrategy) -> Result<()> {
        let loaded = match load_sources(strategy).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "no usable source list");
                self.status.notice(NOTICE_NO_SOURCES);
                return Err(e);
            }
        };

        if let Some(reason) = &loaded.degraded {
            self.status.notice(reason);
        }
        self.engine = Some(MixingEngine::new(loaded.registry));
        self.status.set_start_enabled(true);
        self.status.notice(NOTICE_READY);
        Ok(())
    }

    /// Process events until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> Finished<B, M, S> {
        let mut pump = tokio::time::interval(self.pump_period);
        pump.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut fixes: Option<mpsc::Receiver<Fix>> = None;
        let mut tracker: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(SessionEvent::MapClick(position)) => self.on_click(position),
                    Some(SessionEvent::Start) => {
                        if self.on_start().await {
                            if let Some(source) = self.tracking.take() {
                                let (tx, rx) = mpsc::channel(FIX_QUEUE_SIZE);
                                tracker = Some(tokio::spawn(track(source, tx)));
                                fixes = Some(rx);
                            }
                        }
                    }
                    Some(SessionEvent::Shutdown) | None => break,
                },
                fix = next_fix(&mut fixes) => match fix {
                    Some(fix) => self.on_fix(fix),
                    None => {
                        debug!("position source ended");
                        fixes = None;
                    }
                },
                _ = pump.tick() => self.backend.pump(),
            }
        }

        if let Some(tracker) = tracker {
            tracker.abort();
        }
        if let Some(engine) = self.engine.take() {
            engine.shutdown(&mut self.backend);
        }
        info!("session ended");

        Finished {
            backend: self.backend,
            map: self.map,
            status: self.status,
        }
    }

    fn on_click(&mut self, position: LatLng) {
        let provenance = if self.using_gps {
            Provenance::SimulatedOverride
        } else {
            Provenance::Simulated
        };
        self.update(position, provenance);
    }

    fn on_fix(&mut self, fix: Fix) {
        match fix {
            Ok(position) => self.update(position, Provenance::Gps),
            Err(e) => {
                warn!(error = %e, "position tracking failed, falling back to simulation");
                self.using_gps = false;
                self.status.notice(&format!(
                    "GPS not available / permission denied. Tap/click map to simulate position. ({e})"
                ));
            }
        }
    }

    fn update(&mut self, position: LatLng, provenance: Provenance) {
        let Some(engine) = self.engine.as_mut() else {
            debug!(%position, "no sources loaded, ignoring position");
            return;
        };
        let result = engine.update(position, provenance);
        render(&result, &mut self.map, &mut self.status);
    }

    /// Returns whether audio came up.
    async fn on_start(&mut self) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            debug!("start requested before sources loaded");
            return false;
        };
        if engine.phase() == EnginePhase::Active {
            debug!("start requested while already active");
            return false;
        }

        self.status.set_start_enabled(false);
        self.status.notice(NOTICE_LOADING);

        if let Err(e) = engine.start(&mut self.backend).await {
            warn!(error = %e, "start failed");
            self.status.notice(&format!("Start audio failed:\n{e}"));
            self.status.set_start_enabled(true);
            return false;
        }

        if let Some(result) = engine.refresh() {
            render(&result, &mut self.map, &mut self.status);
        }

        if self.tracking.is_some() {
            self.using_gps = true;
            self.status.notice(NOTICE_GPS_WAITING);
        } else {
            self.using_gps = false;
            self.status.notice(NOTICE_SIMULATE);
        }
        true
    }
}

async fn next_fix(fixes: &mut Option<mpsc::Receiver<Fix>>) -> Option<Fix> {
    match fixes {
        Some(rx) => rx.recv().await,
        None => core::future::pending().await,
    }
}

async fn track<P: PositionSource>(mut source: P, tx: mpsc::Sender<Fix>) {
    while let Some(fix) = source.next_fix().await {
        if tx.send(fix).await.is_err() {
            break;
        }
    }
}
