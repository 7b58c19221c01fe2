#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use klangort::config::parse_sources;
use klangort::{
    AudioBackend, CircleStyle, GainParam, LatLng, LoadMode, MapView, MixResult, SourceRegistry,
    StatusSink,
};

/// Meters per degree of latitude on the haversine sphere.
pub const METERS_PER_DEGREE: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

/// A point `meters` north (negative: south) of `origin`.
pub fn north_of(origin: LatLng, meters: f64) -> LatLng {
    LatLng::new(origin.lat + meters / METERS_PER_DEGREE, origin.lng)
}

pub fn registry(json: &str) -> SourceRegistry {
    SourceRegistry::new(parse_sources(json).unwrap(), LoadMode::Embedded, PathBuf::new()).unwrap()
}

/// A: 200m north, audible to 300m. B: 350m south, audible to 400m.
/// C: 5km away and small.
pub fn three_sources() -> SourceRegistry {
    let origin = LatLng::new(0.0, 0.0);
    let a = north_of(origin, 200.0);
    let b = north_of(origin, -350.0);
    let c = north_of(origin, 5_000.0);
    registry(&format!(
        r#"[
        {{"id": "a", "label": "A", "icon": "🅰", "lat": {}, "lng": 0,
          "minDistance": 50, "maxDistance": 300, "audio": "data:audio/wav;base64,QUFBQQ=="}},
        {{"id": "b", "label": "B", "icon": "🅱", "lat": {}, "lng": 0,
          "minDistance": 100, "maxDistance": 400, "audio": "data:audio/wav;base64,QkJCQg=="}},
        {{"id": "c", "label": "C", "icon": "©", "lat": {}, "lng": 0,
          "minDistance": 10, "maxDistance": 100, "audio": "data:audio/wav;base64,Q0NDQw=="}}
    ]"#,
        a.lat, b.lat, c.lat
    ))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GainCall {
    Cancel,
    Set(f32),
    Approach(f32, f32),
}

#[derive(Clone)]
pub struct FakeGain {
    pub id: usize,
    pub calls: Arc<Mutex<Vec<GainCall>>>,
}

impl GainParam for FakeGain {
    fn cancel_scheduled(&mut self) {
        self.calls.lock().unwrap().push(GainCall::Cancel);
    }

    fn set_immediately(&mut self, value: f32) {
        self.calls.lock().unwrap().push(GainCall::Set(value));
    }

    fn approach(&mut self, target: f32, time_constant: f32) {
        self.calls.lock().unwrap().push(GainCall::Approach(target, time_constant));
    }
}

#[derive(Debug, PartialEq)]
pub struct FakePlayback {
    pub gain: usize,
}

/// Records everything the engine asks of it.
#[derive(Default)]
pub struct FakeBackend {
    pub gains: Vec<Arc<Mutex<Vec<GainCall>>>>,
    pub decoded: Vec<Vec<u8>>,
    pub playing: Vec<usize>,
    pub released: Vec<(usize, bool)>,
    pub pumps: usize,
    /// Fail the n-th decode (0-based).
    pub fail_decode_at: Option<usize>,
}

impl FakeBackend {
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_decode_at: Some(n),
            ..Self::default()
        }
    }

    pub fn gain_calls(&self, id: usize) -> Vec<GainCall> {
        self.gains[id].lock().unwrap().clone()
    }

    pub fn clear_gain_calls(&self) {
        for gain in &self.gains {
            gain.lock().unwrap().clear();
        }
    }
}

impl AudioBackend for FakeBackend {
    type Gain = FakeGain;
    type Clip = Vec<u8>;
    type Playback = FakePlayback;

    fn create_gain(&mut self) -> klangort::Result<FakeGain> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        self.gains.push(calls.clone());
        Ok(FakeGain {
            id: self.gains.len() - 1,
            calls,
        })
    }

    fn decode(&mut self, bytes: Vec<u8>) -> klangort::Result<Vec<u8>> {
        if self.fail_decode_at == Some(self.decoded.len()) {
            return Err(klangort::Error::Decode("unsupported codec".into()));
        }
        self.decoded.push(bytes.clone());
        Ok(bytes)
    }

    fn play_looped(&mut self, _clip: Vec<u8>, gain: &FakeGain) -> klangort::Result<FakePlayback> {
        self.playing.push(gain.id);
        Ok(FakePlayback { gain: gain.id })
    }

    fn release(&mut self, gain: FakeGain, playback: Option<FakePlayback>) {
        if let Some(playback) = &playback {
            self.playing.retain(|&id| id != playback.gain);
        }
        self.released.push((gain.id, playback.is_some()));
    }

    fn pump(&mut self) {
        self.pumps += 1;
    }
}

/// Everything a session showed, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Shown {
    Report(String),
    Notice(String),
    StartEnabled(bool),
}

#[derive(Clone, Default)]
pub struct RecordingStatus {
    pub log: Arc<Mutex<Vec<Shown>>>,
}

impl RecordingStatus {
    pub fn snapshot(&self) -> Vec<Shown> {
        self.log.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn reports(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Report(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Poll until `pred` holds for the log, or give up after two seconds.
    pub async fn wait_for(&self, pred: impl Fn(&[Shown]) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !pred(&self.snapshot()) {
            assert!(tokio::time::Instant::now() < deadline, "timed out; log: {:#?}", self.snapshot());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl StatusSink for RecordingStatus {
    fn report(&mut self, result: &MixResult) {
        self.log.lock().unwrap().push(Shown::Report(result.to_string()));
    }

    fn notice(&mut self, text: &str) {
        self.log.lock().unwrap().push(Shown::Notice(text.to_string()));
    }

    fn set_start_enabled(&mut self, enabled: bool) {
        self.log.lock().unwrap().push(Shown::StartEnabled(enabled));
    }
}

#[derive(Default)]
pub struct RecordingMap {
    pub listener: Vec<LatLng>,
    pub styles: Vec<(String, CircleStyle)>,
}

impl MapView for RecordingMap {
    fn move_listener(&mut self, position: LatLng) {
        self.listener.push(position);
    }

    fn set_source_style(&mut self, source_id: &str, style: CircleStyle) {
        self.styles.push((source_id.to_string(), style));
    }
}

/// A 16-bit PCM mono WAV holding a constant level.
pub fn constant_wav(sample_rate: u32, frames: usize, level: i16) -> Vec<u8> {
    let data_len = (frames * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..frames {
        out.extend_from_slice(&level.to_le_bytes());
    }
    out
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:audio/wav;base64,{}", base64::encode(bytes))
}
