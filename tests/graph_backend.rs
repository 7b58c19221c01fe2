mod common;

use common::{constant_wav, data_uri, north_of, registry};
use klangort::nodes::RtrbSink;
use klangort::{EnginePhase, GraphBackend, LatLng, MixingEngine, Provenance, BLOCK_SIZE};
use rtrb::{Consumer, RingBuffer};

const RATE: u32 = 48_000;
const ORIGIN: LatLng = LatLng::new(0.0, 0.0);

fn drain(consumer: &mut Consumer<f32>) -> Vec<f32> {
    std::iter::from_fn(|| consumer.pop().ok()).collect()
}

/// Two sources 100m either side of the origin, each a constant level clip.
fn two_constant_sources(second_audio: &str) -> klangort::SourceRegistry {
    let north = north_of(ORIGIN, 100.0);
    let south = north_of(ORIGIN, -100.0);
    let quarter = data_uri(&constant_wav(RATE, 4_800, 8192));
    registry(&format!(
        r#"[
        {{"id": "n", "label": "North", "icon": "⬆", "lat": {}, "lng": 0,
          "minDistance": 10, "maxDistance": 150, "audio": "{quarter}"}},
        {{"id": "s", "label": "South", "icon": "⬇", "lat": {}, "lng": 0,
          "minDistance": 10, "maxDistance": 150, "audio": "{second_audio}"}}
    ]"#,
        north.lat, south.lat
    ))
}

fn backend() -> (GraphBackend, Consumer<f32>) {
    let (producer, consumer) = RingBuffer::new(RATE as usize * 4);
    (GraphBackend::new(RATE).with_output(RtrbSink::mono(producer)), consumer)
}

#[tokio::test]
async fn sources_mix_and_fade_with_distance() {
    // second clip at a different rate gets converted on the fly
    let eighth = data_uri(&constant_wav(22_050, 2_205, 4096));
    let (mut backend, mut out) = backend();
    let mut engine = MixingEngine::new(two_constant_sources(&eighth));

    engine.start(&mut backend).await.unwrap();
    assert_eq!(engine.phase(), EnginePhase::Active);

    // started silent
    backend.process_blocks(4);
    assert!(drain(&mut out).iter().all(|&s| s == 0.0));

    // standing on the north source: only it plays, ramping up to 0.25
    engine.update(north_of(ORIGIN, 100.0), Provenance::Simulated);
    backend.process_blocks(1_500);
    let rendered = drain(&mut out);
    assert_eq!(rendered.len(), 1_500 * BLOCK_SIZE);
    assert!(rendered[0] < 0.01);
    assert!((rendered[rendered.len() - 1] - 0.25).abs() < 1e-3);

    // on the origin both are at the same volume and sum
    let v = engine.update(ORIGIN, Provenance::Simulated).sources[0].volume as f32;
    backend.process_blocks(1_500);
    let rendered = drain(&mut out);
    let expected = v * 0.25 + v * 0.125;
    assert!((rendered[rendered.len() - 1] - expected).abs() < 1e-3, "{}", rendered[rendered.len() - 1]);

    // walking out of range cuts to silence at the next block
    engine.update(north_of(ORIGIN, 10_000.0), Provenance::Simulated);
    backend.process_blocks(2);
    assert!(drain(&mut out).iter().all(|&s| s == 0.0));
}

#[tokio::test]
async fn broken_payload_leaves_nothing_playing() {
    let (mut backend, mut out) = backend();
    let garbage = data_uri(b"definitely not audio");
    let mut engine = MixingEngine::new(two_constant_sources(&garbage));
    let idle_nodes = backend.node_count();

    let err = engine.start(&mut backend).await.unwrap_err();
    assert!(err.to_string().contains("South"), "{err}");
    assert_eq!(engine.phase(), EnginePhase::Ready);
    assert_eq!(backend.node_count(), idle_nodes);

    // retrying doesn't pile up nodes from the aborted attempts
    engine.start(&mut backend).await.unwrap_err();
    assert_eq!(backend.node_count(), idle_nodes);

    engine.update(north_of(ORIGIN, 100.0), Provenance::Simulated);
    backend.process_blocks(200);
    assert!(drain(&mut out).iter().all(|&s| s == 0.0));
}

#[tokio::test]
async fn shutdown_silences_the_mix() {
    let quarter = data_uri(&constant_wav(RATE, 4_800, 8192));
    let (mut backend, mut out) = backend();
    let mut engine = MixingEngine::new(two_constant_sources(&quarter));
    engine.start(&mut backend).await.unwrap();

    engine.update(ORIGIN, Provenance::Simulated);
    backend.process_blocks(100);
    assert!(drain(&mut out).iter().any(|&s| s > 0.0));

    engine.shutdown(&mut backend);
    assert_eq!(backend.node_count(), 2);
    backend.process_blocks(2);
    assert!(drain(&mut out).iter().all(|&s| s == 0.0));
}
