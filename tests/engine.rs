mod common;

use common::{north_of, registry, three_sources, FakeBackend, GainCall};
use klangort::{Classification, EnginePhase, Error, LatLng, MixingEngine, Provenance};

const ORIGIN: LatLng = LatLng::new(0.0, 0.0);

#[test]
fn overlap_is_detected() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let result = engine.update(ORIGIN, Provenance::Simulated);

    let volumes: Vec<f64> = result.sources.iter().map(|s| s.volume).collect();
    assert!((volumes[0] - 0.4f64.powf(1.8)).abs() < 1e-6);
    assert!((volumes[1] - (1.0f64 / 6.0).powf(1.8)).abs() < 1e-6);
    assert_eq!(volumes[2], 0.0);

    assert_eq!(result.audible_count, 2);
    assert_eq!(result.classification, Classification::Overlap);
    assert!(result.sources[0].audible && result.sources[1].audible);
    assert!(!result.sources[2].audible);
}

#[test]
fn status_text_matches_the_display_format() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let result = engine.update(ORIGIN, Provenance::Simulated);

    assert_eq!(
        result.to_string(),
        "[SIM] (mode=embedded)\n\
         🅰 A: d=200m vol=0.19\n\
         🅱 B: d=350m vol=0.04\n\
         © C: d=5000m vol=0.00\n\
         \n\
         ✅ OVERLAP AREA: you are hearing multiple sources at once"
    );
}

#[test]
fn standing_on_a_source_hears_only_it() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let at_a = north_of(ORIGIN, 200.0);
    let result = engine.update(at_a, Provenance::Gps);

    assert_eq!(result.sources[0].volume, 1.0);
    assert_eq!(result.classification, Classification::Single);
    assert!(result.to_string().starts_with("[GPS] (mode=embedded)\n"));
    assert!(result.to_string().ends_with("ℹ️ You are hearing 1 source"));
}

#[test]
fn far_away_hears_nothing() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let result = engine.update(north_of(ORIGIN, -20_000.0), Provenance::Simulated);
    assert_eq!(result.classification, Classification::None);
    assert!(result.to_string().ends_with("🔇 No source audible here"));
    for source in &result.sources {
        assert_eq!(source.style.fill_opacity, 0.04);
        assert_eq!(source.style.stroke_opacity, 0.45);
    }
}

#[test]
fn unusable_position_silences_everything() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let result = engine.update(LatLng::new(f64::NAN, 0.0), Provenance::Simulated);
    assert!(result.sources.iter().all(|s| s.volume == 0.0 && s.distance.is_infinite()));
    assert_eq!(result.classification, Classification::None);
    assert!(result.to_string().contains("🅰 A: d=Infinitym vol=0.00\n"));
}

#[test]
fn unreadable_source_position_silences_only_that_source() {
    let mut engine = MixingEngine::<FakeBackend>::new(registry(
        r#"[{"id": "good", "label": "Good", "lat": 0, "lng": 0,
             "minDistance": 10, "maxDistance": 100, "audio": "good.wav"},
            {"id": "bad", "label": "Bad", "lat": null, "lng": 0,
             "minDistance": 10, "maxDistance": 100, "audio": "bad.wav"}]"#,
    ));
    let result = engine.update(ORIGIN, Provenance::Simulated);

    assert_eq!(result.sources[0].volume, 1.0);
    assert!(result.sources[0].audible);
    assert_eq!(result.sources[1].volume, 0.0);
    assert!(result.sources[1].distance.is_infinite());
    assert_eq!(result.classification, Classification::Single);
}

#[test]
fn updates_are_idempotent() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    let p = north_of(ORIGIN, 37.5);
    let first = engine.update(p, Provenance::Simulated);
    let second = engine.update(p, Provenance::Simulated);
    assert_eq!(first, second);
    assert_eq!(engine.refresh(), Some(second));
}

#[test]
fn refresh_needs_a_position() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    assert_eq!(engine.refresh(), None);
    assert_eq!(engine.listener(), None);
}

#[test]
fn ready_engine_styles_circles() {
    let mut engine = MixingEngine::<FakeBackend>::new(three_sources());
    assert_eq!(engine.phase(), EnginePhase::Ready);

    let result = engine.update(north_of(ORIGIN, 200.0), Provenance::Simulated);
    let a = &result.sources[0];
    assert!((a.style.fill_opacity - 0.34).abs() < 1e-12);
    assert!((a.style.stroke_opacity - 0.90).abs() < 1e-12);
}

#[tokio::test]
async fn start_loops_every_source_silently() {
    let mut backend = FakeBackend::default();
    let mut engine = MixingEngine::new(three_sources());

    engine.start(&mut backend).await.unwrap();

    assert_eq!(engine.phase(), EnginePhase::Active);
    assert_eq!(backend.playing, vec![0, 1, 2]);
    assert_eq!(backend.decoded, vec![b"AAAA".to_vec(), b"BBBB".to_vec(), b"CCCC".to_vec()]);
    // nothing is ramped until the listener shows up
    assert!((0..3).all(|i| backend.gain_calls(i).is_empty()));
}

#[tokio::test]
async fn active_updates_drive_gains() {
    let mut backend = FakeBackend::default();
    let mut engine = MixingEngine::new(three_sources());
    engine.start(&mut backend).await.unwrap();

    engine.update(ORIGIN, Provenance::Simulated);

    match backend.gain_calls(0).as_slice() {
        [GainCall::Cancel, GainCall::Approach(target, tc)] => {
            assert!((*target as f64 - 0.4f64.powf(1.8)).abs() < 1e-6);
            assert_eq!(*tc, 0.12);
        }
        other => panic!("unexpected calls {other:?}"),
    }
    assert!(matches!(backend.gain_calls(1).as_slice(), [GainCall::Cancel, GainCall::Approach(..)]));
    assert_eq!(backend.gain_calls(2), vec![GainCall::Cancel, GainCall::Set(0.0)]);

    // walking out of range cuts straight to zero
    backend.clear_gain_calls();
    engine.update(north_of(ORIGIN, -20_000.0), Provenance::Simulated);
    for i in 0..3 {
        assert_eq!(backend.gain_calls(i), vec![GainCall::Cancel, GainCall::Set(0.0)]);
    }
}

#[tokio::test]
async fn failed_start_unwinds_everything() {
    let mut backend = FakeBackend::failing_at(1);
    let mut engine = MixingEngine::new(three_sources());

    let err = engine.start(&mut backend).await.unwrap_err();
    match &err {
        Error::StartAborted { label, cause } => {
            assert_eq!(label, "B");
            assert!(matches!(**cause, Error::Decode(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(engine.phase(), EnginePhase::Ready);
    assert!(backend.playing.is_empty());
    // B's own gain first, then the A prefix
    assert_eq!(backend.released, vec![(1, false), (0, true)]);
    // C was never touched
    assert_eq!(backend.gains.len(), 2);

    // updates still work and make no sound
    let result = engine.update(ORIGIN, Provenance::Simulated);
    assert_eq!(result.classification, Classification::Overlap);
    assert!((0..2).all(|i| backend.gain_calls(i).is_empty()));
}

#[tokio::test]
async fn retry_after_failure_succeeds() {
    let mut backend = FakeBackend::failing_at(1);
    let mut engine = MixingEngine::new(three_sources());
    assert!(engine.start(&mut backend).await.is_err());

    backend.fail_decode_at = None;
    engine.start(&mut backend).await.unwrap();
    assert_eq!(engine.phase(), EnginePhase::Active);
    assert_eq!(backend.playing.len(), 3);
}

#[tokio::test]
async fn second_start_is_refused() {
    let mut backend = FakeBackend::default();
    let mut engine = MixingEngine::new(three_sources());
    engine.start(&mut backend).await.unwrap();

    assert!(matches!(engine.start(&mut backend).await, Err(Error::AlreadyActive)));
    assert_eq!(backend.playing.len(), 3);
    assert_eq!(backend.gains.len(), 3);
}

#[tokio::test]
async fn shutdown_releases_in_reverse() {
    let mut backend = FakeBackend::default();
    let mut engine = MixingEngine::new(three_sources());
    engine.start(&mut backend).await.unwrap();

    engine.shutdown(&mut backend);
    assert_eq!(backend.released, vec![(2, true), (1, true), (0, true)]);
    assert!(backend.playing.is_empty());
}
