//! Walk a simulated listener past the sources and log what's heard.
//!
//! ```text
//! cargo run --example walk                       # embedded sources, headless
//! cargo run --example walk -- data/sources.json  # a source list on disk
//! cargo run --example walk --features cpal_sink  # play through the speakers
//! ```

use std::time::Duration;

use klangort::{Fix, GraphBackend, LatLng, LoadStrategy, LogStatus, NoMap, Session};
use tokio::sync::mpsc;
use tracing::info;

const STEPS: usize = 40;
const STEP_INTERVAL: Duration = Duration::from_millis(250);

#[cfg(feature = "cpal_sink")]
fn backend() -> klangort::Result<(GraphBackend, Option<rtrb::Consumer<f32>>)> {
    Ok((GraphBackend::default_output()?, None))
}

#[cfg(not(feature = "cpal_sink"))]
fn backend() -> klangort::Result<(GraphBackend, Option<rtrb::Consumer<f32>>)> {
    use klangort::nodes::RtrbSink;

    let (producer, consumer) = rtrb::RingBuffer::new(48_000 * 2);
    Ok((GraphBackend::new(48_000).with_output(RtrbSink::stereo(producer)), Some(consumer)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> klangort::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let strategy = match std::env::args().nth(1) {
        Some(path) => LoadStrategy::FetchWithFallback { path: path.into() },
        None => LoadStrategy::EmbeddedOnly,
    };

    let (backend, mut headless) = backend()?;
    let (fix_tx, fix_rx) = mpsc::channel::<Fix>(8);
    let (mut session, handle) = Session::new(backend, NoMap, LogStatus, Some(fix_rx));
    session.load(&strategy).await?;

    // west to east through the middle of the embedded sources
    let from = LatLng::new(48.8560, 2.3440);
    let to = LatLng::new(48.8575, 2.3600);

    let walker = async {
        handle.start().await;
        for step in 0..=STEPS {
            let t = step as f64 / STEPS as f64;
            let here = LatLng::new(from.lat + (to.lat - from.lat) * t, from.lng + (to.lng - from.lng) * t);
            if fix_tx.send(Ok(here)).await.is_err() {
                break;
            }
            tokio::time::sleep(STEP_INTERVAL).await;

            if let Some(consumer) = headless.as_mut() {
                let peak = std::iter::from_fn(|| consumer.pop().ok()).fold(0.0f32, |m, s| m.max(s.abs()));
                info!(peak, "rendered");
            }
        }
        handle.shutdown().await;
    };

    tokio::join!(session.run(), walker);
    Ok(())
}
