//! Window-less playback
//!
//! Drives the same engine as the GUI from a tokio timer instead of the frame
//! loop, sleeping until the next queued timer and logging each tick.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::info;
use crate::core::geo;
use crate::playback::{PlaybackEngine, PlaybackEvent};

/// What a headless run covered
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: usize,
    pub elapsed_secs: i64,
    pub distance_m: f64,
    pub max_speed_kmh: f64,
    pub wall_time: Duration,
}

/// Play the route from the engine's current position to the end
pub async fn run(engine: &mut PlaybackEngine) -> RunSummary {
    let started = Instant::now();
    let mut summary = RunSummary {
        ticks: 0,
        elapsed_secs: engine.elapsed_secs(),
        distance_m: 0.0,
        max_speed_kmh: 0.0,
        wall_time: Duration::ZERO,
    };

    if !engine.is_playing() {
        engine.toggle_play();
    }

    let mut last_update = Instant::now();
    while let Some(wait) = engine.time_to_next_timer() {
        sleep(wait).await;

        let now = Instant::now();
        let events = engine.update(now - last_update);
        last_update = now;

        for event in events {
            match event {
                PlaybackEvent::Advanced { index, elapsed_secs, speed_kmh, bearing } => {
                    summary.ticks += 1;
                    summary.elapsed_secs = elapsed_secs;
                    summary.max_speed_kmh = summary.max_speed_kmh.max(speed_kmh);
                    if let (Some(prev), Some(next)) = (engine.route().get(index - 1), engine.route().get(index)) {
                        summary.distance_m += geo::distance(prev.position(), next.position());
                    }

                    let wp = engine.route().get(index).unwrap_or_else(|| engine.route().first());
                    info!(
                        "waypoint {:>3}/{}  {:.6}, {:.6}  t+{}s  {:.2} km/h  heading {:.0}",
                        index + 1,
                        engine.route().len(),
                        wp.latitude,
                        wp.longitude,
                        elapsed_secs,
                        speed_kmh,
                        bearing,
                    );
                }
                PlaybackEvent::Finished => info!("route finished"),
            }
        }
    }

    summary.wall_time = started.elapsed();
    summary
}
