use super::{Emitter, TrackingOptions};
use crate::sample::{LatLon, PositionSample, Route};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Emits a pre-recorded route one sample per `interval_ms`.
///
/// The cursor survives stop/start so a paused replay resumes where it left
/// off; [`ReplayProvider::rewind`] starts over.
pub struct ReplayProvider {
    samples: Arc<Vec<PositionSample>>,
    cursor: Arc<AtomicUsize>,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl ReplayProvider {
    pub fn new(samples: Route) -> Self {
        Self {
            samples: Arc::new(samples),
            cursor: Arc::new(AtomicUsize::new(0)),
            worker: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples emitted so far
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn rewind(&mut self) {
        self.cursor.store(0, Ordering::SeqCst);
    }

    pub fn is_exhausted(&self) -> bool {
        self.position() >= self.samples.len()
    }

    pub(super) fn start(&mut self, emitter: Emitter, opts: TrackingOptions) {
        self.stop();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let samples = Arc::clone(&self.samples);
        let cursor = Arc::clone(&self.cursor);
        let interval = Duration::from_millis(opts.interval_ms);

        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                // any message or a dropped sender means stop
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let idx = cursor.load(Ordering::SeqCst);
            let Some(sample) = samples.get(idx) else {
                debug!(emitted = idx, "replay finished");
                break;
            };
            if !emitter.emit(*sample) {
                break;
            }
            cursor.store(idx + 1, Ordering::SeqCst);
        });

        self.worker = Some((stop_tx, handle));
    }

    pub(super) fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            drop(stop_tx);
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parameters for a seeded, jittered synthetic route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRoute {
    pub start: LatLon,
    pub points: usize,
    pub interval_ms: i64,
    pub start_timestamp_ms: i64,
    pub speed_mps: f64,
    pub heading_deg: f64,
    /// Maximum random offset applied to each fix
    pub jitter_m: f64,
    pub start_elevation_m: f64,
    pub seed: u64,
}

impl Default for SyntheticRoute {
    fn default() -> Self {
        Self {
            start: LatLon::new(51.5074, -0.1278),
            points: 600,
            interval_ms: 1000,
            start_timestamp_ms: 0,
            speed_mps: 3.0,
            heading_deg: 45.0,
            jitter_m: 2.0,
            start_elevation_m: 20.0,
            seed: 42,
        }
    }
}

const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Generate a wandering route; the same parameters always give the same samples.
pub fn synthetic_route(params: &SyntheticRoute) -> Route {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let dt = params.interval_ms as f64 / 1000.0;

    let (mut lat, mut lon) = (params.start.latitude, params.start.longitude);
    let mut heading = params.heading_deg.to_radians();
    let mut elevation = params.start_elevation_m;

    let mut route = Vec::with_capacity(params.points);
    for i in 0..params.points {
        let (jn, je) = if params.jitter_m > 0.0 {
            (
                rng.gen_range(-params.jitter_m..=params.jitter_m),
                rng.gen_range(-params.jitter_m..=params.jitter_m),
            )
        } else {
            (0.0, 0.0)
        };
        let meters_per_deg_lon = METERS_PER_DEG_LAT * lat.to_radians().cos().max(1e-6);

        let speed = (params.speed_mps * rng.gen_range(0.9..1.1)).max(0.0);
        route.push(
            PositionSample::new(
                (lat + jn / METERS_PER_DEG_LAT).clamp(-90.0, 90.0),
                (lon + je / meters_per_deg_lon).clamp(-180.0, 180.0),
                params.start_timestamp_ms + i as i64 * params.interval_ms,
            )
            .with_speed(speed)
            .with_accuracy(rng.gen_range(3.0..8.0))
            .with_elevation(elevation),
        );

        let step = speed * dt;
        lat += step * heading.cos() / METERS_PER_DEG_LAT;
        lon += step * heading.sin() / meters_per_deg_lon;
        heading += rng.gen_range(-0.1..0.1);
        elevation += rng.gen_range(-0.5..0.5);
    }
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::total_distance;

    #[test]
    fn synthetic_route_is_deterministic() {
        let params = SyntheticRoute::default();
        assert_eq!(synthetic_route(&params), synthetic_route(&params));

        let other = synthetic_route(&SyntheticRoute { seed: 7, ..params });
        assert_ne!(synthetic_route(&params), other);
    }

    #[test]
    fn synthetic_route_shape() {
        let params = SyntheticRoute {
            points: 300,
            jitter_m: 0.0,
            ..SyntheticRoute::default()
        };
        let route = synthetic_route(&params);
        assert_eq!(route.len(), 300);
        assert!(route.iter().all(PositionSample::is_valid));
        assert!(route.windows(2).all(|w| w[1].timestamp_ms - w[0].timestamp_ms == 1000));

        // ~3 m/s for 299 s
        let d = total_distance(&route);
        assert!(d > 750.0 && d < 1050.0, "got {d}");
    }

    #[test]
    fn empty_replay_is_exhausted() {
        let provider = ReplayProvider::new(Vec::new());
        assert!(provider.is_empty());
        assert!(provider.is_exhausted());
    }
}
