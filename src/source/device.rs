use super::{Emitter, TrackingOptions};
use crate::error::SourceError;
use crate::geo::distance_between;
use crate::sample::PositionSample;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Callback a positioning service calls for every raw fix
pub type FixSink = Box<dyn Fn(PositionSample) + Send + Sync>;

/// Host positioning service (GPS receiver, OS location API, ...)
pub trait PositioningService: Send {
    /// Begin delivering fixes to `deliver` at roughly the requested cadence.
    fn start(&mut self, request: TrackingOptions, deliver: FixSink) -> Result<(), SourceError>;

    fn stop(&mut self);

    /// True once the service will never deliver another fix
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Live provider over a host service, filtering fixes by time and distance.
pub struct DeviceProvider {
    service: Box<dyn PositioningService>,
    running: bool,
}

impl DeviceProvider {
    pub fn new(service: impl PositioningService + 'static) -> Self {
        Self::from_boxed(Box::new(service))
    }

    pub fn from_boxed(service: Box<dyn PositioningService>) -> Self {
        Self {
            service,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_exhausted(&self) -> bool {
        self.service.is_exhausted()
    }

    pub(super) fn start(&mut self, emitter: Emitter, opts: TrackingOptions) {
        self.stop();

        let last_accepted: Mutex<Option<PositionSample>> = Mutex::new(None);
        let deliver: FixSink = Box::new(move |fix| {
            if !fix.is_valid() {
                debug!(?fix, "dropping invalid fix");
                return;
            }

            let mut last = last_accepted.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = *last {
                if !accepts(&prev, &fix, &opts) {
                    return;
                }
            }
            if emitter.emit(fix) {
                *last = Some(fix);
            }
        });

        match self.service.start(opts, deliver) {
            Ok(()) => self.running = true,
            // an activity without fixes is still a valid activity
            Err(err) => warn!(%err, "positioning unavailable; recording without fixes"),
        }
    }

    pub(super) fn stop(&mut self) {
        if self.running {
            self.service.stop();
            self.running = false;
        }
    }
}

/// A fix is kept when time moved forward by the interval and the position by the distance
fn accepts(prev: &PositionSample, fix: &PositionSample, opts: &TrackingOptions) -> bool {
    let dt = fix.timestamp_ms - prev.timestamp_ms;
    if dt < 0 || (dt as u64) < opts.interval_ms {
        return false;
    }
    distance_between(prev, fix) >= opts.min_distance_m
}

/// Service fed by the host: platform location callbacks call [`push`].
///
/// Clones share the same subscription, so the host keeps one handle while
/// the provider owns another.
///
/// [`push`]: PushPositioningService::push
#[derive(Clone, Default)]
pub struct PushPositioningService {
    sink: Arc<Mutex<Option<FixSink>>>,
    closed: Arc<AtomicBool>,
}

impl PushPositioningService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a fix; dropped when the service is stopped
    pub fn push(&self, fix: PositionSample) {
        if let Some(deliver) = self.sink.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            deliver(fix);
        }
    }

    /// Mark the feed as finished; no further fixes will come
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl PositioningService for PushPositioningService {
    fn start(&mut self, _request: TrackingOptions, deliver: FixSink) -> Result<(), SourceError> {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(deliver);
        Ok(())
    }

    fn stop(&mut self) {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn is_exhausted(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Positioning service reading fixes as CSV records
/// (`latitude,longitude,timestamp_ms[,speed_mps,accuracy_m,elevation_m]`).
///
/// The reader is consumed on a background thread from the first `start`.
/// Fixes read while stopped are discarded, like a receiver that is off.
pub struct CsvPositioningService {
    reader: Option<Box<dyn Read + Send>>,
    sink: Arc<Mutex<Option<FixSink>>>,
    exhausted: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CsvPositioningService {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            sink: Arc::new(Mutex::new(None)),
            exhausted: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Wait for the reader thread to reach end of input
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl PositioningService for CsvPositioningService {
    fn start(&mut self, _request: TrackingOptions, deliver: FixSink) -> Result<(), SourceError> {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(deliver);

        if let Some(reader) = self.reader.take() {
            let sink = Arc::clone(&self.sink);
            let exhausted = Arc::clone(&self.exhausted);
            self.worker = Some(std::thread::spawn(move || {
                let mut rdr = csv::ReaderBuilder::new()
                    .trim(csv::Trim::All)
                    .flexible(true)
                    .from_reader(reader);
                for record in rdr.deserialize::<PositionSample>() {
                    match record {
                        Ok(fix) => {
                            if let Some(deliver) =
                                sink.lock().unwrap_or_else(|e| e.into_inner()).as_ref()
                            {
                                deliver(fix);
                            }
                        }
                        Err(err) => warn!(%err, "skipping malformed fix"),
                    }
                }
                exhausted.store(true, Ordering::SeqCst);
                debug!("fix stream ended");
            }));
        }
        Ok(())
    }

    fn stop(&mut self) {
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SampleSource;
    use std::io::Cursor;
    use std::time::Duration;

    struct DeniedService;

    impl PositioningService for DeniedService {
        fn start(&mut self, _: TrackingOptions, _: FixSink) -> Result<(), SourceError> {
            Err(SourceError::PermissionDenied)
        }

        fn stop(&mut self) {}
    }

    fn opts(interval_ms: u64, min_distance_m: f64) -> TrackingOptions {
        TrackingOptions {
            interval_ms,
            min_distance_m,
        }
    }

    #[test]
    fn filters_by_time_and_distance() {
        let service = PushPositioningService::new();
        let mut source = SampleSource::new(DeviceProvider::new(service.clone()));
        source.start_tracking(Arc::new(|_| {}), opts(1000, 5.0));

        service.push(PositionSample::new(0.0, 0.0, 0));
        service.push(PositionSample::new(0.0, 0.001, 500)); // too soon
        service.push(PositionSample::new(0.0, 0.00001, 2000)); // ~1 m, too close
        service.push(PositionSample::new(0.0, 0.001, 3000));
        service.push(PositionSample::new(0.0, 0.002, 2500)); // time went backwards
        service.push(PositionSample::new(95.0, 0.002, 9000)); // invalid latitude

        let route = source.stop_tracking();
        assert_eq!(
            route,
            vec![PositionSample::new(0.0, 0.0, 0), PositionSample::new(0.0, 0.001, 3000)]
        );

        // stopped: nothing reaches the buffer
        service.push(PositionSample::new(0.0, 0.01, 10_000));
        assert!(source.route_points().is_empty());

        assert!(!source.is_exhausted());
        service.close();
        assert!(source.is_exhausted());
    }

    #[test]
    fn permission_denied_still_tracks_without_fixes() {
        let mut source = SampleSource::new(DeviceProvider::new(DeniedService));
        source.start_tracking(Arc::new(|_| {}), TrackingOptions::default());
        assert!(source.is_tracking());
        assert!(source.stop_tracking().is_empty());
    }

    #[test]
    fn csv_service_reads_fixes_until_eof() {
        let input = "latitude,longitude,timestamp_ms,speed_mps,accuracy_m,elevation_m\n\
                     51.0,0.0,0,2.5,4.0,10.0\n\
                     not,a,fix,,,\n\
                     51.001,0.0,1000,,,\n";
        let mut service = CsvPositioningService::new(Cursor::new(input.to_string()));
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        service
            .start(opts(0, 0.0), Box::new(move |fix| sink.lock().unwrap().push(fix)))
            .unwrap();
        service.join();

        assert!(service.is_exhausted());
        let got = got.lock().unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].speed_mps, Some(2.5));
        assert_eq!(got[0].elevation_m, Some(10.0));
        assert_eq!(got[1], PositionSample::new(51.001, 0.0, 1000));
    }

    #[test]
    fn csv_device_source_end_to_end() {
        let input = "latitude,longitude,timestamp_ms\n0.0,0.0,0\n0.0,0.001,1000\n0.0,0.002,2000\n";
        let mut source =
            SampleSource::new(DeviceProvider::new(CsvPositioningService::new(Cursor::new(input))));
        source.start_tracking(Arc::new(|_| {}), opts(1000, 5.0));

        for _ in 0..2000u32 {
            if source.is_exhausted() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(source.is_exhausted());
        assert_eq!(source.stop_tracking().len(), 3);
    }
}
