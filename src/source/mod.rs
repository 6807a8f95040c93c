pub mod device;
pub mod replay;

pub use device::{
    CsvPositioningService, DeviceProvider, FixSink, PositioningService, PushPositioningService,
};
pub use replay::{synthetic_route, ReplayProvider, SyntheticRoute};

use crate::sample::{PositionSample, Route};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Observer invoked for every sample accepted into the buffer
pub type SampleCallback = Arc<dyn Fn(&PositionSample) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Minimum time between fixes; the replay provider's emit period
    pub interval_ms: u64,
    /// Minimum movement between accepted device fixes
    pub min_distance_m: f64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            min_distance_m: 5.0,
        }
    }
}

/// Handle providers use to deliver samples into the current tracking run.
///
/// Each run gets a fresh liveness flag, so an emitter left over from a
/// stopped run can never write into a later run's buffer.
#[derive(Clone)]
pub struct Emitter {
    buffer: Arc<Mutex<Route>>,
    active: Arc<AtomicBool>,
    on_sample: SampleCallback,
}

impl Emitter {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Append `sample` and notify the observer. Returns false once the run stopped.
    pub fn emit(&self, sample: PositionSample) -> bool {
        {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            if !self.is_active() {
                return false;
            }
            buffer.push(sample);
        }
        (self.on_sample)(&sample);
        true
    }
}

/// The two interchangeable providers; exactly one lives in a source.
pub enum SampleProvider {
    Device(DeviceProvider),
    Replay(ReplayProvider),
}

impl SampleProvider {
    fn start(&mut self, emitter: Emitter, opts: TrackingOptions) {
        match self {
            SampleProvider::Device(p) => p.start(emitter, opts),
            SampleProvider::Replay(p) => p.start(emitter, opts),
        }
    }

    fn stop(&mut self) {
        match self {
            SampleProvider::Device(p) => p.stop(),
            SampleProvider::Replay(p) => p.stop(),
        }
    }

    fn rewind(&mut self) {
        if let SampleProvider::Replay(p) = self {
            p.rewind();
        }
    }

    fn is_exhausted(&self) -> bool {
        match self {
            SampleProvider::Device(p) => p.is_exhausted(),
            SampleProvider::Replay(p) => p.is_exhausted(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleProvider::Device(_) => "device",
            SampleProvider::Replay(_) => "replay",
        }
    }
}

impl From<DeviceProvider> for SampleProvider {
    fn from(p: DeviceProvider) -> Self {
        SampleProvider::Device(p)
    }
}

impl From<ReplayProvider> for SampleProvider {
    fn from(p: ReplayProvider) -> Self {
        SampleProvider::Replay(p)
    }
}

/// Owns exactly one provider, a device feed or a replay, chosen at construction.
pub struct SampleSource {
    provider: SampleProvider,
    buffer: Arc<Mutex<Route>>,
    active: Option<Arc<AtomicBool>>,
}

impl SampleSource {
    pub fn new(provider: impl Into<SampleProvider>) -> Self {
        Self {
            provider: provider.into(),
            buffer: Arc::new(Mutex::new(Vec::new())),
            active: None,
        }
    }

    pub fn provider(&self) -> &SampleProvider {
        &self.provider
    }

    /// Begin a tracking run with an empty buffer.
    ///
    /// A run already in progress is stopped first and its samples discarded.
    pub fn start_tracking(&mut self, on_sample: SampleCallback, opts: TrackingOptions) {
        if self.active.is_some() {
            let discarded = self.stop_tracking();
            debug!(discarded = discarded.len(), "restarted tracking");
        }
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();

        let active = Arc::new(AtomicBool::new(true));
        let emitter = Emitter {
            buffer: Arc::clone(&self.buffer),
            active: Arc::clone(&active),
            on_sample,
        };
        self.active = Some(active);
        debug!(provider = self.provider.name(), ?opts, "tracking started");
        self.provider.start(emitter, opts);
    }

    /// Stop the current run and hand its samples to the caller.
    ///
    /// Safe to call repeatedly; returns an empty route when nothing is tracking.
    pub fn stop_tracking(&mut self) -> Route {
        if let Some(active) = self.active.take() {
            active.store(false, Ordering::SeqCst);
            self.provider.stop();
            debug!(provider = self.provider.name(), "tracking stopped");
        }
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Snapshot of the samples gathered by the current run
    pub fn route_points(&self) -> Route {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    /// Restart a replay from its first sample; no effect on device providers.
    pub fn rewind(&mut self) {
        self.provider.rewind();
    }

    /// True once the provider can produce no further samples
    pub fn is_exhausted(&self) -> bool {
        self.provider.is_exhausted()
    }
}

impl Drop for SampleSource {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}
