use crate::announce::Announcer;
use crate::error::SessionError;
use crate::geo::{current_pace, distance_between, format_pace, total_distance, DEFAULT_PACE_WINDOW};
use crate::runtime::{next_event, Clock, FixedTicker, SystemClock, TrackingEvent, TICK_RATE_MS};
use crate::sample::{PositionSample, Route};
use crate::simplify::{PathCache, SimplifiedPath, SimplifyOptions};
use crate::source::{SampleSource, TrackingOptions};
use crate::summary::{ActivitySummary, SportType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    Idle,
    Tracking,
    Paused,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tracking: TrackingOptions,
    pub pace_window: usize,
    pub simplify: SimplifyOptions,
    pub tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingOptions::default(),
            pace_window: DEFAULT_PACE_WINDOW,
            simplify: SimplifyOptions::default(),
            tick_ms: TICK_RATE_MS,
        }
    }
}

/// What the host shows while recording
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub pace_seconds_per_km: f64,
    pub pace_display: String,
    pub sample_count: usize,
}

/// `Idle -> Tracking <-> Paused -> Summary`; a finished session can start again.
pub struct Session<C: Clock = SystemClock> {
    config: SessionConfig,
    clock: C,
    ticker: FixedTicker,
    source: SampleSource,
    announcer: Announcer,
    path_cache: PathCache,

    state: SessionState,
    sport: SportType,
    /// Bumped on every start so cached paths from a previous session are never reused
    generation: u64,
    started_at: Option<DateTime<Utc>>,

    route: Route,
    /// Index in `route` where the current tracking segment begins
    segment_start: usize,
    segment_starts: Vec<usize>,
    last_sample: Option<PositionSample>,
    distance_meters: f64,
    pace_seconds_per_km: f64,

    /// Active time banked before the current anchor
    accumulated: Duration,
    anchor: Option<Duration>,

    samples_rx: Option<Receiver<PositionSample>>,
    summary: Option<ActivitySummary>,
}

impl Session<SystemClock> {
    pub fn new(source: SampleSource, announcer: Announcer, config: SessionConfig) -> Self {
        Self::with_clock(source, announcer, config, SystemClock::new())
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(
        source: SampleSource,
        announcer: Announcer,
        config: SessionConfig,
        clock: C,
    ) -> Self {
        Self {
            ticker: FixedTicker::new(Duration::from_millis(config.tick_ms)),
            config,
            clock,
            source,
            announcer,
            path_cache: PathCache::new(),
            state: SessionState::Idle,
            sport: SportType::default(),
            generation: 0,
            started_at: None,
            route: Vec::new(),
            segment_start: 0,
            segment_starts: Vec::new(),
            last_sample: None,
            distance_meters: 0.0,
            pace_seconds_per_km: 0.0,
            accumulated: Duration::ZERO,
            anchor: None,
            samples_rx: None,
            summary: None,
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            state: self.state,
            action,
        }
    }

    pub fn start(&mut self, sport: SportType) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Idle | SessionState::Summary) {
            return Err(self.invalid("start"));
        }

        self.source.stop_tracking();
        self.source.rewind();
        self.announcer.reset();
        self.path_cache.invalidate();
        self.generation += 1;

        self.sport = sport;
        self.started_at = Some(Utc::now());
        self.route.clear();
        self.segment_start = 0;
        self.segment_starts.clear();
        self.last_sample = None;
        self.distance_meters = 0.0;
        self.pace_seconds_per_km = 0.0;
        self.summary = None;

        self.accumulated = Duration::ZERO;
        self.anchor = Some(self.clock.now());
        self.begin_run();
        self.state = SessionState::Tracking;

        info!(%sport, provider = self.source.provider().name(), "session started");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Tracking {
            return Err(self.invalid("pause"));
        }

        self.pump();
        self.accumulated = self.elapsed();
        self.anchor = None;
        self.end_run();
        self.state = SessionState::Paused;

        info!(elapsed = self.accumulated.as_secs(), "session paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Paused {
            return Err(self.invalid("resume"));
        }

        self.segment_start = self.route.len();
        if self.segment_start > 0 && self.segment_starts.last() != Some(&self.segment_start) {
            self.segment_starts.push(self.segment_start);
        }

        self.anchor = Some(self.clock.now());
        self.begin_run();
        self.state = SessionState::Tracking;

        info!(elapsed = self.accumulated.as_secs(), "session resumed");
        Ok(())
    }

    /// Finish the session and freeze its summary.
    pub fn stop(&mut self) -> Result<&ActivitySummary, SessionError> {
        match self.state {
            SessionState::Tracking => {
                self.pump();
                self.accumulated = self.elapsed();
                self.anchor = None;
                self.end_run();
            }
            SessionState::Paused => {}
            _ => return Err(self.invalid("stop")),
        }

        let route = std::mem::take(&mut self.route);
        let len = route.len();
        let mut segment_starts = std::mem::take(&mut self.segment_starts);
        segment_starts.retain(|&i| i > 0 && i < len);

        let summary = ActivitySummary::from_route(
            self.sport,
            self.started_at.unwrap_or_else(Utc::now),
            Utc::now(),
            self.accumulated.as_secs(),
            route,
            segment_starts,
        );
        self.state = SessionState::Summary;

        info!(
            sport = %summary.sport_type,
            duration = summary.duration_seconds,
            distance = summary.distance_meters,
            samples = summary.sample_count,
            "session stopped"
        );
        Ok(self.summary.insert(summary))
    }

    /// Leave a finished session and return to `Idle`; the summary is dropped.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Summary => {
                self.summary = None;
                self.accumulated = Duration::ZERO;
                self.distance_meters = 0.0;
                self.pace_seconds_per_km = 0.0;
                self.last_sample = None;
                self.path_cache.invalidate();
                self.state = SessionState::Idle;
                Ok(())
            }
            SessionState::Idle => Ok(()),
            _ => Err(self.invalid("reset")),
        }
    }

    fn begin_run(&mut self) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        self.source.start_tracking(
            Arc::new(move |sample: &PositionSample| {
                let _ = tx.lock().unwrap_or_else(|e| e.into_inner()).send(*sample);
            }),
            self.config.tracking,
        );
        self.samples_rx = Some(rx);
    }

    /// Stop the source and make its buffer the authoritative copy of the segment.
    fn end_run(&mut self) {
        let segment = self.source.stop_tracking();
        // anything still queued is already part of `segment`
        self.samples_rx = None;

        self.route.truncate(self.segment_start);
        self.route.extend(segment);
        self.last_sample = self.route.last().copied();
        self.distance_meters = total_distance(&self.route);
        self.pace_seconds_per_km =
            current_pace(&self.route[self.segment_start..], self.config.pace_window);
    }

    /// Apply every sample delivered so far. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let pending: Vec<PositionSample> = match &self.samples_rx {
            Some(rx) => rx.try_iter().collect(),
            None => return 0,
        };
        let n = pending.len();
        for sample in pending {
            self.apply_sample(sample);
        }
        n
    }

    /// Wait up to one tick for a sample and apply it.
    pub fn step(&mut self) -> TrackingEvent {
        let event = next_event(self.samples_rx.as_ref(), &self.ticker);
        if let TrackingEvent::Sample(sample) = event {
            self.apply_sample(sample);
        }
        event
    }

    fn apply_sample(&mut self, sample: PositionSample) {
        if self.state != SessionState::Tracking {
            return;
        }

        if let Some(prev) = self.last_sample {
            self.distance_meters += distance_between(&prev, &sample);
        }
        self.last_sample = Some(sample);
        self.route.push(sample);
        self.pace_seconds_per_km =
            current_pace(&self.route[self.segment_start..], self.config.pace_window);

        debug!(
            lat = sample.latitude,
            lon = sample.longitude,
            distance = self.distance_meters,
            pace = self.pace_seconds_per_km,
            "sample applied"
        );

        let elapsed = self.elapsed().as_secs_f64();
        self.announcer
            .check_and_announce(self.distance_meters, self.pace_seconds_per_km, elapsed);
    }

    /// Active recording time, excluding every paused interval
    pub fn elapsed(&self) -> Duration {
        match (self.state, self.anchor) {
            (SessionState::Tracking, Some(anchor)) => {
                self.accumulated + self.clock.now().saturating_sub(anchor)
            }
            _ => self.accumulated,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn display(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            elapsed_seconds: self.elapsed_seconds(),
            distance_meters: self.distance_meters(),
            pace_seconds_per_km: self.pace_seconds_per_km,
            pace_display: format_pace(self.pace_seconds_per_km),
            sample_count: self.route().len(),
        }
    }

    /// Simplified path of the route for drawing, recomputed only when it changed
    pub fn display_path(&mut self) -> &SimplifiedPath {
        let route: &[PositionSample] = match (&self.state, &self.summary) {
            (SessionState::Summary, Some(summary)) => &summary.route_points,
            _ => &self.route,
        };
        self.path_cache.get(self.generation, route, &self.config.simplify)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sport(&self) -> SportType {
        self.sport
    }

    pub fn distance_meters(&self) -> f64 {
        match (&self.state, &self.summary) {
            (SessionState::Summary, Some(summary)) => summary.distance_meters,
            _ => self.distance_meters,
        }
    }

    pub fn pace_seconds_per_km(&self) -> f64 {
        self.pace_seconds_per_km
    }

    /// Samples recorded so far; the frozen route once the session stopped
    pub fn route(&self) -> &[PositionSample] {
        match (&self.state, &self.summary) {
            (SessionState::Summary, Some(summary)) => &summary.route_points,
            _ => &self.route,
        }
    }

    pub fn segment_starts(&self) -> &[usize] {
        &self.segment_starts
    }

    pub fn summary(&self) -> Option<&ActivitySummary> {
        self.summary.as_ref()
    }

    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    pub fn announcer_mut(&mut self) -> &mut Announcer {
        &mut self.announcer
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Change the render tolerance; the next `display_path` recomputes.
    pub fn set_simplify_options(&mut self, simplify: SimplifyOptions) {
        self.config.simplify = simplify;
    }

    /// True once the provider has nothing more to deliver
    pub fn is_source_exhausted(&self) -> bool {
        self.source.is_exhausted()
    }
}
