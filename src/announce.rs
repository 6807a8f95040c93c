use crate::speech::SpeechSink;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    pub enabled: bool,
    pub interval_meters: f64,
    /// BCP 47 tag handed to the speech sink
    pub language: String,
    pub announce_time: bool,
    pub announce_pace: bool,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_meters: 1000.0,
            language: "en-US".to_string(),
            announce_time: true,
            announce_pace: true,
        }
    }
}

/// Which optional clauses go into an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementOptions {
    pub include_time: bool,
    pub include_pace: bool,
}

impl Default for AnnouncementOptions {
    fn default() -> Self {
        Self {
            include_time: true,
            include_pace: true,
        }
    }
}

impl From<&AnnouncementConfig> for AnnouncementOptions {
    fn from(cfg: &AnnouncementConfig) -> Self {
        Self {
            include_time: cfg.announce_time,
            include_pace: cfg.announce_pace,
        }
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// e.g. `"1 hour 5 minutes"`, `"12 minutes 3 seconds"`, `"0 seconds"`.
/// Seconds are dropped once the duration reaches an hour.
pub fn format_time_spoken(total_seconds: f64) -> String {
    let total = if total_seconds.is_finite() && total_seconds > 0.0 {
        total_seconds.floor() as u64
    } else {
        0
    };
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if hours == 0 && (seconds > 0 || minutes == 0) {
        parts.push(plural(seconds, "second"));
    }
    parts.join(" ")
}

/// e.g. `"5 minutes 30 seconds per kilometer"`; empty for unusable input.
pub fn format_pace_spoken(seconds_per_km: f64) -> String {
    if !seconds_per_km.is_finite() || seconds_per_km <= 0.0 {
        return String::new();
    }

    let total = seconds_per_km.round() as u64;
    let (minutes, seconds) = (total / 60, total % 60);

    let mut parts = Vec::new();
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 || minutes == 0 {
        parts.push(plural(seconds, "second"));
    }
    format!("{} per kilometer", parts.join(" "))
}

/// Whole meters below one kilometer, one-decimal kilometers above.
pub fn format_distance_spoken(meters: f64) -> String {
    let meters = if meters.is_finite() && meters > 0.0 {
        meters
    } else {
        0.0
    };

    if meters < 1000.0 {
        return plural(meters.round() as u64, "meter");
    }

    let km = (meters / 100.0).round() / 10.0;
    if km == 1.0 {
        "1 kilometer".to_string()
    } else if km.fract() == 0.0 {
        format!("{} kilometers", km as u64)
    } else {
        format!("{km:.1} kilometers")
    }
}

pub fn build_announcement(
    distance_meters: f64,
    pace_seconds_per_km: f64,
    elapsed_seconds: f64,
    opts: &AnnouncementOptions,
) -> String {
    let mut clauses = vec![format_distance_spoken(distance_meters)];

    if opts.include_time && elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
        clauses.push(format!("time {}", format_time_spoken(elapsed_seconds)));
    }

    if opts.include_pace {
        let pace = format_pace_spoken(pace_seconds_per_km);
        if !pace.is_empty() {
            clauses.push(format!("pace {pace}"));
        }
    }

    clauses.join(", ")
}

/// Session-scoped milestone tracker that speaks through an optional sink
pub struct Announcer {
    config: AnnouncementConfig,
    last_announced_distance_meters: f64,
    sink: Option<Box<dyn SpeechSink>>,
}

impl std::fmt::Debug for Announcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Announcer")
            .field("config", &self.config)
            .field(
                "last_announced_distance_meters",
                &self.last_announced_distance_meters,
            )
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Announcer {
    pub fn new(config: AnnouncementConfig, sink: Option<Box<dyn SpeechSink>>) -> Self {
        Self {
            config,
            last_announced_distance_meters: 0.0,
            sink,
        }
    }

    /// Announcer with no speech output; milestones are still tracked
    pub fn silent(config: AnnouncementConfig) -> Self {
        Self::new(config, None)
    }

    pub fn config(&self) -> &AnnouncementConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AnnouncementConfig) {
        self.config = config;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn SpeechSink>>) {
        self.sink = sink;
    }

    pub fn last_announced_distance_meters(&self) -> f64 {
        self.last_announced_distance_meters
    }

    /// Forget all milestones; called when a session starts
    pub fn reset(&mut self) {
        self.last_announced_distance_meters = 0.0;
    }

    fn interval(&self) -> Option<f64> {
        let interval = self.config.interval_meters;
        (self.config.enabled && interval.is_finite() && interval > 0.0).then_some(interval)
    }

    /// Speak a progress update if `distance_meters` crossed the next milestone.
    pub fn check_and_announce(
        &mut self,
        distance_meters: f64,
        pace_seconds_per_km: f64,
        elapsed_seconds: f64,
    ) -> bool {
        let Some(interval) = self.interval() else {
            return false;
        };
        if !distance_meters.is_finite()
            || distance_meters < self.last_announced_distance_meters + interval
        {
            return false;
        }

        let milestone = (distance_meters / interval).floor() * interval;
        self.last_announced_distance_meters = milestone;

        let text = build_announcement(
            distance_meters,
            pace_seconds_per_km,
            elapsed_seconds,
            &AnnouncementOptions::from(&self.config),
        );
        info!(milestone, %text, "distance milestone");
        self.speak(&text);
        true
    }

    fn speak(&self, text: &str) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.speak(text, &self.config.language) {
                debug!(%err, "announcement dropped");
            }
        }
    }

    /// Silence any utterance in progress
    pub fn stop_speaking(&self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }
}
