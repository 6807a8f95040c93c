use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::sample::PositionSample;

/// Interval at which the host refreshes displayed elapsed time
pub const TICK_RATE_MS: u64 = 100;

/// Unified event type consumed by the session loop
#[derive(Clone, Debug, PartialEq)]
pub enum TrackingEvent {
    Sample(PositionSample),
    Tick,
}

/// Monotonic time source for elapsed-time accounting
pub trait Clock: Send + 'static {
    /// Time since an arbitrary fixed origin; never decreases.
    fn now(&self) -> Duration;
}

/// Production clock backed by `Instant`
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-advanced clock for tests and simulations. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Blocks up to one tick for the next sample, or returns Tick on timeout.
///
/// A missing receiver (no tracking run) or a disconnected provider still
/// waits out the tick so callers can loop on this without spinning.
pub fn next_event<T: Ticker>(rx: Option<&Receiver<PositionSample>>, ticker: &T) -> TrackingEvent {
    match rx {
        Some(rx) => match rx.recv_timeout(ticker.interval()) {
            Ok(sample) => TrackingEvent::Sample(sample),
            Err(RecvTimeoutError::Timeout) => TrackingEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(ticker.interval());
                TrackingEvent::Tick
            }
        },
        None => {
            std::thread::sleep(ticker.interval());
            TrackingEvent::Tick
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn next_event_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let ticker = FixedTicker::new(Duration::from_millis(1));

        assert_eq!(next_event(Some(&rx), &ticker), TrackingEvent::Tick);
        assert_eq!(next_event(None, &ticker), TrackingEvent::Tick);
    }

    #[test]
    fn next_event_passes_through_samples() {
        let (tx, rx) = mpsc::channel();
        let sample = PositionSample::new(1.0, 2.0, 3);
        tx.send(sample).unwrap();
        let ticker = FixedTicker::new(Duration::from_millis(10));

        assert_eq!(next_event(Some(&rx), &ticker), TrackingEvent::Sample(sample));
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.advance_secs(3);
        clock.advance(Duration::from_millis(250));
        assert_eq!(view.now(), Duration::from_millis(3250));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
