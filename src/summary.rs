use crate::geo::{distance_between, total_distance};
use crate::sample::{PositionSample, Route};
use crate::util::{mean, std_dev};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Distance of one split in the summary
pub const SPLIT_METERS: f64 = 1000.0;

/// Trailing distance below this is rounding noise, not a partial split
const MIN_PARTIAL_SPLIT_METERS: f64 = 1.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SportType {
    #[default]
    Running,
    Walking,
    Cycling,
    Hiking,
}

/// One fixed-distance slice of an activity; the last one may be partial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// 1-based
    pub index: usize,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub pace_seconds_per_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpsQuality {
    pub mean_accuracy_m: Option<f64>,
    pub accuracy_std_dev_m: Option<f64>,
}

impl GpsQuality {
    pub fn from_route(route: &[PositionSample]) -> Self {
        let accuracies: Vec<f64> = route.iter().filter_map(|s| s.accuracy_m).collect();
        Self {
            mean_accuracy_m: mean(&accuracies),
            accuracy_std_dev_m: std_dev(&accuracies),
        }
    }
}

/// Immutable record handed to the caller when a session stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub sport_type: SportType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Active time only; paused intervals are excluded
    pub duration_seconds: u64,
    pub distance_meters: f64,
    pub route_points: Route,
    /// Seconds per kilometer, `None` when no distance was covered
    pub avg_pace: Option<f64>,
    pub sample_count: usize,
    /// Indices into `route_points` where recording resumed after a pause.
    /// The gap before each index is not covered by samples.
    #[serde(default)]
    pub segment_starts: Vec<usize>,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub elevation_gain_m: Option<f64>,
    #[serde(default)]
    pub gps_quality: GpsQuality,
}

impl ActivitySummary {
    /// Derive every statistic from the frozen route.
    pub fn from_route(
        sport_type: SportType,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_seconds: u64,
        route_points: Route,
        segment_starts: Vec<usize>,
    ) -> Self {
        let distance_meters = total_distance(&route_points);
        Self {
            sport_type,
            start_time,
            end_time,
            duration_seconds,
            distance_meters,
            avg_pace: average_pace(duration_seconds as f64, distance_meters),
            sample_count: route_points.len(),
            splits: compute_splits(&route_points, &segment_starts, SPLIT_METERS),
            elevation_gain_m: elevation_gain(&route_points, &segment_starts),
            gps_quality: GpsQuality::from_route(&route_points),
            segment_starts,
            route_points,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

pub fn average_pace(duration_seconds: f64, distance_meters: f64) -> Option<f64> {
    (distance_meters > 0.0 && duration_seconds > 0.0)
        .then(|| duration_seconds / (distance_meters / 1000.0))
}

fn starts_segment(idx: usize, segment_starts: &[usize]) -> bool {
    segment_starts.contains(&idx)
}

/// Cut the route into `split_meters` slices.
///
/// Time across a segment boundary (a pause) is not counted; the distance
/// is, matching how the total distance is defined.
pub fn compute_splits(
    route: &[PositionSample],
    segment_starts: &[usize],
    split_meters: f64,
) -> Vec<Split> {
    if route.len() < 2 || !split_meters.is_finite() || split_meters <= 0.0 {
        return Vec::new();
    }

    let mut splits = Vec::new();
    let (mut distance, mut active) = (0.0_f64, 0.0_f64);
    let mut split_started_at = 0.0;
    let mut next_boundary = split_meters;

    for i in 1..route.len() {
        let leg = distance_between(&route[i - 1], &route[i]);
        let dt = if starts_segment(i, segment_starts) {
            0.0
        } else {
            (route[i].timestamp_ms - route[i - 1].timestamp_ms).max(0) as f64 / 1000.0
        };

        let (d0, t0) = (distance, active);
        distance += leg;
        active += dt;

        while distance >= next_boundary {
            let frac = if leg > 0.0 { (next_boundary - d0) / leg } else { 1.0 };
            let crossed_at = t0 + frac * dt;
            let duration = crossed_at - split_started_at;
            splits.push(Split {
                index: splits.len() + 1,
                distance_meters: split_meters,
                duration_seconds: duration,
                pace_seconds_per_km: duration / (split_meters / 1000.0),
            });
            split_started_at = crossed_at;
            next_boundary += split_meters;
        }
    }

    let remainder = distance - (next_boundary - split_meters);
    if remainder >= MIN_PARTIAL_SPLIT_METERS {
        let duration = active - split_started_at;
        splits.push(Split {
            index: splits.len() + 1,
            distance_meters: remainder,
            duration_seconds: duration,
            pace_seconds_per_km: duration / (remainder / 1000.0),
        });
    }
    splits
}

/// Sum of climbs between consecutive elevation readings within a segment
pub fn elevation_gain(route: &[PositionSample], segment_starts: &[usize]) -> Option<f64> {
    let mut readings = 0usize;
    let mut gain = 0.0;
    let mut prev: Option<f64> = None;

    for (i, sample) in route.iter().enumerate() {
        if starts_segment(i, segment_starts) {
            prev = None;
        }
        if let Some(elevation) = sample.elevation_m {
            readings += 1;
            if let Some(p) = prev {
                if elevation > p {
                    gain += elevation - p;
                }
            }
            prev = Some(elevation);
        }
    }

    (readings >= 2).then_some(gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // ~100 m per step along the equator
    const STEP: f64 = 0.000_899_322;

    fn straight(n: usize, secs_per_step: i64) -> Route {
        (0..n)
            .map(|i| PositionSample::new(0.0, i as f64 * STEP, i as i64 * secs_per_step * 1000))
            .collect()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn sport_type_text_forms() {
        assert_eq!(SportType::Cycling.to_string(), "cycling");
        assert_eq!(SportType::from_str("hiking", true).unwrap(), SportType::Hiking);
        assert_eq!(SportType::from_str("Cycling", true).unwrap(), SportType::Cycling);
        assert!(SportType::from_str("swimming", true).is_err());
        assert_eq!(serde_json::to_string(&SportType::Running).unwrap(), "\"running\"");
    }

    #[test]
    fn summary_from_route() {
        let route = straight(11, 30);
        let summary = ActivitySummary::from_route(
            SportType::Running,
            at(0),
            at(300),
            300,
            route.clone(),
            Vec::new(),
        );

        assert_eq!(summary.sample_count, 11);
        assert!((summary.distance_meters - 1000.0).abs() < 1.0);
        let pace = summary.avg_pace.unwrap();
        assert!((pace - 300.0).abs() < 1.0);
        assert_eq!(summary.route_points, route);
        assert_eq!(summary.elevation_gain_m, None);
    }

    #[test]
    fn empty_route_has_no_pace() {
        let summary = ActivitySummary::from_route(
            SportType::Walking,
            at(0),
            at(60),
            60,
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(summary.distance_meters, 0.0);
        assert_eq!(summary.avg_pace, None);
        assert!(summary.splits.is_empty());
        assert_eq!(summary.gps_quality, GpsQuality::default());
    }

    #[test]
    fn splits_cover_full_and_partial_kilometers() {
        // 2.5 km at 30 s per 100 m
        let route = straight(26, 30);
        let splits = compute_splits(&route, &[], SPLIT_METERS);

        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].index, 1);
        assert!((splits[0].duration_seconds - 300.0).abs() < 1.0);
        assert!((splits[1].pace_seconds_per_km - 300.0).abs() < 1.0);
        assert!((splits[2].distance_meters - 500.0).abs() < 1.0);
        assert!((splits[2].duration_seconds - 150.0).abs() < 1.0);
    }

    #[test]
    fn splits_skip_time_across_pauses() {
        let mut route = straight(11, 30);
        // a 10 minute pause before the sixth sample
        for s in route.iter_mut().skip(5) {
            s.timestamp_ms += 600_000;
        }
        let splits = compute_splits(&route, &[5], SPLIT_METERS);
        assert_eq!(splits.len(), 1);
        // 10 legs, one of them spans the pause and contributes no time
        assert!((splits[0].duration_seconds - 270.0).abs() < 1.0);
    }

    #[test]
    fn elevation_gain_ignores_descents_and_pause_gaps() {
        let route: Route = [10.0, 12.0, 11.0, 15.0, 30.0, 31.0]
            .iter()
            .enumerate()
            .map(|(i, e)| PositionSample::new(0.0, 0.0, i as i64).with_elevation(*e))
            .collect();
        assert_eq!(elevation_gain(&route, &[]), Some(22.0));
        // the jump from 15 to 30 happens across a pause
        assert_eq!(elevation_gain(&route, &[4]), Some(7.0));
        assert_eq!(elevation_gain(&route[..1], &[]), None);
    }

    #[test]
    fn gps_quality_statistics() {
        let route: Route = [4.0, 6.0]
            .iter()
            .map(|a| PositionSample::new(0.0, 0.0, 0).with_accuracy(*a))
            .collect();
        let q = GpsQuality::from_route(&route);
        assert_eq!(q.mean_accuracy_m, Some(5.0));
        assert_eq!(q.accuracy_std_dev_m, Some(1.0));
    }
}
