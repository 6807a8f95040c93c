use crate::sample::PositionSample;
use itertools::Itertools;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Number of trailing samples used for the instantaneous pace
pub const DEFAULT_PACE_WINDOW: usize = 5;

/// Fastest pace we believe a human produces; anything quicker is GPS noise
pub const MIN_PLAUSIBLE_PACE_S_PER_KM: f64 = 30.0;

/// Slowest pace still treated as moving
pub const MAX_PLAUSIBLE_PACE_S_PER_KM: f64 = 1800.0;

/// Rendered in place of a pace that cannot be shown meaningfully
pub const PACE_UNAVAILABLE: &str = "--:--";

/// Haversine distance between two coordinates in meters
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // clamp guards against a > 1 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

pub fn distance_between(a: &PositionSample, b: &PositionSample) -> f64 {
    distance_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Sum of pairwise distances over consecutive samples
pub fn total_distance(samples: &[PositionSample]) -> f64 {
    samples
        .iter()
        .tuple_windows()
        .map(|(a, b)| distance_between(a, b))
        .sum()
}

/// Pace in seconds per kilometer over the last `window` samples.
///
/// Returns `0.0` when the window holds fewer than two samples, covers no
/// distance, or no time has passed between its first and last fix.
pub fn current_pace(samples: &[PositionSample], window: usize) -> f64 {
    let start = samples.len().saturating_sub(window);
    let windowed = &samples[start..];

    if windowed.len() < 2 {
        return 0.0;
    }

    let distance = total_distance(windowed);
    if distance == 0.0 {
        return 0.0;
    }

    let (first, last) = (windowed[0], windowed[windowed.len() - 1]);
    let elapsed_secs = (last.timestamp_ms - first.timestamp_ms) as f64 / 1000.0;
    if elapsed_secs <= 0.0 {
        return 0.0;
    }

    elapsed_secs / (distance / 1000.0)
}

/// Convert a speed in m/s to seconds per kilometer, `0.0` when not moving.
pub fn speed_to_pace(meters_per_second: f64) -> f64 {
    if meters_per_second.is_finite() && meters_per_second > 0.0 {
        1000.0 / meters_per_second
    } else {
        0.0
    }
}

pub fn is_plausible_pace(seconds_per_km: f64) -> bool {
    seconds_per_km.is_finite()
        && (MIN_PLAUSIBLE_PACE_S_PER_KM..=MAX_PLAUSIBLE_PACE_S_PER_KM).contains(&seconds_per_km)
}

/// Render a pace as `M:SS`, or [`PACE_UNAVAILABLE`] outside the plausible band.
pub fn format_pace(seconds_per_km: f64) -> String {
    if !is_plausible_pace(seconds_per_km) {
        return PACE_UNAVAILABLE.to_string();
    }

    // round the whole value first so the seconds part can never be 60
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Inverse of [`format_pace`] for well-formed `M:SS` strings
pub fn parse_pace(text: &str) -> Option<f64> {
    let (mins, secs) = text.split_once(':')?;
    let mins: u64 = mins.parse().ok()?;
    let secs: u64 = secs.parse().ok()?;
    if secs >= 60 || text.split_once(':')?.1.len() != 2 {
        return None;
    }
    Some((mins * 60 + secs) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64, ts: i64) -> PositionSample {
        PositionSample::new(lat, lon, ts)
    }

    #[test]
    fn coincident_points_are_zero() {
        for &(lat, lon) in &[(0.0, 0.0), (40.7128, -74.006), (-33.86, 151.2), (89.9, 179.9)] {
            assert_eq!(distance_meters(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn continental_distance_nyc_to_la() {
        let d = distance_meters(40.7128, -74.0060, 34.0522, -118.2437);
        let expected = 3.94e6;
        assert!((d - expected).abs() / expected < 0.015, "got {d}");
    }

    #[test]
    fn short_distance_is_accurate() {
        // one thousandth of a degree of latitude is ~111.2 m
        let d = distance_meters(51.5, -0.12, 51.501, -0.12);
        assert!((d - 111.19).abs() / 111.19 < 0.03, "got {d}");
    }

    #[test]
    fn total_distance_of_short_routes_is_zero() {
        assert_eq!(total_distance(&[]), 0.0);
        assert_eq!(total_distance(&[sample(1.0, 1.0, 0)]), 0.0);
    }

    #[test]
    fn total_distance_sums_legs() {
        let route = [
            sample(0.0, 0.0, 0),
            sample(0.0, 0.001, 1_000),
            sample(0.0, 0.002, 2_000),
        ];
        let leg = distance_meters(0.0, 0.0, 0.0, 0.001);
        assert!((total_distance(&route) - 2.0 * leg).abs() < 1e-6);
    }

    #[test]
    fn pace_needs_two_samples() {
        assert_eq!(current_pace(&[], DEFAULT_PACE_WINDOW), 0.0);
        assert_eq!(current_pace(&[sample(0.0, 0.0, 0)], DEFAULT_PACE_WINDOW), 0.0);
    }

    #[test]
    fn stationary_window_has_zero_pace() {
        let route = [sample(1.0, 1.0, 0), sample(1.0, 1.0, 5_000), sample(1.0, 1.0, 10_000)];
        let pace = current_pace(&route, DEFAULT_PACE_WINDOW);
        assert_eq!(pace, 0.0);
        assert!(pace.is_finite());
    }

    #[test]
    fn pace_uses_only_the_trailing_window() {
        // a slow first leg followed by four fast legs
        let mut route = vec![sample(0.0, 0.0, 0)];
        let step = 0.0009; // ~100 m at the equator
        route.push(sample(0.0, step, 600_000));
        for i in 2..6 {
            route.push(sample(0.0, step * i as f64, 600_000 + (i as i64 - 1) * 30_000));
        }

        let window = &route[route.len() - 5..];
        let expected = 120.0 / (total_distance(window) / 1000.0);
        let pace = current_pace(&route, 5);
        assert!((pace - expected).abs() < 1e-9);
        assert!(pace < 400.0);
    }

    #[test]
    fn format_pace_examples() {
        assert_eq!(format_pace(359.7), "6:00");
        assert_eq!(format_pace(300.0), "5:00");
        assert_eq!(format_pace(305.4), "5:05");
        assert_eq!(format_pace(59.5), "1:00");
    }

    #[test]
    fn format_pace_band_edges() {
        assert_eq!(format_pace(30.0), "0:30");
        assert_eq!(format_pace(1800.0), "30:00");
        assert_eq!(format_pace(29.99), PACE_UNAVAILABLE);
        assert_eq!(format_pace(1800.01), PACE_UNAVAILABLE);
        assert_eq!(format_pace(0.0), PACE_UNAVAILABLE);
        assert_eq!(format_pace(-5.0), PACE_UNAVAILABLE);
        assert_eq!(format_pace(f64::NAN), PACE_UNAVAILABLE);
        assert_eq!(format_pace(f64::INFINITY), PACE_UNAVAILABLE);
    }

    #[test]
    fn formatted_pace_never_shows_sixty_seconds() {
        let mut pace = 30.0;
        while pace <= 1800.0 {
            let text = format_pace(pace);
            let secs = text.split(':').nth(1).unwrap();
            assert_ne!(secs, "60", "{pace} -> {text}");

            // re-formatting the decoded value yields the same string
            let decoded = parse_pace(&text).unwrap();
            assert_eq!(format_pace(decoded), text);
            pace += 0.37;
        }
    }

    #[test]
    fn parse_pace_rejects_garbage() {
        assert_eq!(parse_pace("5:07"), Some(307.0));
        assert_eq!(parse_pace("5:60"), None);
        assert_eq!(parse_pace("5:7"), None);
        assert_eq!(parse_pace(PACE_UNAVAILABLE), None);
        assert_eq!(parse_pace("abc"), None);
    }

    #[test]
    fn speed_to_pace_handles_standstill() {
        assert_eq!(speed_to_pace(0.0), 0.0);
        assert_eq!(speed_to_pace(-1.0), 0.0);
        assert!((speed_to_pace(4.0) - 250.0).abs() < 1e-9);
    }
}
