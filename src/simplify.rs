use crate::sample::{LatLon, PositionSample};
use serde::{Deserialize, Serialize};

/// Roughly three meters at mid latitudes
pub const DEFAULT_TOLERANCE_DEG: f64 = 3e-5;

/// Routes at or below this many points are drawn as recorded
pub const DEFAULT_MIN_POINTS: usize = 200;

pub type SimplifiedPath = Vec<LatLon>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    pub tolerance_deg: f64,
    pub min_points: usize,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            tolerance_deg: DEFAULT_TOLERANCE_DEG,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

/// Planar distance from `p` to the segment `a`-`b`, in degrees
fn segment_distance(p: LatLon, a: LatLon, b: LatLon) -> f64 {
    let (px, py) = (p.longitude, p.latitude);
    let (ax, ay) = (a.longitude, a.latitude);
    let (dx, dy) = (b.longitude - ax, b.latitude - ay);

    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Reduce `points` so every dropped point lies within `tolerance` of the kept chord.
///
/// Uses an explicit stack so very long routes cannot exhaust the call stack.
pub fn douglas_peucker(points: &[LatLon], tolerance: f64) -> Vec<LatLon> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let (mut max_dist, mut split) = (0.0_f64, first);
        for i in first + 1..last {
            let d = segment_distance(points[i], points[first], points[last]);
            if d > max_dist {
                max_dist = d;
                split = i;
            }
        }

        if max_dist > tolerance {
            keep[split] = true;
            stack.push((first, split));
            stack.push((split, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Drawable path for a route, simplified only once it grows past `min_points`.
pub fn simplified_path(route: &[PositionSample], opts: &SimplifyOptions) -> SimplifiedPath {
    let points: Vec<LatLon> = route.iter().map(LatLon::from).collect();
    if points.len() <= opts.min_points {
        return points;
    }
    douglas_peucker(&points, opts.tolerance_deg)
}

/// Memoised [`simplified_path`], recomputed when the route or options change.
///
/// Routes only ever grow within a session, so `(generation, len)` identifies
/// a route version.
#[derive(Debug, Default)]
pub struct PathCache {
    key: Option<(u64, usize, u64, usize)>,
    path: SimplifiedPath,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        generation: u64,
        route: &[PositionSample],
        opts: &SimplifyOptions,
    ) -> &SimplifiedPath {
        let key = (
            generation,
            route.len(),
            opts.tolerance_deg.to_bits(),
            opts.min_points,
        );
        if self.key != Some(key) {
            self.path = simplified_path(route, opts);
            self.key = Some(key);
        }
        &self.path
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.path.clear();
    }
}
