use serde::{Deserialize, Serialize};

/// One GPS fix as delivered by a positioning provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Capture time in milliseconds since an arbitrary, provider-defined epoch
    pub timestamp_ms: i64,
    #[serde(default)]
    pub speed_mps: Option<f64>,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    #[serde(default)]
    pub elevation_m: Option<f64>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            speed_mps: None,
            accuracy_m: None,
            elevation_m: None,
        }
    }

    pub fn with_speed(self, speed_mps: f64) -> Self {
        Self {
            speed_mps: Some(speed_mps),
            ..self
        }
    }

    pub fn with_accuracy(self, accuracy_m: f64) -> Self {
        Self {
            accuracy_m: Some(accuracy_m),
            ..self
        }
    }

    pub fn with_elevation(self, elevation_m: f64) -> Self {
        Self {
            elevation_m: Some(elevation_m),
            ..self
        }
    }

    /// Coordinates are finite and inside the WGS84 ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Ordered, append-only sequence of fixes; insertion order is temporal order.
pub type Route = Vec<PositionSample>;

/// Render-only coordinate pair used by simplified paths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<(f64, f64)> for LatLon {
    fn from(v: (f64, f64)) -> Self {
        LatLon::new(v.0, v.1)
    }
}

impl From<LatLon> for (f64, f64) {
    fn from(p: LatLon) -> Self {
        (p.latitude, p.longitude)
    }
}

impl From<&PositionSample> for LatLon {
    fn from(s: &PositionSample) -> Self {
        s.lat_lon()
    }
}
