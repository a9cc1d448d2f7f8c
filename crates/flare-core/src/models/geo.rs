//! Geographic primitives shared across the tracking stack.

use serde::{Deserialize, Serialize};

/// A WGS84 position. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both components are inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// True when either component differs from `other` by more than
    /// `epsilon_deg`. Used to decide whether a route is worth recomputing.
    pub fn moved_beyond(&self, other: &Coordinates, epsilon_deg: f64) -> bool {
        (self.latitude - other.latitude).abs() > epsilon_deg
            || (self.longitude - other.longitude).abs() > epsilon_deg
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Accumulating bounding box for fitting a map view.
///
/// Starts empty; `extend` grows it to include each point. The rendered
/// region must cover the incident, every tracked unit, and every point of
/// every route geometry, so callers feed all of those through here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MapBounds {
    bounds: Option<(Coordinates, Coordinates)>,
}

impl MapBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// Grow the bounds to include `point`.
    pub fn extend(&mut self, point: Coordinates) {
        match &mut self.bounds {
            None => self.bounds = Some((point, point)),
            Some((sw, ne)) => {
                sw.latitude = sw.latitude.min(point.latitude);
                sw.longitude = sw.longitude.min(point.longitude);
                ne.latitude = ne.latitude.max(point.latitude);
                ne.longitude = ne.longitude.max(point.longitude);
            }
        }
    }

    /// Grow the bounds to include a (lon, lat) geometry vertex.
    pub fn extend_lon_lat(&mut self, lon: f64, lat: f64) {
        self.extend(Coordinates::new(lat, lon));
    }

    pub fn south_west(&self) -> Option<Coordinates> {
        self.bounds.map(|(sw, _)| sw)
    }

    pub fn north_east(&self) -> Option<Coordinates> {
        self.bounds.map(|(_, ne)| ne)
    }

    pub fn center(&self) -> Option<Coordinates> {
        self.bounds.map(|(sw, ne)| {
            Coordinates::new(
                (sw.latitude + ne.latitude) / 2.0,
                (sw.longitude + ne.longitude) / 2.0,
            )
        })
    }

    /// True when `point` lies inside (or on the edge of) the bounds.
    pub fn contains(&self, point: Coordinates) -> bool {
        match self.bounds {
            None => false,
            Some((sw, ne)) => {
                (sw.latitude..=ne.latitude).contains(&point.latitude)
                    && (sw.longitude..=ne.longitude).contains(&point.longitude)
            }
        }
    }
}
