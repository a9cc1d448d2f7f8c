//! Route and ETA tracking against the Directions Provider.
//!
//! Given a unit position and the incident coordinate, the provider returns
//! distance/duration/geometry; the tracker keeps one estimate per tracked
//! unit, recomputing when an endpoint moves more than a small epsilon or
//! when the caller's refresh timer ticks. Estimates are derived state and
//! are never persisted.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::booking::LocationSnapshot;
use crate::models::geo::{Coordinates, MapBounds};
use crate::models::unit::VehicleKind;

/// Endpoint movement below this many degrees (~11 m) is negligible and
/// does not trigger a recompute.
pub const ROUTE_EPSILON_DEG: f64 = 1e-4;

/// Cadence for timer-driven recomputes in tracking views.
pub const ROUTE_REFRESH_INTERVAL_SECS: u64 = 15;

/// HTTP timeout for directions calls.
const DIRECTIONS_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No route found between the given points")]
    NoRoute,

    #[error("Invalid directions response: {0}")]
    InvalidResponse(String),
}

/// Raw route as returned by the provider: meters, seconds and a (lon, lat)
/// line geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Vec<(f64, f64)>,
}

/// External routing service returning distance/duration/geometry for an
/// origin-destination pair.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<ProviderRoute, ProviderError>;
}

/// Display-ready route estimate in km/minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_min: f64,
    /// Polyline for rendering only; not used for computation.
    pub geometry: Vec<(f64, f64)>,
}

impl From<ProviderRoute> for RouteEstimate {
    fn from(route: ProviderRoute) -> Self {
        Self {
            distance_km: route.distance_m / 1000.0,
            duration_min: route.duration_s / 60.0,
            geometry: route.geometry,
        }
    }
}

/// Compute a single route estimate for an origin-destination pair.
pub async fn compute_route(
    provider: &dyn DirectionsProvider,
    origin: Coordinates,
    destination: Coordinates,
) -> Result<RouteEstimate, ProviderError> {
    Ok(provider.route(origin, destination).await?.into())
}

// ============================================================================
// Mapbox directions
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<WireRoute>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    distance: f64,
    duration: f64,
    geometry: WireGeometry,
}

#[derive(Debug, Deserialize, Default)]
struct WireGeometry {
    #[serde(default)]
    coordinates: Vec<(f64, f64)>,
}

/// Directions Provider backed by the Mapbox driving profile.
#[derive(Clone)]
pub struct MapboxDirections {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MapboxDirections {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DIRECTIONS_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl DirectionsProvider for MapboxDirections {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<ProviderRoute, ProviderError> {
        // Mapbox takes lon,lat pairs.
        let url = format!(
            "{}/directions/v5/mapbox/driving/{},{};{},{}?geometries=geojson&access_token={}",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
            self.access_token,
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "directions request returned {}",
                response.status()
            )));
        }

        let parsed: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let route = parsed.routes.into_iter().next().ok_or(ProviderError::NoRoute)?;
        debug!(
            distance_m = route.distance,
            duration_s = route.duration,
            "Directions computed"
        );

        Ok(ProviderRoute {
            distance_m: route.distance,
            duration_s: route.duration,
            geometry: route.geometry.coordinates,
        })
    }
}

// ============================================================================
// Multi-unit tracking
// ============================================================================

/// One tracked unit's position and latest route estimate.
///
/// A provider failure is kept per unit and never invalidates the other
/// units' estimates.
#[derive(Debug, Clone)]
pub struct UnitRoute {
    pub vehicle: VehicleKind,
    pub unit_id: i64,
    pub position: Coordinates,
    pub estimate: Option<RouteEstimate>,
    pub error: Option<String>,
    stale: bool,
}

/// Aggregate over every successfully-routed unit, for combined display.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub total_distance_km: f64,
    pub average_duration_min: f64,
    pub vehicle_count: usize,
}

/// Tracks routes from every responding unit to one incident.
///
/// `refresh` only recomputes pairs whose endpoints actually moved (beyond
/// `ROUTE_EPSILON_DEG`) since the last computation; `mark_all_stale` forces
/// the next refresh to recompute everything, which is what the caller's
/// fixed refresh timer uses. Holding the tracker by `&mut` across a
/// refresh means a superseded position can never overwrite a newer one.
pub struct RouteTracker {
    provider: Arc<dyn DirectionsProvider>,
    incident: Coordinates,
    units: Vec<UnitRoute>,
}

impl RouteTracker {
    pub fn new(provider: Arc<dyn DirectionsProvider>, incident: Coordinates) -> Self {
        Self {
            provider,
            incident,
            units: Vec::new(),
        }
    }

    /// Build a tracker from a location-map snapshot.
    pub fn from_snapshot(provider: Arc<dyn DirectionsProvider>, snapshot: &LocationSnapshot) -> Self {
        let mut tracker = Self::new(provider, snapshot.incident);
        for unit in &snapshot.units {
            tracker.upsert_unit(unit.vehicle, unit.unit_id, unit.position);
        }
        tracker
    }

    pub fn incident(&self) -> Coordinates {
        self.incident
    }

    pub fn routes(&self) -> &[UnitRoute] {
        &self.units
    }

    /// Move the incident endpoint (a new assignment's coordinates). Every
    /// unit's route becomes stale if it actually moved.
    pub fn set_incident(&mut self, incident: Coordinates) {
        if self.incident.moved_beyond(&incident, ROUTE_EPSILON_DEG) {
            self.incident = incident;
            for unit in &mut self.units {
                unit.stale = true;
            }
        }
    }

    /// Add a unit or update its reported position. Sub-epsilon movement
    /// keeps the existing estimate.
    pub fn upsert_unit(&mut self, vehicle: VehicleKind, unit_id: i64, position: Coordinates) {
        if let Some(unit) = self
            .units
            .iter_mut()
            .find(|u| u.vehicle == vehicle && u.unit_id == unit_id)
        {
            if unit.position.moved_beyond(&position, ROUTE_EPSILON_DEG) {
                unit.position = position;
                unit.stale = true;
            }
        } else {
            self.units.push(UnitRoute {
                vehicle,
                unit_id,
                position,
                estimate: None,
                error: None,
                stale: true,
            });
        }
    }

    /// Fold a fresh location-map snapshot into the tracked state.
    pub fn apply_snapshot(&mut self, snapshot: &LocationSnapshot) {
        self.set_incident(snapshot.incident);
        for unit in &snapshot.units {
            self.upsert_unit(unit.vehicle, unit.unit_id, unit.position);
        }
    }

    /// Force every unit to recompute on the next refresh (timer tick).
    pub fn mark_all_stale(&mut self) {
        for unit in &mut self.units {
            unit.stale = true;
        }
    }

    /// Recompute stale routes, one independent provider call per unit.
    ///
    /// Returns how many units were recomputed. A failing unit gets an
    /// error state; the others keep their fresh estimates.
    pub async fn refresh(&mut self) -> usize {
        let incident = self.incident;
        let jobs: Vec<(usize, Coordinates)> = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, unit)| unit.stale || (unit.estimate.is_none() && unit.error.is_none()))
            .map(|(index, unit)| (index, unit.position))
            .collect();

        let results = futures::future::join_all(jobs.iter().map(|&(_, position)| {
            let provider = Arc::clone(&self.provider);
            async move { provider.route(position, incident).await }
        }))
        .await;

        for (&(index, _), result) in jobs.iter().zip(results) {
            let unit = &mut self.units[index];
            unit.stale = false;
            match result {
                Ok(route) => {
                    unit.estimate = Some(route.into());
                    unit.error = None;
                }
                Err(e) => {
                    warn!(
                        unit_id = unit.unit_id,
                        vehicle = %unit.vehicle,
                        error = %e,
                        "Route computation failed"
                    );
                    unit.estimate = None;
                    unit.error = Some(e.to_string());
                }
            }
        }

        jobs.len()
    }

    /// Combined figures across all units with a current estimate.
    pub fn summary(&self) -> Option<RouteSummary> {
        let estimates: Vec<&RouteEstimate> = self
            .units
            .iter()
            .filter_map(|unit| unit.estimate.as_ref())
            .collect();
        if estimates.is_empty() {
            return None;
        }

        let total_distance_km = estimates.iter().map(|e| e.distance_km).sum();
        let total_duration: f64 = estimates.iter().map(|e| e.duration_min).sum();
        Some(RouteSummary {
            total_distance_km,
            average_duration_min: total_duration / estimates.len() as f64,
            vehicle_count: estimates.len(),
        })
    }

    /// Bounds covering the incident, every unit and every point of every
    /// computed route geometry.
    pub fn map_bounds(&self) -> MapBounds {
        let mut bounds = MapBounds::new();
        bounds.extend(self.incident);
        for unit in &self.units {
            bounds.extend(unit.position);
            if let Some(estimate) = &unit.estimate {
                for &(lon, lat) in &estimate.geometry {
                    bounds.extend_lon_lat(lon, lat);
                }
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same route for every pair, counting calls.
    struct FixedProvider {
        distance_m: f64,
        duration_s: f64,
        geometry: Vec<(f64, f64)>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(distance_m: f64, duration_s: f64) -> Self {
            Self {
                distance_m,
                duration_s,
                geometry: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DirectionsProvider for FixedProvider {
        async fn route(
            &self,
            origin: Coordinates,
            destination: Coordinates,
        ) -> Result<ProviderRoute, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut geometry = vec![(origin.longitude, origin.latitude)];
            geometry.extend(self.geometry.iter().copied());
            geometry.push((destination.longitude, destination.latitude));
            Ok(ProviderRoute {
                distance_m: self.distance_m,
                duration_s: self.duration_s,
                geometry,
            })
        }
    }

    /// Routes only origins it knows about; everything else has no route.
    struct TableProvider {
        entries: Vec<(Coordinates, ProviderRoute)>,
    }

    #[async_trait]
    impl DirectionsProvider for TableProvider {
        async fn route(
            &self,
            origin: Coordinates,
            _destination: Coordinates,
        ) -> Result<ProviderRoute, ProviderError> {
            self.entries
                .iter()
                .find(|(known, _)| !known.moved_beyond(&origin, 1e-9))
                .map(|(_, route)| Ok(route.clone()))
                .unwrap_or(Err(ProviderError::NoRoute))
        }
    }

    fn route(distance_m: f64, duration_s: f64) -> ProviderRoute {
        ProviderRoute {
            distance_m,
            duration_s,
            geometry: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_compute_route_converts_units() {
        let provider = FixedProvider::new(1500.0, 300.0);
        let estimate = compute_route(
            &provider,
            Coordinates::new(18.5204, 73.8567),
            Coordinates::new(18.5310, 73.8446),
        )
        .await
        .unwrap();

        assert_eq!(estimate.distance_km, 1.5);
        assert_eq!(estimate.duration_min, 5.0);
    }

    #[tokio::test]
    async fn test_refresh_computes_one_estimate_per_unit() {
        let ambulance_pos = Coordinates::new(18.6104, 73.8467);
        let truck_pos = Coordinates::new(18.506, 73.809);
        let provider = Arc::new(TableProvider {
            entries: vec![
                (ambulance_pos, route(1500.0, 300.0)),
                (truck_pos, route(2500.0, 600.0)),
            ],
        });

        let mut tracker = RouteTracker::new(provider, Coordinates::new(18.5104, 73.8467));
        tracker.upsert_unit(VehicleKind::Ambulance, 3, ambulance_pos);
        tracker.upsert_unit(VehicleKind::FireTruck, 7, truck_pos);

        assert_eq!(tracker.refresh().await, 2);

        let summary = tracker.summary().unwrap();
        assert_eq!(summary.vehicle_count, 2);
        assert!((summary.total_distance_km - 4.0).abs() < 1e-9);
        assert!((summary.average_duration_min - 7.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_provider_failure_is_isolated_per_unit() {
        let ambulance_pos = Coordinates::new(18.6104, 73.8467);
        let stranded_pos = Coordinates::new(10.0, 10.0);
        let provider = Arc::new(TableProvider {
            entries: vec![(ambulance_pos, route(1500.0, 300.0))],
        });

        let mut tracker = RouteTracker::new(provider, Coordinates::new(18.5104, 73.8467));
        tracker.upsert_unit(VehicleKind::Ambulance, 3, ambulance_pos);
        tracker.upsert_unit(VehicleKind::FireTruck, 7, stranded_pos);
        tracker.refresh().await;

        let routes = tracker.routes();
        assert!(routes[0].estimate.is_some());
        assert!(routes[0].error.is_none());
        assert!(routes[1].estimate.is_none());
        assert!(routes[1].error.is_some());

        // The aggregate only covers the routed unit.
        let summary = tracker.summary().unwrap();
        assert_eq!(summary.vehicle_count, 1);
        assert_eq!(summary.total_distance_km, 1.5);
    }

    #[tokio::test]
    async fn test_sub_epsilon_movement_skips_recompute() {
        let provider = Arc::new(FixedProvider::new(1500.0, 300.0));
        let position = Coordinates::new(18.6104, 73.8467);

        let mut tracker = RouteTracker::new(provider.clone(), Coordinates::new(18.5104, 73.8467));
        tracker.upsert_unit(VehicleKind::Ambulance, 3, position);
        tracker.refresh().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // A wiggle below the epsilon leaves the estimate alone.
        tracker.upsert_unit(
            VehicleKind::Ambulance,
            3,
            Coordinates::new(18.610401, 73.846701),
        );
        assert_eq!(tracker.refresh().await, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // A real move recomputes.
        tracker.upsert_unit(VehicleKind::Ambulance, 3, Coordinates::new(18.62, 73.85));
        assert_eq!(tracker.refresh().await, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_incident_move_marks_everything_stale() {
        let provider = Arc::new(FixedProvider::new(1500.0, 300.0));
        let mut tracker = RouteTracker::new(provider.clone(), Coordinates::new(18.5104, 73.8467));
        tracker.upsert_unit(VehicleKind::Ambulance, 3, Coordinates::new(18.61, 73.84));
        tracker.upsert_unit(VehicleKind::FireTruck, 7, Coordinates::new(18.50, 73.80));
        tracker.refresh().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        tracker.set_incident(Coordinates::new(18.5404, 73.8467));
        assert_eq!(tracker.refresh().await, 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timer_tick_refreshes_all() {
        let provider = Arc::new(FixedProvider::new(1500.0, 300.0));
        let mut tracker = RouteTracker::new(provider.clone(), Coordinates::new(18.5104, 73.8467));
        tracker.upsert_unit(VehicleKind::Ambulance, 3, Coordinates::new(18.61, 73.84));
        tracker.refresh().await;

        tracker.mark_all_stale();
        assert_eq!(tracker.refresh().await, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_map_bounds_cover_geometry() {
        let mut provider = FixedProvider::new(1500.0, 300.0);
        // Route vertex well outside the endpoints box.
        provider.geometry = vec![(73.90, 18.45)];
        let provider = Arc::new(provider);

        let incident = Coordinates::new(18.5104, 73.8467);
        let mut tracker = RouteTracker::new(provider, incident);
        tracker.upsert_unit(VehicleKind::Ambulance, 3, Coordinates::new(18.6104, 73.8467));
        tracker.refresh().await;

        let bounds = tracker.map_bounds();
        assert!(bounds.contains(incident));
        assert!(bounds.contains(Coordinates::new(18.6104, 73.8467)));
        assert!(bounds.contains(Coordinates::new(18.45, 73.90)));
    }
}
