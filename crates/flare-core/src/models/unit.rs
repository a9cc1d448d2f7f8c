//! Responder units (ambulances, fire trucks, police units).
//!
//! Units are owned by the backend; the client holds a read-through cached
//! copy refreshed each polling cycle. Position fields are written upstream
//! only through the location reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::geo::Coordinates;

/// Operational status of an ambulance or fire truck.
///
/// Police units track assignment separately and carry no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,
    EnRoute,
    OnCall,
    Maintenance,
    Offline,
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitStatus::Available => "Available",
            UnitStatus::EnRoute => "En Route",
            UnitStatus::OnCall => "On Call",
            UnitStatus::Maintenance => "Maintenance",
            UnitStatus::Offline => "Offline",
        };
        f.write_str(s)
    }
}

/// The two responder services with driver-facing booking feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderService {
    Ambulance,
    Fire,
}

impl ResponderService {
    pub fn label(&self) -> &'static str {
        match self {
            ResponderService::Ambulance => "ambulance",
            ResponderService::Fire => "fire",
        }
    }

    pub fn vehicle(&self) -> VehicleKind {
        match self {
            ResponderService::Ambulance => VehicleKind::Ambulance,
            ResponderService::Fire => VehicleKind::FireTruck,
        }
    }
}

impl std::fmt::Display for ResponderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Trackable vehicle kinds as they appear in location-map paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Ambulance,
    FireTruck,
}

impl VehicleKind {
    /// Path segment used by `GET /location-map/{vehicleType}/{requestId}`.
    pub fn as_path(&self) -> &'static str {
        match self {
            VehicleKind::Ambulance => "ambulance",
            VehicleKind::FireTruck => "fire_truck",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VehicleKind::Ambulance => "Ambulance",
            VehicleKind::FireTruck => "Fire Truck",
        }
    }
}

impl std::fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A responder unit as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderUnit {
    pub id: i64,
    #[serde(rename = "registrationNumber", default)]
    pub registration_number: String,
    #[serde(rename = "driverName", default)]
    pub driver_name: String,
    #[serde(rename = "driverPhone", default)]
    pub driver_phone: String,
    #[serde(default)]
    pub status: Option<UnitStatus>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ResponderUnit {
    /// Last reported position, if the unit has ever reported one.
    pub fn position(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&UnitStatus::EnRoute).unwrap(),
            "\"EN_ROUTE\""
        );
        let parsed: UnitStatus = serde_json::from_str("\"AVAILABLE\"").unwrap();
        assert_eq!(parsed, UnitStatus::Available);
    }

    #[test]
    fn test_unit_parses_partial_payload() {
        // Police units omit status and may not have reported yet.
        let json = r#"{"id": 12, "driverName": "A. Patil"}"#;
        let unit: ResponderUnit = serde_json::from_str(json).unwrap();
        assert_eq!(unit.id, 12);
        assert_eq!(unit.status, None);
        assert_eq!(unit.position(), None);
    }

    #[test]
    fn test_unit_position() {
        let json = r#"{"id": 3, "latitude": 18.6104, "longitude": 73.8467, "status": "EN_ROUTE"}"#;
        let unit: ResponderUnit = serde_json::from_str(json).unwrap();
        assert_eq!(unit.position(), Some(Coordinates::new(18.6104, 73.8467)));
        assert_eq!(unit.status, Some(UnitStatus::EnRoute));
    }

    #[test]
    fn test_vehicle_path_segments() {
        assert_eq!(VehicleKind::Ambulance.as_path(), "ambulance");
        assert_eq!(VehicleKind::FireTruck.as_path(), "fire_truck");
    }
}
