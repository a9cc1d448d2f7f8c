//! Booking/assignment records mirrored from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::BookingStatus;
use crate::models::geo::Coordinates;
use crate::models::unit::VehicleKind;

/// One emergency request's fulfillment record, created when the backend
/// accepts a request. Terminal statuses accept no further mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "bookingId", alias = "id")]
    pub booking_id: i64,
    #[serde(rename = "requestedByUserId", default)]
    pub requested_by_user_id: i64,
    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(rename = "pickupLatitude")]
    pub pickup_latitude: f64,
    #[serde(rename = "pickupLongitude")]
    pub pickup_longitude: f64,
    #[serde(rename = "issueType", default)]
    pub issue_type: String,
    #[serde(rename = "isForSelf", default)]
    pub is_for_self: bool,
    #[serde(rename = "victimPhoneNumber", default)]
    pub victim_phone_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Booking {
    pub fn pickup(&self) -> Coordinates {
        Coordinates::new(self.pickup_latitude, self.pickup_longitude)
    }
}

/// Identity returned by the backend when it accepts a request.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BookingReceipt {
    #[serde(rename = "bookingId", alias = "id")]
    pub booking_id: i64,
    #[serde(default = "BookingReceipt::initial_status")]
    pub status: BookingStatus,
}

impl BookingReceipt {
    fn initial_status() -> BookingStatus {
        BookingStatus::Pending
    }
}

/// The active assignment's incident location for an authenticated driver.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CurrentAssignment {
    #[serde(rename = "bookingId", alias = "id", default)]
    pub booking_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
}

impl CurrentAssignment {
    pub fn incident(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Incident plus tracked-unit positions for one request, as served by the
/// location-map endpoint (possibly merged across vehicle kinds).
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSnapshot {
    pub request_id: i64,
    pub incident: Coordinates,
    pub units: Vec<SnapshotUnit>,
}

/// One vehicle position within a `LocationSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotUnit {
    pub vehicle: VehicleKind,
    pub unit_id: i64,
    pub position: Coordinates,
}
