//! API client for the dispatch backend.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against the emergency-dispatch REST backend: submitting
//! requests, mirroring booking state, driver completion, location updates
//! and the location-map used by the tracking views.
//!
//! Wire payloads use each service's own field naming (`ambulanceId`,
//! `truckId`); the internal types normalize to one shape and the renames
//! live only in the serde DTOs here.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Role, SessionData};
use crate::location::LocationReport;
use crate::models::{
    Booking, BookingReceipt, CurrentAssignment, EmergencyRequest, LocationSnapshot, ResponderService,
    ResponderUnit, SnapshotUnit, UnitStatus, VehicleKind,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow backend responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Endpoint paths (per-service variants of the same operation)
// ============================================================================

fn bookings_path(service: ResponderService) -> &'static str {
    match service {
        ResponderService::Ambulance => "/booking/ambulance",
        ResponderService::Fire => "/booking/fire",
    }
}

fn current_request_path(service: ResponderService) -> &'static str {
    match service {
        ResponderService::Ambulance => "/ambulance-driver/v1/get/current-request/location",
        ResponderService::Fire => "/fire/truck-driver/v1/current-request",
    }
}

fn complete_booking_path(service: ResponderService) -> &'static str {
    match service {
        ResponderService::Ambulance => "/ambulance-driver/v1/complete-booking",
        ResponderService::Fire => "/fire/truck-driver/v1/complete-booking",
    }
}

fn report_location_path(service: ResponderService) -> &'static str {
    match service {
        ResponderService::Ambulance => "/ambulance/location-update",
        ResponderService::Fire => "/fire/truck-driver/v1/update-location",
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct LoginRequestBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(alias = "jwt", alias = "accessToken")]
    token: String,
    #[serde(rename = "userId", default)]
    user_id: i64,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Serialize)]
struct BookingRequestBody<'a> {
    latitude: f64,
    longitude: f64,
    #[serde(rename = "issueType")]
    issue_type: &'a str,
    notes: &'a str,
    #[serde(rename = "needAmbulance")]
    need_ambulance: bool,
    #[serde(rename = "requestedAmbulanceCount")]
    requested_ambulance_count: u32,
    #[serde(rename = "needPolice")]
    need_police: bool,
    #[serde(rename = "requestedPoliceCount")]
    requested_police_count: u32,
    #[serde(rename = "needFireBrigade")]
    need_fire_brigade: bool,
    #[serde(rename = "requestedFireTruckCount")]
    requested_fire_truck_count: u32,
    #[serde(rename = "isForSelf")]
    is_for_self: bool,
    #[serde(rename = "victimPhoneNumber")]
    victim_phone_number: &'a str,
}

impl<'a> BookingRequestBody<'a> {
    fn from_request(request: &'a EmergencyRequest) -> Self {
        let pickup = request.pickup();
        let ambulance = request.ask(crate::models::ServiceKind::Ambulance);
        let police = request.ask(crate::models::ServiceKind::Police);
        let fire = request.ask(crate::models::ServiceKind::Fire);
        Self {
            latitude: pickup.latitude,
            longitude: pickup.longitude,
            issue_type: request.issue_type(),
            notes: request.notes().unwrap_or(""),
            need_ambulance: ambulance.needed,
            requested_ambulance_count: ambulance.requested_count,
            need_police: police.needed,
            requested_police_count: police.requested_count,
            need_fire_brigade: fire.needed,
            requested_fire_truck_count: fire.requested_count,
            is_for_self: request.is_for_self(),
            victim_phone_number: request.victim_phone_number().unwrap_or(""),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompleteBookingBody {
    #[serde(rename = "bookingId", skip_serializing_if = "Option::is_none")]
    booking_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AmbulanceLocationUpdate {
    #[serde(rename = "ambulanceId")]
    ambulance_id: i64,
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<UnitStatus>,
}

#[derive(Debug, Serialize)]
struct TruckLocationUpdate {
    #[serde(rename = "truckId")]
    truck_id: i64,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PointRecord {
    #[serde(default)]
    id: i64,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize, Default)]
struct LocationMapResponse {
    #[serde(rename = "emergencyRequest")]
    emergency_request: Option<PointRecord>,
    #[serde(default)]
    ambulance: Option<PointRecord>,
    #[serde(rename = "fireTruck", default)]
    fire_truck: Option<PointRecord>,
}

/// Merge one or more location-map responses into a single snapshot.
/// The incident point comes from whichever response carries it.
fn snapshot_from_responses(
    request_id: i64,
    responses: &[LocationMapResponse],
) -> Result<LocationSnapshot, ApiError> {
    let incident = responses
        .iter()
        .find_map(|r| r.emergency_request)
        .ok_or_else(|| {
            ApiError::InvalidResponse("location map carried no emergency request point".to_string())
        })?;

    let mut units = Vec::new();
    for response in responses {
        if let Some(point) = response.ambulance {
            units.push(SnapshotUnit {
                vehicle: VehicleKind::Ambulance,
                unit_id: point.id,
                position: crate::models::Coordinates::new(point.latitude, point.longitude),
            });
        }
        if let Some(point) = response.fire_truck {
            units.push(SnapshotUnit {
                vehicle: VehicleKind::FireTruck,
                unit_id: point.id,
                position: crate::models::Coordinates::new(point.latitude, point.longitude),
            });
        }
    }

    Ok(LocationSnapshot {
        request_id,
        incident: crate::models::Coordinates::new(incident.latitude, incident.longitude),
        units,
    })
}

// ============================================================================
// Client
// ============================================================================

/// API client for the dispatch backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer headers for an authenticated call.
    ///
    /// A missing token is a precondition failure: it short-circuits here,
    /// before any network I/O happens.
    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let token = self.token.as_ref().ok_or(ApiError::AuthenticationMissing)?;
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::InvalidResponse(format!("invalid token header: {}", e)))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send POST request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Authentication =====

    /// Authenticate against the backend and return session data.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = self.url("/auth/login");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequestBody { email, password })
            .send()
            .await
            .context("Failed to send login request")?;

        let response = Self::check_response(response).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;

        Ok(SessionData {
            token: auth.token,
            user_id: auth.user_id,
            role: auth.role.as_deref().map(Role::from).unwrap_or_default(),
            username: email.to_string(),
            created_at: Utc::now(),
        })
    }

    // ===== Emergency requests =====

    /// Submit a validated emergency request.
    pub async fn submit_request(&self, request: &EmergencyRequest) -> Result<BookingReceipt> {
        let body = BookingRequestBody::from_request(request);
        let receipt: BookingReceipt = self.post("/booking/request", &body).await?;
        debug!(booking_id = receipt.booking_id, "Emergency request accepted");
        Ok(receipt)
    }

    /// Fetch the bookings visible to a responder service, used to mirror
    /// dispatch state client-side.
    pub async fn bookings(&self, service: ResponderService) -> Result<Vec<Booking>> {
        let url = self.url(bookings_path(service));
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} bookings", service))?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;

        // Try to parse as array directly first, then as wrapped object
        if let Ok(bookings) = serde_json::from_str::<Vec<Booking>>(&text) {
            return Ok(bookings);
        }

        #[derive(Deserialize)]
        struct BookingsWrapper {
            #[serde(default)]
            bookings: Vec<Booking>,
            #[serde(default)]
            data: Vec<Booking>,
        }

        if let Ok(wrapper) = serde_json::from_str::<BookingsWrapper>(&text) {
            if !wrapper.bookings.is_empty() {
                return Ok(wrapper.bookings);
            }
            if !wrapper.data.is_empty() {
                return Ok(wrapper.data);
            }
        }

        warn!(service = %service, "Failed to parse bookings response");
        Ok(vec![])
    }

    /// Fetch the authenticated driver's active assignment location.
    pub async fn current_assignment(&self, service: ResponderService) -> Result<CurrentAssignment> {
        self.get(current_request_path(service)).await
    }

    /// Driver-initiated completion of the active booking.
    ///
    /// The caller must only treat the booking as completed when this
    /// returns `Ok`; there is no automatic retry on failure.
    pub async fn complete_booking(
        &self,
        service: ResponderService,
        booking_id: Option<i64>,
    ) -> Result<()> {
        let url = self.url(complete_booking_path(service));
        let response = self
            .client
            .patch(&url)
            .headers(self.auth_headers()?)
            .json(&CompleteBookingBody { booking_id })
            .send()
            .await
            .with_context(|| format!("Failed to send completion request to {}", url))?;

        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Live location =====

    /// Report a unit position upstream, using the service's wire shape.
    pub async fn report_location(
        &self,
        service: ResponderService,
        report: &LocationReport,
    ) -> Result<(), ApiError> {
        let url = self.url(report_location_path(service));
        let request = self.client.post(&url).headers(self.auth_headers()?);

        let request = match service {
            ResponderService::Ambulance => request.json(&AmbulanceLocationUpdate {
                ambulance_id: report.unit_id,
                latitude: report.coordinates.latitude,
                longitude: report.coordinates.longitude,
                status: report.status,
            }),
            ResponderService::Fire => request.json(&TruckLocationUpdate {
                truck_id: report.unit_id,
                latitude: report.coordinates.latitude,
                longitude: report.coordinates.longitude,
            }),
        };

        let response = request.send().await?;
        Self::check_response(response).await?;
        debug!(unit_id = report.unit_id, service = %service, "Reported unit location");
        Ok(())
    }

    /// Fetch one unit's last reported location.
    pub async fn unit_location(&self, unit_id: i64) -> Result<ResponderUnit> {
        self.get(&format!("/ambulance/location/{}", unit_id)).await
    }

    async fn location_map_raw(
        &self,
        vehicle: VehicleKind,
        request_id: i64,
    ) -> Result<LocationMapResponse> {
        self.get(&format!("/location-map/{}/{}", vehicle.as_path(), request_id))
            .await
    }

    /// Fetch incident + unit coordinates for one vehicle kind.
    pub async fn location_map(
        &self,
        vehicle: VehicleKind,
        request_id: i64,
    ) -> Result<LocationSnapshot> {
        let response = self.location_map_raw(vehicle, request_id).await?;
        Ok(snapshot_from_responses(request_id, &[response])?)
    }

    /// Fetch incident + unit coordinates for every trackable vehicle kind
    /// at once. A vehicle kind without data for this request is skipped;
    /// the call only fails when no kind yields anything.
    pub async fn location_map_all(&self, request_id: i64) -> Result<LocationSnapshot> {
        let (ambulance, fire) = tokio::join!(
            self.location_map_raw(VehicleKind::Ambulance, request_id),
            self.location_map_raw(VehicleKind::FireTruck, request_id),
        );

        let mut responses = Vec::new();
        let mut first_error = None;
        for result in [ambulance, fire] {
            match result {
                Ok(response) => responses.push(response),
                Err(e) => {
                    warn!(request_id, error = %e, "Location map fetch failed for one vehicle kind");
                    first_error.get_or_insert(e);
                }
            }
        }

        if responses.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| anyhow::anyhow!("no location data for request {}", request_id)));
        }

        Ok(snapshot_from_responses(request_id, &responses)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestDraft;

    #[test]
    fn test_per_service_paths() {
        assert_eq!(bookings_path(ResponderService::Ambulance), "/booking/ambulance");
        assert_eq!(bookings_path(ResponderService::Fire), "/booking/fire");
        assert_eq!(
            complete_booking_path(ResponderService::Fire),
            "/fire/truck-driver/v1/complete-booking"
        );
        assert_eq!(
            report_location_path(ResponderService::Ambulance),
            "/ambulance/location-update"
        );
        assert_eq!(
            current_request_path(ResponderService::Ambulance),
            "/ambulance-driver/v1/get/current-request/location"
        );
    }

    #[test]
    fn test_booking_request_wire_shape() {
        let draft = RequestDraft {
            latitude: "18.52".to_string(),
            longitude: "73.85".to_string(),
            issue_type: "Cardiac arrest".to_string(),
            need_ambulance: true,
            requested_ambulance_count: 1,
            is_for_self: true,
            ..RequestDraft::default()
        };
        let request = draft.build().unwrap();
        let body = BookingRequestBody::from_request(&request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["latitude"], 18.52);
        assert_eq!(json["issueType"], "Cardiac arrest");
        assert_eq!(json["needAmbulance"], true);
        assert_eq!(json["requestedAmbulanceCount"], 1);
        // Not-needed services go out with zeroed counts.
        assert_eq!(json["requestedPoliceCount"], 0);
        assert_eq!(json["isForSelf"], true);
        assert_eq!(json["victimPhoneNumber"], "");
    }

    #[test]
    fn test_location_update_wire_shapes_differ_per_service() {
        let ambulance = AmbulanceLocationUpdate {
            ambulance_id: 3,
            latitude: 18.6,
            longitude: 73.8,
            status: Some(UnitStatus::EnRoute),
        };
        let json = serde_json::to_value(&ambulance).unwrap();
        assert_eq!(json["ambulanceId"], 3);
        assert_eq!(json["status"], "EN_ROUTE");

        let truck = TruckLocationUpdate {
            truck_id: 9,
            latitude: 18.5,
            longitude: 73.8,
        };
        let json = serde_json::to_value(&truck).unwrap();
        assert_eq!(json["truckId"], 9);
        assert!(json.get("status").is_none());
    }

    #[test]
    fn test_snapshot_merges_vehicle_kinds() {
        let ambulance: LocationMapResponse = serde_json::from_str(
            r#"{
                "emergencyRequest": {"id": 42, "latitude": 18.5104, "longitude": 73.8467},
                "ambulance": {"id": 3, "latitude": 18.6104, "longitude": 73.8467}
            }"#,
        )
        .unwrap();
        let fire: LocationMapResponse = serde_json::from_str(
            r#"{
                "emergencyRequest": {"id": 42, "latitude": 18.5104, "longitude": 73.8467},
                "fireTruck": {"id": 7, "latitude": 18.506, "longitude": 73.809}
            }"#,
        )
        .unwrap();

        let snapshot = snapshot_from_responses(42, &[ambulance, fire]).unwrap();
        assert_eq!(snapshot.request_id, 42);
        assert_eq!(snapshot.units.len(), 2);
        assert_eq!(snapshot.units[0].vehicle, VehicleKind::Ambulance);
        assert_eq!(snapshot.units[1].vehicle, VehicleKind::FireTruck);
    }

    #[test]
    fn test_snapshot_requires_incident_point() {
        let response = LocationMapResponse::default();
        assert!(snapshot_from_responses(1, &[response]).is_err());
    }

    #[test]
    fn test_missing_token_short_circuits() {
        let client = ApiClient::new("http://localhost:8080").unwrap();
        let err = client.auth_headers().unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationMissing));
    }
}
