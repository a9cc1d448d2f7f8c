//! The citizen-submitted emergency request.
//!
//! A `RequestDraft` mirrors the form state a dashboard collects; `build`
//! turns it into an immutable, validated `EmergencyRequest` ready for
//! submission. The backend assigns identity (`bookingId`) and owns every
//! mutation after that point.

use serde::{Deserialize, Serialize};

use crate::models::geo::Coordinates;
use crate::validation::{self, ValidationErrors};

/// The three dispatchable services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceKind {
    Ambulance,
    Police,
    Fire,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Ambulance, ServiceKind::Police, ServiceKind::Fire];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Ambulance => "Ambulance",
            ServiceKind::Police => "Police",
            ServiceKind::Fire => "Fire Brigade",
        }
    }

    /// The form-field name carrying this service's unit count.
    pub fn count_field(&self) -> &'static str {
        match self {
            ServiceKind::Ambulance => "requestedAmbulanceCount",
            ServiceKind::Police => "requestedPoliceCount",
            ServiceKind::Fire => "requestedFireTruckCount",
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One service line within a request: whether it is needed and how many
/// units are asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAsk {
    pub kind: ServiceKind,
    pub needed: bool,
    pub requested_count: u32,
}

/// Mutable form state for an emergency request.
///
/// Field names (via serde) match the booking form payload, so a draft can
/// be read straight from a saved form JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDraft {
    pub latitude: String,
    pub longitude: String,
    #[serde(rename = "issueType")]
    pub issue_type: String,
    #[serde(rename = "needAmbulance")]
    pub need_ambulance: bool,
    #[serde(rename = "requestedAmbulanceCount")]
    pub requested_ambulance_count: u32,
    #[serde(rename = "needPolice")]
    pub need_police: bool,
    #[serde(rename = "requestedPoliceCount")]
    pub requested_police_count: u32,
    #[serde(rename = "needFireBrigade")]
    pub need_fire_brigade: bool,
    #[serde(rename = "requestedFireTruckCount")]
    pub requested_fire_truck_count: u32,
    #[serde(rename = "isForSelf")]
    pub is_for_self: bool,
    #[serde(rename = "victimPhoneNumber")]
    pub victim_phone_number: String,
    pub notes: String,
}

impl RequestDraft {
    /// The three service lines in canonical order.
    pub fn asks(&self) -> [ServiceAsk; 3] {
        [
            ServiceAsk {
                kind: ServiceKind::Ambulance,
                needed: self.need_ambulance,
                requested_count: self.requested_ambulance_count,
            },
            ServiceAsk {
                kind: ServiceKind::Police,
                needed: self.need_police,
                requested_count: self.requested_police_count,
            },
            ServiceAsk {
                kind: ServiceKind::Fire,
                needed: self.need_fire_brigade,
                requested_count: self.requested_fire_truck_count,
            },
        ]
    }

    /// Validate and freeze the draft into an `EmergencyRequest`.
    ///
    /// Counts of services that are not needed are forced to 0; the victim
    /// phone number is dropped when the request is for the caller. Pure
    /// transform, no I/O.
    pub fn build(&self) -> Result<EmergencyRequest, ValidationErrors> {
        let errors = validation::validate_request(self);
        if !errors.is_valid() {
            return Err(errors);
        }

        // Ranges were just validated, so the parses cannot fail.
        let latitude: f64 = self.latitude.trim().parse().map_err(|_| {
            let mut e = ValidationErrors::new();
            e.insert("latitude", "Invalid latitude (-90 to 90).");
            e
        })?;
        let longitude: f64 = self.longitude.trim().parse().map_err(|_| {
            let mut e = ValidationErrors::new();
            e.insert("longitude", "Invalid longitude (-180 to 180).");
            e
        })?;

        let services = self.asks().map(|ask| ServiceAsk {
            requested_count: if ask.needed { ask.requested_count } else { 0 },
            ..ask
        });

        let victim_phone_number = if self.is_for_self {
            None
        } else {
            Some(self.victim_phone_number.trim().to_string())
        };

        let notes = {
            let trimmed = self.notes.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };

        Ok(EmergencyRequest {
            pickup: Coordinates::new(latitude, longitude),
            issue_type: self.issue_type.trim().to_string(),
            is_for_self: self.is_for_self,
            victim_phone_number,
            services,
            notes,
        })
    }
}

/// A validated, immutable emergency request.
///
/// Constructed only through `RequestDraft::build`; private fields keep it
/// frozen once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyRequest {
    pickup: Coordinates,
    issue_type: String,
    is_for_self: bool,
    victim_phone_number: Option<String>,
    services: [ServiceAsk; 3],
    notes: Option<String>,
}

impl EmergencyRequest {
    pub fn pickup(&self) -> Coordinates {
        self.pickup
    }

    pub fn issue_type(&self) -> &str {
        &self.issue_type
    }

    pub fn is_for_self(&self) -> bool {
        self.is_for_self
    }

    pub fn victim_phone_number(&self) -> Option<&str> {
        self.victim_phone_number.as_deref()
    }

    pub fn services(&self) -> &[ServiceAsk; 3] {
        &self.services
    }

    pub fn ask(&self, kind: ServiceKind) -> ServiceAsk {
        self.services
            .iter()
            .copied()
            .find(|ask| ask.kind == kind)
            .unwrap_or(ServiceAsk {
                kind,
                needed: false,
                requested_count: 0,
            })
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> RequestDraft {
        RequestDraft {
            latitude: "18.52".to_string(),
            longitude: "73.85".to_string(),
            issue_type: "Cardiac arrest".to_string(),
            need_ambulance: true,
            requested_ambulance_count: 1,
            is_for_self: true,
            ..RequestDraft::default()
        }
    }

    #[test]
    fn test_build_valid_request() {
        let request = valid_draft().build().expect("draft should build");
        assert_eq!(request.pickup(), Coordinates::new(18.52, 73.85));
        assert_eq!(request.issue_type(), "Cardiac arrest");
        assert!(request.is_for_self());
        assert_eq!(request.victim_phone_number(), None);
        assert_eq!(request.ask(ServiceKind::Ambulance).requested_count, 1);
    }

    #[test]
    fn test_build_requires_at_least_one_service() {
        let mut draft = valid_draft();
        draft.need_ambulance = false;

        let errors = draft.build().expect_err("no service asked for");
        let msg = errors.get("services").expect("services error present");
        assert!(msg.contains("at least one service"), "{}", msg);
    }

    #[test]
    fn test_build_rejects_needed_service_with_zero_count() {
        let mut draft = valid_draft();
        draft.need_police = true;
        draft.requested_police_count = 0;

        let errors = draft.build().expect_err("zero count for needed service");
        let msg = errors.get("requestedPoliceCount").expect("count error present");
        assert!(msg.contains("Police"), "{}", msg);
    }

    #[test]
    fn test_build_normalizes_unneeded_counts_to_zero() {
        let mut draft = valid_draft();
        // Leftover count from a toggled-off checkbox.
        draft.need_police = false;
        draft.requested_police_count = 4;

        let request = draft.build().expect("draft should build");
        let police = request.ask(ServiceKind::Police);
        assert!(!police.needed);
        assert_eq!(police.requested_count, 0);
    }

    #[test]
    fn test_victim_phone_required_only_for_others() {
        let mut draft = valid_draft();
        draft.is_for_self = false;
        draft.victim_phone_number = "12345".to_string();

        let errors = draft.build().expect_err("bad phone for someone else");
        assert!(errors.get("victimPhoneNumber").is_some());

        // Same value is ignored entirely when the request is for self.
        draft.is_for_self = true;
        let request = draft.build().expect("phone not validated for self");
        assert_eq!(request.victim_phone_number(), None);
    }

    #[test]
    fn test_build_rejects_out_of_range_pickup() {
        let mut draft = valid_draft();
        draft.latitude = "90.5".to_string();
        let errors = draft.build().expect_err("latitude out of range");
        assert_eq!(errors.get("latitude"), Some("Invalid latitude (-90 to 90)."));

        let mut draft = valid_draft();
        draft.longitude = "-200".to_string();
        let errors = draft.build().expect_err("longitude out of range");
        assert!(errors.get("longitude").is_some());
    }

    #[test]
    fn test_build_rejects_short_issue_type() {
        let mut draft = valid_draft();
        draft.issue_type = "Owie".to_string();
        let errors = draft.build().expect_err("issue type too short");
        assert!(errors.get("issueType").is_some());
    }

    #[test]
    fn test_draft_parses_form_json() {
        let json = r#"{
            "latitude": "18.5204",
            "longitude": "73.8567",
            "issueType": "House fire",
            "needFireBrigade": true,
            "requestedFireTruckCount": 2,
            "isForSelf": false,
            "victimPhoneNumber": "9876543210"
        }"#;
        let draft: RequestDraft = serde_json::from_str(json).expect("draft parses");
        let request = draft.build().expect("draft builds");
        assert_eq!(request.ask(ServiceKind::Fire).requested_count, 2);
        assert_eq!(request.victim_phone_number(), Some("9876543210"));
    }
}
