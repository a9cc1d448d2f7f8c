//! Field and request validation.
//!
//! Every dashboard form funnels through these rules, so they live in one
//! place instead of being repeated per screen. All functions are pure and
//! synchronous: they return a human-readable message for an invalid value
//! and `None` for a valid one, with no side effects.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::request::RequestDraft;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Indian mobile numbering: 10 digits, first digit 6-9.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6-9]\d{9}$").expect("valid regex"));

/// 12-digit government ID in groups of 4 with optional spaces.
static GOVERNMENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\s?\d{4}\s?\d{4}$").expect("valid regex"));

static DRIVING_LICENSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Z]{2}[0-9]{2}\s?[0-9]{11}$").expect("valid regex"));

static VEHICLE_REG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[A-Z]{2}[0-9]{1,2}[A-Z]{1,2}[0-9]{4}$").expect("valid regex"));

/// Minimum password length accepted at registration/login forms.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Issue description length limits.
const MIN_ISSUE_LENGTH: usize = 5;
const MAX_ISSUE_LENGTH: usize = 200;

/// Free-text notes limit.
const MAX_NOTES_LENGTH: usize = 500;

/// A validatable form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Email,
    Phone,
    GovernmentId,
    DrivingLicense,
    VehicleRegistration,
    Latitude,
    Longitude,
    Password,
    /// Hospital/station/truck/ambulance identifiers: integer > 0.
    PositiveId { label: &'static str },
    IssueType,
    Notes,
}

impl Field {
    fn label(&self) -> &'static str {
        match self {
            Field::Email => "Email",
            Field::Phone => "Phone number",
            Field::GovernmentId => "Government ID",
            Field::DrivingLicense => "License number",
            Field::VehicleRegistration => "Vehicle registration number",
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
            Field::Password => "Password",
            Field::PositiveId { label } => label,
            Field::IssueType => "Issue description",
            Field::Notes => "Notes",
        }
    }
}

/// Validate a single field value.
///
/// Returns `None` when valid, or a user-facing message. Calling twice with
/// the same input always produces the same result.
pub fn validate_field(field: Field, value: &str) -> Option<String> {
    let trimmed = value.trim();

    // Notes are the only optional free-text field; everything else is
    // required once it is being validated at all.
    if trimmed.is_empty() {
        if field == Field::Notes {
            return None;
        }
        return Some(format!("{} is required.", field.label()));
    }

    match field {
        Field::Email => {
            if EMAIL_RE.is_match(trimmed) {
                None
            } else {
                Some("Please enter a valid email address.".to_string())
            }
        }
        Field::Phone => {
            if PHONE_RE.is_match(trimmed) {
                None
            } else {
                Some("Enter a valid 10-digit mobile number starting with 6-9.".to_string())
            }
        }
        Field::GovernmentId => {
            if GOVERNMENT_ID_RE.is_match(trimmed) {
                None
            } else {
                Some("Enter a valid 12-digit government ID.".to_string())
            }
        }
        Field::DrivingLicense => {
            if DRIVING_LICENSE_RE.is_match(trimmed) {
                None
            } else {
                Some("Enter a valid driving license number.".to_string())
            }
        }
        Field::VehicleRegistration => {
            if VEHICLE_REG_RE.is_match(trimmed) {
                None
            } else {
                Some("Enter a valid vehicle registration number.".to_string())
            }
        }
        Field::Latitude => match trimmed.parse::<f64>() {
            Ok(v) if (-90.0..=90.0).contains(&v) => None,
            _ => Some("Invalid latitude (-90 to 90).".to_string()),
        },
        Field::Longitude => match trimmed.parse::<f64>() {
            Ok(v) if (-180.0..=180.0).contains(&v) => None,
            _ => Some("Invalid longitude (-180 to 180).".to_string()),
        },
        Field::Password => {
            // Raw value: leading/trailing spaces are legal password chars.
            if value.len() >= MIN_PASSWORD_LENGTH {
                None
            } else {
                Some("Password must be at least 6 characters long.".to_string())
            }
        }
        Field::PositiveId { label } => match trimmed.parse::<i64>() {
            Ok(v) if v > 0 => None,
            _ => Some(format!("{} must be a positive number.", label)),
        },
        Field::IssueType => {
            let len = trimmed.chars().count();
            if len < MIN_ISSUE_LENGTH {
                Some(format!(
                    "Issue description must be at least {} characters.",
                    MIN_ISSUE_LENGTH
                ))
            } else if len > MAX_ISSUE_LENGTH {
                Some(format!(
                    "Issue description cannot exceed {} characters.",
                    MAX_ISSUE_LENGTH
                ))
            } else {
                None
            }
        }
        Field::Notes => {
            if trimmed.chars().count() > MAX_NOTES_LENGTH {
                Some(format!("Notes cannot exceed {} characters.", MAX_NOTES_LENGTH))
            } else {
                None
            }
        }
    }
}

/// Conditionally-required field: when the governing condition is false the
/// field is not validated at all and any content passes.
pub fn validate_field_if(required: bool, field: Field, value: &str) -> Option<String> {
    if required {
        validate_field(field, value)
    } else {
        None
    }
}

/// Per-field validation errors keyed by form-field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a whole emergency-request draft.
///
/// Folds the field rules over every relevant field and enforces the two
/// request invariants: at least one service must be asked for, and every
/// asked-for service needs a count of at least 1. Counts of services that
/// are not needed are ignored here; `RequestDraft::build` zeroes them.
pub fn validate_request(draft: &RequestDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if let Some(msg) = validate_field(Field::Latitude, &draft.latitude) {
        errors.insert("latitude", msg);
    }
    if let Some(msg) = validate_field(Field::Longitude, &draft.longitude) {
        errors.insert("longitude", msg);
    }
    if let Some(msg) = validate_field(Field::IssueType, &draft.issue_type) {
        errors.insert("issueType", msg);
    }
    if let Some(msg) = validate_field(Field::Notes, &draft.notes) {
        errors.insert("notes", msg);
    }

    // Victim phone is only required (and only validated) when the request
    // is for someone else.
    if let Some(msg) = validate_field_if(!draft.is_for_self, Field::Phone, &draft.victim_phone_number)
    {
        errors.insert("victimPhoneNumber", msg);
    }

    let asks = draft.asks();
    if !asks.iter().any(|ask| ask.needed) {
        errors.insert(
            "services",
            "Please select at least one service (Ambulance, Police, or Fire Brigade).",
        );
    }
    for ask in asks {
        if ask.needed && ask.requested_count == 0 {
            errors.insert(
                ask.kind.count_field(),
                format!("Requested {} count must be at least 1.", ask.kind.label()),
            );
        }
    }

    errors
}
