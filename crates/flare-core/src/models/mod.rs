//! Domain models for the dispatch platform.
//!
//! - `request`: the citizen-submitted emergency request and its builder
//! - `booking`: booking/assignment records mirrored from the backend
//! - `unit`: responder units and their statuses
//! - `geo`: coordinates and map bounds

pub mod booking;
pub mod geo;
pub mod request;
pub mod unit;

pub use booking::{Booking, BookingReceipt, CurrentAssignment, LocationSnapshot, SnapshotUnit};
pub use geo::{Coordinates, MapBounds};
pub use request::{EmergencyRequest, RequestDraft, ServiceAsk, ServiceKind};
pub use unit::{ResponderService, ResponderUnit, UnitStatus, VehicleKind};
