//! Core library for the flare emergency-dispatch client.
//!
//! Everything the role dashboards share lives here: request validation and
//! the emergency-request model, the booking lifecycle state machine, live
//! location reporting, route/ETA tracking against the Directions Provider,
//! the backend API client, session/credential handling and the local
//! read-through cache.
//!
//! The crate never reads ambient global state for authentication: tokens
//! travel inside `auth::Session` / `api::ApiClient` instances that callers
//! construct and pass down explicitly.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod location;
pub mod models;
pub mod route;
pub mod validation;

pub use api::{ApiClient, ApiError};
pub use auth::{Role, Session, SessionData};
pub use config::Config;
pub use dispatch::{history_view, AssignmentTracker, BookingStatus, DispatchError, SortOrder};
pub use location::{
    LocationReport, LocationReporter, PositionFix, PositionWatch, ReportEvent, ReportSink,
};
pub use models::{
    Booking, BookingReceipt, Coordinates, CurrentAssignment, EmergencyRequest, LocationSnapshot,
    MapBounds, RequestDraft, ResponderService, ResponderUnit, ServiceAsk, ServiceKind, UnitStatus,
    VehicleKind,
};
pub use route::{
    compute_route, DirectionsProvider, MapboxDirections, ProviderError, ProviderRoute,
    RouteEstimate, RouteSummary, RouteTracker,
};
pub use validation::{validate_field, validate_field_if, Field, ValidationErrors};
