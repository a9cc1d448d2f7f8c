//! REST API client module for the dispatch backend.
//!
//! This module provides the `ApiClient` for submitting emergency requests,
//! mirroring booking state, reporting responder locations and fetching the
//! location-map used by tracking views.
//!
//! The backend uses JWT bearer token authentication obtained through its
//! `/auth/login` endpoint; a missing token fails before any network call.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
