//! Local caching module for the dispatch views.
//!
//! This module provides the `CacheManager` for the client's read-through
//! copies of backend-owned data (bookings per service, responder units).
//! Data is cached in JSON format and considered stale after 60 seconds.

pub mod manager;

pub use manager::{CacheManager, CachedData};
