use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Booking, ResponderService, ResponderUnit};

/// Consider cached dispatch data stale after 60 seconds.
/// Bookings and unit positions move fast; anything older than a polling
/// cycle or two should be refetched.
const CACHE_STALE_SECONDS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.cached_at).num_seconds()
    }

    pub fn age_display(&self) -> String {
        let seconds = self.age_seconds();
        if seconds < 0 {
            // Handle clock skew gracefully
            "just now".to_string()
        } else if seconds < 5 {
            "just now".to_string()
        } else if seconds < 60 {
            format!("{}s ago", seconds)
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else {
            format!("{}h ago", seconds / 3600)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_seconds() > CACHE_STALE_SECONDS
    }
}

/// Read-through disk cache for the dispatch views.
///
/// Written only by fetch-completion handlers; every dashboard view reads
/// the same copy (last write wins, there is no parallel mutation).
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    // ===== Bookings =====

    pub fn load_bookings(&self, service: ResponderService) -> Result<Option<CachedData<Vec<Booking>>>> {
        self.load(&format!("bookings_{}", service))
    }

    pub fn save_bookings(&self, service: ResponderService, bookings: &[Booking]) -> Result<()> {
        self.save(&format!("bookings_{}", service), &bookings)
    }

    // ===== Responder units =====

    pub fn load_units(&self) -> Result<Option<CachedData<Vec<ResponderUnit>>>> {
        self.load("units")
    }

    pub fn save_units(&self, units: &[ResponderUnit]) -> Result<()> {
        self.save("units", &units)
    }

    /// True when any live dataset is missing or overdue for a refetch.
    pub fn any_stale(&self) -> bool {
        let stale_checks = [
            self.is_cache_stale("bookings_ambulance", || {
                self.load_bookings(ResponderService::Ambulance)
            }),
            self.is_cache_stale("bookings_fire", || self.load_bookings(ResponderService::Fire)),
            self.is_cache_stale("units", || self.load_units()),
        ];
        stale_checks.iter().any(|&stale| stale)
    }

    /// Helper to check staleness and log errors without failing
    fn is_cache_stale<T>(
        &self,
        name: &str,
        loader: impl FnOnce() -> Result<Option<CachedData<T>>>,
    ) -> bool {
        match loader() {
            Ok(Some(cached)) => cached.is_stale(),
            Ok(None) => true, // No cache = stale
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache for staleness check");
                true // Error reading = treat as stale
            }
        }
    }
}
