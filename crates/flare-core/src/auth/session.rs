use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ResponderService;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Token expiry time in minutes.
/// Backend-issued JWTs expire after ~30 minutes.
const TOKEN_EXPIRY_MINUTES: i64 = 30;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Platform roles as issued by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    PoliceOfficer,
    FireDriver,
    AmbulanceDriver,
    Admin,
}

impl Role {
    /// The responder service this role drives for, if any.
    pub fn responder_service(&self) -> Option<ResponderService> {
        match self {
            Role::AmbulanceDriver => Some(ResponderService::Ambulance),
            Role::FireDriver => Some(ResponderService::Fire),
            _ => None,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "POLICE_OFFICER" => Role::PoliceOfficer,
            "FIRE_DRIVER" => Role::FireDriver,
            "AMBULANCE_DRIVER" => Role::AmbulanceDriver,
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "User",
            Role::PoliceOfficer => "Police Officer",
            Role::FireDriver => "Fire Driver",
            Role::AmbulanceDriver => "Ambulance Driver",
            Role::Admin => "Admin",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub user_id: i64,
    #[serde(default)]
    pub role: Role,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        Utc::now() > expiry
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.created_at
            + Duration::minutes(TOKEN_EXPIRY_MINUTES - TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    /// Get the user ID if session exists
    pub fn user_id(&self) -> Option<i64> {
        self.data.as_ref().map(|d| d.user_id)
    }

    pub fn role(&self) -> Option<Role> {
        self.data.as_ref().map(|d| d.role)
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_data(created_at: DateTime<Utc>) -> SessionData {
        SessionData {
            token: "tok".to_string(),
            user_id: 7,
            role: Role::AmbulanceDriver,
            username: "driver@flare.example.org".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from("AMBULANCE_DRIVER"), Role::AmbulanceDriver);
        assert_eq!(Role::from("fire_driver"), Role::FireDriver);
        assert_eq!(Role::from("USER"), Role::User);
        assert_eq!(Role::from("something-else"), Role::User);
    }

    #[test]
    fn test_role_responder_service() {
        assert_eq!(
            Role::AmbulanceDriver.responder_service(),
            Some(ResponderService::Ambulance)
        );
        assert_eq!(Role::FireDriver.responder_service(), Some(ResponderService::Fire));
        assert_eq!(Role::PoliceOfficer.responder_service(), None);
        assert_eq!(Role::User.responder_service(), None);
    }

    #[test]
    fn test_session_expiry() {
        let fresh = session_data(Utc::now());
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());

        let aging = session_data(Utc::now() - Duration::minutes(27));
        assert!(!aging.is_expired());
        assert!(aging.needs_refresh());

        let expired = session_data(Utc::now() - Duration::minutes(31));
        assert!(expired.is_expired());
    }
}
