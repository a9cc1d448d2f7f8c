//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: Token-based session management with automatic expiry
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//!
//! Sessions are persisted to disk and tokens expire after 30 minutes. The
//! core never reads ambient global state for the token: callers pass the
//! session (or a token-bearing `ApiClient`) explicitly.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Role, Session, SessionData};
