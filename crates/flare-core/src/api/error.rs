use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No bearer token in the session; detected before any network call.
    #[error("Authentication token not found. Please login again.")]
    AuthenticationMissing,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    /// Backend completed the request but rejected it; carries the
    /// backend's own message verbatim when one was provided.
    #[error("{0}")]
    Rejection(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Fallback shown when a rejection carries no usable message.
const GENERIC_REJECTION: &str = "Request failed. Please try again.";

/// Standard backend error envelope: `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Pull the backend's `message` field out of an error body, if any.
    fn backend_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::Rejection(
                Self::backend_message(body).unwrap_or_else(|| GENERIC_REJECTION.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_surfaces_backend_message_verbatim() {
        let err = ApiError::from_status(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"message": "No ambulance available near the pickup point."}"#,
        );
        assert_eq!(
            err.to_string(),
            "No ambulance available near the pickup point."
        );
    }

    #[test]
    fn test_rejection_falls_back_to_generic_message() {
        let err = ApiError::from_status(reqwest::StatusCode::BAD_REQUEST, "not json");
        assert_eq!(err.to_string(), GENERIC_REJECTION);

        let err = ApiError::from_status(reqwest::StatusCode::BAD_REQUEST, r#"{"message": ""}"#);
        assert_eq!(err.to_string(), GENERIC_REJECTION);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_truncate_body() {
        let long_body = "x".repeat(600);
        let err = ApiError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &long_body);
        let msg = err.to_string();
        assert!(msg.contains("truncated"));
        assert!(msg.len() < long_body.len());
    }
}
