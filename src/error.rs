//! Error types for the session core.
//!
//! The Identity Client collapses every transport/HTTP outcome into one of
//! these kinds, so the Session Manager and OTP flow switch on kind instead
//! of inspecting status codes. [`Error::user_message`] is the single place
//! user-facing copy lives.

use std::path::Path;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds the session core can produce.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Server unreachable or connection dropped mid-request.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// HTTP 401: login credentials rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// HTTP 403: the account exists but is disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// HTTP 400/422: request rejected by server-side validation.
    /// Carries the server's `detail` string when present.
    #[error("validation failed: {}", .0.as_deref().unwrap_or("invalid request"))]
    Validation(Option<String>),

    /// HTTP 409: the account/email already exists.
    #[error("conflict: {}", .0.as_deref().unwrap_or("already exists"))]
    Conflict(Option<String>),

    /// No stored credentials, or an operation that requires a token was
    /// called without one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Any other non-success HTTP response.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Configuration problem (bad base URL, missing config dir).
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential store I/O failure.
    #[error("storage I/O error at {path}: {message}")]
    StorageIo { path: String, message: String },

    /// Credential store (de)serialization failure.
    #[error("storage serialization error: {0}")]
    StorageSerialization(String),
}

impl Error {
    /// Helper for storage I/O errors.
    pub fn storage_io(path: &Path, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// True for connectivity failures (server unreachable, timeout), as
    /// opposed to the server actively rejecting the request.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }

    /// Map this error to the fixed user-facing message for it.
    ///
    /// Connectivity failures get a message distinct from credential
    /// rejection so a flaky network never reads as a wrong password.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) | Self::Timeout => {
                "Unable to connect to the server. Please check your connection and try again."
                    .to_string()
            }
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::AccountDisabled => "Account is disabled".to_string(),
            Self::Validation(detail) => detail
                .clone()
                .unwrap_or_else(|| "Invalid request. Please check your input.".to_string()),
            Self::Conflict(detail) => detail
                .clone()
                .unwrap_or_else(|| "An account with this email already exists".to_string()),
            Self::NotAuthenticated => "You are not signed in".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejection_message() {
        assert_eq!(
            Error::InvalidCredentials.user_message(),
            "Invalid email or password"
        );
    }

    #[test]
    fn test_disabled_account_message() {
        assert_eq!(Error::AccountDisabled.user_message(), "Account is disabled");
    }

    #[test]
    fn test_validation_prefers_server_detail() {
        let err = Error::Validation(Some("Username already taken".into()));
        assert_eq!(err.user_message(), "Username already taken");

        let err = Error::Validation(None);
        assert_eq!(err.user_message(), "Invalid request. Please check your input.");
    }

    #[test]
    fn test_conflict_fallback_message() {
        let err = Error::Conflict(None);
        assert!(err.user_message().contains("already exists"));
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::Timeout.is_transport());
        assert!(!Error::InvalidCredentials.is_transport());
        assert!(!Error::Api { status: 500, message: String::new() }.is_transport());
    }

    #[test]
    fn test_transport_message_distinct_from_credentials() {
        assert_ne!(
            Error::Timeout.user_message(),
            Error::InvalidCredentials.user_message()
        );
    }
}
