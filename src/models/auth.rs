//! Authentication wire types and the persisted session token.

use serde::{Deserialize, Serialize};

use super::user::User;

/// Token pair persisted in the credential store under
/// [`crate::config::SESSION_TOKEN_KEY`], serialized as JSON.
///
/// Presence of this record does not imply validity; validity is only
/// established by a successful profile fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Opaque bearer token.
    pub access_token: String,
    /// Refresh token, when the backend issued one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp the access token expires at. Diagnostic only.
    #[serde(default)]
    pub expires_at: i64,
}

impl SessionToken {
    /// Build a token record from a bare access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: 0,
        }
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Attach an expiry computed from a server-supplied `expires_in`.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: i64) -> Self {
        self.expires_at = chrono::Utc::now().timestamp() + expires_in;
        self
    }
}

/// Signup request body.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Response from the login and signup endpoints.
///
/// The backend also embeds a partial user summary; it is deliberately not
/// modeled, since the session settles only on the full record from the
/// profile fetch that follows.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Response from the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<RefreshData>,
}

/// Payload of a successful refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Server-side intent for an OTP send: which email template and account
/// handling (create vs. authenticate) the backend applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpContext {
    Signup,
    Login,
}

impl std::fmt::Display for OtpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::Login => write!(f, "login"),
        }
    }
}

/// Envelope returned by the OTP send/verify/resend endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<OtpData>,
}

/// Payload of a successful OTP verification.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpData {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}
