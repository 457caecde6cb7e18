//! Configuration constants and URL helpers for the Folio identity API.

use std::time::Duration;

/// Default identity backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Base path all identity endpoints live under.
pub const AUTH_BASE_PATH: &str = "/api/auth";

/// Credential store key holding the serialized session token.
pub const SESSION_TOKEN_KEY: &str = "folio.session_token";

/// Credential store key holding the onboarding-completed fast-path flag.
pub const ONBOARDING_COMPLETE_KEY: &str = "folio.onboarding_complete";

/// Server-declared OTP validity window.
pub const OTP_WINDOW: Duration = Duration::from_secs(600); // 10 minutes

/// Minimum time that must elapse before an OTP resend is permitted.
pub const OTP_RESEND_DELAY: Duration = Duration::from_secs(60);

/// Required OTP code length (digits).
pub const OTP_CODE_LEN: usize = 6;

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Total timeout for HTTP requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the full URL for an identity endpoint.
///
/// Trailing slashes on the base URL are tolerated so configuration typos
/// don't produce `//api/auth/...` paths.
pub fn auth_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{}{}/{}", base, AUTH_BASE_PATH, endpoint.trim_start_matches('/'))
}
