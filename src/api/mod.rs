//! Identity API collaborator.
//!
//! [`IdentityApi`] is the seam between the session core and the backend:
//! the Session Manager and OTP flow only ever see typed [`crate::Error`]
//! values, never raw transport failures. [`HttpIdentityClient`] is the
//! production implementation; tests substitute mocks.

mod http;

use async_trait::async_trait;

pub use http::HttpIdentityClient;

use crate::error::Result;
use crate::models::{
    OtpContext, OtpResponse, ProfileUpdate, RefreshResponse, SignupRequest, TokenResponse, User,
};

/// Request/response surface of the identity backend.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Authenticate with email and password.
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse>;

    /// Register a new account. Success implies an implicit login.
    async fn signup(&self, request: &SignupRequest) -> Result<TokenResponse>;

    /// Notify the server of logout. Callers treat failures as best-effort.
    async fn logout(&self) -> Result<()>;

    /// Fetch the current user's profile. Any failure is treated by callers
    /// as "token invalid".
    async fn get_profile(&self) -> Result<User>;

    /// Exchange a refresh token for a new access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResponse>;

    /// Apply a partial profile update; returns the full updated record.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User>;

    /// Send a one-time passcode to `email`.
    async fn send_otp(&self, email: &str, context: OtpContext) -> Result<OtpResponse>;

    /// Verify a one-time passcode.
    async fn verify_otp(&self, email: &str, code: &str, context: OtpContext)
        -> Result<OtpResponse>;

    /// Resend the one-time passcode.
    async fn resend_otp(&self, email: &str) -> Result<OtpResponse>;
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: IdentityApi + ?Sized> IdentityApi for std::sync::Arc<T> {
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        (**self).login(email, password).await
    }
    async fn signup(&self, request: &SignupRequest) -> Result<TokenResponse> {
        (**self).signup(request).await
    }
    async fn logout(&self) -> Result<()> {
        (**self).logout().await
    }
    async fn get_profile(&self) -> Result<User> {
        (**self).get_profile().await
    }
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResponse> {
        (**self).refresh_token(refresh_token).await
    }
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        (**self).update_profile(update).await
    }
    async fn send_otp(&self, email: &str, context: OtpContext) -> Result<OtpResponse> {
        (**self).send_otp(email, context).await
    }
    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        context: OtpContext,
    ) -> Result<OtpResponse> {
        (**self).verify_otp(email, code, context).await
    }
    async fn resend_otp(&self, email: &str) -> Result<OtpResponse> {
        (**self).resend_otp(email).await
    }
}
