//! Data types shared across the session core.

pub mod auth;
pub mod user;

pub use auth::{
    OtpContext, OtpData, OtpResponse, RefreshData, RefreshResponse, SessionToken, SignupRequest,
    TokenResponse,
};
pub use user::{ProfileUpdate, User};
