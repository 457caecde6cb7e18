//! # folio-session
//!
//! Client-side authenticated-session lifecycle for the Folio portfolio
//! dashboard: establishes, validates, refreshes, and tears down a user's
//! session against the identity backend, including the one-time-passcode
//! flow used for the Google-assisted path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use folio_session::{RouteGuard, SessionManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> folio_session::Result<()> {
//!     let session = Arc::new(
//!         SessionManager::builder()
//!             .base_url("https://api.folio.dev")
//!             .build()?,
//!     );
//!
//!     // Resolve any persisted session once at startup.
//!     session.check_auth_status().await;
//!
//!     let guard = RouteGuard::new(Arc::clone(&session));
//!     match guard.resolve().await {
//!         folio_session::RenderState::Render => { /* show dashboard */ }
//!         folio_session::RenderState::RedirectToLogin => { /* go to login */ }
//!         folio_session::RenderState::Loading => { /* spinner */ }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod otp;
pub mod session;
pub mod store;

// Re-exports for ergonomic usage
pub use api::{HttpIdentityClient, IdentityApi};
pub use error::{Error, Result};
pub use guard::{RenderState, RouteGuard};
pub use models::{
    OtpContext, ProfileUpdate, SessionToken, SignupRequest, User,
};
pub use otp::{OtpFlow, OtpStep, OtpSuccess};
pub use session::{AuthState, SessionManager, SessionManagerBuilder};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
