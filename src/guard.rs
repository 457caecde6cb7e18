//! Route guard: gatekeeper between the session state and protected views.
//!
//! A pure consumer of [`AuthState`]. The view layer renders exactly one of
//! three states and may rely on nothing else from the session core.

use std::sync::Arc;

use crate::session::{AuthState, SessionManager};

/// What the view layer should do for a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Auth resolution in flight: show a blocking indicator, render
    /// nothing else, and do not redirect.
    Loading,
    /// Settled unauthenticated: render nothing and redirect to the login
    /// entry point.
    RedirectToLogin,
    /// Settled authenticated: render the wrapped content.
    Render,
}

/// Derive the render state from a session snapshot.
///
/// Loading wins over everything so an in-progress auth resolution is never
/// raced by a redirect.
#[must_use]
pub fn resolve(state: &AuthState) -> RenderState {
    if state.is_loading {
        RenderState::Loading
    } else if state.is_authenticated {
        RenderState::Render
    } else {
        RenderState::RedirectToLogin
    }
}

/// Guard bound to a [`SessionManager`] instance.
pub struct RouteGuard {
    session: Arc<SessionManager>,
}

impl RouteGuard {
    /// Create a guard over the given session manager.
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Resolve the current render state.
    pub async fn resolve(&self) -> RenderState {
        resolve(&self.session.state().await)
    }
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard").finish()
    }
}
