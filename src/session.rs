//! Session lifecycle manager.
//!
//! Owns the client's belief about who is logged in and whether that belief
//! is still being established. Composes the credential store and the
//! identity client; consumed by the route guard and profile editors.
//!
//! Thread-safe: state lives behind a `RwLock` and the lifecycle operations
//! (`check_auth_status`, `login`, `signup`, `logout`, `refresh_token`) are
//! serialized behind a `Mutex` so concurrent callers cannot interleave
//! store writes with half-settled state.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{HttpIdentityClient, IdentityApi};
use crate::config::{DEFAULT_BASE_URL, ONBOARDING_COMPLETE_KEY, SESSION_TOKEN_KEY};
use crate::error::Result;
use crate::models::{ProfileUpdate, SessionToken, SignupRequest, User};
use crate::store::{
    clear_session, load_session_token, save_session_token, CredentialStore, FileCredentialStore,
};

/// Generic message for auth responses that succeed without yielding a
/// token. Shared by login and signup, so the copy names neither.
const GENERIC_AUTH_FAILURE: &str = "Authentication failed. Please try again.";

/// The client-side session state.
///
/// Invariant: `is_authenticated` implies `user` is `Some`. Callers must not
/// act on `user`/`is_authenticated` while `is_loading` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub error: Option<String>,
}

impl Default for AuthState {
    /// Process-start state: empty and loading, pending the first
    /// [`SessionManager::check_auth_status`].
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
            is_authenticated: false,
            error: None,
        }
    }
}

/// Owns [`AuthState`] and drives the session lifecycle against the
/// identity backend.
pub struct SessionManager {
    state: RwLock<AuthState>,
    /// Serializes the lifecycle operations (critical sections over both the
    /// state and the credential store).
    lifecycle: Mutex<()>,
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    /// Create a builder for configuring the manager.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// Create a manager from explicit collaborators.
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            state: RwLock::new(AuthState::default()),
            lifecycle: Mutex::new(()),
            api,
            store,
        }
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Resolve the persisted session, if any. Invoked once at startup.
    ///
    /// No stored token settles to unauthenticated with no error. A stored
    /// token is validated by fetching the profile; any failure purges the
    /// token and settles silently - a stale session must never surface as
    /// an alarming error on load.
    pub async fn check_auth_status(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.begin().await;

        match load_session_token(self.store.as_ref()).await {
            Ok(None) => {
                debug!("No stored session token");
                self.settle_unauthenticated().await;
            }
            Ok(Some(_)) => match self.api.get_profile().await {
                Ok(user) => {
                    info!(username = user.username.as_str(), "Restored session");
                    self.settle_authenticated(user).await;
                }
                Err(e) => {
                    debug!("Stored token rejected, purging: {}", e);
                    if let Err(e) = self.store.remove(SESSION_TOKEN_KEY).await {
                        warn!("Failed to purge stale token: {}", e);
                    }
                    self.settle_unauthenticated().await;
                }
            },
            Err(e) => {
                warn!("Credential store unreadable: {}", e);
                self.settle_unauthenticated().await;
            }
        }
    }

    /// Authenticate with email and password.
    ///
    /// On success the token is persisted and the full profile is fetched
    /// before the state settles authenticated. Failures settle back to
    /// unauthenticated with a user-facing message; they are never
    /// propagated to the caller.
    pub async fn login(&self, email: &str, password: &str) {
        let _lifecycle = self.lifecycle.lock().await;
        self.begin().await;

        match self.api.login(email, password).await {
            Ok(resp) => self.complete_auth(resp.access_token, resp.refresh_token, resp.expires_in).await,
            Err(e) => {
                debug!("Login rejected: {}", e);
                self.settle_failure(e.user_message()).await;
            }
        }
    }

    /// Register a new account. Success implies an implicit login.
    pub async fn signup(&self, request: &SignupRequest) {
        let _lifecycle = self.lifecycle.lock().await;
        self.begin().await;

        match self.api.signup(request).await {
            Ok(resp) => self.complete_auth(resp.access_token, resp.refresh_token, resp.expires_in).await,
            Err(e) => {
                debug!("Signup rejected: {}", e);
                self.settle_failure(e.user_message()).await;
            }
        }
    }

    /// End the session.
    ///
    /// The server notification is best-effort; client-side teardown is
    /// unconditional, so this always settles to the empty unauthenticated
    /// state with the store purged.
    pub async fn logout(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure - including a missing refresh token - is treated as an
    /// unrecoverable session and escalates to a full logout, never a
    /// retryable error state.
    pub async fn refresh_token(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let stored = match load_session_token(self.store.as_ref()).await {
            Ok(Some(token)) => token,
            _ => {
                debug!("No stored token to refresh");
                self.teardown().await;
                return;
            }
        };
        let Some(refresh) = stored.refresh_token else {
            debug!("Stored token has no refresh token");
            self.teardown().await;
            return;
        };

        match self.api.refresh_token(&refresh).await {
            Ok(resp) if resp.success => {
                let Some(data) = resp.data else {
                    warn!("Refresh succeeded without a token payload");
                    self.teardown().await;
                    return;
                };

                let mut token = SessionToken::new(data.access_token);
                token.refresh_token = data.refresh_token.or(Some(refresh));
                if let Err(e) = save_session_token(self.store.as_ref(), &token).await {
                    warn!("Failed to persist refreshed token: {}", e);
                    self.teardown().await;
                    return;
                }

                // The cached user is left untouched when the server omits
                // one; the next check_auth_status re-validates anyway.
                if let Some(user) = data.user {
                    let mut state = self.state.write().await;
                    state.user = Some(user);
                }
                info!("Session token refreshed");
            }
            Ok(resp) => {
                debug!(
                    "Refresh rejected: {}",
                    resp.message.as_deref().unwrap_or("no reason given")
                );
                self.teardown().await;
            }
            Err(e) => {
                debug!("Refresh failed: {}", e);
                self.teardown().await;
            }
        }
    }

    /// Apply a partial profile update.
    ///
    /// On success the cached user is replaced wholesale with the server's
    /// returned record. Unlike the other operations, failure is propagated
    /// to the caller (profile editors display inline feedback) and never
    /// written into the ambient `error` field.
    pub async fn update_user_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let user = self.api.update_profile(update).await?;

        {
            let mut state = self.state.write().await;
            state.user = Some(user.clone());
        }

        // Local fast-path flag, independent of the server record.
        if update.onboarding_complete == Some(true) {
            self.store.set(ONBOARDING_COMPLETE_KEY, "true").await?;
        }

        info!(username = user.username.as_str(), "Profile updated");
        Ok(user)
    }

    /// Clear the error field. Pure state transition.
    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }

    /// Mark a lifecycle operation in flight: loading on, prior error gone.
    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.is_loading = true;
        state.error = None;
    }

    /// Shared tail of login and signup: persist the token, fetch the full
    /// profile, settle authenticated.
    async fn complete_auth(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
    ) {
        if access_token.is_empty() {
            warn!("Auth response carried no access token");
            self.settle_failure(GENERIC_AUTH_FAILURE.to_string()).await;
            return;
        }

        let mut token = SessionToken::new(access_token).with_expires_in(expires_in);
        token.refresh_token = refresh_token;
        if let Err(e) = save_session_token(self.store.as_ref(), &token).await {
            warn!("Failed to persist session token: {}", e);
            self.settle_failure(e.user_message()).await;
            return;
        }

        match self.api.get_profile().await {
            Ok(user) => {
                info!(username = user.username.as_str(), "Authenticated");
                self.settle_authenticated(user).await;
            }
            Err(e) => {
                warn!("Profile fetch after auth failed: {}", e);
                if let Err(e) = self.store.remove(SESSION_TOKEN_KEY).await {
                    warn!("Failed to remove unusable token: {}", e);
                }
                self.settle_failure(e.user_message()).await;
            }
        }
    }

    async fn settle_authenticated(&self, user: User) {
        let mut state = self.state.write().await;
        *state = AuthState {
            user: Some(user),
            is_loading: false,
            is_authenticated: true,
            error: None,
        };
    }

    async fn settle_unauthenticated(&self) {
        let mut state = self.state.write().await;
        *state = AuthState {
            user: None,
            is_loading: false,
            is_authenticated: false,
            error: None,
        };
    }

    /// Settle a failed login/signup attempt. The cached user (present only
    /// when the attempt raced an existing session) is left untouched.
    async fn settle_failure(&self, message: String) {
        let mut state = self.state.write().await;
        state.is_loading = false;
        state.is_authenticated = false;
        state.error = Some(message);
    }

    /// Unconditional client-side teardown: notify the server best-effort,
    /// purge the store, reset the state.
    async fn teardown(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Server logout failed, continuing teardown: {}", e);
        }
        if let Err(e) = clear_session(self.store.as_ref()).await {
            warn!("Failed to clear credential store: {}", e);
        }
        self.settle_unauthenticated().await;
        info!("Session ended");
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store.name())
            .finish()
    }
}

/// Builder for [`SessionManager`].
pub struct SessionManagerBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    api: Option<Arc<dyn IdentityApi>>,
    reqwest_client: Option<reqwest::Client>,
}

impl SessionManagerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            store: None,
            api: None,
            reqwest_client: None,
        }
    }

    /// Set the identity backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set a credential store backend.
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a custom identity API implementation (testing).
    pub fn api(mut self, api: Arc<dyn IdentityApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set a custom reqwest client.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Build the manager. The default store is the file store at the
    /// platform config path; the default API is the HTTP client.
    pub fn build(self) -> Result<SessionManager> {
        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileCredentialStore::default_path()?),
        };

        let api: Arc<dyn IdentityApi> = match self.api {
            Some(api) => api,
            None => {
                let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
                match self.reqwest_client {
                    Some(client) => Arc::new(HttpIdentityClient::with_client(
                        client,
                        base_url,
                        Arc::clone(&store),
                    )),
                    None => Arc::new(HttpIdentityClient::new(base_url, Arc::clone(&store))?),
                }
            }
        };

        info!("SessionManager initialized");
        Ok(SessionManager::new(api, store))
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
