//! One-time-passcode verification flow for the Google-assisted path.
//!
//! Two-step interactive state machine: email entry, then code entry against
//! a server-issued six-digit code. The countdown is a scoped resource - the
//! ticker task is aborted whenever the flow closes, succeeds, or steps back
//! to email entry, so no interval outlives the modal that started it.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::api::IdentityApi;
use crate::config::{OTP_CODE_LEN, OTP_RESEND_DELAY, OTP_WINDOW};
use crate::error::Result;
use crate::models::{OtpContext, SessionToken, User};
use crate::store::{save_session_token, CredentialStore};

/// Fallback message when the server fails without explaining itself.
const GENERIC_OTP_FAILURE: &str = "Something went wrong. Please try again.";

/// Current step of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpStep {
    /// Waiting for the user's email address.
    Email,
    /// Waiting for the six-digit code.
    Otp,
}

/// Result of a successful verification, handed to the caller before the
/// flow closes.
#[derive(Debug, Clone)]
pub struct OtpSuccess {
    pub access_token: String,
    pub user: Option<User>,
}

/// Countdown over the server's OTP validity window.
///
/// Remaining time is derived from the deadline, not from ticker state, so
/// observations stay exact even if the ticker lags. The spawned ticker only
/// publishes one-second updates for views that subscribe. Dropping the
/// countdown aborts the ticker.
struct Countdown {
    deadline: Instant,
    remaining: watch::Receiver<u64>,
    ticker: JoinHandle<()>,
}

impl Countdown {
    fn start(window: Duration) -> Self {
        let deadline = Instant::now() + window;
        let (tx, rx) = watch::channel(window.as_secs());

        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick is immediate
            loop {
                interval.tick().await;
                let left = deadline.saturating_duration_since(Instant::now()).as_secs();
                if tx.send(left).is_err() || left == 0 {
                    break;
                }
            }
        });

        Self {
            deadline,
            remaining: rx,
            ticker,
        }
    }

    /// Seconds until the window closes, frozen at zero once reached.
    fn remaining_secs(&self) -> u64 {
        self.deadline
            .saturating_duration_since(Instant::now())
            .as_secs()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// The OTP verification flow. Ephemeral: lives for the duration of the
/// modal and is discarded on close, success, or navigation away.
pub struct OtpFlow {
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn CredentialStore>,
    context: OtpContext,
    step: OtpStep,
    email: String,
    code: String,
    error: Option<String>,
    countdown: Option<Countdown>,
    closed: bool,
}

impl OtpFlow {
    /// Open a new flow. `context` selects the server-side template/intent.
    pub fn new(
        api: Arc<dyn IdentityApi>,
        store: Arc<dyn CredentialStore>,
        context: OtpContext,
    ) -> Self {
        Self {
            api,
            store,
            context,
            step: OtpStep::Email,
            email: String::new(),
            code: String::new(),
            error: None,
            countdown: None,
            closed: false,
        }
    }

    pub fn step(&self) -> OtpStep {
        self.step
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Seconds left in the validity window, zero when no countdown is armed.
    pub fn countdown_secs(&self) -> u64 {
        self.countdown.as_ref().map_or(0, Countdown::remaining_secs)
    }

    /// Watch the per-second countdown updates (for rendering).
    pub fn subscribe_countdown(&self) -> Option<watch::Receiver<u64>> {
        self.countdown.as_ref().map(Countdown::subscribe)
    }

    /// Whether a resend is currently permitted: only after the first minute
    /// of the window has elapsed, to throttle rapid resends.
    pub fn can_resend(&self) -> bool {
        match &self.countdown {
            Some(countdown) => {
                countdown.remaining_secs() <= (OTP_WINDOW - OTP_RESEND_DELAY).as_secs()
            }
            None => false,
        }
    }

    /// Replace the entered code with `input`, stripped to digits and
    /// clamped to six characters. Applied on every keystroke or paste.
    pub fn set_code(&mut self, input: &str) {
        self.code = input
            .chars()
            .filter(char::is_ascii_digit)
            .take(OTP_CODE_LEN)
            .collect();
    }

    /// Submit the email address and request a code.
    ///
    /// On success the flow advances to code entry and the countdown is
    /// armed. Email format validation is the input field's job; only
    /// presence is checked here.
    pub async fn submit_email(&mut self, email: &str) {
        let email = email.trim();
        if email.is_empty() {
            self.error = Some("Please enter your email address".into());
            return;
        }

        match self.api.send_otp(email, self.context).await {
            Ok(resp) if resp.success => {
                debug!(context = %self.context, "OTP sent");
                self.email = email.to_string();
                self.step = OtpStep::Otp;
                self.error = None;
                self.countdown = Some(Countdown::start(OTP_WINDOW));
            }
            Ok(resp) => {
                self.error = Some(resp.message.unwrap_or_else(|| GENERIC_OTP_FAILURE.into()));
            }
            Err(e) => {
                warn!("OTP send failed: {}", e);
                self.error = Some(GENERIC_OTP_FAILURE.into());
            }
        }
    }

    /// Submit the entered code.
    ///
    /// On success the returned token is persisted, the flow closes, and the
    /// token/user pair is returned for the caller to act on. On failure the
    /// flow stays on the code step for retry. Transport failures never
    /// escape as errors; they surface as the generic retry message.
    pub async fn submit_otp(&mut self) -> Result<Option<OtpSuccess>> {
        if self.code.len() != OTP_CODE_LEN {
            self.error = Some(format!("Please enter the {}-digit code", OTP_CODE_LEN));
            return Ok(None);
        }

        match self
            .api
            .verify_otp(&self.email, &self.code, self.context)
            .await
        {
            Ok(resp) if resp.success => {
                let data = resp.data.unwrap_or_else(|| crate::models::OtpData {
                    access_token: None,
                    user: None,
                });
                let Some(access_token) = data.access_token.filter(|t| !t.is_empty()) else {
                    self.error = Some(GENERIC_OTP_FAILURE.into());
                    return Ok(None);
                };

                save_session_token(self.store.as_ref(), &SessionToken::new(access_token.clone()))
                    .await?;
                info!("OTP verified, session token persisted");

                self.close();
                Ok(Some(OtpSuccess {
                    access_token,
                    user: data.user,
                }))
            }
            Ok(resp) => {
                // Server message verbatim - it is authoritative on expiry.
                self.error = Some(resp.message.unwrap_or_else(|| GENERIC_OTP_FAILURE.into()));
                Ok(None)
            }
            Err(e) => {
                warn!("OTP verify failed: {}", e);
                self.error = Some(GENERIC_OTP_FAILURE.into());
                Ok(None)
            }
        }
    }

    /// Request a fresh code.
    ///
    /// Rejected locally (no network call, countdown untouched) while more
    /// than the resend gate remains. Returns whether a resend happened.
    pub async fn resend_otp(&mut self) -> bool {
        if !self.can_resend() {
            debug!("Resend throttled");
            return false;
        }

        match self.api.resend_otp(&self.email).await {
            Ok(resp) if resp.success => {
                debug!("OTP resent");
                self.error = None;
                self.countdown = Some(Countdown::start(OTP_WINDOW));
                true
            }
            Ok(resp) => {
                self.error = Some(resp.message.unwrap_or_else(|| GENERIC_OTP_FAILURE.into()));
                false
            }
            Err(e) => {
                warn!("OTP resend failed: {}", e);
                self.error = Some(GENERIC_OTP_FAILURE.into());
                false
            }
        }
    }

    /// Step back to email entry, discarding the entered code and stopping
    /// the countdown.
    pub fn change_email(&mut self) {
        self.step = OtpStep::Email;
        self.code.clear();
        self.error = None;
        self.countdown = None;
    }

    /// Close the flow (success or explicit cancel). Stops the countdown.
    pub fn close(&mut self) {
        self.closed = true;
        self.countdown = None;
        self.code.clear();
        self.error = None;
    }
}

impl std::fmt::Debug for OtpFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpFlow")
            .field("step", &self.step)
            .field("context", &self.context)
            .field("closed", &self.closed)
            .field("countdown_secs", &self.countdown_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{
        OtpData, OtpResponse, ProfileUpdate, RefreshResponse, SignupRequest, TokenResponse,
    };
    use crate::store::{load_session_token, MemoryCredentialStore};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted OTP endpoints; counts resend calls to assert throttling
    /// happens before the network.
    #[derive(Default)]
    struct ScriptedOtpApi {
        send: StdMutex<VecDeque<Result<OtpResponse>>>,
        verify: StdMutex<VecDeque<Result<OtpResponse>>>,
        resend: StdMutex<VecDeque<Result<OtpResponse>>>,
        resend_calls: AtomicUsize,
    }

    fn unexpected() -> Error {
        Error::Api {
            status: 0,
            message: "unexpected call".into(),
        }
    }

    #[async_trait]
    impl IdentityApi for ScriptedOtpApi {
        async fn login(&self, _e: &str, _p: &str) -> Result<TokenResponse> {
            Err(unexpected())
        }
        async fn signup(&self, _r: &SignupRequest) -> Result<TokenResponse> {
            Err(unexpected())
        }
        async fn logout(&self) -> Result<()> {
            Err(unexpected())
        }
        async fn get_profile(&self) -> Result<User> {
            Err(unexpected())
        }
        async fn refresh_token(&self, _r: &str) -> Result<RefreshResponse> {
            Err(unexpected())
        }
        async fn update_profile(&self, _u: &ProfileUpdate) -> Result<User> {
            Err(unexpected())
        }
        async fn send_otp(&self, _email: &str, _context: OtpContext) -> Result<OtpResponse> {
            self.send.lock().unwrap().pop_front().unwrap_or_else(|| Err(unexpected()))
        }
        async fn verify_otp(
            &self,
            _email: &str,
            _code: &str,
            _context: OtpContext,
        ) -> Result<OtpResponse> {
            self.verify.lock().unwrap().pop_front().unwrap_or_else(|| Err(unexpected()))
        }
        async fn resend_otp(&self, _email: &str) -> Result<OtpResponse> {
            self.resend_calls.fetch_add(1, Ordering::SeqCst);
            self.resend.lock().unwrap().pop_front().unwrap_or_else(|| Err(unexpected()))
        }
    }

    fn ok_envelope() -> OtpResponse {
        OtpResponse {
            success: true,
            message: None,
            data: None,
        }
    }

    fn flow(api: ScriptedOtpApi) -> (OtpFlow, Arc<MemoryCredentialStore>, Arc<ScriptedOtpApi>) {
        let api = Arc::new(api);
        let store = Arc::new(MemoryCredentialStore::new());
        (
            OtpFlow::new(api.clone(), store.clone(), OtpContext::Login),
            store,
            api,
        )
    }

    #[tokio::test]
    async fn test_code_input_strips_non_digits_and_clamps() {
        let (mut flow, _, _) = flow(ScriptedOtpApi::default());

        flow.set_code("12a3bC45");
        assert_eq!(flow.code(), "12345");

        flow.set_code("9876543210");
        assert_eq!(flow.code(), "987654");

        flow.set_code("abc");
        assert_eq!(flow.code(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_email_advances_and_arms_countdown() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, _) = flow(api);

        flow.submit_email("user@x.com").await;

        assert_eq!(flow.step(), OtpStep::Otp);
        assert_eq!(flow.email(), "user@x.com");
        assert_eq!(flow.countdown_secs(), 600);
        assert!(flow.error().is_none());
    }

    #[tokio::test]
    async fn test_submit_empty_email_stays_put() {
        let (mut flow, _, _) = flow(ScriptedOtpApi::default());

        flow.submit_email("   ").await;

        assert_eq!(flow.step(), OtpStep::Email);
        assert!(flow.error().is_some());
    }

    #[tokio::test]
    async fn test_submit_email_transport_failure_is_generic() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Err(Error::Timeout));
        let (mut flow, _, _) = flow(api);

        flow.submit_email("user@x.com").await;

        assert_eq!(flow.step(), OtpStep::Email);
        assert_eq!(flow.error(), Some(GENERIC_OTP_FAILURE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_throttled_inside_first_minute() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, api) = flow(api);
        flow.submit_email("user@x.com").await;

        assert!(!flow.can_resend());
        assert!(!flow.resend_otp().await);
        // Throttled locally: no network call, countdown unchanged.
        assert_eq!(api.resend_calls.load(Ordering::SeqCst), 0);
        assert_eq!(flow.countdown_secs(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_permitted_after_first_minute_and_resets_window() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        api.resend.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, api) = flow(api);
        flow.submit_email("user@x.com").await;

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(flow.countdown_secs(), 539);
        assert!(flow.can_resend());

        assert!(flow.resend_otp().await);
        assert_eq!(api.resend_calls.load(Ordering::SeqCst), 1);
        assert_eq!(flow.countdown_secs(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_failure_leaves_countdown_unchanged() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        api.resend.lock().unwrap().push_back(Err(Error::Timeout));
        let (mut flow, _, _) = flow(api);
        flow.submit_email("user@x.com").await;

        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(!flow.resend_otp().await);

        assert_eq!(flow.error(), Some(GENERIC_OTP_FAILURE));
        assert_eq!(flow.countdown_secs(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_freezes_at_zero() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, _) = flow(api);
        flow.submit_email("user@x.com").await;

        tokio::time::advance(Duration::from_secs(700)).await;

        // The window closed but the step does not auto-expire; the server
        // is authoritative on expiry.
        assert_eq!(flow.countdown_secs(), 0);
        assert_eq!(flow.step(), OtpStep::Otp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_success_persists_token_and_closes() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 5, "username": "demo", "email": "user@x.com"
        }))
        .unwrap();
        api.verify.lock().unwrap().push_back(Ok(OtpResponse {
            success: true,
            message: Some("Login successful".into()),
            data: Some(OtpData {
                access_token: Some("t2".into()),
                user: Some(user),
            }),
        }));
        let (mut flow, store, _) = flow(api);
        flow.submit_email("user@x.com").await;
        flow.set_code("123456");

        let success = flow.submit_otp().await.unwrap().expect("verified");

        assert_eq!(success.access_token, "t2");
        assert_eq!(success.user.as_ref().unwrap().id, 5);
        assert!(flow.is_closed());
        assert!(flow.subscribe_countdown().is_none(), "countdown stopped");

        let token = load_session_token(store.as_ref()).await.unwrap().unwrap();
        assert_eq!(token.access_token, "t2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_rejection_surfaces_server_message_and_allows_retry() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        api.verify.lock().unwrap().push_back(Ok(OtpResponse {
            success: false,
            message: Some("OTP has expired".into()),
            data: None,
        }));
        let (mut flow, store, _) = flow(api);
        flow.submit_email("user@x.com").await;
        flow.set_code("123456");

        let outcome = flow.submit_otp().await.unwrap();

        assert!(outcome.is_none());
        assert_eq!(flow.error(), Some("OTP has expired"));
        assert_eq!(flow.step(), OtpStep::Otp);
        assert!(!flow.is_closed());
        assert!(load_session_token(store.as_ref()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_code_is_rejected_locally() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, _) = flow(api);
        flow.submit_email("user@x.com").await;
        flow.set_code("123");

        let outcome = flow.submit_otp().await.unwrap();

        assert!(outcome.is_none());
        assert!(flow.error().unwrap().contains("6-digit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_email_discards_code_and_countdown() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, _) = flow(api);
        flow.submit_email("user@x.com").await;
        flow.set_code("123456");

        flow.change_email();

        assert_eq!(flow.step(), OtpStep::Email);
        assert_eq!(flow.code(), "");
        assert_eq!(flow.countdown_secs(), 0);
        assert!(flow.subscribe_countdown().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_countdown() {
        let api = ScriptedOtpApi::default();
        api.send.lock().unwrap().push_back(Ok(ok_envelope()));
        let (mut flow, _, _) = flow(api);
        flow.submit_email("user@x.com").await;

        flow.close();

        assert!(flow.is_closed());
        assert!(flow.subscribe_countdown().is_none());
    }
}
