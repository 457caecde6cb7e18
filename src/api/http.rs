//! HTTP implementation of the identity API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::IdentityApi;
use crate::config::{auth_url, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::models::{
    OtpContext, OtpResponse, ProfileUpdate, RefreshResponse, SignupRequest, TokenResponse, User,
};
use crate::store::{load_session_token, CredentialStore};

/// Identity client speaking JSON over HTTP to the Folio backend.
///
/// Bearer tokens are read from the injected credential store on each
/// authorized request, so the client always sends whatever the Session
/// Manager last persisted.
pub struct HttpIdentityClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl HttpIdentityClient {
    /// Create a client against `base_url`.
    pub fn new(base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::Network)?;
        Ok(Self::with_client(client, base_url, store))
    }

    /// Create with a custom reqwest client (testing, custom TLS config).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            store,
        }
    }

    fn headers(token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        // Unique request ID for backend-side tracing
        headers.insert(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("00000000-0000-0000-0000-000000000000")),
        );
        if let Some(token) = token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .unwrap_or_else(|_| HeaderValue::from_static("Bearer invalid")),
            );
        }
        headers
    }

    async fn bearer_token(&self) -> Result<String> {
        load_session_token(self.store.as_ref())
            .await?
            .map(|t| t.access_token)
            .ok_or(Error::NotAuthenticated)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T> {
        let response = request.send().await.map_err(classify_reqwest)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, status = status.as_u16(), "Identity API rejected request");
            return Err(status_error(status.as_u16(), &body));
        }

        debug!(endpoint, "Identity API request ok");
        response.json::<T>().await.map_err(classify_reqwest)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
        token: Option<&str>,
    ) -> Result<T> {
        let url = auth_url(&self.base_url, endpoint);
        let request = self.client.post(&url).headers(Self::headers(token)).json(body);
        self.send_json(request, endpoint).await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, token: &str) -> Result<T> {
        let url = auth_url(&self.base_url, endpoint);
        let request = self.client.get(&url).headers(Self::headers(Some(token)));
        self.send_json(request, endpoint).await
    }
}

/// Map a reqwest error to the transport side of the error taxonomy.
fn classify_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e)
    }
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success HTTP status to an error kind.
///
/// The backend reports failures as `{"detail": "..."}` (or occasionally
/// `{"message": "..."}`); the detail string is preserved where the taxonomy
/// surfaces it to the user.
fn status_error(status: u16, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail.or(b.message));

    match status {
        401 => Error::InvalidCredentials,
        403 => Error::AccountDisabled,
        409 => Error::Conflict(detail),
        400 | 422 => Error::Validation(detail),
        _ => Error::Api {
            status,
            message: detail.unwrap_or_else(|| body.chars().take(200).collect()),
        },
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        // The backend accepts username or email in the `username` field.
        let body = json!({ "username": email, "password": password });
        self.post("login", &body, None).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<TokenResponse> {
        let body = serde_json::to_value(request)
            .map_err(|e| Error::Config(format!("Failed to serialize signup request: {}", e)))?;
        self.post("register", &body, None).await
    }

    async fn logout(&self) -> Result<()> {
        let token = self.bearer_token().await?;
        let _: serde_json::Value = self.post("logout", &json!({}), Some(&token)).await?;
        Ok(())
    }

    async fn get_profile(&self) -> Result<User> {
        let token = self.bearer_token().await?;
        self.get("profile", &token).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let body = json!({ "refresh_token": refresh_token });
        self.post("refresh", &body, None).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let token = self.bearer_token().await?;
        let url = auth_url(&self.base_url, "profile");
        let request = self
            .client
            .put(&url)
            .headers(Self::headers(Some(&token)))
            .json(update);
        self.send_json(request, "profile").await
    }

    async fn send_otp(&self, email: &str, context: OtpContext) -> Result<OtpResponse> {
        let body = json!({ "email": email, "context": context });
        self.post("google/send-otp", &body, None).await
    }

    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        context: OtpContext,
    ) -> Result<OtpResponse> {
        let body = json!({ "email": email, "otp": code, "context": context });
        self.post("google/verify-otp", &body, None).await
    }

    async fn resend_otp(&self, email: &str) -> Result<OtpResponse> {
        let body = json!({ "email": email });
        self.post("google/resend-otp", &body, None).await
    }
}

impl std::fmt::Debug for HttpIdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityClient")
            .field("base_url", &self.base_url)
            .field("store", &self.store.name())
            .finish()
    }
}
