//! OAuth2 device authorization grant (RFC 8628).
//!
//! [`DeviceAuthorizer::request_code`] obtains a user code and verification URI
//! to show the user; [`DeviceAuthorizer::poll_token`] then polls the token
//! endpoint until the user approves, denies, or the device code expires.
//! [`DeviceTokenSource`] strings both together behind [`TokenSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::endpoint::{
    self, default_http_client, lenient_seconds, TokenEndpointResponse, DEVICE_CODE_GRANT_TYPE,
};
use super::error::AuthError;
use super::interact::{default_opener, default_prompter, Prompter, UrlOpener};
use super::scope::{ensure_openid_scope, join_scopes};
use super::source::TokenSource;
use super::token::Token;
use crate::util::timeout::{with_cancel, with_timeout};

/// Poll interval used when the provider does not declare one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Added to the poll interval on every `slow_down` reply.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// What the user needs in order to approve the device elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCode {
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
}

/// An outstanding device authorization.
///
/// Created by [`DeviceAuthorizer::request_code`] and consumed by
/// [`DeviceAuthorizer::poll_token`]. The device code itself never leaves this
/// value.
#[derive(Debug)]
pub struct DeviceGrant {
    device_code: String,
    user: UserCode,
    expires_at: DateTime<Utc>,
    deadline: Instant,
    interval: Duration,
}

impl DeviceGrant {
    pub fn user_code(&self) -> &UserCode {
        &self.user
    }

    /// When the device code (not the eventual access token) stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    #[serde(default)]
    device_code: String,
    #[serde(default)]
    user_code: String,
    #[serde(default, alias = "verification_url")]
    verification_uri: String,
    #[serde(default)]
    verification_uri_complete: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    interval: Option<i64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Device authorization protocol engine.
///
/// # Example
/// ```no_run
/// use native_token::auth::DeviceAuthorizer;
///
/// # async fn run() -> Result<(), native_token::auth::AuthError> {
/// let authorizer = DeviceAuthorizer::builder()
///     .device_authorization_endpoint("https://idp.example.com/oauth2/device/authorize")
///     .token_endpoint("https://idp.example.com/oauth2/token")
///     .client_id("my-cli")
///     .build();
/// let cancel = tokio_util::sync::CancellationToken::new();
/// let grant = authorizer.request_code(&cancel).await?;
/// println!("visit {} and enter {}", grant.user_code().verification_uri, grant.user_code().user_code);
/// let token = authorizer.poll_token(grant, &cancel).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceAuthorizer {
    device_authorization_endpoint: String,
    token_endpoint: String,
    client_id: String,
    client_secret: Option<String>,
    scopes: Vec<String>,
    http: reqwest::Client,
}

#[bon]
impl DeviceAuthorizer {
    #[builder]
    pub fn new(
        #[builder(into)] device_authorization_endpoint: String,
        #[builder(into)] token_endpoint: String,
        #[builder(into)] client_id: String,
        #[builder(into)] client_secret: Option<String>,
        #[builder(default)] scopes: Vec<String>,
        #[builder(default = default_http_client())] http: reqwest::Client,
    ) -> Self {
        Self {
            device_authorization_endpoint,
            token_endpoint,
            client_id,
            client_secret,
            scopes: ensure_openid_scope(scopes),
            http,
        }
    }
}

impl DeviceAuthorizer {
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Ask the device authorization endpoint for a device and user code.
    pub async fn request_code(&self, cancel: &CancellationToken) -> Result<DeviceGrant, AuthError> {
        let scope = join_scopes(&self.scopes);
        let mut form = vec![("client_id", self.client_id.as_str()), ("scope", scope.as_str())];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        let payload: DeviceCodeResponse = with_cancel(
            cancel,
            "device code request",
            endpoint::post_form(&self.http, &self.device_authorization_endpoint, &form),
        )
        .await?;

        if let Some(code) = payload.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(AuthError::denied(code, payload.error_description.clone()));
        }
        let expires_in = payload.expires_in.unwrap_or(0);
        if payload.device_code.is_empty()
            || payload.user_code.is_empty()
            || payload.verification_uri.is_empty()
            || expires_in <= 0
        {
            return Err(AuthError::Protocol(format!(
                "incomplete device code response from {} (device_code, user_code, \
                 verification_uri and positive expires_in are required)",
                self.device_authorization_endpoint
            )));
        }

        let interval = match payload.interval {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => DEFAULT_POLL_INTERVAL,
        };
        let lifetime = Duration::from_secs(expires_in as u64);
        let grant = DeviceGrant {
            device_code: payload.device_code,
            user: UserCode {
                user_code: payload.user_code,
                verification_uri: payload.verification_uri,
                verification_uri_complete: payload
                    .verification_uri_complete
                    .filter(|uri| !uri.is_empty()),
            },
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
            deadline: Instant::now() + lifetime,
            interval,
        };
        tracing::info!(
            client_id = %self.client_id,
            expires_in,
            interval_secs = interval.as_secs(),
            "device code issued"
        );
        Ok(grant)
    }

    /// Poll the token endpoint until the grant resolves.
    ///
    /// Polls are paced at the grant's interval and the whole loop is bounded by
    /// the device code lifetime: reaching it yields [`AuthError::Expired`].
    pub async fn poll_token(
        &self,
        grant: DeviceGrant,
        cancel: &CancellationToken,
    ) -> Result<Token, AuthError> {
        let mut interval = grant.interval;
        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(polling_cancelled()),
                _ = tokio::time::sleep_until(grant.deadline) => return Err(code_expired()),
                _ = tokio::time::sleep(interval) => {}
            }

            attempt += 1;
            tracing::debug!(
                client_id = %self.client_id,
                attempt,
                interval_secs = interval.as_secs(),
                "polling device token"
            );
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(polling_cancelled()),
                _ = tokio::time::sleep_until(grant.deadline) => return Err(code_expired()),
                reply = self.request_token(&grant.device_code) => reply?,
            };

            if let Some(token) = reply.token_at(Utc::now()) {
                tracing::info!(client_id = %self.client_id, attempt, "device authorization granted");
                return Ok(token);
            }
            match reply.error_code() {
                Some("authorization_pending") => {}
                Some("slow_down") => {
                    interval += SLOW_DOWN_INCREMENT;
                    tracing::debug!(interval_secs = interval.as_secs(), "provider asked to slow down");
                }
                Some("expired_token") => return Err(code_expired()),
                Some(code) => {
                    return Err(AuthError::denied(code, reply.error_description.clone()));
                }
                None => {
                    return Err(AuthError::Protocol(
                        "device token response carries neither access_token nor error"
                            .to_string(),
                    ));
                }
            }
        }
    }

    async fn request_token(&self, device_code: &str) -> Result<TokenEndpointResponse, AuthError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code),
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        endpoint::post_form(&self.http, &self.token_endpoint, &form).await
    }
}

fn polling_cancelled() -> AuthError {
    AuthError::Cancelled("device token polling cancelled".to_string())
}

fn code_expired() -> AuthError {
    AuthError::Expired("device code expired before authorization completed".to_string())
}

/// Token source running the full device flow: request a code, show it to the
/// user, then poll.
pub struct DeviceTokenSource {
    authorizer: DeviceAuthorizer,
    opener: Arc<dyn UrlOpener>,
    prompter: Arc<dyn Prompter>,
    timeout: Option<Duration>,
}

#[bon]
impl DeviceTokenSource {
    #[builder]
    pub fn new(
        authorizer: DeviceAuthorizer,
        #[builder(default = default_opener())] opener: Arc<dyn UrlOpener>,
        #[builder(default = default_prompter())] prompter: Arc<dyn Prompter>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            authorizer,
            opener,
            prompter,
            timeout,
        }
    }
}

impl DeviceTokenSource {
    /// Show the user code and open the verification page.
    ///
    /// Cancellation while the confirmation prompt is up returns immediately.
    /// A prompter blocked on stdin cannot be interrupted, so its thread finishes
    /// on its own and the answer is discarded.
    async fn direct_user(
        &self,
        user: &UserCode,
        cancel: &CancellationToken,
    ) -> Result<(), AuthError> {
        match user.verification_uri_complete.as_deref() {
            Some(complete) => self.opener.open(complete),
            None => {
                let prompter = self.prompter.clone();
                let message = format!("Please copy one-time code: {}", user.user_code);
                let prompt = tokio::task::spawn_blocking(move || prompter.prompt(&message, true));
                with_cancel(cancel, "user code confirmation", async {
                    if let Err(err) = prompt.await {
                        tracing::warn!(error = %err, "user code prompt failed");
                    }
                    Ok(())
                })
                .await?;
                self.opener.open(&user.verification_uri);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenSource for DeviceTokenSource {
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        with_timeout(self.timeout, async {
            let grant = self.authorizer.request_code(cancel).await?;
            self.direct_user(grant.user_code(), cancel).await?;
            self.authorizer.poll_token(grant, cancel).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_normalizes_scopes() {
        let authorizer = DeviceAuthorizer::builder()
            .device_authorization_endpoint("https://idp.example/device")
            .token_endpoint("https://idp.example/token")
            .client_id("cli")
            .scopes(vec!["offline_access".to_string()])
            .build();
        assert_eq!(authorizer.scopes(), ["offline_access", "openid"]);
    }

    #[test]
    fn device_code_response_accepts_string_numbers_and_url_alias() {
        let payload: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"u","verification_url":"https://v","expires_in":"1800","interval":"5"}"#,
        )
        .unwrap();
        assert_eq!(payload.verification_uri, "https://v");
        assert_eq!(payload.expires_in, Some(1800));
        assert_eq!(payload.interval, Some(5));
    }
}
