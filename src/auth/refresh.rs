//! Refresh-token grant and a token source over a rotating refresh token.

use async_trait::async_trait;
use bon::bon;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::endpoint::{self, default_http_client};
use super::error::AuthError;
use super::source::TokenSource;
use super::token::Token;
use crate::util::timeout::with_cancel;

/// Exchanges refresh tokens at a token endpoint.
#[derive(Debug, Clone)]
pub struct Refresher {
    token_endpoint: String,
    client_id: String,
    client_secret: Option<String>,
    http: reqwest::Client,
}

#[bon]
impl Refresher {
    #[builder]
    pub fn new(
        #[builder(into)] token_endpoint: String,
        #[builder(into)] client_id: String,
        #[builder(into)] client_secret: Option<String>,
        #[builder(default = default_http_client())] http: reqwest::Client,
    ) -> Self {
        Self {
            token_endpoint,
            client_id,
            client_secret,
            http,
        }
    }
}

impl Refresher {
    /// Run one `refresh_token` grant.
    ///
    /// The returned token carries the provider's rotated refresh token, or
    /// `refresh_token` itself when the provider did not rotate. Persisting the
    /// rotation is the caller's job.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Token, AuthError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::Validation("refresh token is empty".to_string()));
        }
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        tracing::debug!(
            client_id = %self.client_id,
            endpoint = %self.token_endpoint,
            "refreshing token"
        );
        let mut token = with_cancel(
            cancel,
            "token refresh",
            endpoint::exchange(&self.http, &self.token_endpoint, &form),
        )
        .await?;

        let rotated = token.refresh_token().is_some_and(|new| new != refresh_token);
        if token.refresh_token().is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        tracing::info!(client_id = %self.client_id, rotated, "token refreshed");
        Ok(token)
    }
}

/// Token source that holds a refresh token and keeps it current.
///
/// Every call performs a refresh; whenever the provider rotates the refresh
/// token the held value is replaced so the next call uses the new one.
pub struct RefreshTokenSource {
    refresher: Refresher,
    refresh_token: Mutex<String>,
}

impl RefreshTokenSource {
    pub fn new(refresher: Refresher, refresh_token: impl Into<String>) -> Self {
        Self {
            refresher,
            refresh_token: Mutex::new(refresh_token.into()),
        }
    }

    /// The refresh token the next call will present.
    pub async fn current_refresh_token(&self) -> String {
        self.refresh_token.lock().await.clone()
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        let mut held = self.refresh_token.lock().await;
        let token = self.refresher.refresh(&held, cancel).await?;
        if let Some(rotated) = token.refresh_token() {
            if rotated != held.as_str() {
                *held = rotated.to_string();
            }
        }
        Ok(token)
    }
}
