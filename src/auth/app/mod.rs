//! Native-app authorization code flow over a loopback redirect (RFC 8252).
//!
//! Two futures run side by side for each call. One binds the loopback
//! listener, announces the authorization URL, waits for the redirect and
//! exchanges the code. The other waits for that announcement and sends the
//! user to the URL. The first error from either ends the call; both futures
//! are polled on the caller's task so neither can outlive it.

mod loopback;
mod pkce;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use reqwest::Url;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use self::loopback::LoopbackListener;
use self::pkce::{random_urlsafe, PkcePair, CHALLENGE_METHOD};
use super::endpoint::{self, default_http_client};
use super::error::AuthError;
use super::interact::{default_opener, UrlOpener};
use super::scope::{ensure_openid_scope, join_scopes};
use super::source::TokenSource;
use super::token::Token;
use crate::util::timeout::{with_cancel, with_timeout};

/// Loopback hostname placed in the redirect URI unless overridden.
pub const DEFAULT_REDIRECT_HOSTNAME: &str = "127.0.0.1";
/// Any free port on the IPv4 loopback interface.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:0";

/// Settings shared by both native-app variants.
#[derive(Clone)]
pub struct AppFlowConfig {
    authorization_endpoint: String,
    token_endpoint: String,
    client_id: String,
    scopes: Vec<String>,
    bind_addresses: Vec<String>,
    redirect_hostname: String,
    http: reqwest::Client,
    timeout: Option<Duration>,
    opener: Arc<dyn UrlOpener>,
}

#[bon]
impl AppFlowConfig {
    #[builder]
    pub fn new(
        #[builder(into)] authorization_endpoint: String,
        #[builder(into)] token_endpoint: String,
        #[builder(into)] client_id: String,
        #[builder(default)] scopes: Vec<String>,
        /// Tried in order; the first that binds wins. Empty means the default.
        #[builder(default)]
        bind_addresses: Vec<String>,
        #[builder(into, default = DEFAULT_REDIRECT_HOSTNAME.to_string())]
        redirect_hostname: String,
        #[builder(default = default_http_client())] http: reqwest::Client,
        timeout: Option<Duration>,
        #[builder(default = default_opener())] opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let bind_addresses = if bind_addresses.is_empty() {
            vec![DEFAULT_BIND_ADDRESS.to_string()]
        } else {
            bind_addresses
        };
        Self {
            authorization_endpoint,
            token_endpoint,
            client_id,
            scopes: ensure_openid_scope(scopes),
            bind_addresses,
            redirect_hostname,
            http,
            timeout,
            opener,
        }
    }
}

impl AppFlowConfig {
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn bind_addresses(&self) -> &[String] {
        &self.bind_addresses
    }

    pub fn redirect_hostname(&self) -> &str {
        &self.redirect_hostname
    }
}

#[derive(Clone)]
enum ClientAuth {
    Pkce,
    Secret(String),
}

/// Token source for the interactive native-app flow.
///
/// # Example
/// ```no_run
/// use native_token::auth::{AppFlowConfig, AppTokenSource, TokenSource};
///
/// # async fn run() -> Result<(), native_token::auth::AuthError> {
/// let config = AppFlowConfig::builder()
///     .authorization_endpoint("https://idp.example.com/oauth2/authorize")
///     .token_endpoint("https://idp.example.com/oauth2/token")
///     .client_id("my-cli")
///     .build();
/// let token = AppTokenSource::pkce(config).token().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppTokenSource {
    config: AppFlowConfig,
    client_auth: ClientAuth,
}

impl AppTokenSource {
    /// Public client: the code exchange is bound by a PKCE verifier.
    pub fn pkce(config: AppFlowConfig) -> Self {
        Self {
            config,
            client_auth: ClientAuth::Pkce,
        }
    }

    /// Confidential client: the code exchange is authenticated by a secret.
    pub fn confidential(
        config: AppFlowConfig,
        client_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client_secret = client_secret.into();
        if client_secret.trim().is_empty() {
            return Err(AuthError::Validation(
                "the confidential app flow requires a client secret".to_string(),
            ));
        }
        Ok(Self {
            config,
            client_auth: ClientAuth::Secret(client_secret),
        })
    }

    pub fn config(&self) -> &AppFlowConfig {
        &self.config
    }

    async fn authorize(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        let flow = cancel.child_token();
        let _flow_guard = flow.clone().drop_guard();
        let pkce = match self.client_auth {
            ClientAuth::Pkce => Some(PkcePair::generate()),
            ClientAuth::Secret(_) => None,
        };
        let state = random_urlsafe(2);
        let (ready_tx, ready_rx) = oneshot::channel();

        let direct = async {
            let result = self.direct_user(ready_rx, &flow).await;
            if result.is_err() {
                flow.cancel();
            }
            result
        };
        let exchange = async {
            let result = self
                .exchange_code(ready_tx, &state, pkce.as_ref(), &flow)
                .await;
            if result.is_err() {
                flow.cancel();
            }
            result
        };
        let ((), token) = tokio::try_join!(direct, exchange)?;
        Ok(token)
    }

    async fn direct_user(
        &self,
        ready: oneshot::Receiver<String>,
        cancel: &CancellationToken,
    ) -> Result<(), AuthError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AuthError::Cancelled(
                "cancelled while waiting for the loopback listener".to_string(),
            )),
            announced = ready => {
                // A closed channel means the exchange side gave up; it reports why.
                if let Ok(url) = announced {
                    self.config.opener.open(&url);
                }
                Ok(())
            }
        }
    }

    async fn exchange_code(
        &self,
        ready: oneshot::Sender<String>,
        state: &str,
        pkce: Option<&PkcePair>,
        cancel: &CancellationToken,
    ) -> Result<Token, AuthError> {
        let listener =
            LoopbackListener::bind(&self.config.bind_addresses, &self.config.redirect_hostname)
                .await?;
        let redirect_uri = listener.redirect_uri().to_string();
        let auth_url = self.authorization_url(&redirect_uri, state, pkce)?;
        let _ = ready.send(auth_url);

        let code = listener.wait_for_code(state, cancel).await?;
        tracing::debug!(client_id = %self.config.client_id, "authorization code received");

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        match (&self.client_auth, pkce) {
            (ClientAuth::Secret(secret), _) => form.push(("client_secret", secret.as_str())),
            (ClientAuth::Pkce, Some(pair)) => form.push(("code_verifier", pair.verifier.as_str())),
            (ClientAuth::Pkce, None) => {}
        }
        let token = with_cancel(
            cancel,
            "authorization code exchange",
            endpoint::exchange(&self.config.http, &self.config.token_endpoint, &form),
        )
        .await?;
        tracing::info!(client_id = %self.config.client_id, "native app authorization granted");
        Ok(token)
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        pkce: Option<&PkcePair>,
    ) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.config.authorization_endpoint).map_err(|e| {
            AuthError::Validation(format!(
                "invalid authorization endpoint {}: {e}",
                self.config.authorization_endpoint
            ))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("scope", &join_scopes(&self.config.scopes))
                .append_pair("state", state);
            if let Some(pair) = pkce {
                query
                    .append_pair("code_challenge", &pair.challenge)
                    .append_pair("code_challenge_method", CHALLENGE_METHOD);
            }
        }
        Ok(url.into())
    }
}

#[async_trait]
impl TokenSource for AppTokenSource {
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        with_timeout(self.config.timeout, self.authorize(cancel)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config() -> AppFlowConfig {
        AppFlowConfig::builder()
            .authorization_endpoint("https://idp.example/authorize?prompt=login")
            .token_endpoint("https://idp.example/token")
            .client_id("cli")
            .scopes(vec!["profile".to_string()])
            .build()
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn defaults_are_applied() {
        let config = config();
        assert_eq!(config.bind_addresses(), ["127.0.0.1:0"]);
        assert_eq!(config.redirect_hostname(), "127.0.0.1");
        assert_eq!(config.scopes(), ["profile", "openid"]);
    }

    #[test]
    fn pkce_url_carries_challenge() {
        let source = AppTokenSource::pkce(config());
        let pair = PkcePair::generate();
        let url = source
            .authorization_url("http://127.0.0.1:4000/", "st", Some(&pair))
            .unwrap();
        let params = query(&url);
        assert_eq!(params["prompt"], "login");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "cli");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4000/");
        assert_eq!(params["scope"], "profile openid");
        assert_eq!(params["state"], "st");
        assert_eq!(params["code_challenge"], pair.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
    }

    #[test]
    fn confidential_url_has_no_challenge() {
        let source = AppTokenSource::confidential(config(), "secret").unwrap();
        let url = source
            .authorization_url("http://127.0.0.1:4000/", "st", None)
            .unwrap();
        assert!(!query(&url).contains_key("code_challenge"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn confidential_requires_secret() {
        assert!(matches!(
            AppTokenSource::confidential(config(), "  "),
            Err(AuthError::Validation(_))
        ));
    }
}
