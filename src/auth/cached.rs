//! Cache-first token source: reuse, refresh, or re-authorize.

use std::sync::Arc;

use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::error::AuthError;
use super::refresh::Refresher;
use super::source::TokenSource;
use super::store::TokenStore;
use super::token::Token;

/// What one call will do, decided from the cached entry alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CachePlan {
    Reuse(Token),
    Refresh(String),
    Authorize,
    NoSource,
}

pub(crate) fn plan(
    cached: Option<Token>,
    now: DateTime<Utc>,
    can_refresh: bool,
    has_source: bool,
) -> CachePlan {
    if let Some(token) = cached {
        if token.is_valid_at(now) {
            return CachePlan::Reuse(token);
        }
        if can_refresh {
            if let Some(refresh_token) = token.refresh_token() {
                return CachePlan::Refresh(refresh_token.to_string());
            }
        }
    }
    if has_source {
        CachePlan::Authorize
    } else {
        CachePlan::NoSource
    }
}

/// Wraps a primary [`TokenSource`] with a [`TokenStore`] and an optional
/// [`Refresher`].
///
/// Each call holds one lock across load, decide, acquire and persist, so
/// concurrent callers on the same instance trigger at most one interactive
/// flow or refresh.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use native_token::auth::{CachedTokenSource, FileTokenStore, TokenSource};
///
/// # async fn run(primary: Arc<dyn TokenSource>) -> Result<(), native_token::auth::AuthError> {
/// let cached = CachedTokenSource::builder()
///     .key("my-cli")
///     .store(Arc::new(FileTokenStore::new_default()))
///     .source(primary)
///     .build();
/// let token = cached.token().await?;
/// # Ok(())
/// # }
/// ```
pub struct CachedTokenSource {
    key: String,
    store: Arc<dyn TokenStore>,
    source: Option<Arc<dyn TokenSource>>,
    refresher: Option<Refresher>,
    lock: Mutex<()>,
}

#[bon]
impl CachedTokenSource {
    #[builder]
    pub fn new(
        /// Cache key, normally the client identifier.
        #[builder(into)]
        key: String,
        store: Arc<dyn TokenStore>,
        source: Option<Arc<dyn TokenSource>>,
        refresher: Option<Refresher>,
    ) -> Self {
        Self {
            key,
            store,
            source,
            refresher,
            lock: Mutex::new(()),
        }
    }
}

impl CachedTokenSource {
    pub fn key(&self) -> &str {
        &self.key
    }

    fn load(&self) -> Option<Token> {
        match self.store.load(&self.key) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "ignoring unreadable cached token");
                None
            }
        }
    }

    fn persist(&self, token: Token) -> Token {
        if let Err(err) = self.store.save(&self.key, &token) {
            tracing::warn!(key = %self.key, error = %err, "could not cache token");
        }
        token
    }

    async fn authorize(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        let source = self.source.as_ref().ok_or(AuthError::NoSourceAvailable)?;
        tracing::info!(key = %self.key, "no usable cached token; starting authorization");
        let token = source.token_with_cancel(cancel).await?;
        Ok(self.persist(token))
    }
}

#[async_trait]
impl TokenSource for CachedTokenSource {
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        let _guard = self.lock.lock().await;
        let cached = self.load();
        match plan(
            cached,
            Utc::now(),
            self.refresher.is_some(),
            self.source.is_some(),
        ) {
            CachePlan::Reuse(token) => {
                tracing::debug!(key = %self.key, "using cached token");
                Ok(token)
            }
            CachePlan::Refresh(refresh_token) => {
                let Some(refresher) = self.refresher.as_ref() else {
                    return self.authorize(cancel).await;
                };
                match refresher.refresh(&refresh_token, cancel).await {
                    Ok(token) => Ok(self.persist(token)),
                    Err(err @ AuthError::Cancelled(_)) => Err(err),
                    Err(err) if self.source.is_some() => {
                        tracing::info!(key = %self.key, error = %err, "refresh failed");
                        self.authorize(cancel).await
                    }
                    Err(err) => Err(err),
                }
            }
            CachePlan::Authorize => self.authorize(cancel).await,
            CachePlan::NoSource => Err(AuthError::NoSourceAvailable),
        }
    }
}
