use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::AuthError;
use super::token::Token;

/// Something that can produce a valid token.
///
/// Implemented by every acquisition strategy (device flow, native-app flow,
/// refresh) and by [`CachedTokenSource`](super::CachedTokenSource), which wraps
/// one of the others.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Produce a token, giving up with [`AuthError::Cancelled`] once `cancel`
    /// fires.
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError>;

    /// Produce a token with no external cancellation.
    async fn token(&self) -> Result<Token, AuthError> {
        self.token_with_cancel(&CancellationToken::new()).await
    }
}

#[async_trait]
impl<T> TokenSource for Arc<T>
where
    T: TokenSource + ?Sized,
{
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        (**self).token_with_cancel(cancel).await
    }
}

#[async_trait]
impl<T> TokenSource for Box<T>
where
    T: TokenSource + ?Sized,
{
    async fn token_with_cancel(&self, cancel: &CancellationToken) -> Result<Token, AuthError> {
        (**self).token_with_cancel(cancel).await
    }
}
