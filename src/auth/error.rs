use thiserror::Error;

/// Errors produced while acquiring, refreshing or caching a token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Authorization denied: {description}")]
    AuthorizationDenied { error: String, description: String },
    #[error("Expired: {0}")]
    Expired(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("No valid token and no token source available")]
    NoSourceAvailable,
}

impl AuthError {
    /// Build a denial from an OAuth2 `error` / `error_description` pair.
    ///
    /// Falls back to the error code when the provider sent no description.
    pub fn denied(error: impl Into<String>, description: Option<String>) -> Self {
        let error = error.into();
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| error.clone());
        Self::AuthorizationDenied { error, description }
    }

    /// Whether repeating the same call could plausibly succeed.
    ///
    /// Nothing in this crate retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}
