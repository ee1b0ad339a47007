use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin subtracted from a token's expiry before it is considered usable.
pub const EXPIRY_SKEW: Duration = Duration::seconds(10);

/// OAuth2 token as returned by a token source and persisted by a store.
///
/// Tokens are plain values: sources hand out fresh copies and never mutate one
/// after it was built.
///
/// # Example
/// ```
/// use native_token::auth::Token;
/// use chrono::{Duration, Utc};
///
/// let token = Token {
///     access_token: "access".to_string(),
///     token_type: "Bearer".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expiry: Some(Utc::now() + Duration::hours(1)),
/// };
/// assert!(token.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Whether the token can be used right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Non-empty access token that does not expire within [`EXPIRY_SKEW`] of `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry > now + EXPIRY_SKEW,
            None => true,
        }
    }

    /// Refresh token, if a non-empty one is present.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}
