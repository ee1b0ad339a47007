//! Token endpoint wire format shared by every grant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer};

use super::error::AuthError;
use super::token::Token;

pub(crate) const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_TOKEN_TYPE: &str = "Bearer";
const BODY_SNIPPET_CHARS: usize = 200;
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Build the HTTP client a configuration uses when none is injected.
///
/// Each configuration owns its own client; nothing is shared process-wide.
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to an HTTP client without timeout");
            reqwest::Client::new()
        })
}

/// One schema for every token endpoint reply: either token fields or an
/// OAuth2 error pair.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenEndpointResponse {
    /// Token built from this reply, with expiry counted from `now`.
    ///
    /// `None` when the reply carries no access token.
    pub fn token_at(&self, now: DateTime<Utc>) -> Option<Token> {
        let access_token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some(Token {
            access_token: access_token.to_string(),
            token_type: self
                .token_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            refresh_token: self.refresh_token.clone().filter(|t| !t.is_empty()),
            expiry: expiry_from(now, self.expires_in),
        })
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    /// Collapse a single-shot grant reply into a token or an error.
    pub fn into_result(self, now: DateTime<Utc>) -> Result<Token, AuthError> {
        if let Some(token) = self.token_at(now) {
            return Ok(token);
        }
        match self.error_code() {
            Some(code) => Err(AuthError::denied(code, self.error_description.clone())),
            None => Err(AuthError::Protocol(
                "token response carries neither access_token nor error".to_string(),
            )),
        }
    }
}

/// POST a form to a token-style endpoint and decode the JSON reply.
///
/// Error replies (4xx with an OAuth2 `error` body) decode successfully so the
/// caller can inspect the error code; anything that is not JSON is reported as
/// a transport failure when the status is not 2xx.
pub(crate) async fn post_form<T>(
    http: &reqwest::Client,
    url: &str,
    form: &[(&str, &str)],
) -> Result<T, AuthError>
where
    T: for<'de> Deserialize<'de>,
{
    let resp = http
        .post(url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await?;
    let status = resp.status();
    let body = resp.text().await?;
    match serde_json::from_str::<T>(&body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => Err(AuthError::Transport(format!(
            "{url} returned status {status}: {}",
            snippet(&body)
        ))),
        Err(err) => Err(AuthError::Protocol(format!(
            "{url} returned an unreadable body ({err}): {}",
            snippet(&body)
        ))),
    }
}

/// Run a single-shot grant (authorization_code, refresh_token) at `url`.
pub(crate) async fn exchange(
    http: &reqwest::Client,
    url: &str,
    form: &[(&str, &str)],
) -> Result<Token, AuthError> {
    let response: TokenEndpointResponse = post_form(http, url, form).await?;
    response.into_result(Utc::now())
}

pub(crate) fn expiry_from(now: DateTime<Utc>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| now + Duration::seconds(secs))
}

/// Seconds that may arrive as a JSON number or a numeric string.
///
/// Values are clamped to `i32::MAX` so later date arithmetic cannot overflow.
pub(crate) fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let secs = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid seconds value: {n}")))?,
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid seconds string: {e}")))?,
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "invalid seconds value: {other}"
            )))
        }
    };
    Ok(Some(secs.min(i64::from(i32::MAX))))
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(BODY_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> TokenEndpointResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn expires_in_accepts_numbers_and_strings() {
        assert_eq!(parse(r#"{"expires_in": 3600}"#).expires_in, Some(3600));
        assert_eq!(parse(r#"{"expires_in": "3600"}"#).expires_in, Some(3600));
        assert_eq!(parse(r#"{"expires_in": null}"#).expires_in, None);
        assert_eq!(parse(r#"{}"#).expires_in, None);
    }

    #[test]
    fn expires_in_is_clamped() {
        let parsed = parse(r#"{"expires_in": 99999999999}"#);
        assert_eq!(parsed.expires_in, Some(i64::from(i32::MAX)));
    }

    #[test]
    fn expires_in_rejects_garbage() {
        assert!(serde_json::from_str::<TokenEndpointResponse>(r#"{"expires_in": "soon"}"#).is_err());
        assert!(serde_json::from_str::<TokenEndpointResponse>(r#"{"expires_in": true}"#).is_err());
    }

    #[test]
    fn token_expiry_counts_from_reply_time() {
        let now = Utc::now();
        let token = parse(r#"{"access_token": "a", "token_type": "bearer", "expires_in": 60}"#)
            .token_at(now)
            .unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expiry, Some(now + Duration::seconds(60)));
        assert_eq!(token.refresh_token, None);
    }

    #[test]
    fn zero_expires_in_means_no_expiry() {
        let token = parse(r#"{"access_token": "a", "expires_in": 0}"#)
            .token_at(Utc::now())
            .unwrap();
        assert_eq!(token.expiry, None);
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn error_reply_becomes_denial() {
        let err = parse(r#"{"error": "invalid_grant", "error_description": "stale"}"#)
            .into_result(Utc::now())
            .unwrap_err();
        match err {
            AuthError::AuthorizationDenied { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description, "stale");
            }
            other => panic!("expected AuthorizationDenied, got {other:?}"),
        }
    }

    #[test]
    fn empty_reply_is_a_protocol_error() {
        let err = parse(r#"{"access_token": ""}"#)
            .into_result(Utc::now())
            .unwrap_err();
        assert!(matches!(err, AuthError::Protocol(_)));
    }
}
