//! OpenID Connect issuer discovery.

use serde::Deserialize;

use crate::auth::AuthError;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Endpoints advertised by an issuer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoints {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub device_authorization_endpoint: Option<String>,
}

impl Endpoints {
    /// Device endpoint, or a validation error naming the issuer.
    pub fn require_device_endpoint(&self) -> Result<&str, AuthError> {
        self.device_authorization_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                AuthError::Validation(format!(
                    "issuer {} does not advertise a device_authorization_endpoint",
                    self.issuer
                ))
            })
    }
}

/// Fetch `{issuer}/.well-known/openid-configuration`.
///
/// The document's `issuer` must equal `issuer` (ignoring a trailing slash).
pub async fn discover(http: &reqwest::Client, issuer: &str) -> Result<Endpoints, AuthError> {
    let base = issuer.trim_end_matches('/');
    let url = format!("{base}{WELL_KNOWN_PATH}");
    tracing::debug!(%url, "discovering issuer endpoints");

    let resp = http
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AuthError::Transport(format!(
            "{url} returned status {status}"
        )));
    }
    let endpoints: Endpoints = resp
        .json()
        .await
        .map_err(|e| AuthError::Protocol(format!("invalid discovery document at {url}: {e}")))?;

    if endpoints.issuer.trim_end_matches('/') != base {
        return Err(AuthError::Protocol(format!(
            "issuer mismatch: expected {base}, discovery document says {}",
            endpoints.issuer
        )));
    }
    if endpoints.authorization_endpoint.is_empty() || endpoints.token_endpoint.is_empty() {
        return Err(AuthError::Protocol(format!(
            "discovery document at {url} lacks authorization or token endpoint"
        )));
    }
    Ok(endpoints)
}
