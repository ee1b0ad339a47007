//! CLI command handlers for app-auth, dev-auth, status, and logout.

use std::sync::Arc;

use chrono::Utc;

use super::{AppAuthArgs, DevAuthArgs, GlobalArgs};
use crate::auth::{
    default_http_client, AppFlowConfig, AppTokenSource, BrowserOpener, CachedTokenSource,
    DeviceAuthorizer, DeviceTokenSource, FileTokenStore, PromptOpener, Refresher,
    StdoutPrompter, Token, TokenSource, TokenStore, UrlOpener,
};
use crate::config::{expand_home, resolve_client_secret};
use crate::discovery::discover;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `native-token app-auth`.
pub async fn handle_app_auth(global: &GlobalArgs, args: &AppAuthArgs) -> CliResult {
    let client_id = require(&global.client_id, "--client-id")?;
    let issuer = require(&global.issuer, "--issuer")?;
    let client_secret = resolve_client_secret(global.client_secret.clone());
    if client_secret.is_none() && !args.pkce {
        return Err("client secret is required for the confidential flow; pass \
                    --client-secret, set NATIVE_TOKEN_SECRET, or use --pkce"
            .into());
    }

    let http = default_http_client();
    let endpoints = discover(&http, issuer).await?;
    let config = AppFlowConfig::builder()
        .authorization_endpoint(endpoints.authorization_endpoint.clone())
        .token_endpoint(endpoints.token_endpoint.clone())
        .client_id(client_id)
        .scopes(global.scopes.clone())
        .bind_addresses(args.bind.clone())
        .redirect_hostname(args.redirect_hostname.clone())
        .http(http.clone())
        .maybe_timeout(global.timeout())
        .opener(opener(args.no_browser))
        .build();
    let source: Arc<dyn TokenSource> = match client_secret.as_deref() {
        Some(secret) if !args.pkce => Arc::new(AppTokenSource::confidential(config, secret)?),
        _ => Arc::new(AppTokenSource::pkce(config)),
    };

    let secret_for_refresh = if args.pkce { None } else { client_secret };
    let refresher = Refresher::builder()
        .token_endpoint(endpoints.token_endpoint)
        .client_id(client_id)
        .maybe_client_secret(secret_for_refresh)
        .http(http)
        .build();
    let token = obtain(global, client_id, source, refresher).await?;
    print_token(&token)
}

/// Handle `native-token dev-auth`.
pub async fn handle_dev_auth(global: &GlobalArgs, args: &DevAuthArgs) -> CliResult {
    let client_id = require(&global.client_id, "--client-id")?;
    let issuer = require(&global.issuer, "--issuer")?;
    let client_secret = resolve_client_secret(global.client_secret.clone());

    let http = default_http_client();
    let endpoints = discover(&http, issuer).await?;
    let authorizer = DeviceAuthorizer::builder()
        .device_authorization_endpoint(endpoints.require_device_endpoint()?)
        .token_endpoint(endpoints.token_endpoint.clone())
        .client_id(client_id)
        .maybe_client_secret(client_secret.clone())
        .scopes(global.scopes.clone())
        .http(http.clone())
        .build();
    let source: Arc<dyn TokenSource> = Arc::new(
        DeviceTokenSource::builder()
            .authorizer(authorizer)
            .opener(opener(args.no_browser))
            .maybe_timeout(global.timeout())
            .build(),
    );

    let refresher = Refresher::builder()
        .token_endpoint(endpoints.token_endpoint)
        .client_id(client_id)
        .maybe_client_secret(client_secret)
        .http(http)
        .build();
    let token = obtain(global, client_id, source, refresher).await?;
    print_token(&token)
}

/// Handle `native-token status`.
pub async fn handle_status(global: &GlobalArgs) -> CliResult {
    let client_id = require(&global.client_id, "--client-id")?;
    let store = file_store(global);
    let path = store.token_path(client_id);

    match store.load(client_id)? {
        None => println!("No cached token for {client_id} ({})", path.display()),
        Some(token) => {
            println!("Client:   {client_id}");
            println!("Cache:    {}", path.display());
            println!("Type:     {}", token.token_type);
            match token.expiry {
                Some(expiry) => {
                    let now = Utc::now();
                    if token.is_valid_at(now) {
                        let minutes = (expiry - now).num_minutes();
                        println!("Expires:  {expiry} (in {minutes}m)");
                    } else if expiry > now {
                        println!("Expires:  {expiry} (about to expire)");
                    } else {
                        println!("Expired:  {expiry}");
                    }
                }
                None => println!("Expires:  never"),
            }
            println!(
                "Refresh:  {}",
                if token.refresh_token().is_some() {
                    "available"
                } else {
                    "none"
                }
            );
        }
    }
    Ok(())
}

/// Handle `native-token logout`.
pub async fn handle_logout(global: &GlobalArgs) -> CliResult {
    let client_id = require(&global.client_id, "--client-id")?;
    file_store(global).clear(client_id)?;
    println!("Removed cached token for {client_id}");
    Ok(())
}

async fn obtain(
    global: &GlobalArgs,
    client_id: &str,
    source: Arc<dyn TokenSource>,
    refresher: Refresher,
) -> Result<Token, Box<dyn std::error::Error>> {
    if global.no_cache {
        return Ok(source.token().await?);
    }
    let cached = CachedTokenSource::builder()
        .key(client_id)
        .store(Arc::new(file_store(global)) as Arc<dyn TokenStore>)
        .source(source)
        .maybe_refresher((!global.no_refresh).then_some(refresher))
        .build();
    Ok(cached.token().await?)
}

fn file_store(global: &GlobalArgs) -> FileTokenStore {
    FileTokenStore::new(expand_home(&global.store))
}

fn opener(no_browser: bool) -> Arc<dyn UrlOpener> {
    if no_browser {
        Arc::new(PromptOpener::new(Arc::new(StdoutPrompter)))
    } else {
        Arc::new(BrowserOpener)
    }
}

fn require<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{flag} is required"))
}

fn print_token(token: &Token) -> CliResult {
    println!("{}", serde_json::to_string_pretty(token)?);
    Ok(())
}
