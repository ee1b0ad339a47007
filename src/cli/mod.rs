//! CLI entry point for native-token.

pub mod auth;

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::auth::{SCOPE_OFFLINE_ACCESS, SCOPE_OPENID};

/// Get OAuth2 access tokens for command-line tools
#[derive(Parser, Debug)]
#[command(
    name = "native-token",
    version,
    about = "Get OAuth2 access tokens via the native app (RFC 8252) or device (RFC 8628) flows"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// OAuth2 client ID (also the cache key)
    #[arg(short = 'c', long, global = true)]
    pub client_id: Option<String>,

    /// OAuth2 issuer URI, used for OpenID Connect discovery
    #[arg(short = 'i', long, global = true)]
    pub issuer: Option<String>,

    /// OAuth2 client secret; falls back to $NATIVE_TOKEN_SECRET
    #[arg(short = 'p', long, global = true)]
    pub client_secret: Option<String>,

    /// Scopes to request (repeatable or comma separated)
    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        default_values = [SCOPE_OPENID, SCOPE_OFFLINE_ACCESS]
    )]
    pub scopes: Vec<String>,

    /// Directory holding cached tokens
    #[arg(short = 's', long, global = true, default_value = "~/.native-token")]
    pub store: String,

    /// Skip the token cache entirely
    #[arg(long, global = true, conflicts_with = "store")]
    pub no_cache: bool,

    /// Never use a cached refresh token
    #[arg(long, global = true)]
    pub no_refresh: bool,

    /// Give up on interactive authorization after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl GlobalArgs {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get a token with the native app authorization flow (RFC 8252)
    AppAuth(AppAuthArgs),
    /// Get a token with the device authorization flow (RFC 8628)
    DevAuth(DevAuthArgs),
    /// Show the cached token state for a client
    Status,
    /// Remove the cached token for a client
    Logout,
}

/// Arguments for `native-token app-auth`.
#[derive(Args, Debug, Clone)]
pub struct AppAuthArgs {
    /// Use the PKCE public-client variant instead of a client secret
    #[arg(long)]
    pub pkce: bool,

    /// Print the URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Hostname placed in the redirect URI
    #[arg(short = 'r', long, default_value = crate::auth::DEFAULT_REDIRECT_HOSTNAME)]
    pub redirect_hostname: String,

    /// Address for the loopback listener (repeatable); default is any free port on 127.0.0.1
    #[arg(short = 'b', long = "bind")]
    pub bind: Vec<String>,
}

/// Arguments for `native-token dev-auth`.
#[derive(Args, Debug, Clone)]
pub struct DevAuthArgs {
    /// Print the verification URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_app_auth_with_defaults() {
        let cli =
            Cli::try_parse_from(["native-token", "app-auth", "-c", "cli", "-i", "https://idp"])
                .unwrap();
        assert_eq!(cli.global.client_id.as_deref(), Some("cli"));
        assert_eq!(cli.global.issuer.as_deref(), Some("https://idp"));
        assert_eq!(cli.global.scopes, ["openid", "offline_access"]);
        assert_eq!(cli.global.store, "~/.native-token");
        assert!(!cli.global.no_cache);
        assert_eq!(cli.global.timeout(), None);
        match cli.command {
            Commands::AppAuth(args) => {
                assert!(!args.pkce);
                assert!(!args.no_browser);
                assert_eq!(args.redirect_hostname, "127.0.0.1");
                assert!(args.bind.is_empty());
            }
            other => panic!("expected AppAuth, got {other:?}"),
        }
    }

    #[test]
    fn parse_app_auth_with_all_options() {
        let cli = Cli::try_parse_from([
            "native-token",
            "app-auth",
            "--pkce",
            "--no-browser",
            "-r",
            "localhost",
            "-b",
            "0.0.0.0:8085",
            "--scopes",
            "openid,profile",
            "--timeout",
            "90",
        ])
        .unwrap();
        assert_eq!(cli.global.scopes, ["openid", "profile"]);
        assert_eq!(cli.global.timeout(), Some(Duration::from_secs(90)));
        match cli.command {
            Commands::AppAuth(args) => {
                assert!(args.pkce);
                assert!(args.no_browser);
                assert_eq!(args.redirect_hostname, "localhost");
                assert_eq!(args.bind, ["0.0.0.0:8085"]);
            }
            other => panic!("expected AppAuth, got {other:?}"),
        }
    }

    #[test]
    fn parse_dev_auth_no_browser() {
        let cli = Cli::try_parse_from(["native-token", "dev-auth", "--no-browser"]).unwrap();
        assert!(matches!(cli.command, Commands::DevAuth(DevAuthArgs { no_browser: true })));
    }

    #[test]
    fn parse_status_and_logout() {
        let cli = Cli::try_parse_from(["native-token", "status", "-c", "cli"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
        let cli = Cli::try_parse_from(["native-token", "logout", "-c", "cli"]).unwrap();
        assert!(matches!(cli.command, Commands::Logout));
    }

    #[test]
    fn store_conflicts_with_no_cache() {
        assert!(
            Cli::try_parse_from(["native-token", "status", "-s", "/tmp/x", "--no-cache"]).is_err()
        );
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["native-token"]).is_err());
    }
}
