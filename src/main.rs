//! native-token CLI binary entry point.

use native_token::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    let global = &cli.global;

    let result = match &cli.command {
        Commands::AppAuth(args) => native_token::cli::auth::handle_app_auth(global, args).await,
        Commands::DevAuth(args) => native_token::cli::auth::handle_dev_auth(global, args).await,
        Commands::Status => native_token::cli::auth::handle_status(global).await,
        Commands::Logout => native_token::cli::auth::handle_logout(global).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
