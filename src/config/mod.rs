//! Ambient settings: where the token cache lives and where secrets come from.
//!
//! Resolution order for the client secret:
//! 1. Explicit value (e.g. a CLI flag)
//! 2. `NATIVE_TOKEN_SECRET` from the environment (a `.env` file is loaded first)

use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::AuthError;

/// Environment variable consulted for the client secret.
pub const SECRET_ENV: &str = "NATIVE_TOKEN_SECRET";
/// Directory under the user's home that holds cached tokens.
pub const CACHE_DIR_NAME: &str = ".native-token";

/// `~/.native-token`, or a relative `.native-token` when no home is known.
pub fn default_cache_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(CACHE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(CACHE_DIR_NAME))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    expand_with(path, home.as_deref())
}

fn expand_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Create the cache directory (and parents) readable only by the owner.
pub fn ensure_cache_dir(path: &Path) -> Result<(), AuthError> {
    fs::create_dir_all(path).map_err(|e| {
        AuthError::Persistence(format!("creating cache dir {}: {e}", path.display()))
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| {
            AuthError::Persistence(format!("restricting cache dir {}: {e}", path.display()))
        })?;
    }
    Ok(())
}

/// Pick the client secret from an explicit value or the environment.
pub fn resolve_client_secret(explicit: Option<String>) -> Option<String> {
    let _ = dotenvy::dotenv(); // load .env if present, ignore error
    pick_secret(explicit, std::env::var(SECRET_ENV).ok())
}

fn pick_secret(explicit: Option<String>, env: Option<String>) -> Option<String> {
    explicit
        .filter(|s| !s.trim().is_empty())
        .or_else(|| env.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn expands_tilde_prefix() {
        let home = Path::new("/home/someone");
        assert_eq!(expand_with("~", Some(home)), PathBuf::from("/home/someone"));
        assert_eq!(
            expand_with("~/.native-token", Some(home)),
            PathBuf::from("/home/someone/.native-token")
        );
        assert_eq!(expand_with("~other/x", Some(home)), PathBuf::from("~other/x"));
        assert_eq!(expand_with("/tmp/cache", Some(home)), PathBuf::from("/tmp/cache"));
        assert_eq!(expand_with("~/x", None), PathBuf::from("~/x"));
    }

    #[test]
    fn explicit_secret_wins_over_env() {
        assert_eq!(
            pick_secret(Some("flag".into()), Some("env".into())).as_deref(),
            Some("flag")
        );
        assert_eq!(
            pick_secret(Some(" ".into()), Some("env".into())).as_deref(),
            Some("env")
        );
        assert_eq!(pick_secret(None, Some(String::new())), None);
    }

    #[test]
    fn default_cache_dir_ends_with_dir_name() {
        assert!(default_cache_dir().ends_with(CACHE_DIR_NAME));
    }

    #[test]
    fn cache_dir_is_created_owner_only() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("nested").join("cache");
        ensure_cache_dir(&cache).unwrap();
        assert!(cache.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&cache).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
