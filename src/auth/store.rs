use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::error::AuthError;
use super::token::Token;
use crate::config;

/// Storage abstraction for persisted tokens, keyed by client identifier.
pub trait TokenStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Token>, AuthError>;
    fn save(&self, key: &str, token: &Token) -> Result<(), AuthError>;
    fn clear(&self, key: &str) -> Result<(), AuthError>;
}

/// File-backed token store: one JSON file per key, owner-only permissions.
///
/// Writers in separate processes race on the same file; the last write wins.
///
/// # Example
/// ```no_run
/// use native_token::auth::{FileTokenStore, Token, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let token = Token {
///     access_token: "access".to_string(),
///     token_type: "Bearer".to_string(),
///     refresh_token: Some("refresh".to_string()),
///     expiry: None,
/// };
/// store.save("my-cli", &token)?;
/// # Ok::<(), native_token::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn new_default() -> Self {
        Self::new(config::default_cache_dir())
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Where the entry for `key` lives.
    pub fn token_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", normalize_key(key)))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<Token>, AuthError> {
        let path = self.token_path(key);
        let raw = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AuthError::Persistence(format!(
                    "reading {}: {err}",
                    path.display()
                )))
            }
        };
        let token = serde_json::from_slice(&raw).map_err(|e| {
            AuthError::Persistence(format!("corrupt token cache {}: {e}", path.display()))
        })?;
        Ok(Some(token))
    }

    fn save(&self, key: &str, token: &Token) -> Result<(), AuthError> {
        config::ensure_cache_dir(&self.base_dir)?;
        let path = self.token_path(key);
        let serialized = serde_json::to_vec_pretty(token)
            .map_err(|e| AuthError::Persistence(format!("serializing token: {e}")))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        file.write_all(&serialized)?;
        #[cfg(unix)]
        {
            // `mode` only applies on creation; tighten files left by older writers.
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %path.display(), "token cached");
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), AuthError> {
        let path = self.token_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Persistence(format!(
                "removing {}: {err}",
                path.display()
            ))),
        }
    }
}

/// Process-local store, mostly useful for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<Token>, AuthError> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tokens.get(key).cloned())
    }

    fn save(&self, key: &str, token: &Token) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), token.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// File-name-safe form of a client identifier.
fn normalize_key(value: &str) -> String {
    let trimmed = value.trim();
    let out: String = trimmed
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if out.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
