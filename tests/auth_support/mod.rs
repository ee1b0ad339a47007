#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use native_token::auth::{AuthError, Prompter, Token, TokenSource, TokenStore, UrlOpener};
use tokio_util::sync::CancellationToken;

/// In-memory store that counts saves and can be told to fail them.
#[derive(Default)]
pub struct RecordingTokenStore {
    tokens: Mutex<HashMap<String, Token>>,
    saves: AtomicUsize,
    fail_saves: bool,
    fail_loads: bool,
}

impl RecordingTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, key: &str, token: Token) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), token);
    }

    pub fn get(&self, key: &str) -> Option<Token> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl TokenStore for RecordingTokenStore {
    fn load(&self, key: &str) -> Result<Option<Token>, AuthError> {
        if self.fail_loads {
            return Err(AuthError::Persistence("disk on fire".to_string()));
        }
        Ok(self.get(key))
    }

    fn save(&self, key: &str, token: &Token) -> Result<(), AuthError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(AuthError::Persistence("read-only filesystem".to_string()));
        }
        self.seed(key, token.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }
}

/// Token source that returns a fixed outcome and counts calls.
pub struct StaticTokenSource {
    outcome: Box<dyn Fn() -> Result<Token, AuthError> + Send + Sync>,
    calls: AtomicUsize,
    delay: Option<std::time::Duration>,
}

impl StaticTokenSource {
    pub fn ok(token: Token) -> Self {
        Self::with(move || Ok(token.clone()))
    }

    pub fn failing(make: impl Fn() -> AuthError + Send + Sync + 'static) -> Self {
        Self::with(move || Err(make()))
    }

    fn with(outcome: impl Fn() -> Result<Token, AuthError> + Send + Sync + 'static) -> Self {
        Self {
            outcome: Box::new(outcome),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token_with_cancel(&self, _cancel: &CancellationToken) -> Result<Token, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.outcome)()
    }
}

/// Records every URL it is asked to open.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn urls(&self) -> Vec<String> {
        self.opened.lock().expect("opener lock poisoned").clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) {
        self.opened
            .lock()
            .expect("opener lock poisoned")
            .push(url.to_string());
    }
}

/// Records prompts without blocking.
#[derive(Default)]
pub struct RecordingPrompter {
    pub prompts: Mutex<Vec<(String, bool)>>,
}

impl RecordingPrompter {
    pub fn prompts(&self) -> Vec<(String, bool)> {
        self.prompts.lock().expect("prompter lock poisoned").clone()
    }
}

impl Prompter for RecordingPrompter {
    fn prompt(&self, message: &str, require_confirm: bool) {
        self.prompts
            .lock()
            .expect("prompter lock poisoned")
            .push((message.to_string(), require_confirm));
    }
}

pub fn token(access_token: &str) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: None,
        expiry: Some(Utc::now() + Duration::hours(1)),
    }
}

pub fn expired_token(access_token: &str, refresh_token: Option<&str>) -> Token {
    Token {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: refresh_token.map(String::from),
        expiry: Some(Utc::now() - Duration::minutes(5)),
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
