//! Token acquisition: device flow, native-app flow, refresh, and caching.

pub mod app;
pub mod cached;
pub mod device_code;
mod endpoint;
pub mod error;
pub mod interact;
pub mod refresh;
pub mod scope;
pub mod source;
pub mod store;
pub mod token;

pub use app::{AppFlowConfig, AppTokenSource, DEFAULT_BIND_ADDRESS, DEFAULT_REDIRECT_HOSTNAME};
pub use cached::CachedTokenSource;
pub use device_code::{DeviceAuthorizer, DeviceGrant, DeviceTokenSource, UserCode};
pub use endpoint::default_http_client;
pub use error::AuthError;
pub use interact::{BrowserOpener, PromptOpener, Prompter, StdoutPrompter, UrlOpener};
pub use refresh::{RefreshTokenSource, Refresher};
pub use scope::{ensure_openid_scope, SCOPE_OFFLINE_ACCESS, SCOPE_OPENID};
pub use source::TokenSource;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{Token, EXPIRY_SKEW};
