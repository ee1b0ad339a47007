//! Convenience re-exports for common use.

pub use crate::auth::{
    default_http_client, AppFlowConfig, AppTokenSource, AuthError, CachedTokenSource,
    DeviceAuthorizer, DeviceTokenSource, FileTokenStore, MemoryTokenStore, RefreshTokenSource,
    Refresher, Token, TokenSource, TokenStore,
};
pub use crate::discovery::Endpoints;
