//! native-token: OAuth2 access tokens for command-line tools and native apps.
//!
//! Acquisition strategies share the [`auth::TokenSource`] trait:
//! the device authorization grant (RFC 8628), the native-app loopback flow
//! (RFC 8252, with PKCE or a client secret), and the refresh-token grant.
//! [`auth::CachedTokenSource`] wraps any of them with a persistent cache.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use native_token::prelude::*;
//!
//! # async fn example() -> Result<(), AuthError> {
//! let http = default_http_client();
//! let endpoints = native_token::discovery::discover(&http, "https://idp.example.com").await?;
//! let authorizer = DeviceAuthorizer::builder()
//!     .device_authorization_endpoint(endpoints.require_device_endpoint()?)
//!     .token_endpoint(endpoints.token_endpoint.clone())
//!     .client_id("my-cli")
//!     .http(http.clone())
//!     .build();
//! let device = DeviceTokenSource::builder().authorizer(authorizer).build();
//! let cached = CachedTokenSource::builder()
//!     .key("my-cli")
//!     .store(Arc::new(FileTokenStore::new_default()))
//!     .source(Arc::new(device))
//!     .refresher(
//!         Refresher::builder()
//!             .token_endpoint(endpoints.token_endpoint)
//!             .client_id("my-cli")
//!             .http(http)
//!             .build(),
//!     )
//!     .build();
//! let token = cached.token().await?;
//! println!("{}", token.access_token);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod discovery;
pub mod prelude;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
