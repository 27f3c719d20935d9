//! OAuth 2.0 authorization-code handshake.
//!
//! 1. [`OAuthHandshake::generate_authorization_redirect`] builds the consent
//!    screen URL and stores a fresh `state` nonce for the tenant.
//! 2. [`OAuthHandshake::handle_callback`] checks the echoed nonce and the
//!    platform's HMAC signature, exchanges the code for an access token,
//!    and consumes the nonce.
//!
//! # Security Features
//!
//! - **CSRF protection**: the nonce must match and is single-use
//! - **HMAC validation**: the callback's signature is checked over every
//!   query parameter
//! - **Constant-time comparison** for nonces and signatures
//! - **Key rotation**: an old secret key keeps verifying in-flight callbacks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopify_server::auth::oauth::{AuthQuery, OAuthHandshake};
//! use shopify_server::auth::SessionLedger;
//!
//! let handshake = OAuthHandshake::with_http_exchange(Arc::new(config), SessionLedger::new());
//!
//! let redirect = handshake.generate_authorization_redirect(&shop, None).await?;
//! // 303 to redirect.url
//!
//! let query: AuthQuery = /* callback query string */;
//! let access_token = handshake.handle_callback(&query).await?;
//! ```

mod auth_query;
mod begin_auth;
mod error;
mod exchange;
mod handshake;
pub mod hmac;
mod state;

pub use auth_query::AuthQuery;
pub use begin_auth::{begin_auth, AuthorizationRedirect};
pub use error::OAuthError;
pub use exchange::{HttpTokenExchange, TokenExchange, TokenGrant};
pub use handshake::OAuthHandshake;
pub use hmac::{compute_signature, constant_time_compare, validate_hmac};
pub use state::StateParam;
