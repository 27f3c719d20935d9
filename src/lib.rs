//! # Shopify app server plumbing
//!
//! Server-side building blocks for a multi-tenant Shopify app:
//!
//! - Type-safe configuration via [`AppConfig`] and [`AppConfigBuilder`]
//! - The OAuth authorization-code handshake with nonce and HMAC checks, via
//!   [`auth::oauth::OAuthHandshake`], backed by a per-tenant
//!   [`auth::SessionLedger`]
//! - Identity bridging: a custom token is minted for each shop and its access
//!   token is stored in an external identity provider ([`identity`])
//! - Webhook reconciliation: every tenant's subscriptions are converged to a
//!   desired topic set with bounded concurrency ([`webhooks`])
//! - Verified webhook delivery and per-topic dispatch
//! - axum handlers that tie the pieces together ([`routes`])
//!
//! ## Quick Start
//!
//! ```rust
//! use shopify_server::{AppConfig, AppName, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .app_name(AppName::new("tagged-images").unwrap())
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .scopes("read_products,write_orders".parse().unwrap())
//!     .host(HostUrl::new("https://app.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.token_namespace(), "shopifyAccessToken");
//! ```
//!
//! ## Serving an app
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopify_server::auth::{oauth::OAuthHandshake, SessionLedger};
//! use shopify_server::identity::{FirebaseIdentityProvider, IdentityBridge, ServiceAccount, WebAppConfig};
//! use shopify_server::routes::{router, AppState};
//! use shopify_server::webhooks::{WebhookCatalog, WebhookRouter};
//!
//! let config = Arc::new(config);
//! let handshake = OAuthHandshake::with_http_exchange(config.clone(), SessionLedger::new());
//!
//! let account = ServiceAccount::from_json(&std::fs::read_to_string("service-account.json")?)?;
//! let database_url = account.default_database_url();
//! let provider = Arc::new(FirebaseIdentityProvider::new(account, database_url)?);
//! let bridge = IdentityBridge::from_config(provider, &config);
//!
//! let webhooks = WebhookRouter::new(WebhookCatalog::standard())
//!     .on("app", "uninstalled", Uninstalled)?;
//!
//! let state = AppState::new(config, handshake, bridge, WebAppConfig::new("web-key", "my-project"), webhooks);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router(state)).await?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration, the catalog and collaborators are
//!   built once and passed explicitly
//! - **Fail-fast validation**: all newtypes validate on construction
//! - **Thread-safe**: all shared types are `Send + Sync`
//! - **Secrets stay secret**: keys and tokens have masking `Debug` impls
//!   and never appear in error messages

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod webhooks;

// Re-export public types at crate root for convenience
pub use auth::{AccessToken, AuthScopes, FederatedToken, FederatedUserId, SessionLedger, TenantKey};
pub use config::{
    ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, AppName, HostUrl, ShopDomain,
};
pub use error::ConfigError;

pub use auth::oauth::{AuthQuery, OAuthError, OAuthHandshake};
pub use identity::{IdentityBridge, IdentityError, IdentityProvider};
pub use webhooks::{Topic, WebhookCatalog, WebhookError, WebhookReconciler};
