//! Server configuration.
//!
//! One [`AppConfig`] describes one hosted app: its Shopify credentials, the
//! public host it is reachable on, and the knobs used by the handshake, the
//! identity bridge and the webhook reconciler. It is built once at startup,
//! wrapped in an `Arc`, and handed to each component explicitly.
//!
//! # Example
//!
//! ```rust
//! use shopify_server::{AppConfig, AppName, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .app_name(AppName::new("tagged-images").unwrap())
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .host(HostUrl::new("https://app.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     config.callback_url().as_deref(),
//!     Some("https://app.example.com/auth/tagged-images/callback")
//! );
//! ```

mod newtypes;
mod version;

pub use newtypes::{ApiKey, ApiSecretKey, AppName, HostUrl, ShopDomain};
pub use version::ApiVersion;

use crate::auth::AuthScopes;
use crate::error::ConfigError;

/// Identity-store namespace the access tokens are written under.
pub const DEFAULT_TOKEN_NAMESPACE: &str = "shopifyAccessToken";

/// Default number of concurrent remote calls per reconciliation fan-out level.
pub const DEFAULT_RECONCILE_CONCURRENCY: usize = 8;

/// Configuration for one hosted app.
///
/// # Key Rotation
///
/// When `old_api_secret_key` is set, HMAC verification of OAuth callbacks
/// and webhook deliveries falls back to it after the primary key fails, so
/// in-flight installs survive a secret rotation.
#[derive(Clone, Debug)]
pub struct AppConfig {
    app_name: AppName,
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: AuthScopes,
    host: Option<HostUrl>,
    api_version: ApiVersion,
    token_namespace: String,
    reconcile_concurrency: usize,
    user_agent_prefix: Option<String>,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Returns the app handle used in routes and session keys.
    #[must_use]
    pub const fn app_name(&self) -> &AppName {
        &self.app_name
    }

    /// Returns the API key.
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the previous API secret key, if one is still accepted.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the OAuth scopes requested by default.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the public host URL, if configured.
    #[must_use]
    pub const fn host(&self) -> Option<&HostUrl> {
        self.host.as_ref()
    }

    /// Returns the Admin API version used by the webhook client.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the identity-store namespace for persisted access tokens.
    #[must_use]
    pub fn token_namespace(&self) -> &str {
        &self.token_namespace
    }

    /// Returns the maximum number of concurrent calls per fan-out level.
    #[must_use]
    pub const fn reconcile_concurrency(&self) -> usize {
        self.reconcile_concurrency
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns `{host}/auth/{app}/callback`, or `None` without a host.
    #[must_use]
    pub fn callback_url(&self) -> Option<String> {
        self.host
            .as_ref()
            .map(|host| host.join(&format!("auth/{}/callback", self.app_name)))
    }

    /// Returns the `User-Agent` header value for outgoing requests.
    #[must_use]
    pub fn user_agent(&self) -> String {
        let base = concat!("shopify-server/", env!("CARGO_PKG_VERSION"));
        match &self.user_agent_prefix {
            Some(prefix) => format!("{prefix} | {base}"),
            None => base.to_string(),
        }
    }
}

const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for [`AppConfig`].
///
/// `app_name`, `api_key` and `api_secret_key` are required.
///
/// # Defaults
///
/// - `scopes`: empty
/// - `host`: `None`
/// - `api_version`: latest stable
/// - `token_namespace`: [`DEFAULT_TOKEN_NAMESPACE`]
/// - `reconcile_concurrency`: [`DEFAULT_RECONCILE_CONCURRENCY`]
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    app_name: Option<AppName>,
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: Option<AuthScopes>,
    host: Option<HostUrl>,
    api_version: Option<ApiVersion>,
    token_namespace: Option<String>,
    reconcile_concurrency: Option<usize>,
    user_agent_prefix: Option<String>,
}

impl AppConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the app handle (required).
    #[must_use]
    pub fn app_name(mut self, name: AppName) -> Self {
        self.app_name = Some(name);
        self
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the previous secret key accepted during rotation.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the public host URL.
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the Admin API version.
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Overrides the identity-store namespace for access tokens.
    #[must_use]
    pub fn token_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.token_namespace = Some(namespace.into());
        self
    }

    /// Sets the reconciliation concurrency limit.
    #[must_use]
    pub const fn reconcile_concurrency(mut self, limit: usize) -> Self {
        self.reconcile_concurrency = Some(limit);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`AppConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] when a required field is
    /// unset, [`ConfigError::InvalidTokenNamespace`] for a namespace that is
    /// not a single identity-store path segment, and
    /// [`ConfigError::ZeroConcurrency`] for a concurrency limit of zero.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let app_name = self
            .app_name
            .ok_or(ConfigError::MissingRequiredField { field: "app_name" })?;
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self
            .api_secret_key
            .ok_or(ConfigError::MissingRequiredField {
                field: "api_secret_key",
            })?;

        let token_namespace = self
            .token_namespace
            .unwrap_or_else(|| DEFAULT_TOKEN_NAMESPACE.to_string());
        let forbidden = ['/', '.', '#', '$', '[', ']'];
        if token_namespace.is_empty() || token_namespace.contains(forbidden) {
            return Err(ConfigError::InvalidTokenNamespace {
                namespace: token_namespace,
            });
        }

        let reconcile_concurrency = self
            .reconcile_concurrency
            .unwrap_or(DEFAULT_RECONCILE_CONCURRENCY);
        if reconcile_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(AppConfig {
            app_name,
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            scopes: self.scopes.unwrap_or_default(),
            host: self.host,
            api_version: self.api_version.unwrap_or_else(ApiVersion::latest),
            token_namespace,
            reconcile_concurrency,
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
