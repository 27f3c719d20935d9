//! Validated newtype wrappers for configuration values.
//!
//! Raw strings coming from config files or request paths are parsed once into
//! these types. Everything downstream can then rely on the invariants.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated Shopify API key (the app's client id).
///
/// # Example
///
/// ```rust
/// use shopify_server::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated Shopify API secret key.
///
/// The `Debug` implementation prints `ApiSecretKey(*****)` so the secret
/// never ends up in logs.
///
/// ```rust
/// use shopify_server::ApiSecretKey;
///
/// let secret = ApiSecretKey::new("my-secret").unwrap();
/// assert_eq!(format!("{:?}", secret), "ApiSecretKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecretKey(String);

impl ApiSecretKey {
    /// Creates a new validated API secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiSecretKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiSecretKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiSecretKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecretKey(*****)")
    }
}

/// The handle of a hosted app.
///
/// The name is part of every public route (`/auth/{app}/...`,
/// `/webhook/{app}/...`) and of every session key, so it is restricted to
/// lowercase ASCII letters, digits, `-` and `_`.
///
/// ```rust
/// use shopify_server::AppName;
///
/// assert!(AppName::new("tagged-images").is_ok());
/// assert!(AppName::new("Tagged Images").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    /// Creates a validated app name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAppName`] for empty names or names with
    /// characters outside `[a-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(ConfigError::InvalidAppName { name });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for AppName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated Shopify shop domain.
///
/// Both the short form (`my-store`) and the full form
/// (`my-store.myshopify.com`) are accepted; the value is always stored in
/// the full form.
///
/// ```rust
/// use shopify_server::ShopDomain;
///
/// let domain = ShopDomain::new("My-Store").unwrap();
/// assert_eq!(domain.as_ref(), "my-store.myshopify.com");
/// assert_eq!(domain.shop_name(), "my-store");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShopDomain {
    full_domain: String,
    shop_name_end: usize,
}

impl ShopDomain {
    const SUFFIX: &'static str = ".myshopify.com";

    /// Creates a new validated shop domain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if the domain is invalid.
    pub fn new(domain: impl Into<String>) -> Result<Self, ConfigError> {
        let domain: String = domain.into();
        let domain = domain.trim().to_lowercase();

        let (shop_name, full_domain) = if let Some(name) = domain.strip_suffix(Self::SUFFIX) {
            (name.to_string(), domain.clone())
        } else if domain.contains('.') {
            return Err(ConfigError::InvalidShopDomain { domain });
        } else {
            (domain.clone(), format!("{domain}{}", Self::SUFFIX))
        };

        if !Self::is_valid_shop_name(&shop_name) {
            return Err(ConfigError::InvalidShopDomain { domain });
        }

        Ok(Self {
            shop_name_end: shop_name.len(),
            full_domain,
        })
    }

    /// Returns the shop name (the subdomain before `.myshopify.com`).
    #[must_use]
    pub fn shop_name(&self) -> &str {
        &self.full_domain[..self.shop_name_end]
    }

    /// Returns the admin URL the merchant lands on after installing `api_key`.
    #[must_use]
    pub fn app_url(&self, api_key: &ApiKey) -> String {
        format!("https://{}/admin/apps/{}", self.full_domain, api_key.as_ref())
    }

    fn is_valid_shop_name(name: &str) -> bool {
        if name.is_empty() || name.starts_with('-') || name.ends_with('-') {
            return false;
        }
        name.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.full_domain
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_domain)
    }
}

impl Serialize for ShopDomain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.full_domain)
    }
}

impl<'de> Deserialize<'de> for ShopDomain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// The public base URL the app is served from.
///
/// Used to build the OAuth callback URL and webhook delivery addresses.
/// A trailing `/` is stripped so paths can be appended directly.
///
/// ```rust
/// use shopify_server::HostUrl;
///
/// let url = HostUrl::new("https://myapp.example.com/").unwrap();
/// assert_eq!(url.as_ref(), "https://myapp.example.com");
/// assert_eq!(url.join("/auth/app/callback"), "https://myapp.example.com/auth/app/callback");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostUrl {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl HostUrl {
    /// Creates a new validated host URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostUrl`] unless the URL has an
    /// `http` or `https` scheme and a non-empty host.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url: String = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidHostUrl { url: url.clone() };

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        if !matches!(&url[..scheme_end], "http" | "https") {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        let host_end = url[host_start..]
            .find([':', '/', '?', '#'])
            .map_or(url.len(), |i| host_start + i);
        if host_end == host_start {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme (`http` or `https`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Appends an absolute path to the base URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

impl AsRef<str> for HostUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}
