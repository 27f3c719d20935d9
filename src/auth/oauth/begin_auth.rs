//! Authorization URL construction.

use crate::auth::oauth::error::OAuthError;
use crate::auth::oauth::state::StateParam;
use crate::auth::AuthScopes;
use crate::config::{AppConfig, ShopDomain};

/// Where to send the merchant's browser to start a handshake.
#[derive(Clone, Debug)]
pub struct AuthorizationRedirect {
    /// The consent screen URL.
    pub url: String,
    /// The nonce embedded in `url`, to be checked on callback.
    pub state: StateParam,
}

const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuthorizationRedirect>();
};

/// Builds the consent screen URL for `shop` with a fresh nonce.
///
/// The callback URL is `{host}/auth/{app}/callback`. `scope_override`
/// replaces the configured scopes for this request only.
///
/// This is a pure function; storing the nonce is the caller's job (see
/// [`OAuthHandshake`](crate::auth::oauth::OAuthHandshake)).
///
/// # Errors
///
/// Returns [`OAuthError::MissingHostConfig`] if no host is configured.
///
/// ```rust
/// use shopify_server::{AppConfig, AppName, ApiKey, ApiSecretKey, HostUrl, ShopDomain};
/// use shopify_server::auth::oauth::begin_auth;
///
/// let config = AppConfig::builder()
///     .app_name(AppName::new("tagged-images").unwrap())
///     .api_key(ApiKey::new("key").unwrap())
///     .api_secret_key(ApiSecretKey::new("secret").unwrap())
///     .host(HostUrl::new("https://app.example.com").unwrap())
///     .build()
///     .unwrap();
///
/// let redirect = begin_auth(&config, &ShopDomain::new("acme").unwrap(), None).unwrap();
/// assert!(redirect.url.starts_with("https://acme.myshopify.com/admin/oauth/authorize?"));
/// ```
pub fn begin_auth(
    config: &AppConfig,
    shop: &ShopDomain,
    scope_override: Option<&AuthScopes>,
) -> Result<AuthorizationRedirect, OAuthError> {
    let redirect_uri = config.callback_url().ok_or(OAuthError::MissingHostConfig)?;
    let state = StateParam::new();
    let scopes = scope_override.unwrap_or_else(|| config.scopes());

    let params = [
        ("client_id", config.api_key().as_ref().to_string()),
        ("scope", scopes.to_string()),
        ("redirect_uri", redirect_uri),
        ("state", state.to_string()),
    ];
    let query_string = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let url = format!(
        "https://{}/admin/oauth/authorize?{query_string}",
        shop.as_ref()
    );

    Ok(AuthorizationRedirect { url, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey, AppName, HostUrl};

    fn config(host: Option<&str>) -> AppConfig {
        let mut builder = AppConfig::builder()
            .app_name(AppName::new("tagged-images").unwrap())
            .api_key(ApiKey::new("test-api-key").unwrap())
            .api_secret_key(ApiSecretKey::new("test-secret").unwrap())
            .scopes("read_products,write_orders".parse().unwrap());
        if let Some(host) = host {
            builder = builder.host(HostUrl::new(host).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_url_embeds_client_scopes_callback_and_state() {
        let shop = ShopDomain::new("test-shop").unwrap();
        let redirect = begin_auth(&config(Some("https://myapp.example.com")), &shop, None).unwrap();

        assert!(redirect
            .url
            .starts_with("https://test-shop.myshopify.com/admin/oauth/authorize?"));
        assert!(redirect.url.contains("client_id=test-api-key"));
        assert!(redirect
            .url
            .contains("scope=read_orders%2Cread_products%2Cwrite_orders"));
        assert!(redirect.url.contains(
            "redirect_uri=https%3A%2F%2Fmyapp.example.com%2Fauth%2Ftagged-images%2Fcallback"
        ));
        assert!(redirect
            .url
            .ends_with(&format!("state={}", redirect.state.as_ref())));
    }

    #[test]
    fn test_scope_override_replaces_configured_scopes() {
        let shop = ShopDomain::new("test-shop").unwrap();
        let only_themes: AuthScopes = "read_themes".parse().unwrap();
        let redirect = begin_auth(
            &config(Some("https://myapp.example.com")),
            &shop,
            Some(&only_themes),
        )
        .unwrap();

        assert!(redirect.url.contains("scope=read_themes&"));
    }

    #[test]
    fn test_each_call_uses_a_new_nonce() {
        let config = config(Some("https://myapp.example.com"));
        let shop = ShopDomain::new("test-shop").unwrap();
        let a = begin_auth(&config, &shop, None).unwrap();
        let b = begin_auth(&config, &shop, None).unwrap();
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn test_missing_host_is_an_error() {
        let shop = ShopDomain::new("test-shop").unwrap();
        let result = begin_auth(&config(None), &shop, None);
        assert!(matches!(result, Err(OAuthError::MissingHostConfig)));
    }
}
