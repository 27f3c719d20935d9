//! Authorization code exchange.
//!
//! The handshake talks to the platform through the [`TokenExchange`] trait
//! so tests and alternative transports can stand in for
//! [`HttpTokenExchange`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::oauth::OAuthError;
use crate::auth::session::AccessToken;
use crate::auth::AuthScopes;
use crate::config::{ApiKey, ApiSecretKey, AppConfig, ShopDomain};

/// A successful code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    /// The offline access token for the shop.
    pub access_token: AccessToken,
    /// The scopes the merchant actually granted.
    pub scopes: AuthScopes,
}

/// Exchanges an authorization code for an access token.
///
/// Implementations must not retry: a code is single-use, and a second
/// attempt after an ambiguous failure can only fail.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchanges `code` for an access token on `shop`.
    async fn exchange_code(&self, shop: &ShopDomain, code: &str) -> Result<TokenGrant, OAuthError>;
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    scope: String,
}

/// [`TokenExchange`] over HTTPS against
/// `https://{shop}/admin/oauth/access_token`.
#[derive(Clone, Debug)]
pub struct HttpTokenExchange {
    client: reqwest::Client,
    client_id: ApiKey,
    client_secret: ApiSecretKey,
    base_url: Option<String>,
}

impl HttpTokenExchange {
    /// Creates an exchanger using the app's credentials.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "falling back to an HTTP client without the app user agent");
                reqwest::Client::new()
            });
        Self {
            client,
            client_id: config.api_key().clone(),
            client_secret: config.api_secret_key().clone(),
            base_url: None,
        }
    }

    /// Sends every exchange to `base_url` instead of the shop's own host.
    ///
    /// Meant for pointing the exchange at a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn token_url(&self, shop: &ShopDomain) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", shop.as_ref()));
        format!("{base}/admin/oauth/access_token")
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange_code(&self, shop: &ShopDomain, code: &str) -> Result<TokenGrant, OAuthError> {
        let request_body = TokenExchangeRequest {
            client_id: self.client_id.as_ref(),
            client_secret: self.client_secret.as_ref(),
            code,
        };

        let response = self
            .client
            .post(self.token_url(shop))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(shop = %shop, status, "authorization code exchange rejected");
            return Err(OAuthError::TokenExchangeFailed { status, message });
        }

        let body: AccessTokenResponse =
            response
                .json()
                .await
                .map_err(|e| OAuthError::TokenExchangeFailed {
                    status,
                    message: format!("Failed to parse token response: {e}"),
                })?;

        let scopes = body
            .scope
            .parse::<AuthScopes>()
            .map_err(|e| OAuthError::TokenExchangeFailed {
                status,
                message: format!("Failed to parse granted scopes: {e}"),
            })?;

        Ok(TokenGrant {
            access_token: AccessToken::new(body.access_token),
            scopes,
        })
    }
}
