//! The stateful authorization-code handshake.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::auth::oauth::begin_auth::{begin_auth, AuthorizationRedirect};
use crate::auth::oauth::exchange::{HttpTokenExchange, TokenExchange};
use crate::auth::oauth::hmac::validate_hmac;
use crate::auth::oauth::{AuthQuery, OAuthError};
use crate::auth::session::{AccessToken, SessionLedger, TenantKey};
use crate::auth::AuthScopes;
use crate::config::{AppConfig, ShopDomain};

/// Drives the OAuth handshake for one app.
///
/// The handshake owns no state of its own: nonces and tokens live in the
/// [`SessionLedger`] it was given, and the code exchange goes through a
/// [`TokenExchange`] collaborator.
///
/// At most one handshake per tenant is in flight. Starting a second one
/// replaces the first one's nonce, so the first callback will fail.
#[derive(Clone)]
pub struct OAuthHandshake {
    config: Arc<AppConfig>,
    ledger: SessionLedger,
    exchanger: Arc<dyn TokenExchange>,
}

impl OAuthHandshake {
    /// Creates a handshake with an explicit exchange collaborator.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        ledger: SessionLedger,
        exchanger: Arc<dyn TokenExchange>,
    ) -> Self {
        Self {
            config,
            ledger,
            exchanger,
        }
    }

    /// Creates a handshake that exchanges codes over HTTPS.
    #[must_use]
    pub fn with_http_exchange(config: Arc<AppConfig>, ledger: SessionLedger) -> Self {
        let exchanger = Arc::new(HttpTokenExchange::new(&config));
        Self::new(config, ledger, exchanger)
    }

    /// Returns the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the ledger this handshake writes to.
    #[must_use]
    pub const fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    /// Returns the session key for `shop` under this app.
    #[must_use]
    pub fn tenant_key(&self, shop: ShopDomain) -> TenantKey {
        TenantKey::new(self.config.app_name().clone(), shop)
    }

    /// Starts a handshake: builds the consent URL and stores its nonce.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::MissingHostConfig`] if no host is configured.
    /// Nothing is stored in that case.
    #[instrument(skip(self, shop, scopes), fields(app = %self.config.app_name(), shop = %shop))]
    pub async fn generate_authorization_redirect(
        &self,
        shop: &ShopDomain,
        scopes: Option<&AuthScopes>,
    ) -> Result<AuthorizationRedirect, OAuthError> {
        let redirect = begin_auth(&self.config, shop, scopes)?;
        let key = self.tenant_key(shop.clone());
        self.ledger.store_state(&key, redirect.state.clone()).await;
        debug!("stored authorization nonce");
        Ok(redirect)
    }

    /// Completes a handshake from the platform's callback.
    ///
    /// Runs, in order: shop parsing, the state check, the signature check,
    /// the code exchange (exactly once, no retry), and the commit that
    /// records the token and consumes the nonce. Each step gates the next.
    /// Nothing is written to the ledger unless every step succeeds, so a
    /// rejected callback leaves the tenant's session exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::InvalidCallback`] if `shop` is not a valid shop domain.
    /// - [`OAuthError::StateMismatch`] if `state` is not the stored nonce,
    ///   including when no nonce is stored, when it was already consumed,
    ///   and when a concurrent redirect or callback changed it before the
    ///   commit (the freshly exchanged token is discarded in that case).
    /// - [`OAuthError::InvalidHmac`] if the signature does not verify.
    /// - [`OAuthError::TokenExchangeFailed`] or [`OAuthError::Network`] if
    ///   the exchange fails.
    #[instrument(skip(self, query), fields(app = %self.config.app_name(), shop = %query.shop()))]
    pub async fn handle_callback(&self, query: &AuthQuery) -> Result<AccessToken, OAuthError> {
        let shop = ShopDomain::new(query.shop()).map_err(|_| OAuthError::InvalidCallback {
            reason: "invalid shop domain".to_string(),
        })?;
        let key = self.tenant_key(shop);

        if !self.ledger.state_matches(&key, query.state()).await {
            warn!("callback state does not match stored nonce");
            return Err(OAuthError::StateMismatch);
        }

        if !validate_hmac(query, &self.config) {
            warn!("callback signature verification failed");
            return Err(OAuthError::InvalidHmac);
        }

        let grant = self.exchanger.exchange_code(key.shop(), query.code()).await?;

        let committed = self
            .ledger
            .complete_handshake(
                &key,
                query.state(),
                grant.access_token.clone(),
                Some(grant.scopes),
            )
            .await;
        if !committed {
            warn!("nonce changed while the code was being exchanged");
            return Err(OAuthError::StateMismatch);
        }

        info!("handshake completed");
        Ok(grant.access_token)
    }
}

impl std::fmt::Debug for OAuthHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthHandshake")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::exchange::TokenGrant;
    use crate::auth::oauth::hmac::compute_signature;
    use crate::config::{ApiKey, ApiSecretKey, AppName, HostUrl};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingExchange {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn exchange_code(
            &self,
            _shop: &ShopDomain,
            code: &str,
        ) -> Result<TokenGrant, OAuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OAuthError::TokenExchangeFailed {
                    status: 400,
                    message: "code already used".to_string(),
                });
            }
            Ok(TokenGrant {
                access_token: AccessToken::new(format!("token-for-{code}")),
                scopes: "read_orders".parse().unwrap(),
            })
        }
    }

    fn config() -> Arc<AppConfig> {
        Arc::new(
            AppConfig::builder()
                .app_name(AppName::new("tagged-images").unwrap())
                .api_key(ApiKey::new("key").unwrap())
                .api_secret_key(ApiSecretKey::new("secret").unwrap())
                .host(HostUrl::new("https://app.example.com").unwrap())
                .build()
                .unwrap(),
        )
    }

    fn handshake(exchange: Arc<CountingExchange>) -> OAuthHandshake {
        OAuthHandshake::new(config(), SessionLedger::new(), exchange)
    }

    fn callback(state: &str, secret: &str) -> AuthQuery {
        let mut params: BTreeMap<String, String> = [
            ("code", "c0de"),
            ("shop", "acme.myshopify.com"),
            ("state", state),
            ("timestamp", "1700000000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let message = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        params.insert("hmac".to_string(), compute_signature(&message, secret));
        AuthQuery::from_params(params).unwrap()
    }

    fn acme() -> ShopDomain {
        ShopDomain::new("acme").unwrap()
    }

    #[tokio::test]
    async fn test_redirect_stores_nonce_for_tenant() {
        let hs = handshake(Arc::default());
        let redirect = hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let key = hs.tenant_key(acme());
        assert!(hs.ledger().state_matches(&key, redirect.state.as_ref()).await);
    }

    #[tokio::test]
    async fn test_successful_callback_stores_token_and_clears_nonce() {
        let exchange = Arc::new(CountingExchange::default());
        let hs = handshake(exchange.clone());
        let redirect = hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let token = hs
            .handle_callback(&callback(redirect.state.as_ref(), "secret"))
            .await
            .unwrap();

        assert_eq!(token.as_ref(), "token-for-c0de");
        let session = hs.ledger().session(&hs.tenant_key(acme())).await.unwrap();
        assert_eq!(session.access_token(), Some(&token));
        assert!(session.state_nonce().is_none());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected_before_exchange() {
        let exchange = Arc::new(CountingExchange::default());
        let hs = handshake(exchange.clone());
        hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let err = hs.handle_callback(&callback("forged", "secret")).await.unwrap_err();

        assert!(matches!(err, OAuthError::StateMismatch));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        assert!(hs.ledger().access_token(&hs.tenant_key(acme())).await.is_none());
    }

    #[tokio::test]
    async fn test_callback_without_redirect_is_state_mismatch() {
        let hs = handshake(Arc::default());
        let err = hs.handle_callback(&callback("anything", "secret")).await.unwrap_err();
        assert!(matches!(err, OAuthError::StateMismatch));
    }

    #[tokio::test]
    async fn test_tampered_signature_leaves_session_unchanged() {
        let exchange = Arc::new(CountingExchange::default());
        let hs = handshake(exchange.clone());
        let redirect = hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let err = hs
            .handle_callback(&callback(redirect.state.as_ref(), "wrong-secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::InvalidHmac));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
        let session = hs.ledger().session(&hs.tenant_key(acme())).await.unwrap();
        assert_eq!(session.state_nonce(), Some(&redirect.state));
        assert!(session.access_token().is_none());
    }

    #[tokio::test]
    async fn test_replayed_callback_fails_after_success() {
        let exchange = Arc::new(CountingExchange::default());
        let hs = handshake(exchange.clone());
        let redirect = hs.generate_authorization_redirect(&acme(), None).await.unwrap();
        let query = callback(redirect.state.as_ref(), "secret");

        hs.handle_callback(&query).await.unwrap();
        let err = hs.handle_callback(&query).await.unwrap_err();

        assert!(matches!(err, OAuthError::StateMismatch));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_keeps_nonce_and_has_no_token() {
        let exchange = Arc::new(CountingExchange {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let hs = handshake(exchange.clone());
        let redirect = hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let err = hs
            .handle_callback(&callback(redirect.state.as_ref(), "secret"))
            .await
            .unwrap_err();

        assert!(err.is_exchange_error());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        let session = hs.ledger().session(&hs.tenant_key(acme())).await.unwrap();
        assert!(session.access_token().is_none());
        assert!(session.state_nonce().is_some());
    }

    #[tokio::test]
    async fn test_second_redirect_invalidates_first_nonce() {
        let hs = handshake(Arc::default());
        let first = hs.generate_authorization_redirect(&acme(), None).await.unwrap();
        hs.generate_authorization_redirect(&acme(), None).await.unwrap();

        let err = hs
            .handle_callback(&callback(first.state.as_ref(), "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::StateMismatch));
    }

    #[tokio::test]
    async fn test_invalid_shop_is_rejected() {
        let hs = handshake(Arc::default());
        let mut params = callback("s", "secret").params().clone();
        params.insert("shop".to_string(), "evil.example.com".to_string());
        let err = hs
            .handle_callback(&AuthQuery::from_params(params).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidCallback { .. }));
    }
}
