//! Per-tenant session state.
//!
//! Each `(app, shop)` pair gets one [`TenantSession`] holding the in-flight
//! OAuth nonce, the platform access token, and the federated token minted
//! for the identity store. Sessions are created lazily on the first
//! authorization redirect and live as long as the [`SessionLedger`] does.
//! Expiry is left to the host.
//!
//! Only the handshake and the identity bridge write to a session, and only
//! to the session of the tenant they are serving.

use crate::auth::oauth::hmac::constant_time_compare;
use crate::auth::oauth::StateParam;
use crate::auth::tenant::FederatedUserId;
use crate::auth::AuthScopes;
use crate::config::{AppName, ShopDomain};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// A platform access token.
///
/// `Debug` output is masked.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(*****)")
    }
}

/// A custom auth token minted by the identity provider.
///
/// `Debug` output is masked.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedToken(String);

impl FederatedToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AsRef<str> for FederatedToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FederatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FederatedToken(*****)")
    }
}

/// Identifies a tenant: one shop of one hosted app.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantKey {
    app_name: AppName,
    shop: ShopDomain,
}

impl TenantKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(app_name: AppName, shop: ShopDomain) -> Self {
        Self { app_name, shop }
    }

    /// Returns the app half of the key.
    #[must_use]
    pub const fn app_name(&self) -> &AppName {
        &self.app_name
    }

    /// Returns the shop half of the key.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// Returns the federated user id derived from the shop.
    #[must_use]
    pub fn federated_user_id(&self) -> FederatedUserId {
        FederatedUserId::from_shop(&self.shop)
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.shop.shop_name())
    }
}

/// Ledger operations that would break a session invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A federated token was offered before any access token was recorded.
    #[error("No access token recorded for tenant '{tenant}'.")]
    AccessTokenMissing {
        /// The tenant the token was offered for.
        tenant: String,
    },
}

/// The state kept for one tenant.
///
/// Fields are read through accessors; writes go through [`SessionLedger`],
/// which enforces that a federated token is only attached after an access
/// token, and that a nonce is consumed at most once.
#[derive(Clone, Debug, Default)]
pub struct TenantSession {
    state_nonce: Option<StateParam>,
    access_token: Option<AccessToken>,
    granted_scopes: Option<AuthScopes>,
    authorized_at: Option<DateTime<Utc>>,
    federated_token: Option<FederatedToken>,
    federated_user_id: Option<FederatedUserId>,
}

impl TenantSession {
    /// Returns the nonce of the in-flight handshake, if any.
    #[must_use]
    pub const fn state_nonce(&self) -> Option<&StateParam> {
        self.state_nonce.as_ref()
    }

    /// Returns the platform access token, once a handshake has completed.
    #[must_use]
    pub const fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// Returns the scopes granted in the last handshake.
    #[must_use]
    pub const fn granted_scopes(&self) -> Option<&AuthScopes> {
        self.granted_scopes.as_ref()
    }

    /// Returns when the last handshake completed.
    #[must_use]
    pub const fn authorized_at(&self) -> Option<DateTime<Utc>> {
        self.authorized_at
    }

    /// Returns the federated token, once the tenant has been bridged.
    #[must_use]
    pub const fn federated_token(&self) -> Option<&FederatedToken> {
        self.federated_token.as_ref()
    }

    /// Returns the federated user id, once the tenant has been bridged.
    #[must_use]
    pub const fn federated_user_id(&self) -> Option<&FederatedUserId> {
        self.federated_user_id.as_ref()
    }
}

/// Shared store of tenant sessions.
///
/// Cloning the ledger is cheap and every clone sees the same sessions.
///
/// ```rust
/// # block_on(async {
/// use shopify_server::auth::oauth::StateParam;
/// use shopify_server::auth::{AccessToken, SessionLedger, TenantKey};
/// use shopify_server::{AppName, ShopDomain};
///
/// let ledger = SessionLedger::new();
/// let key = TenantKey::new(AppName::new("app").unwrap(), ShopDomain::new("acme").unwrap());
///
/// ledger.store_state(&key, StateParam::from_raw("nonce")).await;
/// assert!(ledger.state_matches(&key, "nonce").await);
/// assert!(ledger.complete_handshake(&key, "nonce", AccessToken::new("t"), None).await);
/// assert!(!ledger.state_matches(&key, "nonce").await);
/// # });
/// # fn block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SessionLedger {
    sessions: Arc<RwLock<HashMap<TenantKey, TenantSession>>>,
}

impl SessionLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the nonce of a new handshake, creating the session if needed.
    ///
    /// Any earlier nonce for the tenant is overwritten, which invalidates the
    /// handshake it belonged to.
    pub async fn store_state(&self, key: &TenantKey, state: StateParam) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(key.clone()).or_default().state_nonce = Some(state);
    }

    /// Returns `true` if `received` equals the stored nonce.
    ///
    /// Returns `false` when no nonce is stored. Never mutates the ledger.
    pub async fn state_matches(&self, key: &TenantKey, received: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(key)
            .and_then(|s| s.state_nonce.as_ref())
            .is_some_and(|nonce| constant_time_compare(nonce.as_ref(), received))
    }

    /// Records a completed handshake if the nonce is still `expected_state`.
    ///
    /// The check and the write happen under one write lock: the access token
    /// is stored and the nonce cleared only if the stored nonce still equals
    /// `expected_state`. Returns `false`, leaving the session untouched,
    /// when another redirect replaced the nonce or another callback already
    /// consumed it.
    ///
    /// A successful handshake drops any federated token bridged for an
    /// earlier handshake; the new one must be bridged again.
    pub async fn complete_handshake(
        &self,
        key: &TenantKey,
        expected_state: &str,
        access_token: AccessToken,
        granted_scopes: Option<AuthScopes>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(key) else {
            return false;
        };
        let matches = session
            .state_nonce
            .as_ref()
            .is_some_and(|nonce| constant_time_compare(nonce.as_ref(), expected_state));
        if !matches {
            return false;
        }
        session.state_nonce = None;
        session.access_token = Some(access_token);
        session.granted_scopes = granted_scopes;
        session.authorized_at = Some(Utc::now());
        session.federated_user_id = None;
        session.federated_token = None;
        true
    }

    /// Attaches a federated token to a tenant that has an access token.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccessTokenMissing`] if the tenant has not
    /// completed a handshake.
    pub async fn record_federated_token(
        &self,
        key: &TenantKey,
        user_id: FederatedUserId,
        token: FederatedToken,
    ) -> Result<(), LedgerError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(key) {
            Some(session) if session.access_token.is_some() => {
                session.federated_user_id = Some(user_id);
                session.federated_token = Some(token);
                Ok(())
            }
            _ => Err(LedgerError::AccessTokenMissing {
                tenant: key.to_string(),
            }),
        }
    }

    /// Returns a snapshot of the tenant's session.
    pub async fn session(&self, key: &TenantKey) -> Option<TenantSession> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Returns the tenant's access token, if a handshake has completed.
    pub async fn access_token(&self, key: &TenantKey) -> Option<AccessToken> {
        let sessions = self.sessions.read().await;
        sessions.get(key).and_then(|s| s.access_token.clone())
    }

    /// Returns the tenant's federated token, if it has been bridged.
    pub async fn federated_token(&self, key: &TenantKey) -> Option<FederatedToken> {
        let sessions = self.sessions.read().await;
        sessions.get(key).and_then(|s| s.federated_token.clone())
    }
}
