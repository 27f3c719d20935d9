//! Bridging a platform access token into a federated identity.

use crate::auth::{AccessToken, FederatedToken, FederatedUserId, SessionLedger, TenantKey};
use crate::config::{AppConfig, ShopDomain};
use crate::identity::error::{BridgeStage, IdentityError};
use crate::identity::provider::{store_path, IdentityProvider};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// The result of a successful bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgedIdentity {
    /// The tenant's federated user id.
    pub user_id: FederatedUserId,
    /// The custom token minted for `user_id`.
    pub token: FederatedToken,
    /// Whether the profile's shop attribute had to be written.
    pub profile_updated: bool,
}

/// Mints federated tokens for tenants and records their access tokens.
///
/// A bridge is three provider calls in order: mint a token for the shop's
/// uid, write the access token to `/{namespace}/{uid}`, then set the
/// profile's shop if it differs. Repeating a bridge leaves the store as it
/// was after the first one.
#[derive(Clone)]
pub struct IdentityBridge {
    provider: Arc<dyn IdentityProvider>,
    token_namespace: String,
}

impl IdentityBridge {
    /// Creates a bridge writing access tokens under `token_namespace`.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, token_namespace: impl Into<String>) -> Self {
        Self {
            provider,
            token_namespace: token_namespace.into(),
        }
    }

    /// Creates a bridge using the namespace configured for the app.
    #[must_use]
    pub fn from_config(provider: Arc<dyn IdentityProvider>, config: &AppConfig) -> Self {
        Self::new(provider, config.token_namespace())
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Returns the namespace access tokens are written under.
    #[must_use]
    pub fn token_namespace(&self) -> &str {
        &self.token_namespace
    }

    /// Returns the store path of the access token for `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidPath`] if the namespace is not a
    /// valid path segment.
    pub fn token_path(&self, uid: &FederatedUserId) -> Result<String, IdentityError> {
        store_path(&[&self.token_namespace, uid.as_ref()])
    }

    /// Bridges `shop` with its `access_token`.
    ///
    /// # Errors
    ///
    /// A failure to mint is returned unchanged. Any failure after minting
    /// is wrapped in [`IdentityError::BridgeIncomplete`], which carries the
    /// minted token.
    #[instrument(skip(self, shop, access_token), fields(shop = %shop))]
    pub async fn bridge(
        &self,
        shop: &ShopDomain,
        access_token: &AccessToken,
    ) -> Result<BridgedIdentity, IdentityError> {
        let user_id = FederatedUserId::from_shop(shop);
        let token = self.provider.create_custom_token(&user_id).await?;

        let incomplete = |stage: BridgeStage, token: &FederatedToken| {
            let token = token.clone();
            move |source: IdentityError| {
                tracing::warn!(%stage, error = %source, "identity bridge incomplete");
                IdentityError::BridgeIncomplete {
                    token,
                    stage,
                    source: Box::new(source),
                }
            }
        };

        let path = self
            .token_path(&user_id)
            .map_err(incomplete(BridgeStage::PersistAccessToken, &token))?;
        self.provider
            .write_value(&path, &Value::String(access_token.as_ref().to_string()))
            .await
            .map_err(incomplete(BridgeStage::PersistAccessToken, &token))?;

        let current = self
            .provider
            .profile_shop(&user_id)
            .await
            .map_err(incomplete(BridgeStage::UpdateProfile, &token))?;
        let profile_updated = current.as_deref() != Some(shop.as_ref());
        if profile_updated {
            self.provider
                .update_profile_shop(&user_id, shop.as_ref())
                .await
                .map_err(incomplete(BridgeStage::UpdateProfile, &token))?;
        }

        tracing::info!(uid = %user_id, profile_updated, "tenant bridged");
        Ok(BridgedIdentity {
            user_id,
            token,
            profile_updated,
        })
    }

    /// Bridges the tenant behind `key` and records the result in `ledger`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::AccessTokenMissing`] if the tenant has not
    /// completed a handshake, and otherwise the errors of
    /// [`bridge`](Self::bridge).
    pub async fn bridge_session(
        &self,
        ledger: &SessionLedger,
        key: &TenantKey,
    ) -> Result<BridgedIdentity, IdentityError> {
        let access_token =
            ledger
                .access_token(key)
                .await
                .ok_or_else(|| IdentityError::AccessTokenMissing {
                    tenant: key.to_string(),
                })?;

        let bridged = self.bridge(key.shop(), &access_token).await?;
        ledger
            .record_federated_token(key, bridged.user_id.clone(), bridged.token.clone())
            .await?;
        Ok(bridged)
    }
}

impl fmt::Debug for IdentityBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityBridge")
            .field("token_namespace", &self.token_namespace)
            .finish_non_exhaustive()
    }
}
