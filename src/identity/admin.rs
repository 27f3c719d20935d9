//! Listing the tenants recorded in the identity store.

use crate::auth::{AccessToken, TenantKeyCodec};
use crate::config::ShopDomain;
use crate::identity::error::IdentityError;
use crate::identity::provider::{store_path, IdentityProvider};
use serde_json::Value;

/// A shop with an access token in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledShop {
    /// The store key, as written. Ids from older installs use the legacy form.
    pub uid: String,
    /// The shop the key decodes to.
    pub shop: ShopDomain,
    /// The recorded access token.
    pub access_token: AccessToken,
}

/// Lists every shop with an access token under `namespace`, ordered by key.
///
/// Keys in the current form and in the legacy `-myshopify-com` form are both
/// understood. Entries whose key does not decode to a shop, or whose value
/// is not a string, are skipped with a warning.
///
/// # Errors
///
/// Returns the provider's error if the namespace cannot be read.
pub async fn list_installed_shops(
    provider: &dyn IdentityProvider,
    namespace: &str,
) -> Result<Vec<InstalledShop>, IdentityError> {
    let path = store_path(&[namespace])?;
    let entries = provider.read_children(&path).await?;

    let mut shops = Vec::with_capacity(entries.len());
    for (uid, value) in entries {
        let Value::String(access_token) = value else {
            tracing::warn!(%uid, "skipping entry whose access token is not a string");
            continue;
        };
        match TenantKeyCodec::decode_shop(&uid) {
            Ok(shop) => shops.push(InstalledShop {
                uid,
                shop,
                access_token: AccessToken::new(access_token),
            }),
            Err(error) => tracing::warn!(%uid, %error, "skipping undecodable entry"),
        }
    }
    Ok(shops)
}
