//! Federated identity for tenants.
//!
//! After a handshake, each shop is bridged into an external identity
//! provider: a custom auth token is minted for the shop's
//! [`FederatedUserId`](crate::auth::FederatedUserId), the platform access
//! token is written to `/{namespace}/{uid}`, and the profile at
//! `/profiles/{uid}/shop` records the shop.
//!
//! - [`IdentityProvider`]: the provider seam, with
//!   [`FirebaseIdentityProvider`] and [`MemoryIdentityProvider`]
//! - [`IdentityBridge`]: the bridge itself
//! - [`SignInPage`]: the HTML handed to the browser after the callback
//! - [`list_installed_shops`]: every tenant with a stored access token

mod admin;
mod bridge;
mod error;
mod firebase;
mod provider;
mod sign_in;

pub use admin::{list_installed_shops, InstalledShop};
pub use bridge::{BridgedIdentity, IdentityBridge};
pub use error::{BridgeStage, IdentityError};
pub use firebase::{FirebaseIdentityProvider, ServiceAccount, CUSTOM_TOKEN_AUDIENCE, CUSTOM_TOKEN_TTL_SECS};
pub use provider::{profile_shop_path, store_path, IdentityProvider, MemoryIdentityProvider, PROFILES_ROOT};
pub use sign_in::{js_string, SignInPage, WebAppConfig};
