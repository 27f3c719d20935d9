//! Tenant authorization.
//!
//! - [`AuthScopes`]: requested and granted OAuth scopes
//! - [`TenantKeyCodec`] / [`FederatedUserId`]: the reversible mapping from a
//!   shop domain to its identity-store user id
//! - [`SessionLedger`]: per-tenant nonce and token state
//! - [`oauth`]: the authorization-code handshake that fills the ledger

pub mod oauth;
mod scopes;
pub mod session;
pub mod tenant;

pub use scopes::AuthScopes;
pub use session::{AccessToken, FederatedToken, LedgerError, SessionLedger, TenantKey, TenantSession};
pub use tenant::{FederatedUserId, TenantKeyCodec, TenantKeyError};
