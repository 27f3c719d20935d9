//! Identity provider errors.

use crate::auth::{FederatedToken, LedgerError};
use std::fmt;
use thiserror::Error;

/// The step of a bridge that failed after the federated token was minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStage {
    /// Writing the access token under the tenant's uid.
    PersistAccessToken,
    /// Reading or writing the profile's shop attribute.
    UpdateProfile,
}

impl fmt::Display for BridgeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersistAccessToken => f.write_str("persisting the access token"),
            Self::UpdateProfile => f.write_str("updating the profile"),
        }
    }
}

/// Errors raised while talking to the identity provider.
///
/// ```rust
/// use shopify_server::identity::IdentityError;
///
/// let error = IdentityError::Rejected { status: 401, message: "Permission denied".to_string() };
/// assert!(error.to_string().contains("401"));
/// ```
#[derive(Debug, Error, Clone)]
pub enum IdentityError {
    /// The provider could not be reached.
    #[error("Identity provider unreachable: {reason}")]
    Unreachable {
        /// Transport error description.
        reason: String,
    },

    /// The provider answered with a non-success status.
    #[error("Identity provider rejected the request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        message: String,
    },

    /// The service-account credentials cannot be used.
    #[error("Invalid identity provider credentials: {reason}")]
    InvalidCredentials {
        /// Why the credentials were rejected.
        reason: String,
    },

    /// The provider answered with a body that could not be interpreted.
    #[error("Malformed identity provider response: {reason}")]
    MalformedResponse {
        /// What was wrong with the body.
        reason: String,
    },

    /// A store path segment contains a character the store forbids.
    #[error("Invalid identity store path '{path}'")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// The tenant has no access token to bridge.
    #[error("No access token recorded for tenant '{tenant}'")]
    AccessTokenMissing {
        /// The tenant, as `app/shop`.
        tenant: String,
    },

    /// The federated token was minted but a later step failed.
    ///
    /// The caller holds a valid `token`, while the store may not reflect it.
    #[error("Identity bridge incomplete after {stage}: {source}")]
    BridgeIncomplete {
        /// The minted token.
        token: FederatedToken,
        /// The step that failed.
        stage: BridgeStage,
        /// The failure.
        source: Box<IdentityError>,
    },
}

impl IdentityError {
    /// Returns the minted token carried by [`IdentityError::BridgeIncomplete`].
    #[must_use]
    pub const fn minted_token(&self) -> Option<&FederatedToken> {
        match self {
            Self::BridgeIncomplete { token, .. } => Some(token),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(error: reqwest::Error) -> Self {
        Self::Unreachable {
            reason: error.to_string(),
        }
    }
}

impl From<LedgerError> for IdentityError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::AccessTokenMissing { tenant } => Self::AccessTokenMissing { tenant },
        }
    }
}
