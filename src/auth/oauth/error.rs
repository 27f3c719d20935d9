//! Errors raised by the OAuth handshake.
//!
//! The variants fall in three groups:
//!
//! - security failures ([`OAuthError::StateMismatch`],
//!   [`OAuthError::InvalidHmac`]): terminal, never retried, reported to the
//!   browser as a client error;
//! - exchange failures ([`OAuthError::TokenExchangeFailed`],
//!   [`OAuthError::Network`]): terminal for the attempt because authorization
//!   codes are single-use;
//! - request and configuration problems.
//!
//! No variant carries a nonce, code, token or secret, so `Display` output is
//! safe to send back in an HTTP response.
//!
//! ```rust
//! use shopify_server::auth::oauth::OAuthError;
//!
//! let error = OAuthError::StateMismatch;
//! assert!(error.is_security_error());
//! assert_eq!(error.to_string(), "Security checks failed (state)");
//! ```

use thiserror::Error;

/// Errors that can occur while driving the OAuth handshake.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The callback's `state` does not match the nonce stored for the tenant,
    /// no nonce is stored, or the nonce was consumed while the callback was
    /// being processed.
    #[error("Security checks failed (state)")]
    StateMismatch,

    /// The callback's `hmac` does not match the signature computed with the
    /// current or previous API secret.
    #[error("Security checks failed (hmac)")]
    InvalidHmac,

    /// The platform rejected the code exchange or answered with a body that
    /// is not a token response.
    #[error("Token exchange failed with status {status}: {message}")]
    TokenExchangeFailed {
        /// HTTP status of the exchange response.
        status: u16,
        /// Response body or parse failure description.
        message: String,
    },

    /// The exchange request never produced a response.
    #[error("Token exchange request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The callback query is missing parameters or names an invalid shop.
    #[error("Invalid callback: {reason}")]
    InvalidCallback {
        /// What is wrong with the callback.
        reason: String,
    },

    /// A redirect URL was requested but [`AppConfig`](crate::AppConfig) has
    /// no host to build the callback URL from.
    #[error("Host URL must be configured in AppConfig for OAuth")]
    MissingHostConfig,
}

impl OAuthError {
    /// Returns `true` for state and signature failures.
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(self, Self::StateMismatch | Self::InvalidHmac)
    }

    /// Returns `true` if the code exchange itself failed.
    #[must_use]
    pub const fn is_exchange_error(&self) -> bool {
        matches!(self, Self::TokenExchangeFailed { .. } | Self::Network(_))
    }
}

const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};
