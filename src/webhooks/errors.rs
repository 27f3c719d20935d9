//! Webhook error types.
//!
//! - [`WebhookError::HostNotConfigured`]: no host to build callback addresses from
//! - [`WebhookError::InvalidTopic`]: a topic string is not `resource/action`
//! - [`WebhookError::RemoteApi`] / [`WebhookError::Network`]: the platform's
//!   webhook API failed
//! - [`WebhookError::InvalidHmac`] / [`WebhookError::InvalidHeader`]: an
//!   inbound delivery failed verification
//! - [`WebhookError::NoHandler`]: a verified delivery has nowhere to go
//!
//! ```rust
//! use shopify_server::webhooks::WebhookError;
//!
//! let error = WebhookError::InvalidTopic { topic: "orders".to_string() };
//! assert!(error.to_string().contains("resource/action"));
//! ```

use thiserror::Error;

/// Error type for webhook catalog, subscription and delivery operations.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Host URL is not configured, so callback addresses cannot be built.
    #[error("Host URL is not configured. Please set host in AppConfig to register webhooks.")]
    HostNotConfigured,

    /// The topic does not have the form `resource/action`.
    #[error("Invalid webhook topic '{topic}': expected resource/action")]
    InvalidTopic {
        /// The rejected topic.
        topic: String,
    },

    /// The platform answered a webhook API call with a non-success status.
    #[error("Webhook API error (status {status}): {message}")]
    RemoteApi {
        /// HTTP status code.
        status: u16,
        /// Response body or parse failure.
        message: String,
    },

    /// The platform's webhook API could not be reached.
    #[error("Webhook API request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The delivery's signature does not match its body.
    ///
    /// The message is generic so it leaks nothing about the expected value.
    #[error("Webhook signature verification failed")]
    InvalidHmac,

    /// A delivery header required for verification or routing is absent
    /// or malformed.
    #[error("Webhook delivery has a missing or malformed {header} header")]
    InvalidHeader {
        /// The header name.
        header: &'static str,
    },

    /// No handler is registered for the delivered topic.
    #[error("No webhook handler registered for topic '{topic}'")]
    NoHandler {
        /// The delivered topic.
        topic: String,
    },

    /// The delivery body is not valid JSON.
    #[error("Failed to parse webhook payload: {message}")]
    PayloadParse {
        /// The parse failure.
        message: String,
    },

    /// A handler failed while processing a delivery.
    #[error("Webhook handler failed: {message}")]
    Handler {
        /// The handler's failure description.
        message: String,
    },
}

impl WebhookError {
    /// Returns `true` for failures of the remote webhook API.
    #[must_use]
    pub const fn is_remote_api_error(&self) -> bool {
        matches!(self, Self::RemoteApi { .. } | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_not_configured_error_message() {
        let message = WebhookError::HostNotConfigured.to_string();
        assert!(message.contains("Host URL is not configured"));
        assert!(message.contains("AppConfig"));
    }

    #[test]
    fn test_remote_api_error_message() {
        let error = WebhookError::RemoteApi {
            status: 422,
            message: r#"{"errors":{"address":["for this topic has already been taken"]}}"#.to_string(),
        };
        assert!(error.is_remote_api_error());
        assert!(error.to_string().contains("422"));
        assert!(error.to_string().contains("already been taken"));
    }

    #[test]
    fn test_invalid_hmac_error_message() {
        let error = WebhookError::InvalidHmac;
        assert_eq!(error.to_string(), "Webhook signature verification failed");
        assert!(!error.is_remote_api_error());
    }

    #[test]
    fn test_invalid_header_names_header() {
        let error = WebhookError::InvalidHeader {
            header: "X-Shopify-Topic",
        };
        assert!(error.to_string().contains("X-Shopify-Topic"));
    }

    #[test]
    fn test_no_handler_names_topic() {
        let error = WebhookError::NoHandler {
            topic: "orders/create".to_string(),
        };
        assert!(error.to_string().contains("orders/create"));
    }
}
