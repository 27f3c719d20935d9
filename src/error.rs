//! Configuration error types.
//!
//! Every validated value in [`crate::config`] is constructed through a
//! fallible constructor returning `Result<T, ConfigError>`, so a server
//! refuses to start with a half-valid configuration.
//!
//! # Example
//!
//! ```rust
//! use shopify_server::{AppName, ConfigError};
//!
//! let result = AppName::new("");
//! assert!(matches!(result, Err(ConfigError::InvalidAppName { .. })));
//! ```

use thiserror::Error;

/// Errors raised while building an [`AppConfig`](crate::AppConfig) or one of
/// its validated values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Shopify API key.")]
    EmptyApiKey,

    /// API secret key cannot be empty.
    #[error("API secret key cannot be empty. Please provide a valid Shopify API secret key.")]
    EmptyApiSecretKey,

    /// App name is empty or contains characters not allowed in a URL path segment.
    #[error("Invalid app name '{name}'. Use lowercase letters, digits, '-' or '_'.")]
    InvalidAppName {
        /// The rejected name.
        name: String,
    },

    /// Shop domain is invalid.
    #[error("Invalid shop domain '{domain}'. Expected format: 'shop-name' or 'shop-name.myshopify.com'.")]
    InvalidShopDomain {
        /// The invalid domain that was provided.
        domain: String,
    },

    /// API version is invalid.
    #[error("Invalid API version '{version}'. Expected format: 'YYYY-MM' (e.g., '2025-01') or 'unstable'.")]
    InvalidApiVersion {
        /// The invalid version string that was provided.
        version: String,
    },

    /// Scopes are invalid.
    #[error("Invalid scopes: {reason}")]
    InvalidScopes {
        /// The reason the scopes are invalid.
        reason: String,
    },

    /// Token namespace cannot be used as an identity-store path segment.
    #[error("Invalid token namespace '{namespace}'. It must be non-empty and must not contain '/', '.', '#', '$', '[' or ']'.")]
    InvalidTokenNamespace {
        /// The rejected namespace.
        namespace: String,
    },

    /// Reconciliation concurrency must allow at least one in-flight call.
    #[error("Reconcile concurrency must be greater than zero.")]
    ZeroConcurrency,

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// Host URL is invalid.
    #[error("Invalid host URL '{url}'. Please provide a valid URL with scheme (e.g., 'https://myapp.example.com').")]
    InvalidHostUrl {
        /// The invalid URL that was provided.
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_app_name_message_names_the_value() {
        let error = ConfigError::InvalidAppName {
            name: "My App".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("My App"));
        assert!(message.contains("lowercase"));
    }

    #[test]
    fn test_invalid_token_namespace_lists_forbidden_characters() {
        let error = ConfigError::InvalidTokenNamespace {
            namespace: "a.b".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("a.b"));
        assert!(message.contains("'#'"));
    }

    #[test]
    fn test_missing_required_field_error_message() {
        let error = ConfigError::MissingRequiredField { field: "app_name" };
        let message = error.to_string();
        assert!(message.contains("app_name"));
        assert!(message.contains("must be set"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::ZeroConcurrency;
        let _: &dyn std::error::Error = &error;
    }
}
