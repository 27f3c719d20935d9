//! Inbound delivery verification.
//!
//! The platform signs each delivery with HMAC-SHA256 over the raw body,
//! keyed by the app's secret, and sends the base64 digest in
//! [`HEADER_HMAC`]. Verification accepts the previous secret too, so that
//! deliveries keep verifying while the secret is rotated.

use crate::auth::oauth::hmac::{compute_signature_base64, constant_time_compare, verify_with_rotation};
use crate::config::{AppConfig, ShopDomain};
use crate::webhooks::catalog::Topic;
use crate::webhooks::WebhookError;
use axum::http::HeaderMap;

/// Base64 HMAC-SHA256 of the body.
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-SHA256";

/// The delivery's topic.
pub const HEADER_TOPIC: &str = "X-Shopify-Topic";

/// The shop that triggered the delivery.
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";

/// The API version the payload is serialized with.
pub const HEADER_API_VERSION: &str = "X-Shopify-API-Version";

/// Unique id of the delivery.
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";

/// Metadata of a delivery whose signature checked out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookContext {
    /// The delivered topic.
    pub topic: Topic,
    /// The shop it concerns.
    pub shop: ShopDomain,
    /// Delivery id, for idempotency.
    pub webhook_id: Option<String>,
    /// Payload API version.
    pub api_version: Option<String>,
}

/// Checks a single-secret signature.
///
/// ```rust
/// use shopify_server::auth::oauth::hmac::compute_signature_base64;
/// use shopify_server::webhooks::verify_hmac;
///
/// let hmac = compute_signature_base64(b"payload", "secret");
/// assert!(verify_hmac(b"payload", &hmac, "secret"));
/// assert!(!verify_hmac(b"payload", &hmac, "other"));
/// ```
#[must_use]
pub fn verify_hmac(raw_body: &[u8], hmac_header: &str, secret: &str) -> bool {
    constant_time_compare(&compute_signature_base64(raw_body, secret), hmac_header)
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn required_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    header(headers, name).ok_or(WebhookError::InvalidHeader { header: name })
}

/// Verifies a delivery and extracts its metadata.
///
/// The signature is checked before any other header is looked at.
///
/// # Errors
///
/// - [`WebhookError::InvalidHeader`] if the signature, topic or shop header
///   is absent, or the shop is not a valid domain
/// - [`WebhookError::InvalidHmac`] if the signature does not match under
///   either secret
/// - [`WebhookError::InvalidTopic`] if the topic is not `resource/action`
pub fn verify_webhook(
    headers: &HeaderMap,
    body: &[u8],
    config: &AppConfig,
) -> Result<WebhookContext, WebhookError> {
    let received = required_header(headers, HEADER_HMAC)?;
    if !verify_with_rotation(config, received, |secret| compute_signature_base64(body, secret)) {
        return Err(WebhookError::InvalidHmac);
    }

    let topic = Topic::parse(required_header(headers, HEADER_TOPIC)?)?;
    let shop = ShopDomain::new(required_header(headers, HEADER_SHOP_DOMAIN)?).map_err(|_| {
        WebhookError::InvalidHeader {
            header: HEADER_SHOP_DOMAIN,
        }
    })?;

    Ok(WebhookContext {
        topic,
        shop,
        webhook_id: header(headers, HEADER_WEBHOOK_ID).map(ToString::to_string),
        api_version: header(headers, HEADER_API_VERSION).map(ToString::to_string),
    })
}
