//! HMAC-SHA256 signatures for OAuth callbacks and webhook deliveries.
//!
//! OAuth callbacks carry a hex-encoded signature in the `hmac` query
//! parameter; webhook deliveries carry a base64-encoded signature in the
//! `X-Shopify-Hmac-SHA256` header. Both are checked in constant time, first
//! against the current secret and then against the previous one if the app
//! is mid-rotation.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::oauth::AuthQuery;
use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

// HMAC accepts keys of any length, so construction never fails.
fn mac(message: &[u8], secret: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Computes a lowercase hex HMAC-SHA256 signature.
///
/// ```rust
/// use shopify_server::auth::oauth::hmac::compute_signature;
///
/// assert_eq!(
///     compute_signature("message", "key"),
///     "6e9ef29b75fffc5b7abae527d58fdadb2fe42e7219011976917343065f58ed4a"
/// );
/// ```
#[must_use]
pub fn compute_signature(message: &str, secret: &str) -> String {
    hex::encode(mac(message.as_bytes(), secret))
}

/// Computes a standard base64 HMAC-SHA256 signature over raw bytes.
#[must_use]
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    BASE64_STANDARD.encode(mac(message, secret))
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Returns `true` if `received` matches the signature produced by `sign`
/// under the current secret or, failing that, the previous secret.
pub(crate) fn verify_with_rotation(
    config: &AppConfig,
    received: &str,
    sign: impl Fn(&str) -> String,
) -> bool {
    if constant_time_compare(&sign(config.api_secret_key().as_ref()), received) {
        return true;
    }
    config
        .old_api_secret_key()
        .is_some_and(|old| constant_time_compare(&sign(old.as_ref()), received))
}

/// Validates the `hmac` parameter of an OAuth callback.
///
/// The signed message is every parameter except `hmac` and `signature`,
/// sorted by key (see [`AuthQuery::to_signable_string`]).
#[must_use]
pub fn validate_hmac(query: &AuthQuery, config: &AppConfig) -> bool {
    let signable = query.to_signable_string();
    verify_with_rotation(config, query.hmac(), |secret| {
        compute_signature(&signable, secret)
    })
}
