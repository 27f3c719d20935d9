//! OAuth callback query parameters.

use crate::auth::oauth::OAuthError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Parameters that are never part of the signed message.
const UNSIGNED_PARAMS: [&str; 2] = ["hmac", "signature"];

/// The full query string of an OAuth callback.
///
/// Shopify signs every parameter it sends, including ones this crate does
/// not interpret (`host`, `timestamp`, ...), so the whole map is kept for
/// signature verification. `shop`, `code`, `state` and `hmac` must be present.
///
/// Deserializing (for example through a web framework's query extractor)
/// performs the same presence check as [`AuthQuery::from_params`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct AuthQuery {
    params: BTreeMap<String, String>,
}

impl AuthQuery {
    const REQUIRED: [&'static str; 4] = ["shop", "code", "state", "hmac"];

    /// Wraps a parsed query map.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidCallback`] if a required parameter is
    /// missing.
    pub fn from_params(params: BTreeMap<String, String>) -> Result<Self, OAuthError> {
        if let Some(missing) = Self::REQUIRED.iter().find(|k| !params.contains_key(**k)) {
            return Err(OAuthError::InvalidCallback {
                reason: format!("missing '{missing}' parameter"),
            });
        }
        Ok(Self { params })
    }

    /// Returns the raw `shop` parameter.
    #[must_use]
    pub fn shop(&self) -> &str {
        self.get("shop")
    }

    /// Returns the authorization code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.get("code")
    }

    /// Returns the echoed `state` nonce.
    #[must_use]
    pub fn state(&self) -> &str {
        self.get("state")
    }

    /// Returns the hex signature sent by the platform.
    #[must_use]
    pub fn hmac(&self) -> &str {
        self.get("hmac")
    }

    /// Returns every parameter, signed or not.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Builds the message the `hmac` parameter was computed over.
    ///
    /// All parameters except `hmac` and `signature`, sorted by key and joined
    /// as `key=value` pairs with `&`. `%` and `&` are escaped in values, and
    /// additionally `=` in keys, so no pair can be forged by smuggling a
    /// separator.
    #[must_use]
    pub fn to_signable_string(&self) -> String {
        self.params
            .iter()
            .filter(|(k, _)| !UNSIGNED_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| {
                let key = escape_value(k).replace('=', "%3D");
                format!("{key}={}", escape_value(v))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn get(&self, key: &str) -> &str {
        self.params.get(key).map_or("", String::as_str)
    }
}

impl TryFrom<BTreeMap<String, String>> for AuthQuery {
    type Error = OAuthError;

    fn try_from(params: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_params(params)
    }
}

fn escape_value(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_params_requires_core_parameters() {
        let result = AuthQuery::from_params(params(&[("shop", "a"), ("code", "b"), ("hmac", "c")]));
        match result {
            Err(OAuthError::InvalidCallback { reason }) => assert!(reason.contains("state")),
            other => panic!("expected InvalidCallback, got {other:?}"),
        }
    }

    #[test]
    fn test_signable_string_sorts_and_skips_signatures() {
        let query = AuthQuery::from_params(params(&[
            ("timestamp", "1337178173"),
            ("state", "nonce"),
            ("shop", "acme.myshopify.com"),
            ("code", "0907a61c0c8d55e99db179b68161bc00"),
            ("hmac", "ignored"),
            ("signature", "ignored"),
        ]))
        .unwrap();

        assert_eq!(
            query.to_signable_string(),
            "code=0907a61c0c8d55e99db179b68161bc00&shop=acme.myshopify.com&state=nonce&timestamp=1337178173"
        );
    }

    #[test]
    fn test_signable_string_escapes_separators() {
        let query = AuthQuery::from_params(params(&[
            ("shop", "a"),
            ("code", "x&y=z"),
            ("state", "100%"),
            ("hmac", "h"),
            ("we=ird", "v"),
        ]))
        .unwrap();

        assert_eq!(
            query.to_signable_string(),
            "code=x%26y=z&shop=a&state=100%25&we%3Dird=v"
        );
    }

    #[test]
    fn test_deserialize_runs_presence_check() {
        let ok: AuthQuery = serde_json::from_str(
            r#"{"shop":"acme.myshopify.com","code":"c","state":"s","hmac":"h","host":"x"}"#,
        )
        .unwrap();
        assert_eq!(ok.shop(), "acme.myshopify.com");
        assert_eq!(ok.params().get("host").map(String::as_str), Some("x"));

        let missing = serde_json::from_str::<AuthQuery>(r#"{"shop":"acme"}"#);
        assert!(missing.is_err());
    }
}
