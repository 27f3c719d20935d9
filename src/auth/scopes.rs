//! OAuth scope sets.
//!
//! Scopes are requested on the consent screen as a comma-separated list and
//! come back the same way in the token exchange response.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A set of OAuth scopes.
///
/// Parsing expands implied scopes: `write_products` also grants
/// `read_products`, and `unauthenticated_write_x` grants
/// `unauthenticated_read_x`. The set is ordered, so the `Display` form is
/// stable and can be compared across requests.
///
/// ```rust
/// use shopify_server::AuthScopes;
///
/// let scopes: AuthScopes = "write_orders, read_products".parse().unwrap();
/// assert_eq!(scopes.to_string(), "read_orders,read_products,write_orders");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AuthScopes {
    scopes: BTreeSet<String>,
}

impl AuthScopes {
    /// Creates an empty scope set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no scope is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Returns `true` if every scope in `other` is granted by `self`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.scopes.is_subset(&self.scopes)
    }

    /// Returns an iterator over the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    fn implied_scope(scope: &str) -> Option<String> {
        scope
            .strip_prefix("unauthenticated_write_")
            .map(|rest| format!("unauthenticated_read_{rest}"))
            .or_else(|| scope.strip_prefix("write_").map(|rest| format!("read_{rest}")))
    }
}

impl FromStr for AuthScopes {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut scopes = BTreeSet::new();

        for scope in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if !scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::InvalidScopes {
                    reason: format!("Invalid characters in scope: '{scope}'"),
                });
            }
            if let Some(implied) = Self::implied_scope(scope) {
                scopes.insert(implied);
            }
            scopes.insert(scope.to_string());
        }

        Ok(Self { scopes })
    }
}

impl fmt::Display for AuthScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

impl Serialize for AuthScopes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AuthScopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_skips_empty_entries() {
        let scopes: AuthScopes = " read_products ,, read_orders ".parse().unwrap();
        assert_eq!(scopes.to_string(), "read_orders,read_products");
    }

    #[test]
    fn test_write_scope_implies_read_scope() {
        let scopes: AuthScopes = "write_products,unauthenticated_write_checkouts".parse().unwrap();
        let expected: AuthScopes = "read_products,unauthenticated_read_checkouts"
            .parse()
            .unwrap();
        assert!(scopes.covers(&expected));
    }

    #[test]
    fn test_rejects_scope_with_invalid_characters() {
        let result: Result<AuthScopes, _> = "read_products,write-orders".parse();
        assert!(matches!(result, Err(ConfigError::InvalidScopes { .. })));
    }

    #[test]
    fn test_empty_string_is_empty_set() {
        let scopes: AuthScopes = "".parse().unwrap();
        assert!(scopes.is_empty());
        assert_eq!(scopes.to_string(), "");
    }

    #[test]
    fn test_serde_uses_comma_separated_string() {
        let scopes: AuthScopes = "read_orders".parse().unwrap();
        assert_eq!(serde_json::to_string(&scopes).unwrap(), r#""read_orders""#);
        let back: AuthScopes = serde_json::from_str(r#""write_orders""#).unwrap();
        assert!(back.covers(&"read_orders".parse().unwrap()));
    }
}
