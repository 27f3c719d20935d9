//! Stable identity-store keys for tenants.
//!
//! The identity store addresses users and records by path segments, and a
//! segment cannot contain `.`, `#`, `$`, `[`, `]` or `/`. A shop domain
//! always contains dots, so the federated user id is built from the domain
//! with those characters percent-escaped behind a `shopify:` prefix:
//!
//! ```text
//! my-store.myshopify.com  <->  shopify:my-store%2Emyshopify%2Ecom
//! ```
//!
//! `%` itself is escaped too, which keeps the transform exactly invertible
//! for any input string.

use crate::config::ShopDomain;
use serde::{Serialize, Serializer};
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Prefix every federated user id starts with.
pub const UID_PREFIX: &str = "shopify:";

const ESCAPED: [char; 7] = ['%', '.', '#', '$', '[', ']', '/'];
const LEGACY_SUFFIX: &str = "-myshopify-com";

/// Errors raised when a federated user id cannot be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantKeyError {
    /// The id does not start with [`UID_PREFIX`].
    #[error("Federated user id '{uid}' does not start with '{UID_PREFIX}'.")]
    MissingPrefix {
        /// The rejected id.
        uid: String,
    },

    /// A `%` is not followed by the upper-case hex code of an escaped character.
    #[error("Federated user id '{uid}' has an invalid escape sequence at byte {position}.")]
    InvalidEscape {
        /// The rejected id.
        uid: String,
        /// Byte offset of the offending `%`.
        position: usize,
    },

    /// A character that is always escaped appears raw.
    #[error("Federated user id '{uid}' contains the reserved character '{character}'.")]
    ReservedCharacter {
        /// The rejected id.
        uid: String,
        /// The reserved character.
        character: char,
    },

    /// The id decodes, but not to a valid shop domain.
    #[error("Federated user id '{uid}' does not name a valid shop.")]
    InvalidShop {
        /// The rejected id.
        uid: String,
    },
}

/// Encoder and decoder for federated user ids.
///
/// ```rust
/// use shopify_server::auth::TenantKeyCodec;
///
/// let uid = TenantKeyCodec::encode("my-store.myshopify.com");
/// assert_eq!(uid, "shopify:my-store%2Emyshopify%2Ecom");
/// assert_eq!(TenantKeyCodec::decode(&uid).unwrap(), "my-store.myshopify.com");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TenantKeyCodec;

impl TenantKeyCodec {
    /// Encodes a shop identifier into a federated user id.
    #[must_use]
    pub fn encode(shop: &str) -> String {
        let mut uid = String::with_capacity(UID_PREFIX.len() + shop.len() + 8);
        uid.push_str(UID_PREFIX);
        for c in shop.chars() {
            if ESCAPED.contains(&c) {
                // Writing to a String cannot fail.
                let _ = write!(uid, "%{:02X}", c as u32);
            } else {
                uid.push(c);
            }
        }
        uid
    }

    /// Decodes a federated user id back into the shop identifier.
    ///
    /// Only the canonical form produced by [`encode`](Self::encode) is
    /// accepted, so `encode(decode(uid)) == uid` whenever decoding succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`TenantKeyError`] for a missing prefix, a malformed or
    /// non-canonical escape, or a raw reserved character.
    pub fn decode(uid: &str) -> Result<String, TenantKeyError> {
        let body = uid
            .strip_prefix(UID_PREFIX)
            .ok_or_else(|| TenantKeyError::MissingPrefix {
                uid: uid.to_string(),
            })?;

        let mut shop = String::with_capacity(body.len());
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '%' {
                let decoded = body
                    .get(i + 1..i + 3)
                    .and_then(Self::unescape)
                    .ok_or_else(|| TenantKeyError::InvalidEscape {
                        uid: uid.to_string(),
                        position: UID_PREFIX.len() + i,
                    })?;
                shop.push(decoded);
                chars.next();
                chars.next();
            } else if ESCAPED.contains(&c) {
                return Err(TenantKeyError::ReservedCharacter {
                    uid: uid.to_string(),
                    character: c,
                });
            } else {
                shop.push(c);
            }
        }
        Ok(shop)
    }

    /// Decodes an id written by the earlier dash-substitution scheme
    /// (`shopify:my-store-myshopify-com`).
    ///
    /// That scheme mapped `.` to `-` and is only reversible for the
    /// `.myshopify.com` suffix, which is all this recovers.
    ///
    /// # Errors
    ///
    /// Returns [`TenantKeyError::MissingPrefix`] or
    /// [`TenantKeyError::InvalidShop`].
    pub fn decode_legacy(uid: &str) -> Result<ShopDomain, TenantKeyError> {
        let body = uid
            .strip_prefix(UID_PREFIX)
            .ok_or_else(|| TenantKeyError::MissingPrefix {
                uid: uid.to_string(),
            })?;
        let name = body.strip_suffix(LEGACY_SUFFIX).unwrap_or(body);
        ShopDomain::new(name).map_err(|_| TenantKeyError::InvalidShop {
            uid: uid.to_string(),
        })
    }

    /// Decodes an id read back from the store into a shop, accepting both
    /// the current form and the legacy `-myshopify-com` form.
    ///
    /// # Errors
    ///
    /// Returns a [`TenantKeyError`] if neither form decodes to a valid shop.
    pub fn decode_shop(uid: &str) -> Result<ShopDomain, TenantKeyError> {
        if uid.ends_with(LEGACY_SUFFIX) {
            return Self::decode_legacy(uid);
        }
        let shop = Self::decode(uid)?;
        ShopDomain::new(shop).map_err(|_| TenantKeyError::InvalidShop {
            uid: uid.to_string(),
        })
    }

    fn unescape(hex: &str) -> Option<char> {
        if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
            return None;
        }
        let byte = u8::from_str_radix(hex, 16).ok()?;
        let c = char::from(byte);
        ESCAPED.contains(&c).then_some(c)
    }
}

/// The federated user id of a tenant.
///
/// Always produced by [`TenantKeyCodec::encode`], so it is a valid
/// identity-store path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FederatedUserId(String);

impl FederatedUserId {
    /// Derives the id for a shop.
    #[must_use]
    pub fn from_shop(shop: &ShopDomain) -> Self {
        Self(TenantKeyCodec::encode(shop.as_ref()))
    }

    /// Parses an id read back from the identity store.
    ///
    /// # Errors
    ///
    /// Returns a [`TenantKeyError`] unless `uid` decodes to a valid shop.
    pub fn parse(uid: &str) -> Result<Self, TenantKeyError> {
        let id = Self(uid.to_string());
        id.shop()?;
        Ok(id)
    }

    /// Returns the shop this id was derived from.
    ///
    /// # Errors
    ///
    /// Returns a [`TenantKeyError`] if the id does not decode to a shop.
    pub fn shop(&self) -> Result<ShopDomain, TenantKeyError> {
        let shop = TenantKeyCodec::decode(&self.0)?;
        ShopDomain::new(shop).map_err(|_| TenantKeyError::InvalidShop {
            uid: self.0.clone(),
        })
    }
}

impl AsRef<str> for FederatedUserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FederatedUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FederatedUserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_every_reserved_character() {
        let uid = TenantKeyCodec::encode("a.b#c$d[e]f/g%h");
        assert_eq!(uid, "shopify:a%2Eb%23c%24d%5Be%5Df%2Fg%25h");
        assert!(!uid[UID_PREFIX.len()..].contains(['.', '#', '$', '[', ']', '/']));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let samples = [
            "",
            "my-store.myshopify.com",
            "my-store-myshopify-com",
            "already%2Eescaped",
            "%",
            "%%25",
            "ünïcödé.shop",
            "shopify:nested.prefix",
            "trailing.",
        ];
        for shop in samples {
            let uid = TenantKeyCodec::encode(shop);
            assert_eq!(TenantKeyCodec::decode(&uid).unwrap(), shop, "uid {uid}");
        }
    }

    #[test]
    fn test_dashed_and_dotted_shops_do_not_collide() {
        let dotted = TenantKeyCodec::encode("a-b.myshopify.com");
        let dashed = TenantKeyCodec::encode("a.b.myshopify.com");
        assert_ne!(dotted, dashed);
    }

    #[test]
    fn test_decode_requires_prefix() {
        assert!(matches!(
            TenantKeyCodec::decode("google:abc"),
            Err(TenantKeyError::MissingPrefix { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_non_canonical_escapes() {
        for uid in ["shopify:a%2e", "shopify:a%41", "shopify:a%", "shopify:a%2", "shopify:%+E"] {
            assert!(
                matches!(TenantKeyCodec::decode(uid), Err(TenantKeyError::InvalidEscape { .. })),
                "{uid} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_reports_escape_position() {
        let err = TenantKeyCodec::decode("shopify:ab%zz").unwrap_err();
        assert_eq!(
            err,
            TenantKeyError::InvalidEscape {
                uid: "shopify:ab%zz".to_string(),
                position: 10,
            }
        );
    }

    #[test]
    fn test_decode_rejects_raw_reserved_characters() {
        assert!(matches!(
            TenantKeyCodec::decode("shopify:a.b"),
            Err(TenantKeyError::ReservedCharacter { character: '.', .. })
        ));
    }

    #[test]
    fn test_decode_shop_accepts_both_forms() {
        let current = TenantKeyCodec::decode_shop("shopify:acme%2Emyshopify%2Ecom").unwrap();
        assert_eq!(current.as_ref(), "acme.myshopify.com");
        let legacy = TenantKeyCodec::decode_shop("shopify:acme-myshopify-com").unwrap();
        assert_eq!(legacy.as_ref(), "acme.myshopify.com");
        assert!(TenantKeyCodec::decode_shop("acme").is_err());
    }

    #[test]
    fn test_decode_legacy_restores_myshopify_suffix() {
        let shop = TenantKeyCodec::decode_legacy("shopify:my-store-myshopify-com").unwrap();
        assert_eq!(shop.as_ref(), "my-store.myshopify.com");
    }

    #[test]
    fn test_federated_user_id_round_trips_shop_domain() {
        let shop = ShopDomain::new("my-store").unwrap();
        let uid = FederatedUserId::from_shop(&shop);
        assert_eq!(uid.as_ref(), "shopify:my-store%2Emyshopify%2Ecom");
        assert_eq!(uid.shop().unwrap(), shop);
        assert_eq!(FederatedUserId::parse(uid.as_ref()).unwrap(), uid);
    }

    #[test]
    fn test_federated_user_id_parse_rejects_non_shop_ids() {
        assert!(matches!(
            FederatedUserId::parse("shopify:not a shop"),
            Err(TenantKeyError::InvalidShop { .. })
        ));
    }
}
