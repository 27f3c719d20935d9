//! The identity provider seam.

use crate::auth::{FederatedToken, FederatedUserId};
use crate::identity::error::IdentityError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Root of the profile records.
pub const PROFILES_ROOT: &str = "profiles";

const FORBIDDEN_IN_SEGMENT: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Joins segments into an absolute store path.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidPath`] if a segment is empty or contains
/// `.`, `#`, `$`, `[`, `]`, `/` or a control character.
pub fn store_path(segments: &[&str]) -> Result<String, IdentityError> {
    let path = format!("/{}", segments.join("/"));
    let valid = segments.iter().all(|segment| {
        !segment.is_empty()
            && !segment
                .chars()
                .any(|c| FORBIDDEN_IN_SEGMENT.contains(&c) || c.is_control())
    });
    if valid {
        Ok(path)
    } else {
        Err(IdentityError::InvalidPath { path })
    }
}

/// Returns the path of the profile's shop attribute.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidPath`] if `uid` is not a valid segment.
pub fn profile_shop_path(uid: &FederatedUserId) -> Result<String, IdentityError> {
    store_path(&[PROFILES_ROOT, uid.as_ref(), "shop"])
}

/// An external identity provider with a hierarchical key-value store.
///
/// Paths are absolute and slash-separated, as produced by [`store_path`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Mints a custom auth token for `uid`.
    async fn create_custom_token(&self, uid: &FederatedUserId)
        -> Result<FederatedToken, IdentityError>;

    /// Replaces the value at `path`.
    async fn write_value(&self, path: &str, value: &Value) -> Result<(), IdentityError>;

    /// Reads the value at `path`, or `None` if nothing is stored there.
    async fn read_value(&self, path: &str) -> Result<Option<Value>, IdentityError>;

    /// Reads the direct children of `path` as a map from key to value.
    async fn read_children(&self, path: &str) -> Result<BTreeMap<String, Value>, IdentityError> {
        match self.read_value(path).await? {
            None => Ok(BTreeMap::new()),
            Some(Value::Object(children)) => Ok(children.into_iter().collect()),
            Some(other) => Err(IdentityError::MalformedResponse {
                reason: format!("expected an object at '{path}', found {other}"),
            }),
        }
    }

    /// Reads the shop attribute of the profile for `uid`.
    async fn profile_shop(&self, uid: &FederatedUserId) -> Result<Option<String>, IdentityError> {
        let path = profile_shop_path(uid)?;
        match self.read_value(&path).await? {
            None => Ok(None),
            Some(Value::String(shop)) => Ok(Some(shop)),
            Some(other) => Err(IdentityError::MalformedResponse {
                reason: format!("expected a string at '{path}', found {other}"),
            }),
        }
    }

    /// Sets the shop attribute of the profile for `uid`.
    async fn update_profile_shop(&self, uid: &FederatedUserId, shop: &str) -> Result<(), IdentityError> {
        let path = profile_shop_path(uid)?;
        self.write_value(&path, &Value::String(shop.to_string())).await
    }
}

/// An in-process identity provider.
///
/// Tokens are opaque strings of the form `custom-token:{uid}`. Every write
/// is kept as one leaf, and reading a parent path assembles its leaves into
/// an object. Clones share the same store.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentityProvider {
    values: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryIdentityProvider {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored leaf, keyed by absolute path.
    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.read().await.clone()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_custom_token(
        &self,
        uid: &FederatedUserId,
    ) -> Result<FederatedToken, IdentityError> {
        Ok(FederatedToken::new(format!("custom-token:{uid}")))
    }

    async fn write_value(&self, path: &str, value: &Value) -> Result<(), IdentityError> {
        let mut values = self.values.write().await;
        let nested = format!("{path}/");
        values.retain(|key, _| !key.starts_with(&nested));
        if value.is_null() {
            values.remove(path);
        } else {
            values.insert(path.to_string(), value.clone());
        }
        Ok(())
    }

    async fn read_value(&self, path: &str) -> Result<Option<Value>, IdentityError> {
        let values = self.values.read().await;
        if let Some(value) = values.get(path) {
            return Ok(Some(value.clone()));
        }

        let prefix = format!("{path}/");
        let mut root = Map::new();
        for (key, value) in values.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            let segments: Vec<&str> = rest.split('/').collect();
            insert_nested(&mut root, &segments, value.clone());
        }
        Ok((!root.is_empty()).then_some(Value::Object(root)))
    }
}

fn insert_nested(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            map.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_nested(child, rest, value);
            }
        }
    }
}
