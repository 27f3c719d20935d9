//! OAuth `state` nonces.
//!
//! A fresh nonce is generated for every authorization redirect and stored in
//! the tenant's session. The callback must echo it back exactly once.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

/// A single-use OAuth state nonce.
///
/// ```rust
/// use shopify_server::auth::oauth::StateParam;
///
/// let state = StateParam::new();
/// assert_eq!(state.as_ref().len(), 15);
/// assert!(state.as_ref().chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct StateParam(String);

const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<StateParam>();
};

impl StateParam {
    const NONCE_LENGTH: usize = 15;

    /// Generates a nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn new() -> Self {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::NONCE_LENGTH)
            .map(char::from)
            .collect();
        Self(nonce)
    }

    /// Wraps an existing value, e.g. one restored from a session store.
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl Default for StateParam {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for StateParam {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Nonces are short-lived secrets; keep them out of debug logs.
impl fmt::Debug for StateParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateParam(*****)")
    }
}
