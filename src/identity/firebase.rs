//! Firebase-backed identity provider.
//!
//! Custom tokens are RS256 JWTs signed with the service account's private
//! key. Values live in the Realtime Database and are read and written
//! through its REST API (`{database_url}/{path}.json`).

use crate::auth::{FederatedToken, FederatedUserId};
use crate::identity::error::IdentityError;
use crate::identity::provider::IdentityProvider;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Audience every custom token is addressed to.
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Lifetime of a custom token, in seconds. The provider rejects anything longer.
pub const CUSTOM_TOKEN_TTL_SECS: i64 = 3600;

/// The fields of a service-account key file this crate uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    /// The Firebase project.
    pub project_id: String,
    /// The service account's email, used as token issuer.
    pub client_email: String,
    /// Id of `private_key`, sent as the token's `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,
    private_key: String,
}

impl ServiceAccount {
    /// Builds a service account from its parts.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            client_email: client_email.into(),
            private_key_id: None,
            private_key: private_key_pem.into(),
        }
    }

    /// Parses a downloaded service-account key file.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if the JSON lacks a
    /// required field.
    pub fn from_json(json: &str) -> Result<Self, IdentityError> {
        serde_json::from_str(json).map_err(|e| IdentityError::InvalidCredentials {
            reason: format!("Invalid service account file: {e}"),
        })
    }

    /// Returns the default database URL of the project.
    #[must_use]
    pub fn default_database_url(&self) -> String {
        format!("https://{}.firebaseio.com", self.project_id)
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"*****")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CustomTokenClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
    uid: String,
}

/// [`IdentityProvider`] backed by Firebase Auth and the Realtime Database.
#[derive(Clone)]
pub struct FirebaseIdentityProvider {
    client: reqwest::Client,
    account: ServiceAccount,
    encoding_key: EncodingKey,
    database_url: String,
    database_secret: Option<String>,
}

impl FirebaseIdentityProvider {
    /// Creates a provider for `account`, storing values under `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if the private key is
    /// not an RSA key in PEM form.
    pub fn new(account: ServiceAccount, database_url: impl Into<String>) -> Result<Self, IdentityError> {
        let encoding_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            IdentityError::InvalidCredentials {
                reason: format!("Invalid private key: {e}"),
            }
        })?;
        let database_url: String = database_url.into();

        Ok(Self {
            client: reqwest::Client::new(),
            account,
            encoding_key,
            database_url: database_url.trim_end_matches('/').to_string(),
            database_secret: None,
        })
    }

    /// Authenticates database requests with `secret`, sent as `?auth=`.
    #[must_use]
    pub fn with_database_secret(mut self, secret: impl Into<String>) -> Self {
        self.database_secret = Some(secret.into());
        self
    }

    /// Returns the database URL values are stored under.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    fn value_url(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{encoded}.json", self.database_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.value_url(path));
        match &self.database_secret {
            Some(secret) => builder.query(&[("auth", secret.as_str())]),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

impl fmt::Debug for FirebaseIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseIdentityProvider")
            .field("account", &self.account)
            .field("database_url", &self.database_url)
            .field("database_secret", &self.database_secret.as_ref().map(|_| "*****"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn create_custom_token(
        &self,
        uid: &FederatedUserId,
    ) -> Result<FederatedToken, IdentityError> {
        let iat = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: self.account.client_email.clone(),
            sub: self.account.client_email.clone(),
            aud: CUSTOM_TOKEN_AUDIENCE.to_string(),
            iat,
            exp: iat + CUSTOM_TOKEN_TTL_SECS,
            uid: uid.to_string(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.account.private_key_id);

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            IdentityError::InvalidCredentials {
                reason: format!("Custom token signing failed: {e}"),
            }
        })?;
        Ok(FederatedToken::new(token))
    }

    async fn write_value(&self, path: &str, value: &Value) -> Result<(), IdentityError> {
        let response = self
            .request(reqwest::Method::PUT, path)
            .json(value)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::debug!(path, "identity store value written");
        Ok(())
    }

    async fn read_value(&self, path: &str) -> Result<Option<Value>, IdentityError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        let value: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::MalformedResponse {
                reason: format!("Failed to parse value at '{path}': {e}"),
            })?;
        Ok((!value.is_null()).then_some(value))
    }
}
