//! HTTP surface of one hosted app.
//!
//! [`router`] mounts four endpoints under the configured app name:
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/auth/{app}/{shop}/redirect` | 303 to the consent screen |
//! | GET | `/auth/{app}/callback` | finishes the handshake, bridges the identity, serves the sign-in page |
//! | GET | `/auth/{app}/{shop}/token` | `{"firebaseToken": ..}` for a bridged tenant |
//! | POST | `/webhook/{app}/{resource}/{action}` | verifies and dispatches a delivery |
//!
//! A request whose `{app}` is not the configured app name gets 404.
//! Error bodies are fixed strings: no nonce, code, token or secret ever
//! reaches the client.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::auth::oauth::{AuthQuery, OAuthError, OAuthHandshake};
use crate::config::{AppConfig, ShopDomain};
use crate::identity::{IdentityBridge, IdentityError, SignInPage, WebAppConfig};
use crate::webhooks::{Topic, WebhookError, WebhookRouter};

/// Shared state of the handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    config: Arc<AppConfig>,
    handshake: OAuthHandshake,
    bridge: IdentityBridge,
    web_app: Arc<WebAppConfig>,
    webhooks: Arc<WebhookRouter>,
}

impl AppState {
    /// Bundles the components the handlers drive.
    ///
    /// `config` should be the same configuration the handshake was built
    /// with; the app name in request paths is checked against it.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        handshake: OAuthHandshake,
        bridge: IdentityBridge,
        web_app: WebAppConfig,
        webhooks: WebhookRouter,
    ) -> Self {
        Self {
            config,
            handshake,
            bridge,
            web_app: Arc::new(web_app),
            webhooks: Arc::new(webhooks),
        }
    }

    /// Returns the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns the handshake, and through it the session ledger.
    #[must_use]
    pub const fn handshake(&self) -> &OAuthHandshake {
        &self.handshake
    }

    fn check_app(&self, app: &str) -> Result<(), RouteError> {
        if app == self.config.app_name().as_ref() {
            Ok(())
        } else {
            Err(RouteError::NotFound)
        }
    }
}

/// Builds the router for `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/{app}/{shop}/redirect", get(redirect))
        .route("/auth/{app}/callback", get(callback))
        .route("/auth/{app}/{shop}/token", get(token))
        .route("/webhook/{app}/{resource}/{action}", post(webhook))
        .with_state(state)
}

/// Handler failures and the status each one is answered with.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Unknown app, shop or topic, or nothing to return.
    #[error("Not Found")]
    NotFound,

    /// The request itself is invalid.
    #[error("{0}")]
    BadRequest(String),

    /// A webhook delivery failed signature verification.
    #[error("Unauthorized")]
    Unauthorized,

    /// The platform or the identity provider failed.
    #[error("Upstream service error")]
    BadGateway,

    /// Misconfiguration or a failing handler.
    #[error("Internal server error")]
    Internal,
}

impl RouteError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

impl From<OAuthError> for RouteError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::StateMismatch | OAuthError::InvalidHmac | OAuthError::InvalidCallback { .. } => {
                Self::BadRequest(err.to_string())
            }
            OAuthError::TokenExchangeFailed { .. } | OAuthError::Network(_) => {
                warn!(error = %err, "code exchange failed");
                Self::BadGateway
            }
            OAuthError::MissingHostConfig => {
                error!(error = %err, "handshake misconfigured");
                Self::Internal
            }
        }
    }
}

impl From<IdentityError> for RouteError {
    fn from(err: IdentityError) -> Self {
        warn!(error = %err, "identity bridging failed");
        Self::BadGateway
    }
}

impl From<WebhookError> for RouteError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidHmac => Self::Unauthorized,
            WebhookError::InvalidHeader { .. } | WebhookError::PayloadParse { .. } => {
                Self::BadRequest(err.to_string())
            }
            WebhookError::InvalidTopic { .. } | WebhookError::NoHandler { .. } => Self::NotFound,
            other => {
                error!(error = %other, "webhook handler failed");
                Self::Internal
            }
        }
    }
}

fn parse_shop(shop: &str) -> Result<ShopDomain, RouteError> {
    ShopDomain::new(shop).map_err(|_| RouteError::BadRequest("Invalid shop domain".to_string()))
}

#[instrument(skip(state))]
async fn redirect(
    State(state): State<AppState>,
    Path((app, shop)): Path<(String, String)>,
) -> Result<Redirect, RouteError> {
    state.check_app(&app)?;
    let shop = parse_shop(&shop)?;
    let redirect = state
        .handshake
        .generate_authorization_redirect(&shop, None)
        .await?;
    Ok(Redirect::to(&redirect.url))
}

#[instrument(skip(state, params))]
async fn callback(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Html<String>, RouteError> {
    state.check_app(&app)?;
    let query = AuthQuery::from_params(params)?;
    let access_token = state.handshake.handle_callback(&query).await?;

    let shop = parse_shop(query.shop())?;
    let key = state.handshake.tenant_key(shop);
    let bridged = state
        .bridge
        .bridge_session(state.handshake.ledger(), &key)
        .await?;
    info!(shop = %key.shop(), "tenant signed in");

    let page = SignInPage {
        shop: key.shop(),
        app_api_key: state.config.api_key(),
        web_app: &state.web_app,
        token_namespace: state.bridge.token_namespace(),
        user_id: &bridged.user_id,
        token: &bridged.token,
        access_token: &access_token,
    };
    Ok(Html(page.render()))
}

#[instrument(skip(state))]
async fn token(
    State(state): State<AppState>,
    Path((app, shop)): Path<(String, String)>,
) -> Result<Response, RouteError> {
    state.check_app(&app)?;
    let shop = ShopDomain::new(shop).map_err(|_| RouteError::NotFound)?;
    let key = state.handshake.tenant_key(shop);
    let token = state
        .handshake
        .ledger()
        .federated_token(&key)
        .await
        .ok_or(RouteError::NotFound)?;
    Ok(Json(json!({ "firebaseToken": token.as_ref() })).into_response())
}

#[instrument(skip(state, headers, body), fields(bytes = body.len()))]
async fn webhook(
    State(state): State<AppState>,
    Path((app, resource, action)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, RouteError> {
    state.check_app(&app)?;
    let topic = Topic::from_parts(&resource, &action)?;
    state
        .webhooks
        .process(&state.config, &topic, &headers, &body)
        .await?;
    Ok(StatusCode::OK)
}
