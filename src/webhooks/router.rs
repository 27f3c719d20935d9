//! Routing verified deliveries to per-topic handlers.

use crate::config::AppConfig;
use crate::webhooks::catalog::{Topic, WebhookCatalog};
use crate::webhooks::verification::{verify_webhook, WebhookContext, HEADER_TOPIC};
use crate::webhooks::WebhookError;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Processes deliveries of one `(resource, action)` pair.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handles one verified delivery.
    async fn handle(&self, context: WebhookContext, payload: Value) -> Result<(), WebhookError>;
}

/// Maps catalog topics to handlers.
///
/// Built once at startup; topics without a handler are rejected at
/// dispatch time with [`WebhookError::NoHandler`].
#[derive(Clone)]
pub struct WebhookRouter {
    catalog: WebhookCatalog,
    handlers: HashMap<Topic, Arc<dyn WebhookHandler>>,
}

impl WebhookRouter {
    /// Creates a router with no handlers.
    #[must_use]
    pub fn new(catalog: WebhookCatalog) -> Self {
        Self {
            catalog,
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `resource/action`, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidTopic`] if the pair is malformed or
    /// not in the catalog.
    pub fn on(
        mut self,
        resource: &str,
        action: &str,
        handler: impl WebhookHandler + 'static,
    ) -> Result<Self, WebhookError> {
        let topic = Topic::from_parts(resource, action)?;
        if !self.catalog.contains(&topic) {
            return Err(WebhookError::InvalidTopic {
                topic: topic.to_string(),
            });
        }
        self.handlers.insert(topic, Arc::new(handler));
        Ok(self)
    }

    /// Returns the catalog the router was built from.
    #[must_use]
    pub const fn catalog(&self) -> &WebhookCatalog {
        &self.catalog
    }

    /// Returns `true` if a handler is registered for `topic`.
    #[must_use]
    pub fn handles(&self, topic: &Topic) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Hands a verified delivery of `topic` to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::NoHandler`] for a topic without a handler,
    /// and otherwise whatever the handler returns.
    pub async fn dispatch(
        &self,
        topic: &Topic,
        context: WebhookContext,
        payload: Value,
    ) -> Result<(), WebhookError> {
        let handler = self
            .handlers
            .get(topic)
            .ok_or_else(|| WebhookError::NoHandler {
                topic: topic.to_string(),
            })?;
        tracing::debug!(%topic, shop = %context.shop, "dispatching webhook");
        handler.handle(context, payload).await
    }

    /// Verifies a raw delivery for `topic` and dispatches it.
    ///
    /// The delivery's topic header must name `topic`.
    ///
    /// # Errors
    ///
    /// Returns the verification errors of [`verify_webhook`],
    /// [`WebhookError::InvalidHeader`] when the topic header disagrees,
    /// [`WebhookError::PayloadParse`] for a non-JSON body, and the errors of
    /// [`dispatch`](Self::dispatch).
    pub async fn process(
        &self,
        config: &AppConfig,
        topic: &Topic,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), WebhookError> {
        let context = verify_webhook(headers, body, config)?;
        if &context.topic != topic {
            return Err(WebhookError::InvalidHeader {
                header: HEADER_TOPIC,
            });
        }
        if !self.handles(topic) {
            return Err(WebhookError::NoHandler {
                topic: topic.to_string(),
            });
        }
        let payload: Value = serde_json::from_slice(body).map_err(|e| WebhookError::PayloadParse {
            message: e.to_string(),
        })?;
        self.dispatch(topic, context, payload).await
    }
}

impl fmt::Debug for WebhookRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut topics: Vec<&str> = self.handlers.keys().map(Topic::as_str).collect();
        topics.sort_unstable();
        f.debug_struct("WebhookRouter")
            .field("handlers", &topics)
            .finish_non_exhaustive()
    }
}
