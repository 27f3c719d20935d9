//! Webhook subscriptions and deliveries.
//!
//! # Overview
//!
//! - [`WebhookCatalog`] / [`Topic`]: the immutable set of `resource/action`
//!   topics and the capability some of them require
//! - [`WebhookApi`] / [`RestWebhookClient`]: one tenant's subscriptions on
//!   the platform
//! - [`WebhookReconciler`]: converges many tenants to a desired topic set
//!   by list, diff, then create or update
//! - [`verify_webhook`] / [`WebhookRouter`]: inbound deliveries at
//!   `/webhook/{app}/{resource}/{action}`
//!
//! # Reconciliation
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopify_server::webhooks::{RestWebhookClient, Tenant, WebhookCatalog, WebhookReconciler};
//!
//! let reconciler = WebhookReconciler::new(config.clone(), WebhookCatalog::standard());
//! let tenants = vec![Tenant::new(
//!     shop.clone(),
//!     Arc::new(RestWebhookClient::from_config(&config, shop, access_token)),
//! )];
//!
//! for outcome in reconciler.reconcile(&[], &tenants).await? {
//!     for failure in outcome.failures() {
//!         eprintln!("{}: {} failed", outcome.shop, failure.topic);
//!     }
//! }
//! ```
//!
//! Every type here is `Send + Sync`.

mod catalog;
mod client;
mod errors;
mod reconciler;
mod router;
mod types;
mod verification;

pub use catalog::{webhook_address, Capability, Topic, WebhookCatalog};
pub use client::{RestWebhookClient, WebhookApi, ACCESS_TOKEN_HEADER};
pub use errors::WebhookError;
pub use reconciler::{Tenant, WebhookReconciler};
pub use router::{WebhookHandler, WebhookRouter};
pub use types::{
    DesiredWebhookSpec, NewWebhook, OutcomeStatus, PruneOutcome, SkipReason, TenantOutcome,
    TopicOutcome, WebhookFormat, WebhookSubscription,
};
pub use verification::{
    verify_hmac, verify_webhook, WebhookContext, HEADER_API_VERSION, HEADER_HMAC, HEADER_SHOP_DOMAIN,
    HEADER_TOPIC, HEADER_WEBHOOK_ID,
};

const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<WebhookReconciler>();
    assert_send_sync::<WebhookRouter>();
    assert_send_sync::<Tenant>();
};
