//! Converging tenants' webhook subscriptions to a desired topic set.
//!
//! For each tenant the reconciler lists the existing subscriptions once,
//! diffs them against the desired topics, and then creates or updates one
//! subscription per topic. Failures are isolated to a single topic of a
//! single tenant and reported in the returned outcomes. Nothing is deleted
//! except through the explicit [`WebhookReconciler::prune_duplicates`].

use crate::config::{AppConfig, HostUrl, ShopDomain};
use crate::webhooks::catalog::{webhook_address, Capability, Topic, WebhookCatalog};
use crate::webhooks::client::WebhookApi;
use crate::webhooks::types::{
    DesiredWebhookSpec, OutcomeStatus, PruneOutcome, SkipReason, TenantOutcome, TopicOutcome,
    WebhookSubscription,
};
use crate::webhooks::WebhookError;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// An authorized tenant, with a webhook client bound to its credential.
#[derive(Clone)]
pub struct Tenant {
    shop: ShopDomain,
    api: Arc<dyn WebhookApi>,
    capabilities: BTreeSet<Capability>,
}

impl Tenant {
    /// Creates a tenant holding no capabilities.
    #[must_use]
    pub fn new(shop: ShopDomain, api: Arc<dyn WebhookApi>) -> Self {
        Self {
            shop,
            api,
            capabilities: BTreeSet::new(),
        }
    }

    /// Marks `capability` as held.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Returns the tenant's shop.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// Returns `true` if the tenant holds `capability`.
    #[must_use]
    pub fn holds(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn may_subscribe(&self, topic: &Topic) -> bool {
        WebhookCatalog::required_capability(topic).map_or(true, |capability| self.holds(capability))
    }
}

impl fmt::Debug for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenant")
            .field("shop", &self.shop)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Reconciles webhook subscriptions across tenants.
#[derive(Clone, Debug)]
pub struct WebhookReconciler {
    config: Arc<AppConfig>,
    catalog: WebhookCatalog,
}

impl WebhookReconciler {
    /// Creates a reconciler using `catalog` as the default topic set.
    #[must_use]
    pub const fn new(config: Arc<AppConfig>, catalog: WebhookCatalog) -> Self {
        Self { config, catalog }
    }

    /// Returns the default topic set.
    #[must_use]
    pub const fn catalog(&self) -> &WebhookCatalog {
        &self.catalog
    }

    fn host(&self) -> Result<&HostUrl, WebhookError> {
        self.config.host().ok_or(WebhookError::HostNotConfigured)
    }

    /// Returns `desired` without repeats, or the whole catalog if empty.
    fn resolve_topics(&self, desired: &[Topic]) -> Vec<Topic> {
        let source = if desired.is_empty() {
            self.catalog.topics()
        } else {
            desired
        };
        let mut seen = HashSet::new();
        source
            .iter()
            .filter(|topic| seen.insert(topic.as_str()))
            .cloned()
            .collect()
    }

    /// Diffs `desired` against a tenant's `existing` subscriptions.
    ///
    /// Each topic gets a spec with its computed address. A topic matching an
    /// existing subscription is marked for update with that subscription's
    /// id; when several match, the first listed wins. Topics gated on a
    /// capability the tenant lacks are flagged and never matched.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::HostNotConfigured`] if no host is configured.
    pub fn plan(
        &self,
        desired: &[Topic],
        existing: &[WebhookSubscription],
        tenant: &Tenant,
    ) -> Result<Vec<DesiredWebhookSpec>, WebhookError> {
        let host = self.host()?;
        Ok(self
            .resolve_topics(desired)
            .into_iter()
            .map(|topic| self.spec_for(host, topic, existing, tenant))
            .collect())
    }

    fn spec_for(
        &self,
        host: &HostUrl,
        topic: Topic,
        existing: &[WebhookSubscription],
        tenant: &Tenant,
    ) -> DesiredWebhookSpec {
        let address = webhook_address(host, self.config.app_name(), &topic);
        if !tenant.may_subscribe(&topic) {
            return DesiredWebhookSpec {
                topic,
                address,
                needs_update: false,
                existing_id: None,
                requires_capability_not_held: true,
            };
        }
        let existing_id = existing
            .iter()
            .find(|subscription| subscription.topic == topic.as_str())
            .map(|subscription| subscription.id);
        DesiredWebhookSpec {
            topic,
            address,
            needs_update: existing_id.is_some(),
            existing_id,
            requires_capability_not_held: false,
        }
    }

    /// Reconciles every tenant to `desired`, or to the catalog if empty.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::HostNotConfigured`] if no host is configured.
    /// Remote failures never surface here; they are reported per topic.
    pub async fn reconcile(
        &self,
        desired: &[Topic],
        tenants: &[Tenant],
    ) -> Result<Vec<TenantOutcome>, WebhookError> {
        self.reconcile_with_cancellation(desired, tenants, &CancellationToken::new())
            .await
    }

    /// Like [`reconcile`](Self::reconcile), stopping at `cancel`.
    ///
    /// Once `cancel` fires, calls already sent run to completion and no new
    /// create or update is sent; the topics left over report
    /// [`SkipReason::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::HostNotConfigured`] if no host is configured.
    #[instrument(skip_all, fields(app = %self.config.app_name(), tenants = tenants.len()))]
    pub async fn reconcile_with_cancellation(
        &self,
        desired: &[Topic],
        tenants: &[Tenant],
        cancel: &CancellationToken,
    ) -> Result<Vec<TenantOutcome>, WebhookError> {
        let host = self.host()?;
        let topics = self.resolve_topics(desired);
        let concurrency = self.config.reconcile_concurrency();

        let outcomes = stream::iter(tenants)
            .map(|tenant| self.reconcile_tenant(host, &topics, tenant, cancel))
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(outcomes)
    }

    async fn reconcile_tenant(
        &self,
        host: &HostUrl,
        topics: &[Topic],
        tenant: &Tenant,
        cancel: &CancellationToken,
    ) -> TenantOutcome {
        let unlisted = |status: OutcomeStatus| TenantOutcome {
            shop: tenant.shop.clone(),
            topics: topics
                .iter()
                .map(|topic| {
                    let spec = self.spec_for(host, topic.clone(), &[], tenant);
                    let status = if spec.requires_capability_not_held {
                        OutcomeStatus::Skipped(SkipReason::CapabilityNotHeld)
                    } else {
                        status.clone()
                    };
                    TopicOutcome {
                        topic: spec.topic,
                        address: spec.address,
                        status,
                    }
                })
                .collect(),
        };

        if cancel.is_cancelled() {
            return unlisted(OutcomeStatus::Skipped(SkipReason::Cancelled));
        }

        let existing = match tenant.api.list_webhooks().await {
            Ok(existing) => existing,
            Err(error) => {
                warn!(shop = %tenant.shop, %error, "listing webhooks failed");
                return unlisted(OutcomeStatus::Failed {
                    reason: error.to_string(),
                });
            }
        };

        let specs: Vec<DesiredWebhookSpec> = topics
            .iter()
            .map(|topic| self.spec_for(host, topic.clone(), &existing, tenant))
            .collect();
        let outcome = TenantOutcome {
            shop: tenant.shop.clone(),
            topics: stream::iter(specs)
                .map(|spec| Self::apply(tenant, spec, cancel))
                .buffered(self.config.reconcile_concurrency())
                .collect()
                .await,
        };

        info!(
            shop = %tenant.shop,
            topics = outcome.topics.len(),
            failed = outcome.failures().count(),
            "webhooks reconciled"
        );
        outcome
    }

    async fn apply(tenant: &Tenant, spec: DesiredWebhookSpec, cancel: &CancellationToken) -> TopicOutcome {
        let status = if spec.requires_capability_not_held {
            OutcomeStatus::Skipped(SkipReason::CapabilityNotHeld)
        } else if cancel.is_cancelled() {
            OutcomeStatus::Skipped(SkipReason::Cancelled)
        } else {
            let body = spec.to_new_webhook();
            let result = match spec.existing_id {
                Some(id) => tenant
                    .api
                    .update_webhook(id, &body)
                    .await
                    .map(|updated| OutcomeStatus::Updated { id: updated.id }),
                None => tenant
                    .api
                    .create_webhook(&body)
                    .await
                    .map(|created| OutcomeStatus::Created { id: created.id }),
            };
            result.unwrap_or_else(|error| {
                warn!(shop = %tenant.shop, topic = %spec.topic, %error, "webhook subscription failed");
                OutcomeStatus::Failed {
                    reason: error.to_string(),
                }
            })
        };

        TopicOutcome {
            topic: spec.topic,
            address: spec.address,
            status,
        }
    }

    /// Deletes every subscription but the first for each topic.
    ///
    /// Returns one outcome per deleted id. A failed deletion does not stop
    /// the others.
    ///
    /// # Errors
    ///
    /// Returns the listing error if the subscriptions cannot be listed.
    #[instrument(skip_all, fields(shop = %tenant.shop))]
    pub async fn prune_duplicates(&self, tenant: &Tenant) -> Result<Vec<PruneOutcome>, WebhookError> {
        let existing = tenant.api.list_webhooks().await?;

        let mut seen = HashSet::new();
        let duplicates: Vec<WebhookSubscription> = existing
            .into_iter()
            .filter(|subscription| !seen.insert(subscription.topic.clone()))
            .collect();

        let outcomes: Vec<PruneOutcome> = stream::iter(duplicates)
            .map(|duplicate| async move {
                let result = tenant
                    .api
                    .delete_webhook(duplicate.id)
                    .await
                    .map_err(|error| {
                        warn!(id = duplicate.id, topic = %duplicate.topic, %error, "deleting duplicate webhook failed");
                        error.to_string()
                    });
                PruneOutcome {
                    id: duplicate.id,
                    topic: duplicate.topic,
                    result,
                }
            })
            .buffered(self.config.reconcile_concurrency())
            .collect()
            .await;

        info!(pruned = outcomes.iter().filter(|o| o.result.is_ok()).count(), "duplicate webhooks pruned");
        Ok(outcomes)
    }
}
