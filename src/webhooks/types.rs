//! Webhook subscription and reconciliation types.

use crate::config::ShopDomain;
use crate::webhooks::catalog::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload format of a subscription. This crate only subscribes with JSON.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    /// JSON payloads.
    #[default]
    Json,
    /// XML payloads.
    Xml,
}

/// A subscription as the platform reports it.
///
/// `topic` is kept as the raw string so a listing with topics outside the
/// catalog still parses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookSubscription {
    /// Platform-assigned id.
    pub id: u64,
    /// The subscribed topic.
    pub topic: String,
    /// Callback URL.
    pub address: String,
    /// Payload format.
    #[serde(default)]
    pub format: WebhookFormat,
    /// When the subscription was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the subscription was last updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The writable fields of a subscription, sent on create and update.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NewWebhook {
    /// The topic to subscribe to.
    pub topic: Topic,
    /// Callback URL.
    pub address: String,
    /// Payload format.
    pub format: WebhookFormat,
}

/// One desired topic for one tenant, after diffing against the listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredWebhookSpec {
    /// The topic.
    pub topic: Topic,
    /// Computed callback URL.
    pub address: String,
    /// `true` when a subscription for the topic already exists.
    pub needs_update: bool,
    /// Id of the existing subscription to update.
    pub existing_id: Option<u64>,
    /// `true` when the topic is gated on a capability the tenant lacks.
    pub requires_capability_not_held: bool,
}

impl DesiredWebhookSpec {
    /// Returns the body to create or update this subscription with.
    #[must_use]
    pub fn to_new_webhook(&self) -> NewWebhook {
        NewWebhook {
            topic: self.topic.clone(),
            address: self.address.clone(),
            format: WebhookFormat::Json,
        }
    }
}

/// Why a topic was not acted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The topic requires a capability the tenant lacks.
    CapabilityNotHeld,
    /// Reconciliation was cancelled before the topic was dispatched.
    Cancelled,
}

/// What happened to one topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// A new subscription was created.
    Created {
        /// Id of the new subscription.
        id: u64,
    },
    /// An existing subscription was updated in place.
    Updated {
        /// Id of the updated subscription.
        id: u64,
    },
    /// No remote call was made.
    Skipped(SkipReason),
    /// The listing, create or update failed.
    Failed {
        /// The error, as text.
        reason: String,
    },
}

impl OutcomeStatus {
    /// Returns `true` for [`OutcomeStatus::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The outcome of one topic for one tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicOutcome {
    /// The topic.
    pub topic: Topic,
    /// The address it was (or would have been) subscribed with.
    pub address: String,
    /// What happened.
    pub status: OutcomeStatus,
}

/// Every topic's outcome for one tenant, in desired-topic order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantOutcome {
    /// The tenant's shop.
    pub shop: ShopDomain,
    /// Per-topic outcomes.
    pub topics: Vec<TopicOutcome>,
}

impl TenantOutcome {
    /// Returns the outcome for `topic`, if it was desired.
    #[must_use]
    pub fn topic(&self, topic: &str) -> Option<&TopicOutcome> {
        self.topics.iter().find(|outcome| outcome.topic.as_str() == topic)
    }

    /// Returns the outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TopicOutcome> {
        self.topics.iter().filter(|outcome| outcome.status.is_failed())
    }
}

/// The result of deleting one duplicate subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Id of the duplicate.
    pub id: u64,
    /// Its topic.
    pub topic: String,
    /// `Err` carries the deletion failure as text.
    pub result: Result<(), String>,
}
