//! The universe of webhook topics.

use crate::config::{AppName, HostUrl};
use crate::webhooks::WebhookError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A webhook topic in `resource/action` form.
///
/// ```rust
/// use shopify_server::webhooks::Topic;
///
/// let topic = Topic::parse("orders/create").unwrap();
/// assert_eq!(topic.resource(), "orders");
/// assert_eq!(topic.action(), "create");
/// assert!(Topic::parse("orders").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    topic: String,
    split: usize,
}

impl Topic {
    /// Parses a topic.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidTopic`] unless `topic` contains exactly
    /// one `/` with a non-empty part on each side.
    pub fn parse(topic: &str) -> Result<Self, WebhookError> {
        let invalid = || WebhookError::InvalidTopic {
            topic: topic.to_string(),
        };
        let split = topic.find('/').ok_or_else(invalid)?;
        let (resource, action) = (&topic[..split], &topic[split + 1..]);
        if resource.is_empty() || action.is_empty() || action.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            topic: topic.to_string(),
            split,
        })
    }

    /// Builds a topic from its halves.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidTopic`] if either half is empty or
    /// contains `/`.
    pub fn from_parts(resource: &str, action: &str) -> Result<Self, WebhookError> {
        Self::parse(&format!("{resource}/{action}"))
    }

    /// Returns the part before the `/`.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.topic[..self.split]
    }

    /// Returns the part after the `/`.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.topic[self.split + 1..]
    }

    /// Returns the whole topic.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.topic
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.topic
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic)
    }
}

impl FromStr for Topic {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Topic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.topic)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A platform add-on a tenant's credential may or may not hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// The app is installed as a sales channel, which unlocks the
    /// product and collection listing topics.
    SalesChannel,
}

const STANDARD_TOPICS: &[&str] = &[
    "carts/create",
    "carts/update",
    "checkouts/create",
    "checkouts/delete",
    "checkouts/update",
    "collections/create",
    "collections/delete",
    "collections/update",
    "collection_listings/add",
    "collection_listings/remove",
    "collection_listings/update",
    "customers/create",
    "customers/delete",
    "customers/disable",
    "customers/enable",
    "customers/update",
    "customer_groups/create",
    "customer_groups/delete",
    "customer_groups/update",
    "draft_orders/create",
    "draft_orders/delete",
    "draft_orders/update",
    "fulfillments/create",
    "fulfillments/update",
    "fulfillment_events/create",
    "fulfillment_events/delete",
    "orders/cancelled",
    "orders/create",
    "orders/delete",
    "orders/fulfilled",
    "orders/paid",
    "orders/partially_fulfilled",
    "orders/updated",
    "order_transactions/create",
    "products/create",
    "products/delete",
    "products/update",
    "product_listings/add",
    "product_listings/remove",
    "product_listings/update",
    "refunds/create",
    "app/uninstalled",
    "shop/update",
    "themes/create",
    "themes/delete",
    "themes/publish",
    "themes/update",
];

const SALES_CHANNEL_RESOURCES: [&str; 2] = ["product_listings", "collection_listings"];

/// An immutable set of supported topics.
///
/// Built once at startup and passed to the reconciler and the delivery
/// router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookCatalog {
    topics: Vec<Topic>,
}

impl WebhookCatalog {
    /// Returns the platform's standard topics.
    #[must_use]
    pub fn standard() -> Self {
        let topics = STANDARD_TOPICS
            .iter()
            .filter_map(|topic| Topic::parse(topic).ok())
            .collect();
        Self { topics }
    }

    /// Builds a catalog from topic strings, keeping their order and
    /// dropping repeats.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidTopic`] for the first malformed topic.
    pub fn new<I, S>(topics: I) -> Result<Self, WebhookError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<Topic> = Vec::new();
        for topic in topics {
            let topic = Topic::parse(topic.as_ref())?;
            if !parsed.contains(&topic) {
                parsed.push(topic);
            }
        }
        Ok(Self { topics: parsed })
    }

    /// Returns the topics in catalog order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Returns `true` if `topic` is in the catalog.
    #[must_use]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    /// Returns the capability a tenant must hold to subscribe to `topic`.
    #[must_use]
    pub fn required_capability(topic: &Topic) -> Option<Capability> {
        SALES_CHANNEL_RESOURCES
            .contains(&topic.resource())
            .then_some(Capability::SalesChannel)
    }
}

impl Default for WebhookCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Returns the callback address for `topic`: `{host}/webhook/{app}/{topic}`.
///
/// ```rust
/// use shopify_server::webhooks::{webhook_address, Topic};
/// use shopify_server::{AppName, HostUrl};
///
/// let address = webhook_address(
///     &HostUrl::new("https://app.example.com").unwrap(),
///     &AppName::new("tagged-images").unwrap(),
///     &Topic::parse("orders/create").unwrap(),
/// );
/// assert_eq!(address, "https://app.example.com/webhook/tagged-images/orders/create");
/// ```
#[must_use]
pub fn webhook_address(host: &HostUrl, app: &AppName, topic: &Topic) -> String {
    host.join(&format!("/webhook/{app}/{topic}"))
}
