//! The platform's webhook subscription API.

use crate::auth::AccessToken;
use crate::config::{ApiVersion, AppConfig, ShopDomain};
use crate::webhooks::types::{NewWebhook, WebhookSubscription};
use crate::webhooks::WebhookError;
use async_trait::async_trait;
use reqwest::header::LINK;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Header carrying the tenant's access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const PAGE_LIMIT: &str = "250";

/// Webhook operations for one tenant, bound to its credential.
#[async_trait]
pub trait WebhookApi: Send + Sync {
    /// Lists every subscription, following pagination to the end.
    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, WebhookError>;

    /// Creates a subscription.
    async fn create_webhook(&self, webhook: &NewWebhook) -> Result<WebhookSubscription, WebhookError>;

    /// Replaces the writable fields of subscription `id`.
    async fn update_webhook(
        &self,
        id: u64,
        webhook: &NewWebhook,
    ) -> Result<WebhookSubscription, WebhookError>;

    /// Deletes subscription `id`.
    async fn delete_webhook(&self, id: u64) -> Result<(), WebhookError>;
}

#[derive(Deserialize)]
struct WebhookList {
    webhooks: Vec<WebhookSubscription>,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    webhook: WebhookSubscription,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    webhook: &'a NewWebhook,
}

/// [`WebhookApi`] over the platform's REST Admin API.
#[derive(Clone)]
pub struct RestWebhookClient {
    client: reqwest::Client,
    shop: ShopDomain,
    access_token: AccessToken,
    api_version: ApiVersion,
    base_url: Option<String>,
}

impl RestWebhookClient {
    /// Creates a client for `shop`.
    #[must_use]
    pub fn new(shop: ShopDomain, access_token: AccessToken, api_version: ApiVersion) -> Self {
        Self {
            client: reqwest::Client::new(),
            shop,
            access_token,
            api_version,
            base_url: None,
        }
    }

    /// Creates a client for `shop` using the app's API version and user agent.
    #[must_use]
    pub fn from_config(config: &AppConfig, shop: ShopDomain, access_token: AccessToken) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .build()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "falling back to an HTTP client without the app user agent");
                reqwest::Client::new()
            });
        Self {
            client,
            ..Self::new(shop, access_token, config.api_version().clone())
        }
    }

    /// Sends every request to `base_url` instead of the shop's own host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Returns the shop this client is bound to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    fn url(&self, resource: &str) -> String {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.shop.as_ref()));
        format!("{base}/admin/api/{}/{resource}.json", self.api_version)
    }

    fn request(&self, method: reqwest::Method, resource: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(resource))
            .header(ACCESS_TOKEN_HEADER, self.access_token.as_ref())
    }

    async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, WebhookError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(WebhookError::RemoteApi {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, WebhookError> {
        let status = response.status().as_u16();
        response.json().await.map_err(|e| WebhookError::RemoteApi {
            status,
            message: format!("Failed to parse webhook response: {e}"),
        })
    }
}

impl std::fmt::Debug for RestWebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestWebhookClient")
            .field("shop", &self.shop)
            .field("access_token", &self.access_token)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl WebhookApi for RestWebhookClient {
    async fn list_webhooks(&self) -> Result<Vec<WebhookSubscription>, WebhookError> {
        let mut webhooks = Vec::new();
        let mut page_info: Option<String> = None;
        let mut seen = HashSet::new();

        loop {
            let mut builder = self
                .request(reqwest::Method::GET, "webhooks")
                .query(&[("limit", PAGE_LIMIT)]);
            if let Some(page_info) = &page_info {
                builder = builder.query(&[("page_info", page_info.as_str())]);
            }
            let response = Self::send(builder).await?;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_info);
            let page: WebhookList = Self::parse(response).await?;
            webhooks.extend(page.webhooks);

            match next {
                Some(next) if seen.insert(next.clone()) => page_info = Some(next),
                Some(next) => {
                    tracing::warn!(shop = %self.shop, page_info = %next, "webhook pagination cycled");
                    break;
                }
                None => break,
            }
        }

        tracing::debug!(shop = %self.shop, count = webhooks.len(), "listed webhooks");
        Ok(webhooks)
    }

    async fn create_webhook(&self, webhook: &NewWebhook) -> Result<WebhookSubscription, WebhookError> {
        let builder = self
            .request(reqwest::Method::POST, "webhooks")
            .json(&WebhookBody { webhook });
        let envelope: WebhookEnvelope = Self::parse(Self::send(builder).await?).await?;
        Ok(envelope.webhook)
    }

    async fn update_webhook(
        &self,
        id: u64,
        webhook: &NewWebhook,
    ) -> Result<WebhookSubscription, WebhookError> {
        let builder = self
            .request(reqwest::Method::PUT, &format!("webhooks/{id}"))
            .json(&WebhookBody { webhook });
        let envelope: WebhookEnvelope = Self::parse(Self::send(builder).await?).await?;
        Ok(envelope.webhook)
    }

    async fn delete_webhook(&self, id: u64) -> Result<(), WebhookError> {
        Self::send(self.request(reqwest::Method::DELETE, &format!("webhooks/{id}"))).await?;
        Ok(())
    }
}

/// Extracts the `page_info` of the `rel="next"` entry of a `Link` header.
///
/// The header looks like
/// `<https://…/webhooks.json?limit=250&page_info=abc>; rel="next", <…>; rel="previous"`.
fn next_page_info(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|link| {
        let mut parts = link.split(';').map(str::trim);
        let url = parts.next()?.trim_start_matches('<').trim_end_matches('>');
        let is_next = parts.any(|part| part.trim_start_matches("rel=").trim_matches('"') == "next");
        if !is_next {
            return None;
        }
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|param| {
            param
                .strip_prefix("page_info=")
                .map(std::string::ToString::to_string)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey, AppName};
    use crate::webhooks::types::WebhookFormat;
    use crate::webhooks::Topic;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WEBHOOKS_PATH: &str = "/admin/api/2025-10/webhooks.json";

    fn client(server: &MockServer) -> RestWebhookClient {
        RestWebhookClient::new(
            ShopDomain::new("acme").unwrap(),
            AccessToken::new("shpat_1"),
            ApiVersion::V2025_10,
        )
        .with_base_url(server.uri())
    }

    fn subscription(id: u64, topic: &str) -> serde_json::Value {
        json!({
            "id": id,
            "topic": topic,
            "address": format!("https://app.example.com/webhook/app/{topic}"),
            "format": "json"
        })
    }

    #[test]
    fn test_next_page_info_parses_link_header() {
        let header = r#"<https://acme.myshopify.com/admin/api/2025-10/webhooks.json?limit=250&page_info=prev1>; rel="previous", <https://acme.myshopify.com/admin/api/2025-10/webhooks.json?limit=250&page_info=next1>; rel="next""#;
        assert_eq!(next_page_info(header).as_deref(), Some("next1"));

        let only_previous = r#"<https://x/webhooks.json?page_info=p>; rel="previous""#;
        assert_eq!(next_page_info(only_previous), None);
    }

    #[test]
    fn test_url_defaults_to_shop_host() {
        let client = RestWebhookClient::new(
            ShopDomain::new("acme").unwrap(),
            AccessToken::new("t"),
            ApiVersion::V2025_10,
        );
        assert_eq!(
            client.url("webhooks/7"),
            "https://acme.myshopify.com/admin/api/2025-10/webhooks/7.json"
        );
        assert!(!format!("{client:?}").contains("\"t\""));
    }

    #[tokio::test]
    async fn test_list_follows_next_links() {
        let server = MockServer::start().await;
        let next_link = format!(
            r#"<{}{WEBHOOKS_PATH}?limit=250&page_info=page2>; rel="next""#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path(WEBHOOKS_PATH))
            .and(query_param("page_info", "page2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "webhooks": [subscription(2, "shop/update")] })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WEBHOOKS_PATH))
            .and(header(ACCESS_TOKEN_HEADER, "shpat_1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next_link.as_str())
                    .set_body_json(json!({ "webhooks": [subscription(1, "orders/create")] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let webhooks = client(&server).list_webhooks().await.unwrap();
        let ids: Vec<u64> = webhooks.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_from_config_sends_app_user_agent() {
        let config = AppConfig::builder()
            .app_name(AppName::new("app").unwrap())
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .user_agent_prefix("TaggedImages")
            .build()
            .unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WEBHOOKS_PATH))
            .and(header("user-agent", config.user_agent().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "webhooks": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let shop = ShopDomain::new("acme").unwrap();
        let client = RestWebhookClient::from_config(&config, shop, AccessToken::new("t"))
            .with_base_url(server.uri());
        assert!(client.list_webhooks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_stops_when_next_links_cycle() {
        let server = MockServer::start().await;
        let link_to = |cursor: &str| {
            format!(
                r#"<{}{WEBHOOKS_PATH}?limit=250&page_info={cursor}>; rel="next""#,
                server.uri()
            )
        };
        for (cursor, next, id) in [("cursor-a", "cursor-b", 2), ("cursor-b", "cursor-a", 3)] {
            Mock::given(method("GET"))
                .and(path(WEBHOOKS_PATH))
                .and(query_param("page_info", cursor))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("Link", link_to(next).as_str())
                        .set_body_json(json!({ "webhooks": [subscription(id, "shop/update")] })),
                )
                .expect(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(WEBHOOKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", link_to("cursor-a").as_str())
                    .set_body_json(json!({ "webhooks": [subscription(1, "orders/create")] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let webhooks = client(&server).list_webhooks().await.unwrap();
        let ids: Vec<u64> = webhooks.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_create_posts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(WEBHOOKS_PATH))
            .and(body_json(json!({
                "webhook": {
                    "topic": "orders/create",
                    "address": "https://app.example.com/webhook/app/orders/create",
                    "format": "json"
                }
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "webhook": subscription(9, "orders/create") })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server)
            .create_webhook(&NewWebhook {
                topic: Topic::parse("orders/create").unwrap(),
                address: "https://app.example.com/webhook/app/orders/create".to_string(),
                format: WebhookFormat::Json,
            })
            .await
            .unwrap();
        assert_eq!(created.id, 9);
    }

    #[tokio::test]
    async fn test_update_and_delete_address_the_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/admin/api/2025-10/webhooks/42.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "webhook": subscription(42, "orders/create") })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/admin/api/2025-10/webhooks/43.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let body = NewWebhook {
            topic: Topic::parse("orders/create").unwrap(),
            address: "https://app.example.com/webhook/app/orders/create".to_string(),
            format: WebhookFormat::Json,
        };
        assert_eq!(client.update_webhook(42, &body).await.unwrap().id, 42);
        client.delete_webhook(43).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_maps_to_remote_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("[API] Invalid API key or access token"))
            .mount(&server)
            .await;

        let error = client(&server).list_webhooks().await.unwrap_err();
        assert!(matches!(error, WebhookError::RemoteApi { status: 401, .. }));
    }
}
