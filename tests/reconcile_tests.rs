//! Integration tests for webhook reconciliation against a mocked Admin API.
//!
//! Each tenant talks to its own `MockServer` through a real
//! `RestWebhookClient`, so these cover the client's request shapes as well
//! as the reconciler's decisions.

use std::sync::Arc;

use serde_json::json;
use shopify_server::auth::AccessToken;
use shopify_server::webhooks::{
    Capability, OutcomeStatus, RestWebhookClient, SkipReason, Tenant, Topic, WebhookCatalog,
    WebhookError, WebhookReconciler,
};
use shopify_server::{ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppName, HostUrl, ShopDomain};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOKS: &str = "/admin/api/2025-01/webhooks.json";

fn config(host: Option<&str>) -> Arc<AppConfig> {
    let mut builder = AppConfig::builder()
        .app_name(AppName::new("tagged-images").unwrap())
        .api_key(ApiKey::new("key").unwrap())
        .api_secret_key(ApiSecretKey::new("secret").unwrap())
        .api_version(ApiVersion::V2025_01);
    if let Some(host) = host {
        builder = builder.host(HostUrl::new(host).unwrap());
    }
    Arc::new(builder.build().unwrap())
}

fn reconciler() -> WebhookReconciler {
    WebhookReconciler::new(config(Some("https://app.example.com")), WebhookCatalog::standard())
}

fn tenant(server: &MockServer, shop: &str) -> Tenant {
    let shop = ShopDomain::new(shop).unwrap();
    let client = RestWebhookClient::new(shop.clone(), AccessToken::new("shpat_test"), ApiVersion::V2025_01)
        .with_base_url(server.uri());
    Tenant::new(shop, Arc::new(client))
}

fn topics(names: &[&str]) -> Vec<Topic> {
    names.iter().map(|name| Topic::parse(name).unwrap()).collect()
}

fn subscription(id: u64, topic: &str) -> serde_json::Value {
    json!({
        "id": id,
        "topic": topic,
        "address": format!("https://app.example.com/webhook/tagged-images/{topic}"),
        "format": "json",
        "created_at": "2024-01-15T10:30:00-05:00",
        "updated_at": "2024-01-15T10:30:00-05:00"
    })
}

async fn mock_listing(server: &MockServer, webhooks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(WEBHOOKS))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "webhooks": webhooks })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mock_create(server: &MockServer, topic: &str, id: u64) {
    Mock::given(method("POST"))
        .and(path(WEBHOOKS))
        .and(body_partial_json(json!({ "webhook": { "topic": topic, "format": "json" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "webhook": subscription(id, topic) })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_empty_tenant_gets_every_topic_created() {
    let server = MockServer::start().await;
    mock_listing(&server, json!([])).await;
    mock_create(&server, "orders/create", 1001).await;
    mock_create(&server, "products/update", 1002).await;

    let outcomes = reconciler()
        .reconcile(&topics(&["orders/create", "products/update"]), &[tenant(&server, "acme")])
        .await
        .unwrap();

    let outcome = &outcomes[0];
    assert_eq!(outcome.shop.as_ref(), "acme.myshopify.com");

    let orders = outcome.topic("orders/create").unwrap();
    assert_eq!(orders.status, OutcomeStatus::Created { id: 1001 });
    assert!(orders.address.ends_with("/webhook/tagged-images/orders/create"));

    let products = outcome.topic("products/update").unwrap();
    assert_eq!(products.status, OutcomeStatus::Created { id: 1002 });
    assert!(products.address.ends_with("/webhook/tagged-images/products/update"));
    assert_ne!(orders.address, products.address);
}

#[tokio::test]
async fn test_existing_subscription_is_updated_by_id() {
    let server = MockServer::start().await;
    mock_listing(&server, json!([subscription(42, "orders/create")])).await;
    Mock::given(method("PUT"))
        .and(path("/admin/api/2025-01/webhooks/42.json"))
        .and(body_partial_json(json!({
            "webhook": {
                "topic": "orders/create",
                "address": "https://app.example.com/webhook/tagged-images/orders/create"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "webhook": subscription(42, "orders/create") })))
        .expect(1)
        .mount(&server)
        .await;
    mock_create(&server, "products/update", 1002).await;

    let outcomes = reconciler()
        .reconcile(&topics(&["orders/create", "products/update"]), &[tenant(&server, "acme")])
        .await
        .unwrap();

    let outcome = &outcomes[0];
    assert_eq!(
        outcome.topic("orders/create").unwrap().status,
        OutcomeStatus::Updated { id: 42 }
    );
    assert_eq!(
        outcome.topic("products/update").unwrap().status,
        OutcomeStatus::Created { id: 1002 }
    );
}

#[tokio::test]
async fn test_gated_topic_is_skipped_without_a_write() {
    let server = MockServer::start().await;
    mock_listing(&server, json!([])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let outcomes = reconciler()
        .reconcile(&topics(&["product_listings/add"]), &[tenant(&server, "acme")])
        .await
        .unwrap();

    assert_eq!(
        outcomes[0].topic("product_listings/add").unwrap().status,
        OutcomeStatus::Skipped(SkipReason::CapabilityNotHeld)
    );
}

#[tokio::test]
async fn test_gated_topic_is_created_when_capability_is_held() {
    let server = MockServer::start().await;
    mock_listing(&server, json!([])).await;
    mock_create(&server, "product_listings/add", 7).await;

    let tenant = tenant(&server, "acme").with_capability(Capability::SalesChannel);
    let outcomes = reconciler()
        .reconcile(&topics(&["product_listings/add"]), &[tenant])
        .await
        .unwrap();

    assert_eq!(
        outcomes[0].topic("product_listings/add").unwrap().status,
        OutcomeStatus::Created { id: 7 }
    );
}

#[tokio::test]
async fn test_failed_create_does_not_stop_sibling_topics() {
    let server = MockServer::start().await;
    mock_listing(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path(WEBHOOKS))
        .and(body_partial_json(json!({ "webhook": { "topic": "orders/create" } })))
        .respond_with(ResponseTemplate::new(422).set_body_string(r#"{"errors":{"address":["for this topic has already been taken"]}}"#))
        .expect(1)
        .mount(&server)
        .await;
    mock_create(&server, "orders/paid", 2).await;
    mock_create(&server, "products/update", 3).await;

    let outcomes = reconciler()
        .reconcile(
            &topics(&["orders/create", "orders/paid", "products/update"]),
            &[tenant(&server, "acme")],
        )
        .await
        .unwrap();

    let outcome = &outcomes[0];
    let failed = &outcome.topic("orders/create").unwrap().status;
    assert!(matches!(failed, OutcomeStatus::Failed { reason } if reason.contains("422")));
    assert_eq!(outcome.topic("orders/paid").unwrap().status, OutcomeStatus::Created { id: 2 });
    assert_eq!(
        outcome.topic("products/update").unwrap().status,
        OutcomeStatus::Created { id: 3 }
    );
    assert_eq!(outcome.failures().count(), 1);
}

#[tokio::test]
async fn test_tenants_are_independent_and_reported_in_order() {
    let healthy = MockServer::start().await;
    mock_listing(&healthy, json!([])).await;
    mock_create(&healthy, "orders/create", 5).await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEBHOOKS))
        .respond_with(ResponseTemplate::new(401).set_body_string("[API] Invalid API key or access token"))
        .mount(&broken)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&broken)
        .await;

    let outcomes = reconciler()
        .reconcile(
            &topics(&["orders/create"]),
            &[tenant(&broken, "broken"), tenant(&healthy, "healthy")],
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].shop.shop_name(), "broken");
    assert!(outcomes[0].topic("orders/create").unwrap().status.is_failed());
    assert_eq!(outcomes[1].shop.shop_name(), "healthy");
    assert_eq!(
        outcomes[1].topic("orders/create").unwrap().status,
        OutcomeStatus::Created { id: 5 }
    );
}

#[tokio::test]
async fn test_cancelled_run_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "webhooks": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcomes = reconciler()
        .reconcile_with_cancellation(&topics(&["orders/create"]), &[tenant(&server, "acme")], &cancel)
        .await
        .unwrap();

    assert_eq!(
        outcomes[0].topic("orders/create").unwrap().status,
        OutcomeStatus::Skipped(SkipReason::Cancelled)
    );
}

#[tokio::test]
async fn test_missing_host_fails_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = WebhookReconciler::new(config(None), WebhookCatalog::standard());
    let result = reconciler
        .reconcile(&topics(&["orders/create"]), &[tenant(&server, "acme")])
        .await;

    assert!(matches!(result, Err(WebhookError::HostNotConfigured)));
}

#[tokio::test]
async fn test_prune_keeps_first_subscription_per_topic() {
    let server = MockServer::start().await;
    mock_listing(
        &server,
        json!([
            subscription(1, "orders/create"),
            subscription(2, "orders/create"),
            subscription(3, "products/update")
        ]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/admin/api/2025-01/webhooks/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let pruned = reconciler()
        .prune_duplicates(&tenant(&server, "acme"))
        .await
        .unwrap();

    assert_eq!(pruned.len(), 1);
    assert_eq!(pruned[0].id, 2);
    assert_eq!(pruned[0].topic, "orders/create");
    assert!(pruned[0].result.is_ok());
}
