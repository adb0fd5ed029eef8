//! Integration tests for SILVERTAPE.
//!
//! Tests drive the storefront router in-process: no server is bound, order
//! records go to a temporary directory, and the payment gateway and the
//! conversions API are `wiremock` servers.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p silvertape-integration-tests
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;
use wiremock::MockServer;

use silvertape_storefront::config::{MetaConfig, StorefrontConfig, TossConfig};
use silvertape_storefront::state::AppState;

/// Gateway secret used by tests. Never a real key.
pub const TEST_SECRET_KEY: &str = "test_sk_zXLkKEypNArWmo50nX3lmeaxYG5R";

/// Pixel ID used by tests.
pub const TEST_PIXEL_ID: &str = "1234567890";

/// An in-process storefront with its own order directory.
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    /// Mock payment gateway (`None` = simulation mode).
    pub gateway: Option<MockServer>,
    /// Mock conversions API (`None` = events dropped).
    pub conversions: Option<MockServer>,
    dir: TempDir,
}

impl TestContext {
    /// Storefront without gateway or conversions: payments are simulated.
    #[must_use]
    pub fn simulated() -> Self {
        Self::build(None, None, Duration::from_secs(5))
    }

    /// Storefront talking to a mock gateway.
    pub async fn with_gateway() -> Self {
        Self::with_gateway_timeout(Duration::from_secs(5)).await
    }

    /// Storefront talking to a mock gateway with a custom request timeout.
    pub async fn with_gateway_timeout(timeout: Duration) -> Self {
        Self::build(Some(MockServer::start().await), None, timeout)
    }

    /// Storefront talking to a mock gateway and a mock conversions API.
    pub async fn with_gateway_and_conversions() -> Self {
        Self::build(
            Some(MockServer::start().await),
            Some(MockServer::start().await),
            Duration::from_secs(5),
        )
    }

    fn build(
        gateway: Option<MockServer>,
        conversions: Option<MockServer>,
        timeout: Duration,
    ) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");

        let config = StorefrontConfig {
            host: "127.0.0.1".parse().expect("valid IP"),
            port: 0,
            base_url: Url::parse("https://silvertape.test").expect("valid URL"),
            order_storage_dir: dir.path().join("orders"),
            stale_order_after: Duration::from_secs(30 * 60),
            toss: gateway.as_ref().map(|server| TossConfig {
                client_key: "test_ck_D5GePWvyJnrK0W0k6q8gLzN97Eoq".to_string(),
                secret_key: SecretString::from(TEST_SECRET_KEY),
                api_base: Url::parse(&server.uri()).expect("mock server URL"),
                timeout,
            }),
            meta: conversions.as_ref().map(|server| MetaConfig {
                pixel_id: TEST_PIXEL_ID.to_string(),
                access_token: SecretString::from("EAAtestToken"),
                api_base: Url::parse(&server.uri()).expect("mock server URL"),
            }),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let state = AppState::new(config).expect("Failed to build app state");
        let app = silvertape_storefront::app(state.clone());

        Self {
            app,
            state,
            gateway,
            conversions,
            dir,
        }
    }

    /// The mock gateway. Panics in simulation contexts.
    pub fn gateway(&self) -> &MockServer {
        self.gateway.as_ref().expect("context has no mock gateway")
    }

    /// Directory holding the order records.
    pub fn orders_dir(&self) -> PathBuf {
        self.dir.path().join("orders")
    }

    /// Send a JSON `POST` and decode the JSON response.
    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .header("user-agent", "integration-test")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    /// Send a `GET` and decode the JSON response (`Null` for non-JSON bodies).
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Create an order through the API and return its ID.
    pub async fn create_order(&self, items: Value, total: i64) -> String {
        let (status, body) = self.post_json("/orders", &order_body(items, total)).await;
        assert_eq!(status, StatusCode::OK, "order creation failed: {body}");
        body["orderId"]
            .as_str()
            .expect("orderId in response")
            .to_string()
    }
}

/// A cart line as the checkout page posts it.
#[must_use]
pub fn cart_item(product_id: &str, print_price: i64, frame_price: i64, quantity: u32) -> Value {
    json!({
        "id": format!("{product_id}-a3-black"),
        "productId": product_id,
        "productTitle": "Morning Fog",
        "productImage": "/images/morning-fog.jpg",
        "studioId": "studio-1",
        "studioName": "Studio Haneul",
        "studioSlug": "haneul",
        "size": "A3",
        "frame": "black",
        "artworkBg": "#f4f1ea",
        "quantity": quantity,
        "printPrice": print_price,
        "framePrice": frame_price,
    })
}

/// An order creation body with the given items and claimed total.
#[must_use]
pub fn order_body(items: Value, total: i64) -> Value {
    json!({
        "items": items,
        "shipping": {
            "name": "김민지",
            "phone": "010-1234-5678",
            "postalCode": "04524",
            "address": "서울특별시 중구 세종대로 110",
            "addressDetail": "3층",
            "memo": "문 앞에 놓아주세요",
        },
        "totalAmount": total,
    })
}

/// A gateway payment object for `order_id`.
#[must_use]
pub fn gateway_payment(order_id: &str, status: &str, amount: i64) -> Value {
    json!({
        "paymentKey": format!("tgen_{order_id}"),
        "orderId": order_id,
        "status": status,
        "method": "카드",
        "totalAmount": amount,
        "approvedAt": "2026-01-01T12:00:00+09:00",
    })
}
