//! Order creation and lookup through the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use silvertape_integration_tests::{TestContext, cart_item, order_body};

#[tokio::test]
async fn test_order_below_free_shipping_then_paid() {
    let ctx = TestContext::simulated();

    let (status, body) = ctx
        .post_json(
            "/orders",
            &order_body(json!([cart_item("fog-001", 30_000, 15_000, 1)]), 48_500),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalAmount"], 48_500);
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let (status, confirm) = ctx
        .post_json(
            "/payment/confirm",
            &json!({"paymentKey": "tgen_sim_1", "orderId": order_id, "amount": 48_500}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirm["success"], true);

    let (status, order) = ctx.get_json(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "paid");
    assert_eq!(order["subtotal"], 45_000);
    assert_eq!(order["shippingFee"], 3_500);
    assert_eq!(order["totalAmount"], 48_500);
}

#[tokio::test]
async fn test_order_with_free_shipping() {
    let ctx = TestContext::simulated();

    let items = json!([
        cart_item("fog-001", 20_000, 10_000, 1),
        cart_item("dawn-002", 15_000, 0, 2),
    ]);
    let (status, body) = ctx.post_json("/orders", &order_body(items, 60_000)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalAmount"], 60_000);
}

#[tokio::test]
async fn test_free_shipping_boundary() {
    let ctx = TestContext::simulated();

    let (status, _) = ctx
        .post_json(
            "/orders",
            &order_body(json!([cart_item("a", 50_000, 0, 1)]), 50_000),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .post_json(
            "/orders",
            &order_body(json!([cart_item("b", 49_999, 0, 1)]), 53_499),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_total_rejected_and_nothing_stored() {
    let ctx = TestContext::simulated();

    let (status, body) = ctx
        .post_json(
            "/orders",
            &order_body(json!([cart_item("fog-001", 30_000, 15_000, 1)]), 999_999),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(body.get("orderId").is_none());
    assert!(ctx.state.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_client_prices_are_the_only_input() {
    let ctx = TestContext::simulated();

    // Claimed subtotal and shipping are wrong, total is right: accepted.
    let mut body = order_body(json!([cart_item("fog-001", 10_000, 5_000, 2)]), 33_500);
    body["subtotal"] = json!(1);
    body["shippingFee"] = json!(0);

    let (status, created) = ctx.post_json("/orders", &body).await;
    assert_eq!(status, StatusCode::OK);

    let order_id = created["orderId"].as_str().unwrap();
    let (_, order) = ctx.get_json(&format!("/orders/{order_id}")).await;
    assert_eq!(order["subtotal"], 30_000);
    assert_eq!(order["shippingFee"], 3_500);
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let ctx = TestContext::simulated();

    let cases = [
        json!({}),
        order_body(json!([]), 3_500),
        json!({"items": [cart_item("a", 10_000, 0, 1)], "shipping": {"name": ""}, "totalAmount": 13_500}),
        order_body(json!([cart_item("a", 10_000, 0, 1)]), 0),
        order_body(json!([cart_item("a", 10_000, 0, 0)]), 3_500),
    ];

    for case in cases {
        let (status, body) = ctx.post_json("/orders", &case).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted: {case}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::simulated();

    let (status, body) = ctx
        .post_json("/orders", &json!({"items": "not-a-list", "totalAmount": 1}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let ctx = TestContext::simulated();

    let (status, body) = ctx.get_json("/orders/HO-0-deadbeef").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_order_record_on_disk_uses_sanitized_id() {
    let ctx = TestContext::simulated();

    let order_id = ctx
        .create_order(json!([cart_item("fog-001", 30_000, 15_000, 1)]), 48_500)
        .await;

    assert!(ctx.orders_dir().join(format!("{order_id}.json")).exists());
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::simulated();

    let (status, _) = ctx.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.get_json("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctx.orders_dir().is_dir());
}
