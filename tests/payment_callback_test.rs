mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use orchard_api::entities::order::PaymentMethod;
use serde_json::json;
use url::Url;

#[tokio::test]
async fn create_payment_returns_a_signed_gateway_url() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("payer@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/vnpay/create-payment",
            Some(json!({ "orderId": order_id, "amount": 20 })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    let url = Url::parse(body["paymentUrl"].as_str().unwrap()).unwrap();
    let params: std::collections::HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    assert_eq!(params["vnp_TxnRef"], order_id.to_string());
    // 20 * 23000 * 100
    assert_eq!(params["vnp_Amount"], "46000000");
    assert_eq!(params["vnp_TmnCode"], "ORCHARD1");
    assert!(params.contains_key("vnp_SecureHash"));

    let verification = app.state.services.payments.gateway().verify_callback(&params);
    assert!(verification.valid);
}

#[tokio::test]
async fn create_payment_rejects_a_different_amount() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("cheap@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/vnpay/create-payment",
            Some(json!({ "orderId": order_id, "amount": 1 })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Payment amount does not match order amount. Expected: 20, Got: 1"
    );
}

#[tokio::test]
async fn create_payment_hides_other_shoppers_orders() {
    let app = TestApp::new().await;
    let (_, owner) = app.create_user("owner@orchard.test").await;
    let (_, other) = app.create_user("other@orchard.test").await;
    let order_id = app.place_reference_order(&owner).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/vnpay/create-payment",
            Some(json!({ "orderId": order_id, "amount": 20 })),
            Some(&other),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Order not found");
}

#[tokio::test]
async fn valid_callback_marks_the_order_paid() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("paid@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let params = app.signed_callback(order_id, "00");
    let (status, body) = app.send_callback(&params).await;

    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Payment successful");
    assert_eq!(body["orderId"], order_id.to_string());

    let order = app.order(order_id).await;
    assert!(order.payment);
    assert_eq!(order.payment_method, PaymentMethod::Vnpay);
}

#[tokio::test]
async fn tampered_callback_is_rejected_and_payment_unchanged() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("forger@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let mut params = app.signed_callback(order_id, "00");
    params.insert("vnp_Amount".into(), "100".into());
    let (status, body) = app.send_callback(&params).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid signature");
    assert!(!app.order(order_id).await.payment);
}

#[tokio::test]
async fn unsigned_callback_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("unsigned@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let mut params = app.signed_callback(order_id, "00");
    params.remove("vnp_SecureHash");
    let (status, _) = app.send_callback(&params).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!app.order(order_id).await.payment);
}

#[tokio::test]
async fn failed_payment_leaves_the_order_unpaid() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("declined@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let params = app.signed_callback(order_id, "24");
    let (status, body) = app.send_callback(&params).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment failed");
    assert!(!app.order(order_id).await.payment);
}

#[tokio::test]
async fn repeated_callback_is_idempotent() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("twice@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;
    let params = app.signed_callback(order_id, "00");

    let (first, _) = app.send_callback(&params).await;
    let paid_at = app.order(order_id).await;
    let (second, body) = app.send_callback(&params).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["success"], true);

    let order = app.order(order_id).await;
    assert!(order.payment);
    assert_eq!(order.updated_at, paid_at.updated_at);

    let second_flip = app
        .state
        .services
        .payments
        .mark_paid(order_id, None, orchard_api::events::PaymentSource::Admin)
        .await
        .unwrap();
    assert!(!second_flip);
}

#[tokio::test]
async fn paid_orders_cannot_start_a_new_payment() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("done@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;
    app.send_callback(&app.signed_callback(order_id, "00")).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/vnpay/create-payment",
            Some(json!({ "orderId": order_id, "amount": 20 })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Order already paid");
}

#[tokio::test]
async fn create_payment_with_overflowing_amount_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.create_user("huge@orchard.test").await;
    let order_id = app.place_reference_order(&token).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/vnpay/create-payment",
            Some(json!({ "orderId": order_id, "amount": "-79228162514264337593543950335" })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Payment amount does not match order amount. Expected: 20"));
}
