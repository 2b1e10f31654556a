mod common;

use axum::http::{Method, StatusCode};
use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};
use rust_decimal::Decimal;
use serde_json::json;

fn registration(email: &str) -> serde_json::Value {
    json!({
        "firstName": "Mai",
        "lastName": "Le",
        "email": email,
        "password": "correct-horse-battery"
    })
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(Method::POST, "/api/user/register", Some(registration("Mai@Orchard.test")), None)
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .request_json(Method::GET, "/api/cart/get", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "mai@orchard.test", "password": "correct-horse-battery" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    app.request_json(Method::POST, "/api/user/register", Some(registration("dup@orchard.test")), None)
        .await;

    let (status, body) = app
        .request_json(Method::POST, "/api/user/register", Some(registration("dup@orchard.test")), None)
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn registration_rejects_a_malformed_email() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(Method::POST, "/api/user/register", Some(registration("not-an-email")), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Please enter a valid email"));
}

#[tokio::test]
async fn wrong_password_gets_a_generic_error() {
    let app = TestApp::new().await;
    app.request_json(Method::POST, "/api/user/register", Some(registration("pw@orchard.test")), None)
        .await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "pw@orchard.test", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/user/login",
            Some(json!({ "email": "nobody@orchard.test", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn admin_login_checks_configured_credentials() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/user/admin",
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let admin = body["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .request_json(Method::GET, "/api/user/list", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/user/admin",
            Some(json!({ "email": ADMIN_EMAIL, "password": "guess" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn locked_accounts_are_refused() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let (user_id, token) = app.create_user("locked@orchard.test").await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/user/toggle-lock",
            Some(json!({ "userId": user_id })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLocked"], true);
    assert_eq!(body["message"], "User has been locked");

    let (status, body) = app
        .request_json(Method::GET, "/api/cart/get", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Your account has been locked. Please contact administrator."
    );

    let (_, body) = app
        .request_json(
            Method::POST,
            "/api/user/toggle-lock",
            Some(json!({ "userId": user_id })),
            Some(&admin),
        )
        .await;
    assert_eq!(body["isLocked"], false);

    let (status, _) = app
        .request_json(Method::GET, "/api/cart/get", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cart_add_update_remove() {
    let app = TestApp::new().await;
    let (user_id, token) = app.create_user("basket@orchard.test").await;
    let product_id = app.seed_product("Apple", Decimal::from(5), &["1kg", "2kg"], true).await;
    let key = product_id.to_string();

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "itemId": product_id, "size": "2 KG" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["message"], "Added to cart successfully");
    assert_eq!(app.cart(user_id).await.quantity(&key, "2kg"), Some(1));

    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/cart/update",
            Some(json!({ "itemId": product_id, "size": "2kg", "quantity": 4 })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.cart(user_id).await.quantity(&key, "2kg"), Some(4));

    let (status, body) = app
        .request_json(Method::GET, "/api/cart/get", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cartData"][&key]["2kg"], 4);

    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/cart/remove",
            Some(json!({ "itemId": product_id, "size": "2kg" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.cart(user_id).await.is_empty());
}

#[tokio::test]
async fn cart_rejects_unoffered_sizes() {
    let app = TestApp::new().await;
    let (user_id, token) = app.create_user("picky@orchard.test").await;
    let product_id = app.seed_product("Apple", Decimal::from(5), &["1kg"], true).await;

    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "itemId": product_id, "size": "3kg" })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.cart(user_id).await.is_empty());
}

#[tokio::test]
async fn product_listing_and_detail_are_public() {
    let app = TestApp::new().await;
    let product_id = app.seed_product("Apple", Decimal::from(5), &["1kg"], true).await;

    let (status, body) = app
        .request_json(Method::GET, "/api/product/list", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .request_json(
            Method::GET,
            &format!("/api/product-detail/product/{}", product_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["productDetail"]["price"], 5.0);
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;
    let (status, _) = app.request_json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
