#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use orchard_api::{
    config::{AppConfig, GatewayConfig},
    db,
    entities::{
        order,
        user::{self, CartData},
    },
    events,
    services::{
        catalog::{CreateProductRequest, SizeInput},
        delivery::CreateDeliveryPersonRequest,
        payments::{canonical_query, SECURE_HASH_PARAM},
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

pub const JWT_SECRET: &str = "k3Jq9vLx2mPz8RtY4wNc7HbF6dGs1aEu";
pub const ADMIN_EMAIL: &str = "admin@orchard.test";
pub const ADMIN_PASSWORD: &str = "orchard-admin-password";
pub const GATEWAY_SECRET: &str = "TESTGATEWAYSECRET";

/// Application harness backed by a private in-memory SQLite database
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            4000,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.admin_email = ADMIN_EMAIL.to_string();
        cfg.admin_password = ADMIN_PASSWORD.to_string();
        cfg.vnpay = GatewayConfig {
            tmn_code: "ORCHARD1".to_string(),
            hash_secret: GATEWAY_SECRET.to_string(),
            ..GatewayConfig::default()
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = orchard_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request with an optional `token` header
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("token", tok);
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// Send a request and decode the JSON body
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is JSON")
        };
        (status, value)
    }

    pub fn admin_token(&self) -> String {
        self.state
            .auth
            .issue_admin_token(ADMIN_EMAIL, ADMIN_PASSWORD)
            .expect("issue admin token")
    }

    /// Inserts a shopper directly and returns the id and a user token
    pub async fn create_user(&self, email: &str) -> (Uuid, String) {
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set("An".to_string()),
            last_name: Set("Nguyen".to_string()),
            email: Set(email.to_string()),
            password_hash: Set("unused".to_string()),
            phone: Set(None),
            address: Set(None),
            cart_data: Set(CartData::default()),
            is_locked: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert test user");

        let token = self
            .state
            .auth
            .issue_user_token(user.id)
            .expect("issue user token");
        (user.id, token)
    }

    /// Creates a product with a detail record and returns the product id
    pub async fn seed_product(&self, name: &str, price: Decimal, sizes: &[&str], available: bool) -> Uuid {
        let created = self
            .state
            .services
            .catalog
            .add_product(CreateProductRequest {
                product_code: None,
                name: name.to_string(),
                description: String::new(),
                category: "fruit".to_string(),
                origin_id: None,
                product_type_id: None,
                images: vec![],
                color: "red".to_string(),
                nutritional_info: String::new(),
                sizes: sizes.iter().map(|s| SizeInput::Text(s.to_string())).collect(),
                price,
                available,
                bestseller: false,
            })
            .await
            .expect("seed product");
        created.product.id
    }

    pub async fn seed_delivery_person(&self) -> Uuid {
        self.state
            .services
            .delivery
            .create(CreateDeliveryPersonRequest {
                name: "Binh Tran".to_string(),
                phone: "0901234567".to_string(),
                email: "binh@orchard.test".to_string(),
                address: "Da Nang".to_string(),
            })
            .await
            .expect("seed delivery person")
            .id
    }

    pub async fn cart(&self, user_id: Uuid) -> CartData {
        self.state
            .services
            .cart
            .get_cart(user_id)
            .await
            .expect("load cart")
    }

    pub async fn order(&self, order_id: Uuid) -> order::Model {
        self.state
            .services
            .orders
            .get_order(order_id)
            .await
            .expect("load order")
    }

    pub async fn order_count(&self) -> usize {
        self.state
            .services
            .orders
            .list_all_orders()
            .await
            .expect("list orders")
            .len()
    }

    /// Places a single-line order over HTTP
    pub async fn place_order(
        &self,
        token: &str,
        product_id: Uuid,
        price: Value,
        quantity: u32,
        size: Value,
        amount: Value,
    ) -> (StatusCode, Value) {
        self.request_json(
            Method::POST,
            "/api/order/place",
            Some(json!({
                "items": [{
                    "product_id": product_id,
                    "name": "Apple",
                    "price": price,
                    "quantity": quantity,
                    "size": size,
                    "image": "apple.png"
                }],
                "amount": amount,
                "address": shipping_address(),
                "paymentMethod": "COD"
            })),
            Some(token),
        )
        .await
    }

    /// Places the reference order (price 5, 1kg x 2, fee 10 => 20) and returns its id
    pub async fn place_reference_order(&self, token: &str) -> Uuid {
        let product_id = self.seed_product("Apple", Decimal::from(5), &["1kg"], true).await;
        let (status, body) = self
            .place_order(token, product_id, json!(5), 2, json!("1kg"), json!(20))
            .await;
        assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
        body["order"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("order id in response")
    }

    /// Gateway return parameters for `order_id`, signed with the shared secret
    pub fn signed_callback(&self, order_id: Uuid, response_code: &str) -> HashMap<String, String> {
        let gateway = self.state.services.payments.gateway();
        let url = gateway
            .build_payment_url(&orchard_api::services::payments::PaymentRequest {
                order_id,
                amount: Decimal::from(20),
                order_info: None,
                locale: None,
                client_ip: "127.0.0.1".to_string(),
            })
            .expect("build payment url");

        let mut params: HashMap<String, String> = Url::parse(&url)
            .expect("valid payment url")
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.remove(SECURE_HASH_PARAM);
        params.insert("vnp_ResponseCode".into(), response_code.into());
        params.insert("vnp_TransactionStatus".into(), response_code.into());
        params.insert("vnp_TransactionNo".into(), "14012345".into());
        params.insert("vnp_BankTranNo".into(), "VNP14012345".into());

        let sign_data = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let hash = gateway.sign(&sign_data).expect("sign callback");
        params.insert(SECURE_HASH_PARAM.into(), hash);
        params
    }

    pub async fn send_callback(&self, params: &HashMap<String, String>) -> (StatusCode, Value) {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        self.request_json(
            Method::GET,
            &format!("/api/vnpay/vnpay-return?{}", query),
            None,
            None,
        )
        .await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn shipping_address() -> Value {
    json!({
        "firstName": "An",
        "lastName": "Nguyen",
        "email": "an@example.com",
        "street": "12 Le Loi",
        "city": "Hue",
        "state": "Thua Thien Hue",
        "zipcode": "530000",
        "country": "Vietnam",
        "phone": "0900000000"
    })
}
