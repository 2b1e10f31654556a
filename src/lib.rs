//! Orchard storefront API
//!
//! Catalog, cart, checkout, VNPAY payments and back-office order handling for
//! a fruit storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::{
    auth::AuthService,
    db::DbPool,
    events::EventSender,
    services::factory::{ServiceContainer, ServiceFactory},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub event_sender: Arc<EventSender>,
    pub services: ServiceContainer,
}

impl AppState {
    /// Wires every service from the loaded configuration
    pub fn new(db: Arc<DbPool>, config: config::AppConfig, event_sender: EventSender) -> Self {
        let event_sender = Arc::new(event_sender);
        let auth = Arc::new(AuthService::new(config.auth_config(), db.clone()));
        let factory = ServiceFactory::new(
            db.clone(),
            event_sender.clone(),
            auth.clone(),
            config.vnpay.clone(),
            config.delivery_fee,
        );

        Self {
            db,
            services: ServiceContainer::new(&factory),
            config,
            auth,
            event_sender,
        }
    }
}

/// Every `/api` route
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/order", handlers::orders::order_routes(state))
        .nest("/vnpay", handlers::vnpay::vnpay_routes(state))
        .nest("/cart", handlers::cart::cart_routes(state))
        .nest("/product", handlers::catalog::product_routes(state))
        .nest("/product-detail", handlers::catalog::product_detail_routes())
        .nest("/delivery", handlers::delivery::delivery_routes(state))
        .nest("/user", handlers::users::user_routes(state))
        .nest("/revenue", handlers::revenue::revenue_routes(state))
}

/// CORS from the configured allow-list; permissive only in development
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        CorsLayer::permissive()
    } else {
        // Config validation refuses this combination; deny cross-origin calls
        CorsLayer::new()
    }
}

/// Full application router with request id, tracing, timeout and CORS layers
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "orchard-api up" }))
        .route("/health", get(health_check))
        .nest("/api", api_routes(&state))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::http_trace_layer())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_connection(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "status": "healthy", "database": "healthy" })),
        ),
        Err(e) => {
            ::tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "status": "unhealthy", "database": "unhealthy" })),
            )
        }
    }
}
