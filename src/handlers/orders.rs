use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{success_response, ApiJson, MessageResponse};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    entities::order,
    errors::ServiceError,
    events::PaymentSource,
    services::{order_lifecycle::UpdateStatusRequest, orders::PlaceOrderRequest},
    AppState,
};
use axum::Extension;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Object)]
    pub order: order::Model,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersEnvelope {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub orders: Vec<order::Model>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub order_id: Uuid,
}

/// Place an order from the caller's basket
#[utoipa::path(
    post,
    path = "/api/order/place",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = OrderEnvelope),
        (status = 400, description = "Basket failed validation", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .place_order(user.user_id, request)
        .await?;

    Ok(success_response(OrderEnvelope {
        success: true,
        message: "Order placed successfully".to_string(),
        order,
    }))
}

/// Orders of the authenticated user, newest first
#[utoipa::path(
    post,
    path = "/api/order/userorders",
    responses(
        (status = 200, description = "Caller's orders", body = OrdersEnvelope),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "orders"
)]
pub async fn user_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_user_orders(user.user_id).await?;
    Ok(success_response(OrdersEnvelope {
        success: true,
        orders,
    }))
}

/// Every order (admin)
#[utoipa::path(
    post,
    path = "/api/order/list",
    responses(
        (status = 200, description = "All orders", body = OrdersEnvelope),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "orders"
)]
pub async fn list_orders(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_all_orders().await?;
    Ok(success_response(OrdersEnvelope {
        success: true,
        orders,
    }))
}

/// Move an order through its lifecycle (admin)
#[utoipa::path(
    post,
    path = "/api/order/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderEnvelope),
        (status = 400, description = "Illegal transition or unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or delivery person not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.lifecycle.update_status(request).await?;
    Ok(success_response(OrderEnvelope {
        success: true,
        message: "Order status updated successfully".to_string(),
        order,
    }))
}

/// Record a cash payment (admin)
#[utoipa::path(
    post,
    path = "/api/order/payment",
    request_body = MarkPaidRequest,
    responses(
        (status = 200, description = "Order is paid", body = MessageResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "orders"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<MarkPaidRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let newly_paid = state
        .services
        .payments
        .mark_paid(request.order_id, None, PaymentSource::Admin)
        .await?;

    let message = if newly_paid {
        "Payment status updated to true"
    } else {
        "Order already paid"
    };
    Ok(success_response(MessageResponse {
        success: true,
        message: message.to_string(),
    }))
}

pub fn order_routes(state: &AppState) -> Router<AppState> {
    let shopper = Router::new()
        .route("/place", post(place_order))
        .route("/userorders", post(user_orders))
        .with_user_auth(state.auth.clone());

    let admin = Router::new()
        .route("/list", post(list_orders))
        .route("/status", post(update_status))
        .route("/payment", post(mark_paid))
        .with_admin_auth(state.auth.clone());

    shopper.merge(admin)
}
