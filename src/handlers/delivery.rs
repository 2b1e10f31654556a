use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    common::{created_response, success_response, ApiJson},
    orders::OrderEnvelope,
};
use crate::{
    auth::AuthRouterExt,
    entities::delivery_person,
    errors::ServiceError,
    services::{
        delivery::CreateDeliveryPersonRequest,
        order_lifecycle::{AssignOrderRequest, UpdateStatusRequest},
    },
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPersonEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub delivery_person: delivery_person::Model,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPersonsEnvelope {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub delivery_persons: Vec<delivery_person::Model>,
}

#[utoipa::path(
    post,
    path = "/api/delivery",
    request_body = CreateDeliveryPersonRequest,
    responses(
        (status = 201, description = "Delivery person created", body = DeliveryPersonEnvelope),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "delivery"
)]
pub async fn create_delivery_person(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateDeliveryPersonRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let delivery_person = state.services.delivery.create(request).await?;
    Ok(created_response(DeliveryPersonEnvelope {
        success: true,
        delivery_person,
    }))
}

#[utoipa::path(
    get,
    path = "/api/delivery",
    responses((status = 200, description = "Delivery persons, newest first", body = DeliveryPersonsEnvelope)),
    security(("Token" = [])),
    tag = "delivery"
)]
pub async fn list_delivery_persons(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let delivery_persons = state.services.delivery.list().await?;
    Ok(success_response(DeliveryPersonsEnvelope {
        success: true,
        delivery_persons,
    }))
}

#[utoipa::path(
    post,
    path = "/api/delivery/assign-order",
    request_body = AssignOrderRequest,
    responses(
        (status = 200, description = "Order assigned and shipping", body = OrderEnvelope),
        (status = 400, description = "Order is not processing", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or delivery person not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "delivery"
)]
pub async fn assign_order(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AssignOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .lifecycle
        .assign_delivery(request.order_id, request.delivery_person_id)
        .await?;
    Ok(success_response(OrderEnvelope {
        success: true,
        message: "Order assigned to delivery person".to_string(),
        order,
    }))
}

#[utoipa::path(
    put,
    path = "/api/delivery/update-status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderEnvelope),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "delivery"
)]
pub async fn update_delivery_status(
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

pub fn delivery_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_delivery_persons).post(create_delivery_person))
        .route("/assign-order", post(assign_order))
        .route("/update-status", put(update_delivery_status))
        .with_admin_auth(state.auth.clone())
}
