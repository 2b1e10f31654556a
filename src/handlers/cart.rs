use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{success_response, ApiJson};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    entities::user::CartData,
    errors::ServiceError,
    services::catalog::SizeInput,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[serde(alias = "productId")]
    pub item_id: Uuid,
    #[schema(value_type = String)]
    pub size: SizeInput,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartUpdateRequest {
    #[serde(alias = "productId")]
    pub item_id: Uuid,
    #[schema(value_type = String)]
    pub size: SizeInput,
    pub quantity: u32,
}

/// Cart keyed by product id, then canonical size
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[schema(value_type = Object)]
    pub cart_data: CartData,
}

fn cart_response(cart_data: CartData, message: Option<&str>) -> CartResponse {
    CartResponse {
        success: true,
        message: message.map(str::to_string),
        cart_data,
    }
}

#[utoipa::path(
    get,
    path = "/api/cart/get",
    responses(
        (status = 200, description = "Current cart", body = CartResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(user.user_id).await?;
    Ok(success_response(cart_response(cart, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/add",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "One unit added", body = CartResponse),
        (status = 400, description = "Product unavailable or size not offered", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .add(user.user_id, request.item_id, &request.size)
        .await?;
    Ok(success_response(cart_response(cart, Some("Added to cart successfully"))))
}

#[utoipa::path(
    post,
    path = "/api/cart/update",
    request_body = CartUpdateRequest,
    responses(
        (status = 200, description = "Quantity set", body = CartResponse),
        (status = 400, description = "Invalid size", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CartUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .update(user.user_id, request.item_id, &request.size, request.quantity)
        .await?;
    Ok(success_response(cart_response(cart, Some("Cart updated"))))
}

#[utoipa::path(
    post,
    path = "/api/cart/remove",
    request_body = CartItemRequest,
    responses(
        (status = 200, description = "Size removed", body = CartResponse),
        (status = 404, description = "Item not found in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CartItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state
        .services
        .cart
        .remove(user.user_id, request.item_id, &request.size)
        .await?;
    Ok(success_response(cart_response(cart, Some("Removed from cart"))))
}

pub fn cart_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/get", get(get_cart))
        .route("/add", post(add_to_cart))
        .route("/update", post(update_cart))
        .route("/remove", post(remove_from_cart))
        .with_user_auth(state.auth.clone())
}
