use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{client_ip, ApiJson};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::payments::{CallbackOutcome, CreatePaymentRequest},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUrlResponse {
    pub success: bool,
    pub payment_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResultResponse {
    pub success: bool,
    pub message: String,
    pub order_id: Option<String>,
}

/// Build a signed gateway redirect for an unpaid order
#[utoipa::path(
    post,
    path = "/api/vnpay/create-payment",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Redirect URL", body = PaymentUrlResponse),
        (status = 400, description = "Order already paid or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment_url = state
        .services
        .payments
        .create_payment(user.user_id, request, client_ip(&headers))
        .await?;

    Ok(Json(PaymentUrlResponse {
        success: true,
        payment_url,
    }))
}

/// Gateway return callback
#[utoipa::path(
    get,
    path = "/api/vnpay/vnpay-return",
    params(("vnp_SecureHash" = String, Query, description = "HMAC-SHA512 over the other vnp_* parameters")),
    responses(
        (status = 200, description = "Payment confirmed", body = PaymentResultResponse),
        (status = 400, description = "Invalid signature or failed payment", body = PaymentResultResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "payments"
)]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ServiceError> {
    let outcome = state.services.payments.handle_return(&params).await?;

    let response = match outcome {
        CallbackOutcome::Paid { order_id, .. } => (
            StatusCode::OK,
            Json(PaymentResultResponse {
                success: true,
                message: "Payment successful".to_string(),
                order_id: Some(order_id.to_string()),
            }),
        ),
        CallbackOutcome::Failed { order_ref } => (
            StatusCode::BAD_REQUEST,
            Json(PaymentResultResponse {
                success: false,
                message: "Payment failed".to_string(),
                order_id: order_ref,
            }),
        ),
    };
    Ok(response.into_response())
}

pub fn vnpay_routes(state: &AppState) -> Router<AppState> {
    let shopper = Router::new()
        .route("/create-payment", post(create_payment))
        .with_user_auth(state.auth.clone());

    Router::new()
        .route("/vnpay-return", get(vnpay_return))
        .merge(shopper)
}
