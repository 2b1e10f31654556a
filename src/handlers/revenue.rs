use axum::{extract::State, response::IntoResponse, routing::get, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::common::success_response;
use crate::{
    auth::AuthRouterExt,
    errors::ServiceError,
    services::revenue::{OrderStats, RevenueSummary},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RevenueSummaryResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: RevenueSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatsResponse {
    pub success: bool,
    pub stats: OrderStats,
}

#[utoipa::path(
    get,
    path = "/api/revenue/summary",
    responses((status = 200, description = "Revenue over completed, paid orders", body = RevenueSummaryResponse)),
    security(("Token" = [])),
    tag = "revenue"
)]
pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.revenue.summary().await?;
    Ok(success_response(RevenueSummaryResponse {
        success: true,
        summary,
    }))
}

#[utoipa::path(
    get,
    path = "/api/revenue/check-orders",
    responses((status = 200, description = "Order counts by status and payment", body = OrderStatsResponse)),
    security(("Token" = [])),
    tag = "revenue"
)]
pub async fn check_orders(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.revenue.check_orders().await?;
    Ok(success_response(OrderStatsResponse {
        success: true,
        stats,
    }))
}

pub fn revenue_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/summary", get(summary))
        .route("/check-orders", get(check_orders))
        .with_admin_auth(state.auth.clone())
}
