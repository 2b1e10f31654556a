use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{success_response, ApiJson};
use crate::{
    auth::AuthRouterExt,
    entities::user,
    errors::ServiceError,
    services::users::{LoginRequest, RegisterRequest},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersEnvelope {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub users: Vec<user::Model>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLockRequest {
    #[serde(alias = "id")]
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLockResponse {
    pub success: bool,
    pub message: String,
    pub is_locked: bool,
}

#[utoipa::path(
    post,
    path = "/api/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Invalid registration", body = crate::errors::ErrorResponse),
        (status = 409, description = "User already exists", body = crate::errors::ErrorResponse),
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let (_, token) = state.services.users.register(request).await?;
    Ok(success_response(TokenResponse {
        success: true,
        token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account locked", body = crate::errors::ErrorResponse),
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = state.services.users.login(request).await?;
    Ok(success_response(TokenResponse {
        success: true,
        token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/admin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Admin token", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "users"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = state.services.users.admin_login(&request)?;
    Ok(success_response(TokenResponse {
        success: true,
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/user/list",
    responses((status = 200, description = "All accounts", body = UsersEnvelope)),
    security(("Token" = [])),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let users = state.services.users.list_users().await?;
    Ok(success_response(UsersEnvelope {
        success: true,
        users,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/toggle-lock",
    request_body = ToggleLockRequest,
    responses(
        (status = 200, description = "Lock flag flipped", body = ToggleLockResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "users"
)]
pub async fn toggle_lock(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ToggleLockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.toggle_lock(request.user_id).await?;
    let verb = if user.is_locked { "locked" } else { "unlocked" };
    Ok(success_response(ToggleLockResponse {
        success: true,
        message: format!("User has been {}", verb),
        is_locked: user.is_locked,
    }))
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/list", get(list_users))
        .route("/toggle-lock", post(toggle_lock))
        .with_admin_auth(state.auth.clone());

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin", post(admin_login))
        .merge(admin)
}
