use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{created_response, success_response, ApiJson, ApiPath};
use crate::{
    auth::AuthRouterExt,
    entities::product_detail,
    errors::ServiceError,
    services::catalog::{CreateProductRequest, ProductWithDetail},
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductEnvelope {
    pub success: bool,
    pub message: String,
    pub product: ProductWithDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductsEnvelope {
    pub success: bool,
    pub products: Vec<ProductWithDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetailEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub product_detail: product_detail::Model,
}

/// Create a product with its detail record (admin)
#[utoipa::path(
    post,
    path = "/api/product/add",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductEnvelope),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product code already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Token" = [])),
    tag = "catalog"
)]
pub async fn add_product(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.catalog.add_product(request).await?;
    Ok(created_response(ProductEnvelope {
        success: true,
        message: "Product added".to_string(),
        product,
    }))
}

#[utoipa::path(
    get,
    path = "/api/product/list",
    responses((status = 200, description = "Products with details, newest first", body = ProductsEnvelope)),
    tag = "catalog"
)]
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.catalog.list_products().await?;
    Ok(success_response(ProductsEnvelope {
        success: true,
        products,
    }))
}

#[utoipa::path(
    get,
    path = "/api/product-detail/product/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Authoritative price, sizes and availability", body = ProductDetailEnvelope),
        (status = 404, description = "Product detail not found", body = crate::errors::ErrorResponse),
    ),
    tag = "catalog"
)]
pub async fn get_product_detail(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_detail = state.services.catalog.get_detail(product_id).await?;
    Ok(success_response(ProductDetailEnvelope {
        success: true,
        product_detail,
    }))
}

pub fn product_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/add", post(add_product))
        .with_admin_auth(state.auth.clone());

    Router::new()
        .route("/list", get(list_products))
        .merge(admin)
}

pub fn product_detail_routes() -> Router<AppState> {
    Router::new().route("/product/:product_id", get(get_product_detail))
}
