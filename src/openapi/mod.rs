use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("token"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Orchard API",
        version = "1.0.0",
        description = r#"
# Orchard storefront API

Back end of a fruit storefront: catalog, cart, checkout, VNPAY payments and
back-office order handling.

## Authentication

Shopper endpoints take the JWT returned by `/api/user/login` in a `token`
header (`Authorization: Bearer <jwt>` is accepted too). Back-office endpoints
take the token returned by `/api/user/admin`.

## Errors

Failures share one envelope:

```json
{ "success": false, "message": "Order not found", "request_id": "..." }
```
        "#,
    ),
    servers(
        (url = "http://localhost:4000", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Checkout and order lifecycle"),
        (name = "payments", description = "VNPAY redirect and return callback"),
        (name = "cart", description = "Per-user cart"),
        (name = "catalog", description = "Products and their authoritative details"),
        (name = "delivery", description = "Delivery staff and assignment"),
        (name = "users", description = "Accounts and tokens"),
        (name = "revenue", description = "Back-office reports")
    ),
    paths(
        crate::handlers::orders::place_order,
        crate::handlers::orders::user_orders,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::update_status,
        crate::handlers::orders::mark_paid,

        crate::handlers::vnpay::create_payment,
        crate::handlers::vnpay::vnpay_return,

        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart,
        crate::handlers::cart::remove_from_cart,

        crate::handlers::catalog::add_product,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product_detail,

        crate::handlers::delivery::create_delivery_person,
        crate::handlers::delivery::list_delivery_persons,
        crate::handlers::delivery::assign_order,
        crate::handlers::delivery::update_delivery_status,

        crate::handlers::users::register,
        crate::handlers::users::login,
        crate::handlers::users::admin_login,
        crate::handlers::users::list_users,
        crate::handlers::users::toggle_lock,

        crate::handlers::revenue::summary,
        crate::handlers::revenue::check_orders,
    ),
    components(
        schemas(
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::order::OrderItem,
            crate::entities::order::ShippingAddress,
            crate::errors::ErrorResponse,
            crate::handlers::common::MessageResponse,
        )
    ),
    modifiers(&TokenSecurity)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
