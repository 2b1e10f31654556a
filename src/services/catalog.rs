use crate::{
    db::DbPool,
    entities::{
        origin,
        product::{self, ProductImages},
        product_detail::{self, ProductSizes},
        product_type,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// A size as sent by clients: `1`, `0.5`, `"1"`, `"1kg"` or `"1 KG"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeInput {
    Text(String),
    Number(serde_json::Number),
}

impl SizeInput {
    /// Canonical `"<number>kg"` form, or `None` when the value is not a positive weight
    pub fn canonical(&self) -> Option<String> {
        match self {
            SizeInput::Text(s) => canonical_size(s),
            SizeInput::Number(n) => canonical_size(&n.to_string()),
        }
    }

    /// The size as the client sent it, for error messages
    pub fn raw(&self) -> String {
        match self {
            SizeInput::Text(s) => s.clone(),
            SizeInput::Number(n) => n.to_string(),
        }
    }
}

/// Normalises a size string to `"<number>kg"`.
///
/// The unit suffix is optional and case-insensitive; the number must be
/// positive. Trailing zeros are dropped, so `"1.50 KG"` becomes `"1.5kg"`.
pub fn canonical_size(raw: &str) -> Option<String> {
    weight_of(raw).map(|w| format!("{}kg", w))
}

/// Numeric weight in kilograms of a size string
pub fn weight_of(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let number = if trimmed.len() >= 2
        && trimmed.is_char_boundary(trimmed.len() - 2)
        && trimmed[trimmed.len() - 2..].eq_ignore_ascii_case("kg")
    {
        trimmed[..trimmed.len() - 2].trim_end()
    } else {
        trimmed
    };

    let value = Decimal::from_str(number).ok()?;
    if value <= Decimal::ZERO {
        return None;
    }
    Some(value.normalize())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub product_code: Option<String>,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub origin_id: Option<Uuid>,
    #[serde(default)]
    pub product_type_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub nutritional_info: String,
    #[validate(length(min = 1, message = "At least one size is required"))]
    #[schema(value_type = Vec<String>)]
    pub sizes: Vec<SizeInput>,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub bestseller: bool,
}

fn default_true() -> bool {
    true
}

/// A product together with its authoritative detail record
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductWithDetail {
    #[schema(value_type = Object)]
    pub product: product::Model,
    #[schema(value_type = Object)]
    pub detail: Option<product_detail::Model>,
}

/// Catalog reads and the admin product seeding operation
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates a product and its detail record
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductWithDetail, ServiceError> {
        request.validate()?;

        if request.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be greater than 0".to_string(),
            ));
        }

        let mut sizes = Vec::with_capacity(request.sizes.len());
        for size in &request.sizes {
            let canonical = size.canonical().ok_or_else(|| {
                ServiceError::ValidationError(format!("Invalid size \"{}\"", size.raw()))
            })?;
            if !sizes.contains(&canonical) {
                sizes.push(canonical);
            }
        }

        let db = &*self.db_pool;

        if let Some(origin_id) = request.origin_id {
            origin::Entity::find_by_id(origin_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Origin not found".to_string()))?;
        }
        if let Some(product_type_id) = request.product_type_id {
            product_type::Entity::find_by_id(product_type_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Product type not found".to_string()))?;
        }

        let now = Utc::now();
        let product_code = request
            .product_code
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| format!("PRD{}", now.timestamp_millis()));

        let existing = product::Entity::find()
            .filter(product::Column::ProductCode.eq(product_code.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Product code already exists".to_string(),
            ));
        }

        let product_id = Uuid::new_v4();
        let product = product::ActiveModel {
            id: Set(product_id),
            product_code: Set(product_code),
            name: Set(request.name),
            description: Set(request.description),
            category: Set(request.category),
            origin_id: Set(request.origin_id),
            product_type_id: Set(request.product_type_id),
            images: Set(ProductImages(request.images)),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert product");
            ServiceError::DatabaseError(e)
        })?;

        let detail = product_detail::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            color: Set(request.color),
            nutritional_info: Set(request.nutritional_info),
            sizes: Set(ProductSizes(sizes)),
            price: Set(request.price),
            available: Set(request.available),
            bestseller: Set(request.bestseller),
            discontinued: Set(false),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, %product_id, "Failed to insert product detail");
            ServiceError::DatabaseError(e)
        })?;

        info!(%product_id, code = %product.product_code, "Product created");

        Ok(ProductWithDetail {
            product,
            detail: Some(detail),
        })
    }

    /// Lists products, newest first, with their details
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductWithDetail>, ServiceError> {
        let rows = product::Entity::find()
            .find_also_related(product_detail::Entity)
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list products");
                ServiceError::DatabaseError(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|(product, detail)| ProductWithDetail { product, detail })
            .collect())
    }

    /// Authoritative detail record of a product, if any
    #[instrument(skip(self))]
    pub async fn find_detail(
        &self,
        product_id: Uuid,
    ) -> Result<Option<product_detail::Model>, ServiceError> {
        product_detail::Entity::find()
            .filter(product_detail::Column::ProductId.eq(product_id))
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %product_id, "Failed to load product detail");
                ServiceError::DatabaseError(e)
            })
    }

    pub async fn get_detail(&self, product_id: Uuid) -> Result<product_detail::Model, ServiceError> {
        self.find_detail(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product detail not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn canonical_size_accepts_suffix_variants() {
        assert_eq!(canonical_size("1").as_deref(), Some("1kg"));
        assert_eq!(canonical_size("1kg").as_deref(), Some("1kg"));
        assert_eq!(canonical_size(" 1 KG ").as_deref(), Some("1kg"));
        assert_eq!(canonical_size("1.50Kg").as_deref(), Some("1.5kg"));
        assert_eq!(canonical_size("0.5").as_deref(), Some("0.5kg"));
    }

    #[test]
    fn canonical_size_rejects_non_weights() {
        assert!(canonical_size("").is_none());
        assert!(canonical_size("kg").is_none());
        assert!(canonical_size("0kg").is_none());
        assert!(canonical_size("-1").is_none());
        assert!(canonical_size("large").is_none());
        assert!(canonical_size("1kgkg").is_none());
    }

    #[test]
    fn numeric_sizes_canonicalise_like_strings() {
        let n: SizeInput = serde_json::from_str("2").unwrap();
        let f: SizeInput = serde_json::from_str("0.5").unwrap();
        let s: SizeInput = serde_json::from_str("\"2kg\"").unwrap();
        assert_eq!(n.canonical().as_deref(), Some("2kg"));
        assert_eq!(f.canonical().as_deref(), Some("0.5kg"));
        assert_eq!(s.canonical(), n.canonical());
    }

    #[test]
    fn weight_is_normalised() {
        assert_eq!(weight_of("2.000kg"), Some(dec!(2)));
        assert_eq!(weight_of("0.25"), Some(dec!(0.25)));
    }

    proptest::proptest! {
        #[test]
        fn canonical_size_is_idempotent(whole in 1u32..10_000, frac in 0u32..1000, upper in proptest::bool::ANY) {
            let raw = format!("{}.{:03}{}", whole, frac, if upper { "KG" } else { "" });
            let once = canonical_size(&raw).unwrap();
            proptest::prop_assert_eq!(canonical_size(&once), Some(once.clone()));
            proptest::prop_assert!(once.ends_with("kg"));
        }
    }
}
