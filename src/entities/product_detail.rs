use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::catalog::canonical_size;

/// Sizes a product is sold in, e.g. `["0.5kg", "1kg"]`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ProductSizes(pub Vec<String>);

impl ProductSizes {
    /// Whether `size` (already canonical) is offered. Stored sizes are
    /// canonicalised before comparison so "1 KG" and "1kg" are the same size.
    pub fn offers(&self, size: &str) -> bool {
        self.0
            .iter()
            .filter_map(|s| canonical_size(s))
            .any(|s| s == size)
    }
}

/// Authoritative price, sizes and availability of a product.
///
/// Order placement validates every cart line against this record; whatever
/// the client sends is only advisory.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub product_id: Uuid,
    pub color: String,
    #[sea_orm(column_type = "Text")]
    pub nutritional_info: String,
    #[sea_orm(column_type = "Json")]
    pub sizes: ProductSizes,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    pub available: bool,
    pub bestseller: bool,
    pub discontinued: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offers_compares_canonical_forms() {
        let sizes = ProductSizes(vec!["0.5kg".into(), "1 KG".into()]);
        assert!(sizes.offers("1kg"));
        assert!(sizes.offers("0.5kg"));
        assert!(!sizes.offers("2kg"));
    }
}
