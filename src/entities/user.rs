use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-user cart: product id -> canonical size -> quantity.
///
/// Quantities are always at least 1. A product key disappears together with
/// its last size.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CartData(pub BTreeMap<String, BTreeMap<String, u32>>);

impl CartData {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn quantity(&self, product_id: &str, size: &str) -> Option<u32> {
        self.0.get(product_id).and_then(|sizes| sizes.get(size)).copied()
    }

    /// Adds one unit of `size`, returning the new quantity
    pub fn increment(&mut self, product_id: &str, size: &str) -> u32 {
        let quantity = self
            .0
            .entry(product_id.to_string())
            .or_default()
            .entry(size.to_string())
            .or_insert(0);
        *quantity = quantity.saturating_add(1);
        *quantity
    }

    /// Sets the quantity of `size`; zero removes it
    pub fn set(&mut self, product_id: &str, size: &str, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id, size);
            return;
        }
        self.0
            .entry(product_id.to_string())
            .or_default()
            .insert(size.to_string(), quantity);
    }

    /// Removes `size`, and the product when it was the last size. Returns
    /// whether anything was removed.
    pub fn remove(&mut self, product_id: &str, size: &str) -> bool {
        let Some(sizes) = self.0.get_mut(product_id) else {
            return false;
        };
        let removed = sizes.remove(size).is_some();
        if sizes.is_empty() {
            self.0.remove(product_id);
        }
        removed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub address: Option<Json>,
    #[sea_orm(column_type = "Json")]
    pub cart_data: CartData,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
