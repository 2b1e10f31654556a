use crate::{
    db::DbPool,
    entities::order::{self, OrderStatus},
    errors::ServiceError,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

/// Revenue over orders that are completed and paid
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    #[schema(value_type = f64)]
    pub total_revenue: Decimal,
    pub total_orders: u64,
    /// Keyed by `YYYY-MM` of the order's creation time (UTC)
    pub revenue_by_month: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total: u64,
    pub paid: u64,
    pub completed_and_paid: u64,
    pub statuses: BTreeMap<String, u64>,
}

fn counts_as_revenue(order: &order::Model) -> bool {
    order.status == OrderStatus::Completed && order.payment
}

pub fn summarize(orders: &[order::Model]) -> RevenueSummary {
    let mut total_revenue = Decimal::ZERO;
    let mut total_orders = 0;
    let mut by_month: BTreeMap<String, Decimal> = BTreeMap::new();

    for order in orders.iter().filter(|o| counts_as_revenue(o)) {
        total_revenue += order.amount;
        total_orders += 1;
        *by_month
            .entry(order.created_at.format("%Y-%m").to_string())
            .or_default() += order.amount;
    }

    RevenueSummary {
        total_revenue,
        total_orders,
        revenue_by_month: by_month
            .into_iter()
            .map(|(month, amount)| (month, amount.to_f64().unwrap_or_default()))
            .collect(),
    }
}

pub fn tally(orders: &[order::Model]) -> OrderStats {
    orders.iter().fold(OrderStats::default(), |mut stats, order| {
        stats.total += 1;
        *stats.statuses.entry(order.status.to_string()).or_default() += 1;
        if order.payment {
            stats.paid += 1;
        }
        if counts_as_revenue(order) {
            stats.completed_and_paid += 1;
        }
        stats
    })
}

/// Admin revenue reports
#[derive(Clone)]
pub struct RevenueService {
    db_pool: Arc<DbPool>,
}

impl RevenueService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<RevenueSummary, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed))
            .filter(order::Column::Payment.eq(true))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load revenue orders");
                ServiceError::DatabaseError(e)
            })?;
        Ok(summarize(&orders))
    }

    #[instrument(skip(self))]
    pub async fn check_orders(&self) -> Result<OrderStats, ServiceError> {
        let orders = order::Entity::find()
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load orders");
                ServiceError::DatabaseError(e)
            })?;
        Ok(tally(&orders))
    }
}
