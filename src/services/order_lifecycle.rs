//! Order status state machine and delivery assignment.
//!
//! ```text
//! processing --assign--> shipping --> completed
//!      |                     |
//!      +----> cancelled <----+
//! ```

use crate::{
    db::DbPool,
    entities::{
        delivery_person,
        order::{self, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender, PaymentSource},
    services::payments::PaymentService,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Body of `POST /api/order/status` and `POST /api/delivery/update-status`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: Uuid,
    pub status: String,
    #[serde(default)]
    pub delivery_person_id: Option<Uuid>,
    #[serde(default)]
    pub payment: Option<bool>,
}

/// Body of `POST /api/delivery/assign-order`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignOrderRequest {
    pub order_id: Uuid,
    pub delivery_person_id: Uuid,
}

/// What a legal status change does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// processing -> shipping through delivery assignment
    Assign(Uuid),
    /// Target equals the current status; nothing to write
    Unchanged,
    Enter(OrderStatus),
}

/// Checks a requested status change against the transition table
pub fn plan_transition(
    current: OrderStatus,
    target: OrderStatus,
    delivery_person_id: Option<Uuid>,
) -> Result<Transition, ServiceError> {
    use OrderStatus::*;

    if current.is_terminal() {
        return Err(ServiceError::InvalidStatus(format!(
            "Order is already {} and its status can no longer change",
            current
        )));
    }

    match (current, target) {
        (Processing, Shipping) => delivery_person_id.map(Transition::Assign).ok_or_else(|| {
            ServiceError::InvalidStatus(
                "A delivery person is required to ship an order".to_string(),
            )
        }),
        (Processing, Cancelled) | (Shipping, Completed) | (Shipping, Cancelled) => {
            Ok(Transition::Enter(target))
        }
        (Shipping, Shipping) => Ok(Transition::Unchanged),
        _ => Err(ServiceError::InvalidStatus(format!(
            "Cannot change order status from {} to {}",
            current, target
        ))),
    }
}

/// Parses a status string sent by the admin client
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidStatus(format!("Invalid status \"{}\"", raw)))
}

/// Moves orders through their lifecycle with conditional updates
#[derive(Clone)]
pub struct OrderLifecycleService {
    db_pool: Arc<DbPool>,
    payments: PaymentService,
    event_sender: Arc<EventSender>,
}

impl OrderLifecycleService {
    pub fn new(db_pool: Arc<DbPool>, payments: PaymentService, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            payments,
            event_sender,
        }
    }

    async fn load_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to load order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Attaches a delivery person to a processing order and ships it
    #[instrument(skip(self))]
    pub async fn assign_delivery(
        &self,
        order_id: Uuid,
        delivery_person_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let person = delivery_person::Entity::find_by_id(delivery_person_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %delivery_person_id, "Failed to load delivery person");
                ServiceError::DatabaseError(e)
            })?;
        if person.is_none() {
            return Err(ServiceError::NotFound(
                "Delivery person not found".to_string(),
            ));
        }

        let current = self.load_order(order_id).await?;
        if current.status != OrderStatus::Processing {
            return Err(ServiceError::InvalidStatus(
                "Order cannot be assigned to a delivery person".to_string(),
            ));
        }

        let result = order::Entity::update_many()
            .col_expr(
                order::Column::DeliveryPersonId,
                Expr::value(Some(delivery_person_id)),
            )
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Shipping))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Processing))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to assign delivery person");
                ServiceError::DatabaseError(e)
            })?;

        // Lost a race with another status change
        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidStatus(
                "Order cannot be assigned to a delivery person".to_string(),
            ));
        }

        info!(%order_id, %delivery_person_id, "Delivery person assigned");
        self.event_sender
            .send_or_log(Event::DeliveryAssigned {
                order_id,
                delivery_person_id,
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: OrderStatus::Processing,
                new_status: OrderStatus::Shipping,
            })
            .await;

        self.load_order(order_id).await
    }

    /// Applies an admin status change. Only transitions in the table are
    /// accepted; the payment flag may only be raised.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, status = %request.status))]
    pub async fn update_status(
        &self,
        request: UpdateStatusRequest,
    ) -> Result<order::Model, ServiceError> {
        let target = parse_status(&request.status)?;
        if request.payment == Some(false) {
            return Err(ServiceError::ValidationError(
                "Payment status can only be set to true".to_string(),
            ));
        }

        let current = self.load_order(request.order_id).await?;
        let order_id = current.id;

        match plan_transition(current.status, target, request.delivery_person_id)? {
            Transition::Assign(delivery_person_id) => {
                self.assign_delivery(order_id, delivery_person_id).await?;
            }
            Transition::Unchanged => {}
            Transition::Enter(status) => self.enter(&current, status).await?,
        }

        if request.payment == Some(true) {
            self.payments
                .mark_paid(order_id, None, PaymentSource::Admin)
                .await?;
        }

        self.load_order(order_id).await
    }

    /// Writes a terminal status, guarded on the status it was read in
    async fn enter(&self, current: &order::Model, status: OrderStatus) -> Result<(), ServiceError> {
        let order_id = current.id;
        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
        if status.is_terminal() {
            update = update.col_expr(
                order::Column::DeliveryPersonId,
                Expr::value(Option::<Uuid>::None),
            );
        }
        if status == OrderStatus::Completed {
            update = update.col_expr(order::Column::Payment, Expr::value(true));
        }

        let result = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(current.status))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to update order status");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidStatus(
                "Order status changed concurrently, please retry".to_string(),
            ));
        }

        info!(%order_id, old_status = %current.status, new_status = %status, "Order status updated");
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: current.status,
                new_status: status,
            })
            .await;

        if status == OrderStatus::Completed && !current.payment {
            counter!("orchard.payments.confirmed", 1);
            self.event_sender
                .send_or_log(Event::PaymentConfirmed {
                    order_id,
                    source: PaymentSource::Completion,
                })
                .await;
        }

        Ok(())
    }
}
