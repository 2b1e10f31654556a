use crate::{
    db::DbPool,
    entities::{
        order::{self, OrderItem, OrderItems, OrderStatus, PaymentMethod, ShippingAddress},
        product_detail,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::CartService,
        catalog::{weight_of, SizeInput},
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Tolerance between the claimed and the computed order total
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// One cart line as submitted at checkout. Name, price, size and image are
/// the client's view and are re-checked against the catalog.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    #[serde(alias = "productId", alias = "_id")]
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub size: SizeInput,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Result of checking a basket against the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
}

/// Validates every line against its authoritative detail record, in input
/// order, and checks the claimed total. The first failing line wins.
pub fn price_order(
    lines: &[OrderLineRequest],
    details: &HashMap<Uuid, product_detail::Model>,
    delivery_fee: Decimal,
    claimed_amount: Decimal,
) -> Result<PricedOrder, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError("No items in order".to_string()));
    }

    let mut items = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        let detail = details.get(&line.product_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Product \"{}\" not found", line.name))
        })?;

        if !detail.available {
            return Err(ServiceError::BadRequest(format!(
                "Sorry, product \"{}\" is currently not available",
                line.name
            )));
        }

        let size = line
            .size
            .canonical()
            .filter(|size| detail.sizes.offers(size))
            .ok_or_else(|| {
                let shown = line.size.canonical().unwrap_or_else(|| line.size.raw());
                ServiceError::BadRequest(format!(
                    "Size \"{}\" is not available for product \"{}\"",
                    shown, line.name
                ))
            })?;

        if line.price != detail.price {
            return Err(ServiceError::BadRequest(format!(
                "Invalid price for product \"{}\"",
                line.name
            )));
        }

        if line.quantity == 0 {
            return Err(ServiceError::ValidationError(format!(
                "Invalid quantity for product \"{}\"",
                line.name
            )));
        }

        let weight = weight_of(&size).ok_or_else(|| {
            ServiceError::InternalError(format!("Canonical size {} has no weight", size))
        })?;
        subtotal = detail
            .price
            .checked_mul(weight)
            .and_then(|unit| unit.checked_mul(Decimal::from(line.quantity)))
            .and_then(|line_total| subtotal.checked_add(line_total))
            .ok_or_else(|| {
                ServiceError::BadRequest(format!("Invalid quantity for product \"{}\"", line.name))
            })?;

        items.push(OrderItem {
            product_id: line.product_id,
            name: line.name.clone(),
            price: detail.price,
            quantity: line.quantity,
            size,
            image: line.image.clone(),
        });
    }

    let total = subtotal.checked_add(delivery_fee).ok_or_else(|| {
        ServiceError::BadRequest("Order total is out of range".to_string())
    })?;
    if !amounts_match(total, claimed_amount) {
        return Err(ServiceError::BadRequest(format!(
            "Order amount does not match item totals. Expected: {}, Got: {}",
            total.normalize(),
            claimed_amount.normalize()
        )));
    }

    Ok(PricedOrder {
        items,
        subtotal,
        total,
    })
}

/// Whether a client-claimed amount equals `expected` within [`AMOUNT_TOLERANCE`].
/// Negative claims and differences that overflow never match.
pub fn amounts_match(expected: Decimal, claimed: Decimal) -> bool {
    if claimed.is_sign_negative() && !claimed.is_zero() {
        return false;
    }
    expected
        .checked_sub(claimed)
        .map_or(false, |diff| diff.abs() <= AMOUNT_TOLERANCE)
}

fn validate_address(address: &ShippingAddress) -> Result<(), ServiceError> {
    let required = [
        &address.first_name,
        &address.last_name,
        &address.street,
        &address.city,
        &address.phone,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ServiceError::ValidationError(
            "Shipping address is incomplete".to_string(),
        ));
    }
    Ok(())
}

/// Order placement and order queries
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    cart: CartService,
    event_sender: Arc<EventSender>,
    delivery_fee: Decimal,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        cart: CartService,
        event_sender: Arc<EventSender>,
        delivery_fee: Decimal,
    ) -> Self {
        Self {
            db_pool,
            cart,
            event_sender,
            delivery_fee,
        }
    }

    pub fn delivery_fee(&self) -> Decimal {
        self.delivery_fee
    }

    async fn load_details(
        &self,
        lines: &[OrderLineRequest],
    ) -> Result<HashMap<Uuid, product_detail::Model>, ServiceError> {
        let ids: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
        let details = product_detail::Entity::find()
            .filter(product_detail::Column::ProductId.is_in(ids))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load product details");
                ServiceError::DatabaseError(e)
            })?;

        Ok(details.into_iter().map(|d| (d.product_id, d)).collect())
    }

    /// Validates the basket against the catalog, records the order and empties
    /// the cart.
    ///
    /// The order insert and the cart clear are two separate writes. If the
    /// clear fails the order stands and the failure is only logged.
    #[instrument(skip(self, request), fields(%user_id, items = request.items.len()))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        request: PlaceOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        let priced = match self.validate(&request).await {
            Ok(priced) => priced,
            Err(e) => {
                counter!("orchard.orders.rejected", 1);
                info!(reason = %e, "Order rejected");
                return Err(e);
            }
        };

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let created = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            items: Set(OrderItems(priced.items)),
            amount: Set(priced.total),
            address: Set(request.address),
            payment_method: Set(request.payment_method),
            payment: Set(false),
            status: Set(OrderStatus::Processing),
            delivery_person_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        counter!("orchard.orders.placed", 1);
        info!(%order_id, amount = %created.amount, "Order placed");
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id,
                user_id,
                amount: created.amount,
                payment_method: created.payment_method,
            })
            .await;

        match self.cart.clear(user_id).await {
            Ok(()) => {
                self.event_sender
                    .send_or_log(Event::CartCleared { user_id })
                    .await
            }
            Err(e) => warn!(error = %e, %order_id, "Order placed but cart was not cleared"),
        }

        Ok(created)
    }

    async fn validate(&self, request: &PlaceOrderRequest) -> Result<PricedOrder, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError("No items in order".to_string()));
        }
        validate_address(&request.address)?;
        let details = self.load_details(&request.items).await?;
        price_order(&request.items, &details, self.delivery_fee, request.amount)
    }

    /// Orders of one user, newest first
    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list user orders");
                ServiceError::DatabaseError(e)
            })
    }

    /// Every order, newest first
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<order::Model>, ServiceError> {
        order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list orders");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to load order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product_detail::ProductSizes;

    fn detail(product_id: Uuid, price: Decimal, sizes: &[&str], available: bool) -> product_detail::Model {
        product_detail::Model {
            id: Uuid::new_v4(),
            product_id,
            color: "red".into(),
            nutritional_info: String::new(),
            sizes: ProductSizes(sizes.iter().map(|s| s.to_string()).collect()),
            price,
            available,
            bestseller: false,
            discontinued: false,
            updated_at: Utc::now(),
        }
    }

    fn line(product_id: Uuid, price: Decimal, size: &str, quantity: u32) -> OrderLineRequest {
        OrderLineRequest {
            product_id,
            name: "Apple".into(),
            price,
            quantity,
            size: SizeInput::Text(size.into()),
            image: None,
        }
    }

    fn catalog(details: Vec<product_detail::Model>) -> HashMap<Uuid, product_detail::Model> {
        details.into_iter().map(|d| (d.product_id, d)).collect()
    }

    #[test]
    fn total_is_price_times_weight_times_quantity_plus_fee() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(5), &["1kg"], true)]);

        let priced =
            price_order(&[line(id, dec!(5), "1", 2)], &details, dec!(10), dec!(20)).unwrap();

        assert_eq!(priced.subtotal, dec!(10));
        assert_eq!(priced.total, dec!(20));
        assert_eq!(priced.items[0].size, "1kg");
    }

    #[test]
    fn amount_mismatch_reports_expected_and_received() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(5), &["1kg"], true)]);

        let err = price_order(&[line(id, dec!(5), "1kg", 2)], &details, dec!(10), dec!(25))
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Order amount does not match item totals. Expected: 20, Got: 25"
        );
    }

    #[test]
    fn amount_within_tolerance_is_accepted() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(3.33), &["0.5kg"], true)]);

        // 3.33 * 0.5 * 3 + 10 = 14.995
        let priced =
            price_order(&[line(id, dec!(3.33), "0.5", 3)], &details, dec!(10), dec!(15)).unwrap();
        assert_eq!(priced.total, dec!(14.995));
    }

    #[test]
    fn tampered_price_is_rejected() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(5), &["1kg"], true)]);

        let err = price_order(&[line(id, dec!(1), "1kg", 2)], &details, dec!(10), dec!(12))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid price for product \"Apple\"");
    }

    #[test]
    fn unknown_product_and_unavailable_product_are_rejected() {
        let id = Uuid::new_v4();
        let missing = price_order(&[line(id, dec!(5), "1kg", 1)], &HashMap::new(), dec!(10), dec!(15))
            .unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));

        let details = catalog(vec![detail(id, dec!(5), &["1kg"], false)]);
        let unavailable = price_order(&[line(id, dec!(5), "1kg", 1)], &details, dec!(10), dec!(15))
            .unwrap_err();
        assert!(unavailable.to_string().contains("currently not available"));
    }

    #[test]
    fn size_not_offered_is_rejected_with_canonical_name() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(5), &["1kg"], true)]);

        let err = price_order(&[line(id, dec!(5), "2", 1)], &details, dec!(10), dec!(20))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Size \"2kg\" is not available for product \"Apple\""
        );
    }

    #[test]
    fn first_failing_line_wins() {
        let good = Uuid::new_v4();
        let bad = Uuid::new_v4();
        let details = catalog(vec![detail(good, dec!(5), &["1kg"], true)]);

        let err = price_order(
            &[line(bad, dec!(5), "1kg", 1), line(good, dec!(9), "1kg", 1)],
            &details,
            dec!(10),
            dec!(0),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn empty_basket_is_rejected() {
        let err = price_order(&[], &HashMap::new(), dec!(10), dec!(10)).unwrap_err();
        assert_eq!(err.to_string(), "No items in order");
    }

    #[test]
    fn extreme_claimed_amounts_are_mismatches_not_panics() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, dec!(5), &["1kg"], true)]);

        for claimed in [Decimal::MIN, Decimal::MAX, dec!(-20)] {
            let err = price_order(&[line(id, dec!(5), "1kg", 2)], &details, dec!(10), claimed)
                .unwrap_err();
            assert!(matches!(err, ServiceError::BadRequest(_)), "claimed {claimed}");
            assert!(err
                .to_string()
                .starts_with("Order amount does not match item totals. Expected: 20"));
        }
    }

    #[test]
    fn amounts_match_within_tolerance() {
        assert!(amounts_match(dec!(20), dec!(20.01)));
        assert!(!amounts_match(dec!(20), dec!(20.02)));
        assert!(!amounts_match(dec!(20), Decimal::MIN));
        assert!(!amounts_match(dec!(-1), Decimal::MAX));
        assert!(amounts_match(Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn huge_quantities_are_rejected_without_overflow() {
        let id = Uuid::new_v4();
        let details = catalog(vec![detail(id, Decimal::MAX, &["1kg"], true)]);

        let err = price_order(&[line(id, Decimal::MAX, "1kg", u32::MAX)], &details, dec!(10), dec!(1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }
}
