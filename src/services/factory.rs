use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    auth::AuthService,
    config::GatewayConfig,
    db::DbPool,
    events::EventSender,
    services::{
        cart::CartService,
        catalog::CatalogService,
        delivery::DeliveryService,
        order_lifecycle::OrderLifecycleService,
        orders::OrderService,
        payments::{PaymentService, VnpayGateway},
        revenue::RevenueService,
        users::UserService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    auth: Arc<AuthService>,
    gateway: GatewayConfig,
    delivery_fee: Decimal,
}

impl ServiceFactory {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        gateway: GatewayConfig,
        delivery_fee: Decimal,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            auth,
            gateway,
            delivery_fee,
        }
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.db_pool.clone())
    }

    pub fn cart_service(&self) -> CartService {
        CartService::new(self.db_pool.clone(), self.catalog_service())
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            self.db_pool.clone(),
            self.cart_service(),
            self.event_sender.clone(),
            self.delivery_fee,
        )
    }

    pub fn payment_service(&self) -> PaymentService {
        PaymentService::new(
            self.db_pool.clone(),
            VnpayGateway::new(self.gateway.clone()),
            self.event_sender.clone(),
        )
    }

    pub fn order_lifecycle_service(&self) -> OrderLifecycleService {
        OrderLifecycleService::new(
            self.db_pool.clone(),
            self.payment_service(),
            self.event_sender.clone(),
        )
    }

    pub fn delivery_service(&self) -> DeliveryService {
        DeliveryService::new(self.db_pool.clone())
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.db_pool.clone(), self.auth.clone())
    }

    pub fn revenue_service(&self) -> RevenueService {
        RevenueService::new(self.db_pool.clone())
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub lifecycle: Arc<OrderLifecycleService>,
    pub delivery: Arc<DeliveryService>,
    pub users: Arc<UserService>,
    pub revenue: Arc<RevenueService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            catalog: Arc::new(factory.catalog_service()),
            cart: Arc::new(factory.cart_service()),
            orders: Arc::new(factory.order_service()),
            payments: Arc::new(factory.payment_service()),
            lifecycle: Arc::new(factory.order_lifecycle_service()),
            delivery: Arc::new(factory.delivery_service()),
            users: Arc::new(factory.user_service()),
            revenue: Arc::new(factory.revenue_service()),
        }
    }
}
