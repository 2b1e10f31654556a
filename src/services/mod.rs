// Catalog and cart
pub mod cart;
pub mod catalog;

// Order placement, payment and lifecycle
pub mod order_lifecycle;
pub mod orders;
pub mod payments;

// Back office
pub mod delivery;
pub mod revenue;
pub mod users;

// Service factory for dependency injection
pub mod factory;
