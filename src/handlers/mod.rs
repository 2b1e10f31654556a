pub mod cart;
pub mod catalog;
pub mod common;
pub mod delivery;
pub mod orders;
pub mod revenue;
pub mod users;
pub mod vnpay;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
