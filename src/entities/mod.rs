pub mod delivery_person;
pub mod order;
pub mod origin;
pub mod product;
pub mod product_detail;
pub mod product_type;
pub mod user;
