use crate::{
    db::DbPool,
    entities::user::{self, CartData},
    errors::ServiceError,
    services::catalog::{CatalogService, SizeInput},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Maintains the per-user cart stored on the user record
#[derive(Clone)]
pub struct CartService {
    db_pool: Arc<DbPool>,
    catalog: CatalogService,
}

impl CartService {
    pub fn new(db_pool: Arc<DbPool>, catalog: CatalogService) -> Self {
        Self { db_pool, catalog }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "Failed to load user");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    async fn save(&self, user_id: Uuid, cart: CartData) -> Result<CartData, ServiceError> {
        let updated = user::ActiveModel {
            id: Set(user_id),
            cart_data: Set(cart),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "Failed to save cart");
            ServiceError::DatabaseError(e)
        })?;
        Ok(updated.cart_data)
    }

    fn canonical(size: &SizeInput) -> Result<String, ServiceError> {
        size.canonical().ok_or_else(|| {
            ServiceError::ValidationError(format!("Invalid size \"{}\"", size.raw()))
        })
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartData, ServiceError> {
        Ok(self.load_user(user_id).await?.cart_data)
    }

    /// Adds one unit of a product size after checking it against the catalog
    #[instrument(skip(self, size))]
    pub async fn add(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        size: &SizeInput,
    ) -> Result<CartData, ServiceError> {
        let size = Self::canonical(size)?;

        let detail = self
            .catalog
            .find_detail(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        if !detail.available {
            return Err(ServiceError::BadRequest(
                "Product is not available".to_string(),
            ));
        }
        if !detail.sizes.offers(&size) {
            return Err(ServiceError::BadRequest(
                "This size is not available for this product".to_string(),
            ));
        }

        let mut cart = self.load_user(user_id).await?.cart_data;
        let quantity = cart.increment(&product_id.to_string(), &size);
        let cart = self.save(user_id, cart).await?;

        info!(%user_id, %product_id, %size, quantity, "Added to cart");
        Ok(cart)
    }

    /// Sets the quantity of a product size; zero removes it
    #[instrument(skip(self, size))]
    pub async fn update(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        size: &SizeInput,
        quantity: u32,
    ) -> Result<CartData, ServiceError> {
        let size = Self::canonical(size)?;
        let mut cart = self.load_user(user_id).await?.cart_data;
        cart.set(&product_id.to_string(), &size, quantity);
        self.save(user_id, cart).await
    }

    #[instrument(skip(self, size))]
    pub async fn remove(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        size: &SizeInput,
    ) -> Result<CartData, ServiceError> {
        let size = Self::canonical(size)?;
        let mut cart = self.load_user(user_id).await?.cart_data;
        if !cart.remove(&product_id.to_string(), &size) {
            return Err(ServiceError::NotFound(
                "Item not found in cart".to_string(),
            ));
        }
        self.save(user_id, cart).await
    }

    /// Empties the cart. A write of its own, separate from any order insert.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.save(user_id, CartData::default()).await.map(|_| ())
    }
}
