use crate::{db::DbPool, entities::delivery_person, errors::ServiceError};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDeliveryPersonRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

/// Delivery staff records used by order assignment
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        request: CreateDeliveryPersonRequest,
    ) -> Result<delivery_person::Model, ServiceError> {
        request.validate()?;
        if request.name.trim().is_empty() || request.phone.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Name and phone are required".to_string(),
            ));
        }

        let now = Utc::now();
        let person = delivery_person::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            phone: Set(request.phone.trim().to_string()),
            email: Set(request.email.trim().to_lowercase()),
            address: Set(request.address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create delivery person");
            ServiceError::DatabaseError(e)
        })?;

        info!(delivery_person_id = %person.id, "Delivery person created");
        Ok(person)
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<delivery_person::Model>, ServiceError> {
        delivery_person::Entity::find()
            .order_by_desc(delivery_person::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list delivery persons");
                ServiceError::DatabaseError(e)
            })
    }
}
