use crate::{
    auth::AuthService,
    db::DbPool,
    entities::user::{self, CartData},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const MIN_PASSWORD_LENGTH: u64 = 8;

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("First name and last name are required".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom = "validate_not_blank")]
    pub first_name: String,
    #[validate(custom = "validate_not_blank")]
    pub last_name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Please enter a strong password"))]
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account registration, login and admin lock control
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up user by email");
                ServiceError::DatabaseError(e)
            })
    }

    /// Creates an account and returns it with a fresh user token
    #[instrument(skip(self, request))]
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<(user::Model, String), ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let password_hash = self.auth.hash_password(&request.password)?;
        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            phone: Set(request.phone),
            address: Set(None),
            cart_data: Set(CartData::default()),
            is_locked: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        let token = self.auth.issue_user_token(created.id)?;
        info!(user_id = %created.id, "User registered");
        Ok((created, token))
    }

    /// Checks credentials and returns a user token
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<String, ServiceError> {
        let email = request.email.trim().to_lowercase();
        let Some(user) = self.find_by_email(&email).await? else {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        };

        if !self.auth.verify_password(&request.password, &user.password_hash) {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }
        if user.is_locked {
            return Err(ServiceError::AccountLocked);
        }

        info!(user_id = %user.id, "User logged in");
        Ok(self.auth.issue_user_token(user.id)?)
    }

    pub fn admin_login(&self, request: &LoginRequest) -> Result<String, ServiceError> {
        Ok(self
            .auth
            .issue_admin_token(request.email.trim(), &request.password)?)
    }

    /// Every account, newest first
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list users");
                ServiceError::DatabaseError(e)
            })
    }

    /// Flips the lock flag and returns the updated account
    #[instrument(skip(self))]
    pub async fn toggle_lock(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "Failed to load user");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        let locked = !user.is_locked;
        let mut active: user::ActiveModel = user.into();
        active.is_locked = Set(locked);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, %user_id, "Failed to toggle user lock");
            ServiceError::DatabaseError(e)
        })?;

        info!(%user_id, locked, "User lock toggled");
        Ok(updated)
    }
}
