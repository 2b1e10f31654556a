/*!
 * # Authentication
 *
 * Shoppers authenticate with a JWT whose subject is their user id, sent either
 * in the `token` header or as `Authorization: Bearer <jwt>`. Back-office calls
 * carry a separately issued admin token that is only minted for the configured
 * admin credentials.
 *
 * Passwords are hashed with argon2.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::entities::user;
use crate::errors::ServiceError;

const ADMIN_ROLE: &str = "admin";
const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Claims carried by a shopper token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by an admin token
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated shopper, placed in request extensions by [`user_auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Authenticated back-office caller, placed in request extensions by [`admin_auth_middleware`]
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    NotAdmin,

    #[error("User not found")]
    UserNotFound,

    #[error("Account locked")]
    AccountLocked,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials
            | AuthError::UserNotFound => ServiceError::Unauthorized(err.to_string()),
            AuthError::NotAdmin => ServiceError::Forbidden(err.to_string()),
            AuthError::AccountLocked => ServiceError::AccountLocked,
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            AuthError::Hashing(msg) => ServiceError::HashError(msg),
            AuthError::Database(e) => ServiceError::DatabaseError(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Token issuance, verification and password hashing
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.config.jwt_secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.config.jwt_secret.as_bytes())
    }

    /// Issue a shopper token for `user_id`
    pub fn issue_user_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.config.token_ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key())
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a shopper token and return the user id it names
    pub fn validate_user_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key(), &Validation::new(Algorithm::HS256))
            .map_err(map_jwt_error)?
            .claims;

        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)
    }

    /// Issue an admin token when `email`/`password` match the configured admin
    pub fn issue_admin_token(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email_ok = secrets_match(&self.config.admin_email, email);
        let password_ok = secrets_match(&self.config.admin_password, password);
        if self.config.admin_email.is_empty() || !(email_ok & password_ok) {
            warn!("Rejected admin login");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now().timestamp();
        let claims = AdminClaims {
            email: email.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now,
            exp: now + ADMIN_TOKEN_TTL.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key())
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate an admin token against the configured admin identity
    pub fn validate_admin_token(&self, token: &str) -> Result<AdminUser, AuthError> {
        let claims =
            decode::<AdminClaims>(token, &self.decoding_key(), &Validation::new(Algorithm::HS256))
                .map_err(map_jwt_error)?
                .claims;

        if claims.role != ADMIN_ROLE
            || self.config.admin_email.is_empty()
            || claims.email != self.config.admin_email
        {
            return Err(AuthError::NotAdmin);
        }

        Ok(AdminUser {
            email: claims.email,
        })
    }

    /// Resolve a shopper token to an unlocked user
    pub async fn authenticate_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        let user_id = self.validate_user_token(token)?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!("Failed to load user {}: {}", user_id, e);
                AuthError::Database(e)
            })?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_locked {
            debug!(%user_id, "Locked account refused");
            return Err(AuthError::AccountLocked);
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    }
}

/// Reads the token from the `token` header, falling back to `Authorization: Bearer`
/// Compares two secrets in time independent of where they differ. Both sides
/// are digested first so their lengths are not observable either.
fn secrets_match(expected: &str, given: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let given = Sha256::digest(given.as_bytes());
    expected
        .iter()
        .zip(given.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get("token")
        .or_else(|| headers.get(header::AUTHORIZATION))
        .and_then(|v| v.to_str().ok())?
        .trim();

    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Authenticates a shopper and inserts [`AuthUser`] into the request
pub async fn user_auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let user = auth.authenticate_user(&token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Authenticates an admin and inserts [`AdminUser`] into the request
pub async fn admin_auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(request.headers()).ok_or(AuthError::MissingToken)?;
    let admin = auth.validate_admin_token(&token)?;
    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_user_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_admin_auth(self, auth: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_user_auth(self, auth: Arc<AuthService>) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            auth,
            user_auth_middleware,
        ))
    }

    fn with_admin_auth(self, auth: Arc<AuthService>) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            auth,
            admin_auth_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig {
                jwt_secret: "k3Jq9vLx2mPz8RtY4wNc7HbF6dGs1aEu".into(),
                token_ttl: Duration::from_secs(3600),
                admin_email: "admin@orchard.test".into(),
                admin_password: "orchard-admin".into(),
            },
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    #[test]
    fn user_token_round_trips_subject() {
        let auth = service();
        let user_id = Uuid::new_v4();
        let token = auth.issue_user_token(user_id).unwrap();
        assert_eq!(auth.validate_user_token(&token).unwrap(), user_id);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let auth = service();
        let mut other = service();
        other.config.jwt_secret = "a-completely-different-signing-secret".into();
        let token = other.issue_user_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            auth.validate_user_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn admin_token_requires_configured_credentials() {
        let auth = service();
        assert!(matches!(
            auth.issue_admin_token("admin@orchard.test", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));

        let token = auth
            .issue_admin_token("admin@orchard.test", "orchard-admin")
            .unwrap();
        let admin = auth.validate_admin_token(&token).unwrap();
        assert_eq!(admin.email, "admin@orchard.test");
    }

    #[test]
    fn admin_login_rejects_near_miss_credentials() {
        let auth = service();
        for (email, password) in [
            ("admin@orchard.test", "orchard-admi"),
            ("admin@orchard.test", "orchard-admin "),
            ("admin@orchard.tes", "orchard-admin"),
            ("", ""),
        ] {
            assert!(matches!(
                auth.issue_admin_token(email, password),
                Err(AuthError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn secrets_match_compares_whole_values() {
        assert!(secrets_match("orchard-admin", "orchard-admin"));
        assert!(!secrets_match("orchard-admin", "orchard-admin2"));
        assert!(!secrets_match("orchard-admin", "Orchard-admin"));
        assert!(!secrets_match("orchard-admin", ""));
    }

    #[test]
    fn user_token_is_not_an_admin_token() {
        let auth = service();
        let token = auth.issue_user_token(Uuid::new_v4()).unwrap();
        assert!(auth.validate_admin_token(&token).is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let auth = service();
        let hash = auth.hash_password("ripe-mangoes-42").unwrap();
        assert!(auth.verify_password("ripe-mangoes-42", &hash));
        assert!(!auth.verify_password("ripe-mangoes-43", &hash));
        assert!(!auth.verify_password("ripe-mangoes-42", "not-a-hash"));
    }

    #[test]
    fn token_header_takes_precedence_and_bearer_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-authorization"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-authorization"));

        headers.insert("token", HeaderValue::from_static("from-token-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-token-header"));

        let empty = HeaderMap::new();
        assert!(extract_token(&empty).is_none());
    }
}
