//! # Auth Module
//!
//! Password hashing, access token issuance/verification, and the
//! [`AuthedUser`] extractor that resolves the caller's user id for
//! protected routes.
//!
//! Handlers and services never parse credentials themselves: the
//! extractor turns the `Authorization: Bearer <token>` header into an
//! opaque user id, and everything downstream works with that id.

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ApiResponse;
use crate::AppState;

/// Auth-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The bearer token is missing, malformed, or expired.
    #[error("Invalid authentication credentials")]
    InvalidToken,

    /// Password hashing or verification failed.
    #[error("Password hashing failed: {0}")]
    Hash(String),

    /// Token creation failed.
    #[error("Token creation failed: {0}")]
    Token(String),
}

/// JWT claims carried by an access token.
///
/// `sub` is the user id; the backend never puts the email or any
/// other PII into tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params =
        Params::new(65536, 8, 4, Some(32)).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash string.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hasher()?
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Issue an access token for a user (HS256).
pub fn create_token(
    user_id: Uuid,
    secret: &str,
    expiry_minutes: i64,
) -> Result<String, AuthError> {
    let exp = (Utc::now() + chrono::Duration::minutes(expiry_minutes)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Token(e.to_string()))
}

/// Decode a token and return the user id it was issued for.
///
/// Rejects expired tokens and bad signatures.
pub fn decode_user_id(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::InvalidToken)?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)
}

/// The authenticated caller of a request.
///
/// Extracted from the `Authorization: Bearer` header on every
/// protected route. Handlers take `AuthedUser` as a parameter and get
/// a verified `user_id`, or the request fails with 401 before the
/// handler runs.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser {
    pub user_id: Uuid,
}

impl FromRequest for AuthedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthedUser, actix_web::Error> {
    let state = req
        .app_data::<web::Data<Arc<AppState>>>()
        .ok_or_else(|| unauthorized("Application state missing"))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Expected a bearer token"))?;

    let user_id = decode_user_id(token, &state.config.jwt_secret)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    Ok(AuthedUser { user_id })
}

fn unauthorized(message: &str) -> actix_web::Error {
    InternalError::from_response(
        message.to_string(),
        HttpResponse::Unauthorized().json(ApiResponse::<()>::error("UNAUTHORIZED", message)),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "test-secret", 60).unwrap();
        assert_eq!(decode_user_id(&token, "test-secret").unwrap(), user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(Uuid::new_v4(), "secret-a", 60).unwrap();
        assert!(decode_user_id(&token, "secret-b").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token(Uuid::new_v4(), "test-secret", -120).unwrap();
        assert!(decode_user_id(&token, "test-secret").is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2!").unwrap();
        assert_ne!(hash, "hunter2!");
        assert!(verify_password("hunter2!", &hash).unwrap());
        assert!(!verify_password("hunter3!", &hash).unwrap());
    }
}
