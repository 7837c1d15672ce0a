//! Bearer-token authentication for the storefront API.
//!
//! Only the surface the order engine needs lives here: HS256 token
//! issuance for freshly minted identities and a request extractor that
//! resolves the bearer token to an identity row. Registration, password
//! reset and the rest of credential management are handled elsewhere.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::{identity, Identity},
    errors::ServiceError,
    AppState,
};

/// Claim structure for issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id
    pub sub: String,
    /// Token id
    pub jti: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Token signing and verification.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    expiration_secs: u64,
}

impl AuthService {
    pub fn new(secret: impl Into<String>, expiration_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_secs,
        }
    }

    /// Issues a bearer token for the given identity.
    pub fn issue_token(&self, identity_id: Uuid) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiration_secs as i64,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token signing failed: {}", e)))
    }

    /// Verifies a bearer token and returns the identity id it names.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, ServiceError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ServiceError::Unauthorized("invalid token".into()))?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".into()))
    }
}

/// The caller's identity, loaded fresh from the database on every request so
/// a just-promoted guest immediately acts as a permanent account.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub identity::Model);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentIdentity {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".into()))?;

        let identity_id = state.auth.verify_token(token)?;

        let identity = Identity::find_by_id(identity_id)
            .one(&*state.db)
            .await?
            .filter(|i| i.is_active)
            .ok_or_else(|| ServiceError::Unauthorized("unknown identity".into()))?;

        Ok(CurrentIdentity(identity))
    }
}

/// Hashes a credential with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

/// Generates a throwaway alphanumeric credential.
pub fn generate_password(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_round_trip() {
        let auth = AuthService::new("test-secret-test-secret-test-secret!", 3600);
        let id = Uuid::new_v4();
        let token = auth.issue_token(id).unwrap();
        assert_eq!(auth.verify_token(&token).unwrap(), id);
    }

    #[test]
    fn foreign_tokens_are_rejected() {
        let auth = AuthService::new("test-secret-test-secret-test-secret!", 3600);
        let other = AuthService::new("other-secret-other-secret-other-sec!", 3600);
        let token = other.issue_token(Uuid::new_v4()).unwrap();
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn generated_passwords_have_requested_length() {
        assert_eq!(generate_password(12).len(), 12);
    }
}
