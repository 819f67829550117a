//! Bearer-token authentication for customers and admins.
//!
//! Secrets (customer passwords, admin codes) are stored as argon2 PHC strings; tokens
//! are HS256 JWTs carrying the principal id and kind.

pub mod extractors;

use crate::{config::AppConfig, errors::ServiceError, models::UserType};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

pub use extractors::{AdminPrincipal, AnyPrincipal, CustomerPrincipal};

/// Claim structure for issued tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_type: UserType,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ServiceError::Unauthorized("missing bearer token".into()),
            AuthError::InvalidToken => ServiceError::Unauthorized("invalid token".into()),
            AuthError::TokenExpired => ServiceError::Unauthorized("token has expired".into()),
            AuthError::InvalidCredentials => {
                ServiceError::Unauthorized("invalid credentials".into())
            }
            AuthError::TokenCreation(e) => ServiceError::JwtError(e),
            AuthError::Hash(e) => ServiceError::HashError(e),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    token_lifetime: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_lifetime", &self.token_lifetime)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>, token_lifetime: Duration) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_lifetime,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.clone(), config.jwt_expiration())
    }

    /// Hashes a password or admin code with a fresh salt on the blocking pool.
    pub async fn hash_secret(&self, secret: &str) -> Result<String, AuthError> {
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || hash_blocking(&secret))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
    }

    /// False for a wrong secret and for a stored hash that does not parse.
    pub async fn verify_secret(&self, secret: &str, stored_hash: &str) -> bool {
        let secret = secret.to_owned();
        let stored_hash = stored_hash.to_owned();
        match tokio::task::spawn_blocking(move || verify_blocking(&secret, &stored_hash)).await {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, "Secret verification task failed");
                false
            }
        }
    }

    pub fn issue_token(&self, subject: Uuid, user_type: UserType) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.token_lifetime)
            .map_err(|_| AuthError::TokenCreation("invalid token lifetime".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            user_type,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };
        Ok(IssuedToken {
            token: self.encode_claims(&claims)?,
            token_type: "Bearer".to_string(),
            expires_in: self.token_lifetime.as_secs(),
        })
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}

// argon2 is CPU-bound; callers reach these through spawn_blocking.
fn hash_blocking(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_blocking(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored secret hash is not a valid PHC string");
            false
        }
    }
}
