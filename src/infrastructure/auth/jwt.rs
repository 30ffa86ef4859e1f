//! JWT validation for caller identity
//!
//! Tokens are issued by an upstream identity provider sharing the HS256
//! secret; this service only needs the `sub` claim. `generate` exists for
//! tests and local tooling.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::user::UserId;
use crate::domain::DomainError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl JwtClaims {
    /// Create new claims for a user valid for `lifetime`
    pub fn new(user_id: &UserId, lifetime: Duration) -> Result<Self, DomainError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| DomainError::internal("Token expiry is out of range"))?;

        Ok(Self {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Get user ID from claims
    pub fn user_id(&self) -> Result<UserId, DomainError> {
        UserId::parse(&self.sub)
            .map_err(|_| DomainError::unauthorized("Token subject is not a valid user ID"))
    }
}

/// Configuration for JWT service
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for HS256 tokens
    pub secret: String,
    /// Lifetime of generated tokens in hours
    pub expiration_hours: u64,
}

impl JwtConfig {
    /// Create new JWT configuration
    pub fn new(secret: impl Into<String>, expiration_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
        }
    }
}

/// JWT service using a shared secret
#[derive(Clone)]
pub struct JwtService {
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("lifetime", &self.lifetime)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service with the given configuration
    ///
    /// Fails when `expiration_hours` does not fit a token lifetime.
    pub fn new(config: JwtConfig) -> Result<Self, DomainError> {
        let lifetime = i64::try_from(config.expiration_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "auth.token_expiration_hours is out of range: {}",
                    config.expiration_hours
                ))
            })?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            lifetime,
            encoding_key,
            decoding_key,
        })
    }

    /// Generate a token for a user
    pub fn generate(&self, user_id: &UserId) -> Result<String, DomainError> {
        let claims = JwtClaims::new(user_id, self.lifetime)?;

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to generate JWT: {}", e)))
    }

    /// Validate a token and return the claims
    pub fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| DomainError::unauthorized(format!("Invalid JWT: {}", e)))?;

        Ok(token_data.claims)
    }
}
