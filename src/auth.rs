//! Password hashing, bearer tokens and institutional email checks.

use crate::orm::users::{self, Role};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, DbErr, EntityTrait};
use serde::{Deserialize, Serialize};

/// Hash a plaintext password into a PHC string (argon2id, random salt).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Check a plaintext password against a stored hash.
/// Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// True when `email` belongs to `domain`, ignoring case.
pub fn validate_institutional_email(email: &str, domain: &str) -> bool {
    let email = email.trim().to_lowercase();
    let suffix = format!("@{}", domain.trim().trim_start_matches('@').to_lowercase());
    email.len() > suffix.len() && email.ends_with(&suffix)
}

/// Token payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HMAC keys and lifetime for bearer tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a signed token for a user with the configured lifetime.
    pub fn generate_token(&self, user: &users::Model) -> Result<String, jsonwebtoken::errors::Error> {
        self.generate_token_with_ttl(user.id, &user.email, user.role, self.ttl)
    }

    pub fn generate_token_with_ttl(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            email: email.to_owned(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Signature and expiry check. Returns None for anything invalid.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                log::debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

/// Resolve a bearer token to an active user.
pub async fn resolve_user(
    db: &DatabaseConnection,
    keys: &TokenKeys,
    token: &str,
) -> Result<Option<users::Model>, DbErr> {
    let claims = match keys.verify_token(token) {
        Some(claims) => claims,
        None => return Ok(None),
    };

    let user = users::Entity::find_by_id(claims.user_id).one(db).await?;
    Ok(user.filter(|u| u.is_active))
}
