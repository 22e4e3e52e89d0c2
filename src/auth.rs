//! Password hashing, token issuance and the authenticated-user extractor.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, AuthError};
use crate::server::AppState;

/// bcrypt cost used for stored passwords.
pub const DEFAULT_PASSWORD_COST: u32 = 10;

/// Token signing settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    secret: String,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
    /// bcrypt cost for new password hashes.
    pub password_cost: u32,
}

/// Identity carried inside a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUser {
    pub id: i64,
}

/// JWT claims: `{ "user": { "id": ... }, "iat": ..., "exp": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub iat: i64,
    pub exp: i64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            token_ttl,
            password_cost: DEFAULT_PASSWORD_COST,
        }
    }

    /// Issues a signed token for a user, valid for `token_ttl`.
    pub fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        self.issue_token_at(user_id, Utc::now())
    }

    fn issue_token_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            user: TokenUser { id: user_id },
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    /// Verifies signature and expiry, returning the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }

    /// Hashes a password with bcrypt.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(bcrypt::hash(password, self.password_cost)?)
    }
}

/// Checks a password against a stored bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(password, hash)?)
}

/// Extracts the bearer token from an `Authorization` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// The authenticated user of a request.
///
/// Handlers take this as an argument instead of reading tokens themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::MissingToken)?;

        let claims = state.auth.verify_token(token).map_err(|e| {
            log::debug!("Rejected token: {}", e);
            ApiError::InvalidToken
        })?;

        Ok(AuthUser {
            user_id: claims.user.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        let mut config = AuthConfig::new("test-secret", Duration::hours(1));
        config.password_cost = 4;
        config
    }

    #[test]
    fn test_token_round_trip() {
        let config = config();
        let token = config.issue_token(42).unwrap();
        let claims = config.verify_token(&token).unwrap();
        assert_eq!(claims.user, TokenUser { id: 42 });
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_wrong_secret() {
        let token = config().issue_token(1).unwrap();
        let other = AuthConfig::new("another-secret", Duration::hours(1));
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_token_expired() {
        let config = config();
        let issued = Utc::now() - Duration::hours(3);
        let token = config.issue_token_at(7, issued).unwrap();
        assert!(config.verify_token(&token).is_err());
    }

    #[test]
    fn test_token_garbage() {
        assert!(config().verify_token("not.a.token").is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let config = config();
        let hash = config.hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("wrongpassword123", &hash).unwrap());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
