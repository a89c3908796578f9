//! HS256 access token issuing and verification.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use thiserror::Error;

use super::Claims;
use crate::domain::User;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("Token verification failed: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_seconds: i64,
}

/// Signing and verification keys shared across requests
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<Keys>,
}

impl JwtKeys {
    pub fn new(secret: &str, issuer: &str, ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;

        Self {
            inner: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
                issuer: issuer.to_string(),
                ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
            }),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.inner.issuer
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.inner.ttl_seconds
    }

    /// Issue an access token for `user`, valid for the configured TTL.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            iss: self.inner.issuer.clone(),
            iat: now,
            exp: now.saturating_add(self.inner.ttl_seconds),
            email: Some(user.email.clone()),
            role: Some(user.role.as_str().to_string()),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.inner.encoding)
            .map_err(TokenError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.inner.decoding, &self.inner.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "site@example.com".into(),
            name: Some("Site Manager".into()),
            role: Role::Contractor,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new("secret", "sitebuild", 900);
        let user = user();
        let token = keys.issue(&user).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.iss, "sitebuild");
        assert_eq!(claims.role.as_deref(), Some("CONTRACTOR"));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn wrong_secret_or_issuer_is_rejected() {
        let token = JwtKeys::new("secret", "sitebuild", 900)
            .issue(&user())
            .unwrap();

        assert!(JwtKeys::new("other", "sitebuild", 900).verify(&token).is_err());
        assert!(JwtKeys::new("secret", "elsewhere", 900).verify(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = JwtKeys::new("secret", "sitebuild", 900);
        let now = Utc::now().timestamp();
        let token = keys
            .sign(&Claims {
                sub: Uuid::new_v4().to_string(),
                iss: "sitebuild".into(),
                iat: now - 7200,
                exp: now - 3600,
                email: None,
                role: None,
            })
            .unwrap();

        assert!(keys.verify(&token).is_err());
    }
}
