//! Password hashes and refresh tokens.
//!
//! A refresh token reads `<id>.<secret>`. The id selects the stored row and the
//! secret is checked against its argon2 hash, so the table never holds a
//! usable token.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::client::ClientResult;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Hash a password or token secret into a PHC string with a fresh salt.
pub fn hash_secret(secret: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// A malformed stored hash never matches.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn check_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if password.trim().is_empty() {
        return Err("Password cannot be blank".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub secret: String,
}

impl RefreshToken {
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4(),
            secret: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let (id, secret) = token.trim().split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            id,
            secret: secret.to_string(),
        })
    }
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id.simple(), self.secret)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredRefreshToken {
    pub user_id: Uuid,
    pub secret_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl StoredRefreshToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Store or replace a password hash. Replacing it revokes the user's refresh
/// tokens.
pub async fn set_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    password_hash: &str,
) -> ClientResult<()> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO user_credentials (user_id, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(password_hash)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn password_hash(pool: &PgPool, user_id: Uuid) -> ClientResult<Option<String>> {
    let hash = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM user_credentials WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(hash)
}

pub async fn store_refresh_token(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    secret_hash: &str,
    expires_at: DateTime<Utc>,
) -> ClientResult<()> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, secret_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(secret_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_refresh_token(
    pool: &PgPool,
    id: Uuid,
) -> ClientResult<Option<StoredRefreshToken>> {
    let token = sqlx::query_as::<_, StoredRefreshToken>(
        "SELECT user_id, secret_hash, expires_at, revoked FROM refresh_tokens WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(token)
}

/// Revoke a live token of `user_id`. Returns false when it was already revoked
/// or belongs to someone else, so each token is spent at most once.
pub async fn revoke_refresh_token(pool: &PgPool, id: Uuid, user_id: Uuid) -> ClientResult<bool> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND user_id = $2 AND NOT revoked",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn hashed_secrets_verify_only_against_the_original() {
        let hash = hash_secret("concrete-grade-30").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("concrete-grade-30", &hash));
        assert!(!verify_secret("concrete-grade-35", &hash));
        assert!(!verify_secret("concrete-grade-30", "not-a-phc-string"));
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(check_password("short").is_err());
        assert!(check_password("         ").is_err());
        assert!(check_password("site-office-1").is_ok());
    }

    #[test]
    fn refresh_token_text_parses_back() {
        let token = RefreshToken::generate();
        let text = token.to_string();
        assert_eq!(RefreshToken::parse(&text), Some(token));

        assert!(RefreshToken::parse("no-separator").is_none());
        assert!(RefreshToken::parse("not-a-uuid.secret").is_none());
        assert!(RefreshToken::parse(&format!("{}.", Uuid::new_v4().simple())).is_none());
    }

    #[test]
    fn revoked_or_expired_tokens_are_unusable() {
        let now = Utc::now();
        let mut stored = StoredRefreshToken {
            user_id: Uuid::new_v4(),
            secret_hash: String::new(),
            expires_at: now + Duration::days(7),
            revoked: false,
        };
        assert!(stored.is_usable(now));

        stored.revoked = true;
        assert!(!stored.is_usable(now));

        stored.revoked = false;
        stored.expires_at = now - Duration::seconds(1);
        assert!(!stored.is_usable(now));
    }
}
