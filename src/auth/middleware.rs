use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::AuthContext;
use crate::app::AppState;
use crate::domain::{Role, UserUnique};
use crate::error::{ApiError, ErrorResponse};

/// Extractor that requires a valid bearer token for an existing user
///
/// Example:
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user_id())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extractor that additionally requires the `ADMIN` role
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthContext);

impl std::ops::Deref for RequireAdmin {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken(String),
    UnknownUser,
    Forbidden(Role),
    Lookup(ApiError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::Lookup(err) => return err.into_response(),
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Rejected token");
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Invalid or expired token",
                )
            }
            AuthError::UnknownUser => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "User no longer exists",
            ),
            AuthError::Forbidden(role) => {
                tracing::debug!(role = %role, "Role lacks admin access");
                (StatusCode::FORBIDDEN, "FORBIDDEN", "Admin role required")
            }
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Pull the bearer token out of the `Authorization` header.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            AuthError::InvalidToken(e.to_string())
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            tracing::warn!(sub = %claims.sub, "Token subject is not a user id");
            AuthError::InvalidToken("Invalid user ID in token".to_string())
        })?;

        let user = state
            .client
            .user()
            .find_unique(UserUnique::Id(user_id))
            .await
            .map_err(|e| AuthError::Lookup(e.into()))?
            .ok_or(AuthError::UnknownUser)?;

        tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
        Ok(RequireAuth(AuthContext::new(user, claims)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(context) = RequireAuth::from_request_parts(parts, state).await?;
        if !context.is_admin() {
            tracing::warn!(user_id = %context.user_id(), "Admin route denied");
            return Err(AuthError::Forbidden(context.role()));
        }
        Ok(RequireAdmin(context))
    }
}
