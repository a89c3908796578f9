//! Password sign-up and sign-in, issuing an access JWT and a rotating refresh
//! token.

use axum::{body::Bytes, extract::State, Json};
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::users::validate_email;
use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::credentials::{self, RefreshToken};
use crate::auth::RequireAuth;
use crate::domain::{
    AuthResponse, RefreshTokenRequest, SignInRequest, SignOutRequest, SignUpRequest, User,
    UserCreate, UserUnique,
};
use crate::error::{ApiError, ApiResult};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

async fn hash_secret(secret: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || credentials::hash_secret(&secret))
        .await
        .map_err(|e| ApiError::internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| ApiError::internal(e.to_string()))
}

async fn verify_secret(secret: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || credentials::verify_secret(&secret, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("Hashing task failed: {}", e)))
}

/// Check and hash an optional new password.
pub(crate) async fn new_password_hash(password: Option<String>) -> ApiResult<Option<String>> {
    match password {
        Some(password) => {
            credentials::check_password(&password).map_err(ApiError::bad_request)?;
            Ok(Some(hash_secret(password).await?))
        }
        None => Ok(None),
    }
}

/// Create a user and, when given, its password in one transaction.
pub(crate) async fn create_account(
    state: &AppState,
    data: UserCreate,
    password_hash: Option<String>,
) -> ApiResult<User> {
    let user = state
        .client
        .transaction(state.client.transaction_defaults(), move |tx| {
            Box::pin(async move {
                let user = tx.user().create(data).await?;
                if let Some(hash) = &password_hash {
                    credentials::set_password(tx.connection(), user.id, hash).await?;
                }
                Ok(user)
            })
        })
        .await?;
    Ok(user)
}

async fn issue_session(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = state
        .jwt
        .issue(&user)
        .map_err(|e| ApiError::internal(format!("Failed to issue token: {}", e)))?;

    let refresh = RefreshToken::generate();
    let secret_hash = hash_secret(refresh.secret.clone()).await?;
    let expires_at = Utc::now() + Duration::days(state.settings.refresh_token_ttl_days);
    credentials::store_refresh_token(
        state.client.pool(),
        refresh.id,
        user.id,
        &secret_hash,
        expires_at,
    )
    .await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh.to_string(),
        token_type: "Bearer",
        expires_in: state.jwt.ttl_seconds(),
        user,
    })
}

/// Register a password account
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> ApiResult<Created<AuthResponse>> {
    validate_email(&req.email)?;
    req.validate().map_err(ApiError::bad_request)?;

    let hash = new_password_hash(Some(req.password.clone())).await?;
    let user = create_account(&state, req.to_create(), hash).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User signed up");
    Ok(Created(issue_session(&state, user).await?))
}

/// Sign in with email and password
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> ApiResult<DataResponse<AuthResponse>> {
    let user = state
        .client
        .user()
        .find_unique(UserUnique::Email(req.email.trim().to_lowercase()))
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;
    let hash = credentials::password_hash(state.client.pool(), user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    if !verify_secret(req.password, hash).await? {
        tracing::warn!(user_id = %user.id, "Sign-in rejected");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    tracing::info!(user_id = %user.id, "User signed in");
    Ok(DataResponse::new(issue_session(&state, user).await?))
}

/// Trade a refresh token for a new token pair; the old one is spent
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> ApiResult<DataResponse<AuthResponse>> {
    let token = RefreshToken::parse(&req.refresh_token)
        .ok_or_else(|| ApiError::unauthorized(INVALID_REFRESH_TOKEN))?;
    let stored = credentials::find_refresh_token(state.client.pool(), token.id)
        .await?
        .filter(|stored| stored.is_usable(Utc::now()))
        .ok_or_else(|| ApiError::unauthorized(INVALID_REFRESH_TOKEN))?;

    if !verify_secret(token.secret, stored.secret_hash).await? {
        return Err(ApiError::unauthorized(INVALID_REFRESH_TOKEN));
    }
    if !credentials::revoke_refresh_token(state.client.pool(), token.id, stored.user_id).await? {
        tracing::warn!(user_id = %stored.user_id, "Refresh token replayed");
        return Err(ApiError::unauthorized(INVALID_REFRESH_TOKEN));
    }

    let user = state
        .client
        .user()
        .find_unique(UserUnique::Id(stored.user_id))
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_REFRESH_TOKEN))?;

    Ok(DataResponse::new(issue_session(&state, user).await?))
}

/// Sign out, revoking the given refresh token
pub async fn sign_out(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<NoContent> {
    let req: SignOutRequest = if body.is_empty() {
        SignOutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    if let Some(token) = req.refresh_token.as_deref().and_then(RefreshToken::parse) {
        let revoked =
            credentials::revoke_refresh_token(state.client.pool(), token.id, auth.user_id())
                .await?;
        tracing::debug!(user_id = %auth.user_id(), revoked, "Refresh token revoked on sign-out");
    }

    tracing::info!(user_id = %auth.user_id(), "User signed out");
    Ok(NoContent)
}
