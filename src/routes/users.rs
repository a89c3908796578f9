use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{create_account, new_password_hash};
use super::projects::invalidate_project;
use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{credentials, AuthContext, RequireAdmin, RequireAuth};
use crate::client::{FindManyArgs, ListRelationFilter, OrderBy};
use crate::domain::{
    BidWhere, CreateUserRequest, ProjectWhere, UpdateUserRequest, User, UserField, UserListQuery,
    UserUnique, UserUpdate,
};
use crate::error::{ApiError, ApiResult};

fn ensure_self_or_admin(auth: &AuthContext, user_id: Uuid) -> ApiResult<()> {
    if auth.is_admin() || auth.user_id() == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only access your own account"))
    }
}

pub(crate) fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("A valid email is required")),
    }
}

/// Projects whose cached detail or bid summary embeds this user's data
fn projects_involving(user_id: Uuid) -> ProjectWhere {
    ProjectWhere {
        or: Some(vec![
            ProjectWhere::owned_by(user_id),
            ProjectWhere {
                bids: Some(ListRelationFilter::some(BidWhere::by_bidder(user_id))),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

/// Ids of the projects matching `filter`; empty when caching is off.
async fn cached_project_ids(state: &AppState, filter: ProjectWhere) -> ApiResult<Vec<Uuid>> {
    if state.cache.is_none() {
        return Ok(Vec::new());
    }
    let projects = state
        .client
        .project()
        .find_many(FindManyArgs::new().filter(filter))
        .await?;
    Ok(projects.into_iter().map(|p| p.id).collect())
}

async fn invalidate_projects(state: &AppState, project_ids: &[Uuid]) {
    for project_id in project_ids {
        invalidate_project(state, *project_id).await;
    }
}

/// List users (admin only)
pub async fn list_users(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Paginated<User>> {
    let filter = query.to_where();

    tracing::debug!(admin_id = %admin.user_id(), "Listing users");

    let total = state.client.user().count(filter.clone()).await?;
    let users = state
        .client
        .user()
        .find_many(
            FindManyArgs::new()
                .filter(filter)
                .order_by(OrderBy::asc(UserField::Email))
                .skip(pagination.skip())
                .take(pagination.take()),
        )
        .await?;

    Ok(Paginated::new(users, &pagination, total))
}

/// Create a user (admin only)
pub async fn create_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<CreateUserRequest>,
) -> ApiResult<Created<User>> {
    validate_email(&req.email)?;
    let password_hash = new_password_hash(req.password.take()).await?;

    let user = create_account(&state, req.into(), password_hash).await?;

    tracing::info!(
        admin_id = %admin.user_id(),
        user_id = %user.id,
        role = %user.role,
        "User created"
    );
    Ok(Created(user))
}

pub async fn get_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<DataResponse<User>> {
    ensure_self_or_admin(&auth, user_id)?;

    let user = state
        .client
        .user()
        .find_unique(UserUnique::Id(user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(DataResponse::new(user))
}

/// Update a profile; changing the role needs admin
pub async fn update_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(mut req): Json<UpdateUserRequest>,
) -> ApiResult<DataResponse<User>> {
    ensure_self_or_admin(&auth, user_id)?;
    if req.role.is_some() && !auth.is_admin() {
        return Err(ApiError::forbidden("Only admins can change roles"));
    }
    if let Some(email) = &req.email {
        validate_email(email)?;
    }

    let password_hash = new_password_hash(req.password.take()).await?;
    let data = UserUpdate::from(req);

    let user = state
        .client
        .transaction(state.client.transaction_defaults(), move |tx| {
            Box::pin(async move {
                let user = tx.user().update(UserUnique::Id(user_id), data).await?;
                if let Some(hash) = &password_hash {
                    credentials::set_password(tx.connection(), user_id, hash).await?;
                }
                Ok(user)
            })
        })
        .await?;

    tracing::info!(user_id = %user_id, updated_by = %auth.user_id(), "User updated");
    let owned = cached_project_ids(&state, ProjectWhere::owned_by(user_id)).await?;
    invalidate_projects(&state, &owned).await;
    Ok(DataResponse::new(user))
}

/// Delete a user (admin only); owned projects and placed bids go with it
pub async fn delete_user(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    if admin.user_id() == user_id {
        return Err(ApiError::bad_request("Admins cannot delete their own account"));
    }
    // Collected first: owned projects and placed bids cascade with the user.
    let affected = cached_project_ids(&state, projects_involving(user_id)).await?;
    state.client.user().delete(UserUnique::Id(user_id)).await?;

    tracing::info!(
        admin_id = %admin.user_id(),
        user_id = %user_id,
        projects = affected.len(),
        "User deleted"
    );
    invalidate_projects(&state, &affected).await;
    if let Some(cache) = &state.cache {
        cache.invalidate(crate::services::cache::keys::stats_pattern()).await;
    }
    Ok(NoContent)
}
