use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::counts_by_status;
use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::client::{
    AggregateArgs, Aggregates, FindManyArgs, GroupByArgs, GroupOrderBy, OrderBy, SortOrder,
};
use crate::domain::{
    BidWhere, ComplianceWhere, CreateProjectRequest, DesignWhere, MaterialWhere, Project,
    ProjectCounts, ProjectDetail, ProjectField, ProjectListQuery, ProjectStats, ProjectUnique,
    ProjectWhere, TaskWhere, UpdateProjectRequest, UserUnique,
};
use crate::error::{ApiError, ApiResult};
use crate::services::cache::keys;

const RECENT_PROJECTS: i64 = 5;

/// Load a project the caller owns (or any project for admins).
pub(crate) async fn authorized_project(
    state: &AppState,
    auth: &AuthContext,
    project_id: Uuid,
) -> ApiResult<Project> {
    let project = state
        .client
        .project()
        .find_unique(ProjectUnique::Id(project_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if !auth.can_access(project.owner_id) {
        return Err(ApiError::forbidden("You don't have access to this project"));
    }
    Ok(project)
}

/// Drop cached reads derived from `project_id` and the portfolio stats.
pub(crate) async fn invalidate_project(state: &AppState, project_id: Uuid) {
    if let Some(cache) = &state.cache {
        let removed = cache.invalidate(&keys::project_pattern(project_id)).await
            + cache.invalidate(keys::stats_pattern()).await;
        tracing::debug!(project_id = %project_id, removed, "Invalidated project cache");
    }
}

/// Create a new project owned by the caller
pub async fn create_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Created<Project>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name is required"));
    }

    tracing::info!(
        user_id = %auth.user_id(),
        project_name = %req.name,
        "Creating project"
    );

    let project = state
        .client
        .project()
        .create(req.into_create(auth.user_id()))
        .await?;

    if let Some(cache) = &state.cache {
        cache.invalidate(keys::stats_pattern()).await;
    }
    Ok(Created(project))
}

/// List the caller's projects, or every project for admins
pub async fn list_projects(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<ProjectListQuery>,
) -> ApiResult<Paginated<Project>> {
    let owner = (!auth.is_admin()).then(|| auth.user_id());
    let filter = query.to_where(owner);

    tracing::debug!(
        user_id = %auth.user_id(),
        page = pagination.page(),
        per_page = pagination.per_page(),
        "Listing projects"
    );

    let total = state.client.project().count(filter.clone()).await?;
    let projects = state
        .client
        .project()
        .find_many(
            FindManyArgs::new()
                .filter(filter)
                .order_by(OrderBy::desc(ProjectField::CreatedAt))
                .skip(pagination.skip())
                .take(pagination.take()),
        )
        .await?;

    Ok(Paginated::new(projects, &pagination, total))
}

/// Status breakdown, total budget and recent projects
pub async fn project_stats(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<DataResponse<ProjectStats>> {
    let owner = (!auth.is_admin()).then(|| auth.user_id());
    let cache_key = keys::project_stats(owner);

    if let Some(cache) = &state.cache {
        if let Some(stats) = cache.get::<ProjectStats>(&cache_key).await {
            return Ok(DataResponse::new(stats));
        }
    }

    let scope = || match owner {
        Some(owner_id) => ProjectWhere::owned_by(owner_id),
        None => ProjectWhere::default(),
    };

    let groups = state
        .client
        .project()
        .group_by(
            GroupByArgs::new(vec![ProjectField::Status], Aggregates::count_all())
                .filter(scope())
                .order_by(GroupOrderBy::key(ProjectField::Status, SortOrder::Asc)),
        )
        .await?;
    let by_status = counts_by_status(&groups);

    let totals = state
        .client
        .project()
        .aggregate(AggregateArgs::new(
            scope(),
            Aggregates {
                sum: vec![ProjectField::Budget],
                ..Aggregates::count_all()
            },
        ))
        .await?;

    let recent = state
        .client
        .project()
        .find_many(
            FindManyArgs::new()
                .filter(scope())
                .order_by(OrderBy::desc(ProjectField::CreatedAt))
                .take(RECENT_PROJECTS),
        )
        .await?;

    let stats = ProjectStats {
        total: totals.count_all(),
        by_status,
        total_budget: totals.sum("budget"),
        recent,
    };

    if let Some(cache) = &state.cache {
        cache.put(&cache_key, &stats).await;
    }
    Ok(DataResponse::new(stats))
}

/// Project with owner and relation counts
pub async fn get_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<ProjectDetail>> {
    let cache_key = keys::project_detail(project_id);

    if let Some(cache) = &state.cache {
        if let Some(detail) = cache.get::<ProjectDetail>(&cache_key).await {
            if !auth.can_access(detail.project.owner_id) {
                return Err(ApiError::forbidden("You don't have access to this project"));
            }
            return Ok(DataResponse::new(detail));
        }
    }

    let project = authorized_project(&state, &auth, project_id).await?;
    let owner = state
        .client
        .user()
        .find_unique_or_throw(UserUnique::Id(project.owner_id))
        .await?;

    let mut bids = state.client.bid();
    let mut materials = state.client.material();
    let mut tasks = state.client.task();
    let mut designs = state.client.design();
    let mut checks = state.client.compliance_check();
    let (bid_count, material_count, task_count, design_count, check_count) = tokio::try_join!(
        bids.count(BidWhere::for_project(project_id)),
        materials.count(MaterialWhere::for_project(project_id)),
        tasks.count(TaskWhere::for_project(project_id)),
        designs.count(DesignWhere::for_project(project_id)),
        checks.count(ComplianceWhere::for_project(project_id)),
    )?;

    let detail = ProjectDetail {
        project,
        owner,
        counts: ProjectCounts {
            bids: bid_count,
            materials: material_count,
            tasks: task_count,
            designs: design_count,
            compliance_checks: check_count,
        },
    };

    if let Some(cache) = &state.cache {
        cache.put(&cache_key, &detail).await;
    }
    Ok(DataResponse::new(detail))
}

pub async fn update_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<DataResponse<Project>> {
    authorized_project(&state, &auth, project_id).await?;
    if matches!(&req.name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::bad_request("Project name cannot be empty"));
    }

    let project = state
        .client
        .project()
        .update(ProjectUnique::Id(project_id), req.into())
        .await?;

    tracing::info!(project_id = %project_id, status = %project.status, "Project updated");
    invalidate_project(&state, project_id).await;
    Ok(DataResponse::new(project))
}

/// Delete a project; bids, materials, tasks and checks go with it
pub async fn delete_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    authorized_project(&state, &auth, project_id).await?;
    state
        .client
        .project()
        .delete(ProjectUnique::Id(project_id))
        .await?;

    tracing::info!(project_id = %project_id, user_id = %auth.user_id(), "Project deleted");
    invalidate_project(&state, project_id).await;
    Ok(NoContent)
}
