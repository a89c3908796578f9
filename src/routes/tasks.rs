use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::projects::{authorized_project, invalidate_project};
use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::client::{FindManyArgs, NullsOrder, OrderBy, ScalarFilter};
use crate::domain::{
    CreateTaskRequest, Task, TaskField, TaskListQuery, TaskUnique, TaskWhere, UpdateTaskRequest,
    UserUnique,
};
use crate::error::{ApiError, ApiResult};

async fn ensure_assignee(state: &AppState, assignee_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(id) = assignee_id {
        let exists = state
            .client
            .user()
            .find_unique(UserUnique::Id(id))
            .await?
            .is_some();
        if !exists {
            return Err(ApiError::bad_request("Assignee does not exist"));
        }
    }
    Ok(())
}

fn by_due_date() -> OrderBy<TaskField> {
    OrderBy::asc(TaskField::DueDate).nulls(NullsOrder::Last)
}

pub async fn create_task(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Created<Task>> {
    authorized_project(&state, &auth, project_id).await?;
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("Task name is required"));
    }
    ensure_assignee(&state, req.assignee_id).await?;

    let task = state
        .client
        .task()
        .create(req.into_create(project_id, Utc::now()))
        .await?;

    tracing::info!(task_id = %task.id, project_id = %project_id, "Task created");
    invalidate_project(&state, project_id).await;
    Ok(Created(task))
}

pub async fn list_project_tasks(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<DataResponse<Vec<Task>>> {
    authorized_project(&state, &auth, project_id).await?;

    let filter = TaskWhere {
        status: query.status.map(ScalarFilter::equals),
        ..TaskWhere::for_project(project_id)
    };
    let tasks = state
        .client
        .task()
        .find_many(
            FindManyArgs::new()
                .filter(filter)
                .order_by(by_due_date())
                .order_by(OrderBy::asc(TaskField::CreatedAt)),
        )
        .await?;

    Ok(DataResponse::new(tasks))
}

/// Tasks assigned to the caller across all projects
pub async fn my_tasks(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Paginated<Task>> {
    let filter = TaskWhere {
        assignee_id: Some(ScalarFilter::equals(auth.user_id())),
        status: query.status.map(ScalarFilter::equals),
        ..Default::default()
    };

    let total = state.client.task().count(filter.clone()).await?;
    let tasks = state
        .client
        .task()
        .find_many(
            FindManyArgs::new()
                .filter(filter)
                .order_by(by_due_date())
                .skip(pagination.skip())
                .take(pagination.take()),
        )
        .await?;

    Ok(Paginated::new(tasks, &pagination, total))
}

/// The project owner manages a task; the assignee may also update it
async fn editable_task(state: &AppState, auth: &AuthContext, task_id: Uuid) -> ApiResult<Task> {
    let task = state
        .client
        .task()
        .find_unique(TaskUnique::Id(task_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    if task.assignee_id == Some(auth.user_id()) {
        return Ok(task);
    }
    authorized_project(state, auth, task.project_id).await?;
    Ok(task)
}

pub async fn update_task(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<DataResponse<Task>> {
    let task = editable_task(&state, &auth, task_id).await?;
    if matches!(&req.name, Some(name) if name.trim().is_empty()) {
        return Err(ApiError::bad_request("Task name cannot be empty"));
    }
    if let Some(assignee) = req.assignee_id {
        ensure_assignee(&state, assignee).await?;
    }

    let updated = state
        .client
        .task()
        .update(
            TaskUnique::Id(task_id),
            req.into_update(task.status, Utc::now()),
        )
        .await?;

    tracing::info!(
        task_id = %task_id,
        from = %task.status,
        to = %updated.status,
        "Task updated"
    );
    invalidate_project(&state, task.project_id).await;
    Ok(DataResponse::new(updated))
}

pub async fn delete_task(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let task = state
        .client
        .task()
        .find_unique(TaskUnique::Id(task_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    authorized_project(&state, &auth, task.project_id).await?;

    state.client.task().delete(TaskUnique::Id(task_id)).await?;
    invalidate_project(&state, task.project_id).await;
    Ok(NoContent)
}
