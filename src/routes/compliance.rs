use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::counts_by_status;
use super::projects::{authorized_project, invalidate_project};
use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::client::{Aggregates, FindManyArgs, GroupByArgs, OrderBy};
use crate::domain::{
    ComplianceCheck, ComplianceField, ComplianceSummary, ComplianceUnique, ComplianceWhere,
    CreateComplianceCheckRequest, UpdateComplianceCheckRequest,
};
use crate::error::{ApiError, ApiResult};

pub async fn create_check(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateComplianceCheckRequest>,
) -> ApiResult<Created<ComplianceCheck>> {
    authorized_project(&state, &auth, project_id).await?;
    if req.standard.trim().is_empty() {
        return Err(ApiError::bad_request("Standard is required"));
    }

    let check = state
        .client
        .compliance_check()
        .create(req.into_create(project_id))
        .await?;

    tracing::info!(
        check_id = %check.id,
        project_id = %project_id,
        status = %check.status,
        "Compliance check recorded"
    );
    invalidate_project(&state, project_id).await;
    Ok(Created(check))
}

pub async fn list_checks(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<ComplianceCheck>>> {
    authorized_project(&state, &auth, project_id).await?;

    let checks = state
        .client
        .compliance_check()
        .find_many(
            FindManyArgs::new()
                .filter(ComplianceWhere::for_project(project_id))
                .order_by(OrderBy::desc(ComplianceField::CheckedAt)),
        )
        .await?;

    Ok(DataResponse::new(checks))
}

/// Per-status counts and the most recent check
pub async fn check_summary(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<ComplianceSummary>> {
    authorized_project(&state, &auth, project_id).await?;

    let groups = state
        .client
        .compliance_check()
        .group_by(
            GroupByArgs::new(vec![ComplianceField::Status], Aggregates::count_all())
                .filter(ComplianceWhere::for_project(project_id)),
        )
        .await?;
    let latest = state
        .client
        .compliance_check()
        .find_first(
            FindManyArgs::new()
                .filter(ComplianceWhere::for_project(project_id))
                .order_by(OrderBy::desc(ComplianceField::CheckedAt)),
        )
        .await?;

    let by_status = counts_by_status(&groups);
    Ok(DataResponse::new(ComplianceSummary {
        total: by_status.values().sum(),
        by_status,
        latest,
    }))
}

/// Re-check: update the outcome and append issues or recommendations
pub async fn update_check(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(check_id): Path<Uuid>,
    Json(req): Json<UpdateComplianceCheckRequest>,
) -> ApiResult<DataResponse<ComplianceCheck>> {
    let check = state
        .client
        .compliance_check()
        .find_unique(ComplianceUnique::Id(check_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Compliance check not found"))?;
    authorized_project(&state, &auth, check.project_id).await?;

    let updated = state
        .client
        .compliance_check()
        .update(ComplianceUnique::Id(check_id), req.into_update(Utc::now()))
        .await?;

    tracing::info!(
        check_id = %check_id,
        from = %check.status,
        to = %updated.status,
        "Compliance check updated"
    );
    invalidate_project(&state, check.project_id).await;
    Ok(DataResponse::new(updated))
}
