use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::projects::{authorized_project, invalidate_project};
use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::client::{FindManyArgs, OrderBy};
use crate::domain::{
    CivilEngineeringDesign, ComplianceCheck, ComplianceCreate, ComplianceStatus, DesignCreate,
    DesignField, DesignUnique, DesignWhere,
};
use crate::error::{ApiError, ApiResult};
use crate::services::structural::{self, DesignRequest, DesignResult, Standard};

/// A persisted design together with the check recorded for it
#[derive(Debug, Serialize)]
pub struct SavedDesign {
    pub design: CivilEngineeringDesign,
    pub compliance_check: ComplianceCheck,
    pub result: DesignResult,
}

/// Run the structural calculation without saving anything
pub async fn calculate_design(
    _auth: RequireAuth,
    Json(req): Json<DesignRequest>,
) -> ApiResult<DataResponse<DesignResult>> {
    let result = structural::calculate(&req)?;
    tracing::debug!(
        structure_type = %result.structure_type,
        material = %result.material,
        compliant = result.compliance.compliant,
        "Design calculated"
    );
    Ok(DataResponse::new(result))
}

pub async fn list_standards(_auth: RequireAuth) -> DataResponse<Vec<Standard>> {
    DataResponse::new(structural::standards())
}

fn to_json<T: Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal(format!("Failed to encode design: {}", e)))
}

fn design_records(
    req: &DesignRequest,
    result: &DesignResult,
    project_id: Uuid,
) -> ApiResult<(DesignCreate, ComplianceCreate)> {
    let report = &result.compliance;
    let design = DesignCreate {
        structure_type: result.structure_type.to_string(),
        material: result.material.to_string(),
        dimensions: to_json(&req.dimensions)?,
        loads: to_json(&req.loads)?,
        capacity: to_json(&result.capacity)?,
        compliance: Some(to_json(report)?),
        project_id: Some(project_id),
    };
    let check = ComplianceCreate {
        standard: report.standards.join(", "),
        status: Some(if report.compliant {
            ComplianceStatus::Pass
        } else {
            ComplianceStatus::Fail
        }),
        issues: Some(report.issues.clone()),
        recommendations: Some(report.recommendations.clone()),
        checked_at: None,
        project_id,
    };
    Ok((design, check))
}

/// Calculate a design and store it with its compliance check atomically
pub async fn create_design(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<DesignRequest>,
) -> ApiResult<Created<SavedDesign>> {
    authorized_project(&state, &auth, project_id).await?;

    let result = structural::calculate(&req)?;
    let (design, check) = design_records(&req, &result, project_id)?;

    let (design, compliance_check) = state
        .client
        .transaction(state.client.transaction_defaults(), move |tx| {
            Box::pin(async move {
                let design = tx.design().create(design).await?;
                let check = tx.compliance_check().create(check).await?;
                Ok((design, check))
            })
        })
        .await?;

    tracing::info!(
        design_id = %design.id,
        project_id = %project_id,
        status = %compliance_check.status,
        "Design saved"
    );
    invalidate_project(&state, project_id).await;
    Ok(Created(SavedDesign {
        design,
        compliance_check,
        result,
    }))
}

pub async fn list_designs(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<CivilEngineeringDesign>>> {
    authorized_project(&state, &auth, project_id).await?;

    let designs = state
        .client
        .design()
        .find_many(
            FindManyArgs::new()
                .filter(DesignWhere::for_project(project_id))
                .order_by(OrderBy::desc(DesignField::CreatedAt)),
        )
        .await?;

    Ok(DataResponse::new(designs))
}

/// Designs detached from a project are visible to admins only
async fn authorized_design(
    state: &AppState,
    auth: &AuthContext,
    design_id: Uuid,
) -> ApiResult<CivilEngineeringDesign> {
    let design = state
        .client
        .design()
        .find_unique(DesignUnique::Id(design_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Design not found"))?;

    match design.project_id {
        Some(project_id) => {
            authorized_project(state, auth, project_id).await?;
        }
        None if auth.is_admin() => {}
        None => return Err(ApiError::forbidden("You don't have access to this design")),
    }
    Ok(design)
}

pub async fn get_design(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(design_id): Path<Uuid>,
) -> ApiResult<DataResponse<CivilEngineeringDesign>> {
    let design = authorized_design(&state, &auth, design_id).await?;
    Ok(DataResponse::new(design))
}

pub async fn delete_design(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(design_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let design = authorized_design(&state, &auth, design_id).await?;
    state
        .client
        .design()
        .delete(DesignUnique::Id(design_id))
        .await?;

    if let Some(project_id) = design.project_id {
        invalidate_project(&state, project_id).await;
    }
    Ok(NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_design_records_a_failed_check() {
        let req: DesignRequest = serde_json::from_str(
            r#"{
                "structure_type": "beam",
                "material": "concrete",
                "dimensions": {"width": 0.3, "height": 0.5, "length": 6.0, "cover": 20.0},
                "loads": {"dead_load": 15.0, "live_load": 10.0}
            }"#,
        )
        .unwrap();
        let result = structural::calculate(&req).unwrap();
        let project_id = Uuid::new_v4();

        let (design, check) = design_records(&req, &result, project_id).unwrap();

        assert_eq!(design.structure_type, "beam");
        assert_eq!(design.project_id, Some(project_id));
        assert_eq!(design.dimensions["cover"], 20.0);
        assert_eq!(check.status, Some(ComplianceStatus::Fail));
        assert!(check.standard.contains(structural::CONCRETE_STANDARD));
        assert_eq!(check.issues.as_ref().map(Vec::len), Some(result.compliance.issues.len()));
    }
}
