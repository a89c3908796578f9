use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::projects::{authorized_project, invalidate_project};
use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::client::{operation, FindManyArgs, OrderBy, TxOperation};
use crate::domain::{
    CreateMaterialsRequest, Material, MaterialCost, MaterialField, MaterialUnique, MaterialWhere,
    UpdateMaterialRequest,
};
use crate::error::{ApiError, ApiResult};

/// Add one material, or a list created all-or-nothing
pub async fn create_materials(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateMaterialsRequest>,
) -> ApiResult<Created<Vec<Material>>> {
    authorized_project(&state, &auth, project_id).await?;

    let items = req.into_vec();
    if items.is_empty() {
        return Err(ApiError::bad_request("At least one material is required"));
    }
    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|msg| ApiError::bad_request(format!("Material {}: {}", index + 1, msg)))?;
    }

    let created = if items.len() == 1 {
        let mut items = items;
        let item = items.remove(0);
        vec![state
            .client
            .material()
            .create(item.into_create(project_id))
            .await?]
    } else {
        let ops: Vec<TxOperation<Material>> = items
            .into_iter()
            .map(|item| {
                let data = item.into_create(project_id);
                operation(move |tx| Box::pin(async move { tx.material().create(data).await }))
            })
            .collect();
        state.client.batch(ops).await?
    };

    tracing::info!(
        project_id = %project_id,
        count = created.len(),
        "Materials added"
    );
    invalidate_project(&state, project_id).await;
    Ok(Created(created))
}

pub async fn list_materials(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Material>>> {
    authorized_project(&state, &auth, project_id).await?;

    let materials = state
        .client
        .material()
        .find_many(
            FindManyArgs::new()
                .filter(MaterialWhere::for_project(project_id))
                .order_by(OrderBy::asc(MaterialField::Name)),
        )
        .await?;

    Ok(DataResponse::new(materials))
}

/// Total cost and quantities per unit
pub async fn material_cost(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<MaterialCost>> {
    authorized_project(&state, &auth, project_id).await?;

    let materials = state
        .client
        .material()
        .find_many(FindManyArgs::new().filter(MaterialWhere::for_project(project_id)))
        .await?;

    Ok(DataResponse::new(MaterialCost::from_materials(&materials)))
}

/// Remove every material of a project
pub async fn clear_materials(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    authorized_project(&state, &auth, project_id).await?;

    let removed = state
        .client
        .material()
        .delete_many(MaterialWhere::for_project(project_id))
        .await?;

    tracing::info!(project_id = %project_id, removed = removed.count, "Materials cleared");
    invalidate_project(&state, project_id).await;
    Ok(NoContent)
}

async fn authorized_material(
    state: &AppState,
    auth: &AuthContext,
    material_id: Uuid,
) -> ApiResult<Material> {
    let material = state
        .client
        .material()
        .find_unique(MaterialUnique::Id(material_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Material not found"))?;
    authorized_project(state, auth, material.project_id).await?;
    Ok(material)
}

pub async fn update_material(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<Uuid>,
    Json(req): Json<UpdateMaterialRequest>,
) -> ApiResult<DataResponse<Material>> {
    let material = authorized_material(&state, &auth, material_id).await?;
    req.validate().map_err(ApiError::bad_request)?;

    let updated = state
        .client
        .material()
        .update(MaterialUnique::Id(material_id), req.into())
        .await?;

    tracing::info!(material_id = %material_id, "Material updated");
    invalidate_project(&state, material.project_id).await;
    Ok(DataResponse::new(updated))
}

pub async fn delete_material(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(material_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let material = authorized_material(&state, &auth, material_id).await?;
    state
        .client
        .material()
        .delete(MaterialUnique::Id(material_id))
        .await?;

    invalidate_project(&state, material.project_id).await;
    Ok(NoContent)
}
