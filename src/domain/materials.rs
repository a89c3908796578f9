//! Material domain types
//!
//! Bill-of-materials lines attached to a project.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::ProjectWhere;
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, DecimalOperation, DecimalUpdate, FieldKind,
    Join, Model,
    RelationFilter, ScalarField, ScalarFilter, StringFilter, UniqueInput, UpdateInput, Value,
    Values, WhereInput,
};

/// Material entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Material {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub project_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

impl Model for Material {
    const NAME: &'static str = "Material";
    const TABLE: &'static str = "materials";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "quantity",
        "unit",
        "unit_price",
        "project_id",
        "created_at",
        "updated_at",
    ];

    type Field = MaterialField;
    type Where = MaterialWhere;
    type Unique = MaterialUnique;
    type Create = MaterialCreate;
    type Update = MaterialUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialField {
    Id,
    Name,
    Description,
    Quantity,
    Unit,
    UnitPrice,
    ProjectId,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for MaterialField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Description => "description",
            Self::Quantity => "quantity",
            Self::Unit => "unit",
            Self::UnitPrice => "unit_price",
            Self::ProjectId => "project_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::ProjectId => FieldKind::Uuid,
            Self::Name | Self::Description | Self::Unit => FieldKind::Text,
            Self::Quantity | Self::UnitPrice => FieldKind::Decimal,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const PROJECT: Join = Join {
    table: "projects",
    on: "projects.id = materials.project_id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterialWhere {
    pub and: Vec<MaterialWhere>,
    pub or: Option<Vec<MaterialWhere>>,
    pub not: Vec<MaterialWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub quantity: Option<ScalarFilter<Decimal>>,
    pub unit: Option<StringFilter>,
    pub unit_price: Option<ScalarFilter<Decimal>>,
    pub project_id: Option<ScalarFilter<Uuid>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project: Option<RelationFilter<ProjectWhere>>,
}

impl WhereInput for MaterialWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("name", &self.name);
        clause.field("description", &self.description);
        clause.field("quantity", &self.quantity);
        clause.field("unit", &self.unit);
        clause.field("unit_price", &self.unit_price);
        clause.field("project_id", &self.project_id);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.relation(PROJECT, &self.project);
    }
}

impl MaterialWhere {
    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(ScalarFilter::equals(project_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialUnique {
    Id(Uuid),
}

impl UniqueInput for MaterialUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterialCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub project_id: Uuid,
}

impl CreateInput for MaterialCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("name", self.name.as_str())
            .optional("description", &self.description)
            .required("quantity", self.quantity)
            .required("unit", self.unit.as_str())
            .required("unit_price", self.unit_price)
            .required("project_id", self.project_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterialUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub quantity: Option<DecimalUpdate>,
    pub unit: Option<String>,
    pub unit_price: Option<DecimalUpdate>,
    pub project_id: Option<Uuid>,
}

impl UpdateInput for MaterialUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("name", &self.name)
            .set_nullable("description", &self.description)
            .decimal("quantity", &self.quantity)
            .set("unit", &self.unit)
            .decimal("unit_price", &self.unit_price)
            .set("project_id", &self.project_id)
            .into_vec()
    }
}

/// Request DTO for one material line
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMaterialRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
}

impl CreateMaterialRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Material name is required".to_string());
        }
        if self.unit.trim().is_empty() {
            return Err("Material unit is required".to_string());
        }
        if self.quantity.is_sign_negative() {
            return Err("Quantity cannot be negative".to_string());
        }
        if self.unit_price.is_sign_negative() {
            return Err("Unit price cannot be negative".to_string());
        }
        Ok(())
    }

    pub fn into_create(self, project_id: Uuid) -> MaterialCreate {
        MaterialCreate {
            name: self.name.trim().to_string(),
            description: self.description,
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            unit_price: self.unit_price,
            project_id,
        }
    }
}

/// A single material or a list, created together.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreateMaterialsRequest {
    Many(Vec<CreateMaterialRequest>),
    One(CreateMaterialRequest),
}

impl CreateMaterialsRequest {
    pub fn into_vec(self) -> Vec<CreateMaterialRequest> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

/// Request DTO for updating a material
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateMaterialRequest {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub quantity: Option<DecimalUpdate>,
    pub unit: Option<String>,
    pub unit_price: Option<DecimalUpdate>,
}

/// Rejects updates that would store a value `validate` refuses on create.
/// Relative steps (`increment`/`decrement`) are left to the column checks.
fn check_amount(label: &str, update: &Option<DecimalUpdate>) -> Result<(), String> {
    let negative = match update {
        Some(DecimalUpdate::Value(v))
        | Some(DecimalUpdate::Operation(DecimalOperation::Set(v)))
        | Some(DecimalUpdate::Operation(DecimalOperation::Multiply(v)))
        | Some(DecimalUpdate::Operation(DecimalOperation::Divide(v))) => v.is_sign_negative(),
        _ => false,
    };
    if negative {
        Err(format!("{} cannot be negative", label))
    } else {
        Ok(())
    }
}

impl UpdateMaterialRequest {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err("Material name is required".to_string());
        }
        if matches!(&self.unit, Some(unit) if unit.trim().is_empty()) {
            return Err("Material unit is required".to_string());
        }
        check_amount("Quantity", &self.quantity)?;
        check_amount("Unit price", &self.unit_price)
    }
}

impl From<UpdateMaterialRequest> for MaterialUpdate {
    fn from(req: UpdateMaterialRequest) -> Self {
        Self {
            name: req.name.map(|name| name.trim().to_string()),
            description: req.description,
            quantity: req.quantity,
            unit: req.unit.map(|unit| unit.trim().to_string()),
            unit_price: req.unit_price,
            project_id: None,
        }
    }
}

/// Cost rollup of a project's materials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialCost {
    pub item_count: usize,
    pub total_cost: Decimal,
    pub quantity_by_unit: BTreeMap<String, Decimal>,
}

impl MaterialCost {
    pub fn from_materials(materials: &[Material]) -> Self {
        let mut quantity_by_unit = BTreeMap::new();
        let mut total_cost = Decimal::ZERO;
        for material in materials {
            total_cost += material.line_total();
            *quantity_by_unit
                .entry(material.unit.clone())
                .or_insert(Decimal::ZERO) += material.quantity;
        }
        Self {
            item_count: materials.len(),
            total_cost: total_cost.round_dp(2),
            quantity_by_unit,
        }
    }
}
