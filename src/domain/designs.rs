use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProjectWhere;
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, FieldKind, Join, JsonFilter, Model,
    RelationFilter, ScalarField, ScalarFilter, StringFilter, UniqueInput, UpdateInput, Value,
    Values, WhereInput,
};

/// Stored structural design with its calculated capacity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CivilEngineeringDesign {
    pub id: Uuid,
    pub structure_type: String,
    pub material: String,
    pub dimensions: serde_json::Value,
    pub loads: serde_json::Value,
    pub capacity: serde_json::Value,
    pub compliance: Option<serde_json::Value>,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for CivilEngineeringDesign {
    const NAME: &'static str = "CivilEngineeringDesign";
    const TABLE: &'static str = "civil_engineering_designs";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "structure_type",
        "material",
        "dimensions",
        "loads",
        "capacity",
        "compliance",
        "project_id",
        "created_at",
        "updated_at",
    ];

    type Field = DesignField;
    type Where = DesignWhere;
    type Unique = DesignUnique;
    type Create = DesignCreate;
    type Update = DesignUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignField {
    Id,
    StructureType,
    Material,
    Dimensions,
    Loads,
    Capacity,
    Compliance,
    ProjectId,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for DesignField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::StructureType => "structure_type",
            Self::Material => "material",
            Self::Dimensions => "dimensions",
            Self::Loads => "loads",
            Self::Capacity => "capacity",
            Self::Compliance => "compliance",
            Self::ProjectId => "project_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::ProjectId => FieldKind::Uuid,
            Self::StructureType | Self::Material => FieldKind::Text,
            Self::Dimensions | Self::Loads | Self::Capacity | Self::Compliance => FieldKind::Json,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const PROJECT: Join = Join {
    table: "projects",
    on: "projects.id = civil_engineering_designs.project_id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignWhere {
    pub and: Vec<DesignWhere>,
    pub or: Option<Vec<DesignWhere>>,
    pub not: Vec<DesignWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub structure_type: Option<StringFilter>,
    pub material: Option<StringFilter>,
    pub dimensions: Option<JsonFilter>,
    pub loads: Option<JsonFilter>,
    pub capacity: Option<JsonFilter>,
    pub compliance: Option<JsonFilter>,
    pub project_id: Option<ScalarFilter<Uuid>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project: Option<RelationFilter<ProjectWhere>>,
}

impl WhereInput for DesignWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("structure_type", &self.structure_type);
        clause.field("material", &self.material);
        clause.field("dimensions", &self.dimensions);
        clause.field("loads", &self.loads);
        clause.field("capacity", &self.capacity);
        clause.field("compliance", &self.compliance);
        clause.field("project_id", &self.project_id);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.relation(PROJECT, &self.project);
    }
}

impl DesignWhere {
    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(ScalarFilter::equals(project_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignUnique {
    Id(Uuid),
}

impl UniqueInput for DesignUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignCreate {
    pub structure_type: String,
    pub material: String,
    pub dimensions: serde_json::Value,
    pub loads: serde_json::Value,
    pub capacity: serde_json::Value,
    #[serde(default)]
    pub compliance: Option<serde_json::Value>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl CreateInput for DesignCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("structure_type", self.structure_type.as_str())
            .required("material", self.material.as_str())
            .required("dimensions", self.dimensions.clone())
            .required("loads", self.loads.clone())
            .required("capacity", self.capacity.clone())
            .optional("compliance", &self.compliance)
            .optional("project_id", &self.project_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DesignUpdate {
    pub structure_type: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<serde_json::Value>,
    pub loads: Option<serde_json::Value>,
    pub capacity: Option<serde_json::Value>,
    #[serde(deserialize_with = "nullable")]
    pub compliance: Option<Option<serde_json::Value>>,
    #[serde(deserialize_with = "nullable")]
    pub project_id: Option<Option<Uuid>>,
}

impl UpdateInput for DesignUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("structure_type", &self.structure_type)
            .set("material", &self.material)
            .set("dimensions", &self.dimensions)
            .set("loads", &self.loads)
            .set("capacity", &self.capacity)
            .set_nullable("compliance", &self.compliance)
            .set_nullable("project_id", &self.project_id)
            .into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Aggregates, CountSelection};
    use serde_json::json;

    #[test]
    fn json_columns_bind_as_json() {
        let create = DesignCreate {
            structure_type: "beam".into(),
            material: "concrete".into(),
            dimensions: json!({ "width": 0.3, "height": 0.6, "length": 6.0 }),
            loads: json!({ "dead_load": 10.0, "live_load": 5.0 }),
            capacity: json!({}),
            compliance: None,
            project_id: None,
        };
        let values = create.values();
        assert_eq!(values.len(), 5);
        assert!(matches!(values[2], ("dimensions", Value::Json(_))));
    }

    #[test]
    fn json_fields_cannot_be_summed() {
        let aggregates: Aggregates<DesignField> = Aggregates {
            sum: vec![DesignField::Loads],
            ..Default::default()
        };
        assert!(aggregates.validate().is_err());

        let counted: Aggregates<DesignField> = Aggregates {
            count: Some(CountSelection {
                all: false,
                fields: vec![DesignField::Compliance],
            }),
            ..Default::default()
        };
        assert!(counted.validate().is_ok());
    }

    #[test]
    fn unlinking_from_project_sets_null() {
        let update: DesignUpdate = serde_json::from_str(r#"{"project_id": null}"#).unwrap();
        assert_eq!(
            update.assignments(),
            vec![Assignment::set("project_id", Value::Null)]
        );
    }
}
