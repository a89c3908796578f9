use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{BidWhere, ComplianceWhere, DesignWhere, MaterialWhere, TaskWhere, User, UserWhere};
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, DecimalUpdate, FieldKind, Join,
    ListRelationFilter, Model, RelationFilter, ScalarField, ScalarFilter, StringFilter,
    UniqueInput, UpdateInput, Value, Values, WhereInput,
};

/// Project status enum
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Bidding,
    Approved,
    InProgress,
    Completed,
    Cancelled,
}

pg_enum!(ProjectStatus, "project_status", {
    Planning => "PLANNING",
    Bidding => "BIDDING",
    Approved => "APPROVED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

/// Project entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub budget: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Project {
    const NAME: &'static str = "Project";
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "status",
        "budget",
        "start_date",
        "end_date",
        "owner_id",
        "created_at",
        "updated_at",
    ];

    type Field = ProjectField;
    type Where = ProjectWhere;
    type Unique = ProjectUnique;
    type Create = ProjectCreate;
    type Update = ProjectUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectField {
    Id,
    Name,
    Description,
    Status,
    Budget,
    StartDate,
    EndDate,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for ProjectField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Description => "description",
            Self::Status => "status",
            Self::Budget => "budget",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::OwnerId => "owner_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::OwnerId => FieldKind::Uuid,
            Self::Name | Self::Description => FieldKind::Text,
            Self::Status => FieldKind::Enum,
            Self::Budget => FieldKind::Decimal,
            Self::StartDate | Self::EndDate | Self::CreatedAt | Self::UpdatedAt => {
                FieldKind::DateTime
            }
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const OWNER: Join = Join {
    table: "users",
    on: "users.id = projects.owner_id",
};
const BIDS: Join = Join {
    table: "bids",
    on: "bids.project_id = projects.id",
};
const MATERIALS: Join = Join {
    table: "materials",
    on: "materials.project_id = projects.id",
};
const TASKS: Join = Join {
    table: "tasks",
    on: "tasks.project_id = projects.id",
};
const DESIGNS: Join = Join {
    table: "civil_engineering_designs",
    on: "civil_engineering_designs.project_id = projects.id",
};
const COMPLIANCE_CHECKS: Join = Join {
    table: "compliance_checks",
    on: "compliance_checks.project_id = projects.id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectWhere {
    pub and: Vec<ProjectWhere>,
    pub or: Option<Vec<ProjectWhere>>,
    pub not: Vec<ProjectWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub status: Option<ScalarFilter<ProjectStatus>>,
    pub budget: Option<ScalarFilter<Decimal>>,
    pub start_date: Option<ScalarFilter<DateTime<Utc>>>,
    pub end_date: Option<ScalarFilter<DateTime<Utc>>>,
    pub owner_id: Option<ScalarFilter<Uuid>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub owner: Option<RelationFilter<UserWhere>>,
    pub bids: Option<ListRelationFilter<BidWhere>>,
    pub materials: Option<ListRelationFilter<MaterialWhere>>,
    pub tasks: Option<ListRelationFilter<TaskWhere>>,
    pub designs: Option<ListRelationFilter<DesignWhere>>,
    pub compliance_checks: Option<ListRelationFilter<ComplianceWhere>>,
}

impl WhereInput for ProjectWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("name", &self.name);
        clause.field("description", &self.description);
        clause.field("status", &self.status);
        clause.field("budget", &self.budget);
        clause.field("start_date", &self.start_date);
        clause.field("end_date", &self.end_date);
        clause.field("owner_id", &self.owner_id);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.relation(OWNER, &self.owner);
        clause.list_relation(BIDS, &self.bids);
        clause.list_relation(MATERIALS, &self.materials);
        clause.list_relation(TASKS, &self.tasks);
        clause.list_relation(DESIGNS, &self.designs);
        clause.list_relation(COMPLIANCE_CHECKS, &self.compliance_checks);
    }
}

impl ProjectWhere {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(ScalarFilter::equals(owner_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectUnique {
    Id(Uuid),
}

impl UniqueInput for ProjectUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
}

impl CreateInput for ProjectCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("name", self.name.as_str())
            .optional("description", &self.description)
            .optional("status", &self.status)
            .optional("budget", &self.budget)
            .optional("start_date", &self.start_date)
            .optional("end_date", &self.end_date)
            .required("owner_id", self.owner_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(deserialize_with = "nullable")]
    pub budget: Option<Option<DecimalUpdate>>,
    #[serde(deserialize_with = "nullable")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub owner_id: Option<Uuid>,
}

impl UpdateInput for ProjectUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("name", &self.name)
            .set_nullable("description", &self.description)
            .set("status", &self.status)
            .nullable_decimal("budget", &self.budget)
            .set_nullable("start_date", &self.start_date)
            .set_nullable("end_date", &self.end_date)
            .set("owner_id", &self.owner_id)
            .into_vec()
    }
}

/// Request DTO for creating a project
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl CreateProjectRequest {
    pub fn into_create(self, owner_id: Uuid) -> ProjectCreate {
        ProjectCreate {
            name: self.name.trim().to_string(),
            description: self.description,
            status: self.status,
            budget: self.budget,
            start_date: self.start_date,
            end_date: self.end_date,
            owner_id,
        }
    }
}

/// Request DTO for updating a project
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(deserialize_with = "nullable")]
    pub budget: Option<Option<Decimal>>,
    #[serde(deserialize_with = "nullable")]
    pub start_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateProjectRequest> for ProjectUpdate {
    fn from(req: UpdateProjectRequest) -> Self {
        Self {
            name: req.name.map(|n| n.trim().to_string()),
            description: req.description,
            status: req.status,
            budget: req.budget.map(|b| b.map(DecimalUpdate::from)),
            start_date: req.start_date,
            end_date: req.end_date,
            owner_id: None,
        }
    }
}

/// Query params for listing projects
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectListQuery {
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

impl ProjectListQuery {
    /// Filter for the listing. `owner_id` is `None` for admins.
    pub fn to_where(&self, owner_id: Option<Uuid>) -> ProjectWhere {
        let search = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        ProjectWhere {
            owner_id: owner_id.map(ScalarFilter::equals),
            status: self.status.map(ScalarFilter::equals),
            or: search.map(|term| {
                vec![
                    ProjectWhere {
                        name: Some(StringFilter::search(term)),
                        ..Default::default()
                    },
                    ProjectWhere {
                        description: Some(StringFilter::search(term)),
                        ..Default::default()
                    },
                ]
            }),
            ..Default::default()
        }
    }
}

/// Number of related rows per relation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectCounts {
    pub bids: i64,
    pub materials: i64,
    pub tasks: i64,
    pub designs: i64,
    pub compliance_checks: i64,
}

/// Project with its owner and relation counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub owner: User,
    pub counts: ProjectCounts,
}

/// Portfolio statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub total_budget: Option<Decimal>,
    pub recent: Vec<Project>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use sqlx::{Postgres, QueryBuilder};

    fn render(filter: &ProjectWhere) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_where(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn status_labels_match_database_enum() {
        assert_eq!(ProjectStatus::default(), ProjectStatus::Planning);
        assert_eq!(ProjectStatus::InProgress.as_str(), "IN_PROGRESS");
        let parsed: ProjectStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, ProjectStatus::Cancelled);
    }

    #[test]
    fn listing_filter_scopes_to_owner() {
        let owner = Uuid::new_v4();
        let query = ProjectListQuery {
            status: Some(ProjectStatus::Bidding),
            search: None,
        };
        assert_eq!(
            render(&query.to_where(Some(owner))),
            "(status = $1::project_status AND owner_id = $2)"
        );
        assert_eq!(render(&ProjectListQuery::default().to_where(None)), "(TRUE)");
    }

    #[test]
    fn to_one_relation_filters() {
        let filter: ProjectWhere = serde_json::from_str(
            r#"{"owner": {"is_not": {"role": {"equals": "ADMIN"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            render(&filter),
            "(NOT EXISTS (SELECT 1 FROM users WHERE users.id = projects.owner_id AND (role = $1::user_role)))"
        );
    }

    #[test]
    fn every_relation_filter_negates_inner_condition() {
        let filter: ProjectWhere = serde_json::from_str(
            r#"{"tasks": {"every": {"status": {"equals": "COMPLETED"}}}}"#,
        )
        .unwrap();
        assert_eq!(
            render(&filter),
            "(NOT EXISTS (SELECT 1 FROM tasks WHERE tasks.project_id = projects.id AND NOT (status = $1::task_status)))"
        );
    }

    #[test]
    fn empty_or_matches_nothing() {
        let filter: ProjectWhere = serde_json::from_str(r#"{"or": []}"#).unwrap();
        assert_eq!(render(&filter), "((FALSE))");
    }

    #[test]
    fn unknown_where_keys_are_rejected() {
        assert!(serde_json::from_str::<ProjectWhere>(r#"{"colour": {}}"#).is_err());
    }

    #[test]
    fn budget_update_can_clear_or_adjust() {
        let clear: ProjectUpdate = serde_json::from_str(r#"{"budget": null}"#).unwrap();
        assert_eq!(clear.assignments(), vec![Assignment::set("budget", Value::Null)]);

        let raise: ProjectUpdate =
            serde_json::from_str(r#"{"budget": {"multiply": 1.1}}"#).unwrap();
        let assignments = raise.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].column, "budget");
    }

    #[test]
    fn detail_flattens_project_fields() {
        let now = Utc::now();
        let owner = User {
            id: Uuid::new_v4(),
            email: "owner@example.com".into(),
            name: None,
            role: Role::Client,
            created_at: now,
            updated_at: now,
        };
        let detail = ProjectDetail {
            project: Project {
                id: Uuid::new_v4(),
                name: "Menara Jaya".into(),
                description: None,
                status: ProjectStatus::Planning,
                budget: None,
                start_date: None,
                end_date: None,
                owner_id: owner.id,
                created_at: now,
                updated_at: now,
            },
            owner,
            counts: ProjectCounts::default(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Menara Jaya");
        assert_eq!(json["counts"]["bids"], 0);
        assert_eq!(json["owner"]["email"], "owner@example.com");
    }
}
