use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::ProjectWhere;
use crate::client::{
    Assignment, Changes, Clause, CreateInput, FieldKind, Join, ListUpdate, Model,
    RelationFilter, ScalarField, ScalarFilter, StringFilter, StringListFilter, UniqueInput,
    UpdateInput, Value, Values, WhereInput,
};

/// Outcome of a compliance check
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "compliance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Pass,
    Fail,
    Warning,
    #[default]
    Pending,
}

pg_enum!(ComplianceStatus, "compliance_status", {
    Pass => "PASS",
    Fail => "FAIL",
    Warning => "WARNING",
    Pending => "PENDING",
});

/// Compliance check against a named standard
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ComplianceCheck {
    pub id: Uuid,
    pub standard: String,
    pub status: ComplianceStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub checked_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub project_id: Uuid,
}

impl Model for ComplianceCheck {
    const NAME: &'static str = "ComplianceCheck";
    const TABLE: &'static str = "compliance_checks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "standard",
        "status",
        "issues",
        "recommendations",
        "checked_at",
        "created_at",
        "project_id",
    ];
    const UPDATED_AT: Option<&'static str> = None;

    type Field = ComplianceField;
    type Where = ComplianceWhere;
    type Unique = ComplianceUnique;
    type Create = ComplianceCreate;
    type Update = ComplianceUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceField {
    Id,
    Standard,
    Status,
    Issues,
    Recommendations,
    CheckedAt,
    CreatedAt,
    ProjectId,
}

impl ScalarField for ComplianceField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Standard => "standard",
            Self::Status => "status",
            Self::Issues => "issues",
            Self::Recommendations => "recommendations",
            Self::CheckedAt => "checked_at",
            Self::CreatedAt => "created_at",
            Self::ProjectId => "project_id",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::ProjectId => FieldKind::Uuid,
            Self::Standard => FieldKind::Text,
            Self::Status => FieldKind::Enum,
            Self::Issues | Self::Recommendations => FieldKind::TextList,
            Self::CheckedAt | Self::CreatedAt => FieldKind::DateTime,
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const PROJECT: Join = Join {
    table: "projects",
    on: "projects.id = compliance_checks.project_id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplianceWhere {
    pub and: Vec<ComplianceWhere>,
    pub or: Option<Vec<ComplianceWhere>>,
    pub not: Vec<ComplianceWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub standard: Option<StringFilter>,
    pub status: Option<ScalarFilter<ComplianceStatus>>,
    pub issues: Option<StringListFilter>,
    pub recommendations: Option<StringListFilter>,
    pub checked_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project_id: Option<ScalarFilter<Uuid>>,
    pub project: Option<RelationFilter<ProjectWhere>>,
}

impl WhereInput for ComplianceWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("standard", &self.standard);
        clause.field("status", &self.status);
        clause.field("issues", &self.issues);
        clause.field("recommendations", &self.recommendations);
        clause.field("checked_at", &self.checked_at);
        clause.field("created_at", &self.created_at);
        clause.field("project_id", &self.project_id);
        clause.relation(PROJECT, &self.project);
    }
}

impl ComplianceWhere {
    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(ScalarFilter::equals(project_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceUnique {
    Id(Uuid),
}

impl UniqueInput for ComplianceUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplianceCreate {
    pub standard: String,
    #[serde(default)]
    pub status: Option<ComplianceStatus>,
    #[serde(default)]
    pub issues: Option<Vec<String>>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    pub project_id: Uuid,
}

impl CreateInput for ComplianceCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("standard", self.standard.as_str())
            .optional("status", &self.status)
            .optional("issues", &self.issues)
            .optional("recommendations", &self.recommendations)
            .optional("checked_at", &self.checked_at)
            .required("project_id", self.project_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplianceUpdate {
    pub standard: Option<String>,
    pub status: Option<ComplianceStatus>,
    pub issues: Option<ListUpdate>,
    pub recommendations: Option<ListUpdate>,
    pub checked_at: Option<DateTime<Utc>>,
    pub project_id: Option<Uuid>,
}

impl UpdateInput for ComplianceUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("standard", &self.standard)
            .set("status", &self.status)
            .list("issues", &self.issues)
            .list("recommendations", &self.recommendations)
            .set("checked_at", &self.checked_at)
            .set("project_id", &self.project_id)
            .into_vec()
    }
}

/// Request DTO for recording a compliance check
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComplianceCheckRequest {
    pub standard: String,
    #[serde(default)]
    pub status: Option<ComplianceStatus>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl CreateComplianceCheckRequest {
    pub fn into_create(self, project_id: Uuid) -> ComplianceCreate {
        ComplianceCreate {
            standard: self.standard.trim().to_string(),
            status: self.status,
            issues: Some(self.issues),
            recommendations: Some(self.recommendations),
            checked_at: None,
            project_id,
        }
    }
}

/// Request DTO for updating a compliance check
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateComplianceCheckRequest {
    pub status: Option<ComplianceStatus>,
    pub issues: Option<ListUpdate>,
    pub recommendations: Option<ListUpdate>,
}

impl UpdateComplianceCheckRequest {
    /// Any change counts as a re-check.
    pub fn into_update(self, now: DateTime<Utc>) -> ComplianceUpdate {
        ComplianceUpdate {
            status: self.status,
            issues: self.issues,
            recommendations: self.recommendations,
            checked_at: Some(now),
            ..Default::default()
        }
    }
}

/// Status breakdown of a project's checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub latest: Option<ComplianceCheck>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, QueryBuilder};

    #[test]
    fn has_no_updated_at_column() {
        assert!(ComplianceCheck::UPDATED_AT.is_none());
        assert!(!ComplianceCheck::COLUMNS.contains(&"updated_at"));
    }

    #[test]
    fn list_filters_render_array_operators() {
        let filter: ComplianceWhere = serde_json::from_str(
            r#"{"status": {"not_in": ["PASS"]}, "issues": {"has_some": ["cover", "deflection"]}}"#,
        )
        .unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "(status NOT IN ($1::compliance_status) AND issues && $2)"
        );
    }

    #[test]
    fn recheck_stamps_checked_at() {
        let now = Utc::now();
        let req: UpdateComplianceCheckRequest =
            serde_json::from_str(r#"{"issues": {"push": ["Fire stop missing"]}}"#).unwrap();
        let update = req.into_update(now);
        assert_eq!(update.checked_at, Some(now));
        let columns: Vec<_> = update.assignments().iter().map(|a| a.column).collect();
        assert_eq!(columns, vec!["issues", "checked_at"]);
    }
}
