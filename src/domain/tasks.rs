//! Task domain types
//!
//! Project tasks for tracking work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ProjectWhere, UserWhere};
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, FieldKind, Join, Model, RelationFilter,
    ScalarField, ScalarFilter, StringFilter, UniqueInput, UpdateInput, Value, Values,
    WhereInput,
};

/// Task status enum
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

pg_enum!(TaskStatus, "task_status", {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Blocked => "BLOCKED",
});

/// Task entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Task {
    const NAME: &'static str = "Task";
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "status",
        "due_date",
        "completed_at",
        "project_id",
        "assignee_id",
        "created_at",
        "updated_at",
    ];

    type Field = TaskField;
    type Where = TaskWhere;
    type Unique = TaskUnique;
    type Create = TaskCreate;
    type Update = TaskUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Id,
    Name,
    Description,
    Status,
    DueDate,
    CompletedAt,
    ProjectId,
    AssigneeId,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for TaskField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Description => "description",
            Self::Status => "status",
            Self::DueDate => "due_date",
            Self::CompletedAt => "completed_at",
            Self::ProjectId => "project_id",
            Self::AssigneeId => "assignee_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::ProjectId | Self::AssigneeId => FieldKind::Uuid,
            Self::Name | Self::Description => FieldKind::Text,
            Self::Status => FieldKind::Enum,
            Self::DueDate | Self::CompletedAt | Self::CreatedAt | Self::UpdatedAt => {
                FieldKind::DateTime
            }
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const PROJECT: Join = Join {
    table: "projects",
    on: "projects.id = tasks.project_id",
};
const ASSIGNEE: Join = Join {
    table: "users",
    on: "users.id = tasks.assignee_id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskWhere {
    pub and: Vec<TaskWhere>,
    pub or: Option<Vec<TaskWhere>>,
    pub not: Vec<TaskWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub name: Option<StringFilter>,
    pub description: Option<StringFilter>,
    pub status: Option<ScalarFilter<TaskStatus>>,
    pub due_date: Option<ScalarFilter<DateTime<Utc>>>,
    pub completed_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project_id: Option<ScalarFilter<Uuid>>,
    pub assignee_id: Option<ScalarFilter<Uuid>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project: Option<RelationFilter<ProjectWhere>>,
    pub assignee: Option<RelationFilter<UserWhere>>,
}

impl WhereInput for TaskWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("name", &self.name);
        clause.field("description", &self.description);
        clause.field("status", &self.status);
        clause.field("due_date", &self.due_date);
        clause.field("completed_at", &self.completed_at);
        clause.field("project_id", &self.project_id);
        clause.field("assignee_id", &self.assignee_id);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.relation(PROJECT, &self.project);
        clause.relation(ASSIGNEE, &self.assignee);
    }
}

impl TaskWhere {
    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(ScalarFilter::equals(project_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskUnique {
    Id(Uuid),
}

impl UniqueInput for TaskUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub project_id: Uuid,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

impl CreateInput for TaskCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("name", self.name.as_str())
            .optional("description", &self.description)
            .optional("status", &self.status)
            .optional("due_date", &self.due_date)
            .optional("completed_at", &self.completed_at)
            .required("project_id", self.project_id)
            .optional("assignee_id", &self.assignee_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    #[serde(deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub project_id: Option<Uuid>,
    #[serde(deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateInput for TaskUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("name", &self.name)
            .set_nullable("description", &self.description)
            .set("status", &self.status)
            .set_nullable("due_date", &self.due_date)
            .set_nullable("completed_at", &self.completed_at)
            .set("project_id", &self.project_id)
            .set_nullable("assignee_id", &self.assignee_id)
            .into_vec()
    }
}

/// Request DTO for creating a task
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

impl CreateTaskRequest {
    pub fn into_create(self, project_id: Uuid, now: DateTime<Utc>) -> TaskCreate {
        let completed_at = (self.status == Some(TaskStatus::Completed)).then_some(now);
        TaskCreate {
            name: self.name.trim().to_string(),
            description: self.description,
            status: self.status,
            due_date: self.due_date,
            completed_at,
            project_id,
            assignee_id: self.assignee_id,
        }
    }
}

/// Request DTO for updating a task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    #[serde(deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,
}

impl UpdateTaskRequest {
    /// Build the update against the task's current status. Entering
    /// `COMPLETED` stamps `completed_at`, leaving it clears the stamp.
    pub fn into_update(self, current: TaskStatus, now: DateTime<Utc>) -> TaskUpdate {
        let completed_at = match self.status {
            Some(TaskStatus::Completed) if current != TaskStatus::Completed => Some(Some(now)),
            Some(next) if next != TaskStatus::Completed && current == TaskStatus::Completed => {
                Some(None)
            }
            _ => None,
        };
        TaskUpdate {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            status: self.status,
            due_date: self.due_date,
            completed_at,
            project_id: None,
            assignee_id: self.assignee_id,
        }
    }
}

/// Query params for listing tasks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListQuery {
    #[serde(default)]
    pub status: Option<TaskStatus>,
}
