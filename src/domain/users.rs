use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BidWhere, ProjectWhere, TaskWhere};
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, FieldKind, Join, ListRelationFilter,
    Model, ScalarField, ScalarFilter, StringFilter, UniqueInput, UpdateInput, Value, Values,
    WhereInput,
};

/// User role
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Contractor,
    #[default]
    Client,
}

pg_enum!(Role, "user_role", {
    Admin => "ADMIN",
    Contractor => "CONTRACTOR",
    Client => "CLIENT",
});

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl Model for User {
    const NAME: &'static str = "User";
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["id", "email", "name", "role", "created_at", "updated_at"];

    type Field = UserField;
    type Where = UserWhere;
    type Unique = UserUnique;
    type Create = UserCreate;
    type Update = UserUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Id,
    Email,
    Name,
    Role,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for UserField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::Name => "name",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Uuid,
            Self::Email | Self::Name => FieldKind::Text,
            Self::Role => FieldKind::Enum,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const OWNED_PROJECTS: Join = Join {
    table: "projects",
    on: "projects.owner_id = users.id",
};
const PLACED_BIDS: Join = Join {
    table: "bids",
    on: "bids.bidder_id = users.id",
};
const ASSIGNED_TASKS: Join = Join {
    table: "tasks",
    on: "tasks.assignee_id = users.id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserWhere {
    pub and: Vec<UserWhere>,
    pub or: Option<Vec<UserWhere>>,
    pub not: Vec<UserWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub email: Option<StringFilter>,
    pub name: Option<StringFilter>,
    pub role: Option<ScalarFilter<Role>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub projects: Option<ListRelationFilter<ProjectWhere>>,
    pub bids: Option<ListRelationFilter<BidWhere>>,
    pub tasks: Option<ListRelationFilter<TaskWhere>>,
}

impl WhereInput for UserWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("email", &self.email);
        clause.field("name", &self.name);
        clause.field("role", &self.role);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.list_relation(OWNED_PROJECTS, &self.projects);
        clause.list_relation(PLACED_BIDS, &self.bids);
        clause.list_relation(ASSIGNED_TASKS, &self.tasks);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserUnique {
    Id(Uuid),
    Email(String),
}

impl UniqueInput for UserUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
            Self::Email(email) => ("email", email.as_str().into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserCreate {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl CreateInput for UserCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("email", self.email.as_str())
            .optional("name", &self.name)
            .optional("role", &self.role)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserUpdate {
    pub email: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: Option<Option<String>>,
    pub role: Option<Role>,
}

impl UpdateInput for UserUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .set("email", &self.email)
            .set_nullable("name", &self.name)
            .set("role", &self.role)
            .into_vec()
    }
}

/// Request DTO for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Enables password sign-in when given
    #[serde(default)]
    pub password: Option<String>,
}

impl From<CreateUserRequest> for UserCreate {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            email: req.email.trim().to_lowercase(),
            name: req.name,
            role: req.role,
        }
    }
}

/// Request DTO for updating a user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: Option<Option<String>>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            email: req.email.map(|e| e.trim().to_lowercase()),
            name: req.name,
            role: req.role,
        }
    }
}

/// Query params for listing users
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub search: Option<String>,
}

impl UserListQuery {
    pub fn to_where(&self) -> UserWhere {
        let search = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        UserWhere {
            role: self.role.map(ScalarFilter::equals),
            or: search.map(|term| {
                vec![
                    UserWhere {
                        email: Some(StringFilter::search(term)),
                        ..Default::default()
                    },
                    UserWhere {
                        name: Some(StringFilter::search(term)),
                        ..Default::default()
                    },
                ]
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, QueryBuilder};

    #[test]
    fn role_labels_match_database_enum() {
        assert_eq!(Role::default(), Role::Client);
        assert_eq!(Role::Admin.to_string(), "ADMIN");
        assert_eq!(
            serde_json::to_string(&Role::Contractor).unwrap(),
            "\"CONTRACTOR\""
        );
        assert_eq!(Role::ALL.len(), 3);
    }

    #[test]
    fn unique_input_is_keyed_by_column() {
        let unique: UserUnique =
            serde_json::from_str(r#"{"email": "site@example.com"}"#).unwrap();
        let (column, value) = unique.condition();
        assert_eq!(column, "email");
        assert_eq!(value, Value::Text("site@example.com".into()));
    }

    #[test]
    fn search_matches_email_or_name() {
        let query = UserListQuery {
            role: Some(Role::Contractor),
            search: Some(" tan ".into()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("");
        query.to_where().push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "(((email ILIKE $1) OR (name ILIKE $2)) AND role = $3::user_role)"
        );
    }

    #[test]
    fn relation_filter_correlates_subquery() {
        let filter: UserWhere = serde_json::from_str(
            r#"{"projects": {"some": {"status": {"equals": "BIDDING"}}}}"#,
        )
        .unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "(EXISTS (SELECT 1 FROM projects WHERE projects.owner_id = users.id AND (status = $1::project_status)))"
        );
    }

    #[test]
    fn every_and_none_negate_the_subquery() {
        let filter: UserWhere = serde_json::from_str(
            r#"{
                "bids": {"every": {"status": {"equals": "APPROVED"}}},
                "tasks": {"none": {}}
            }"#,
        )
        .unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "(NOT EXISTS (SELECT 1 FROM bids WHERE bids.bidder_id = users.id AND NOT (status = $1::bid_status)) \
             AND NOT EXISTS (SELECT 1 FROM tasks WHERE tasks.assignee_id = users.id AND (TRUE)))"
        );
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let clear: UserUpdate = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(
            clear.assignments(),
            vec![Assignment::set("name", Value::Null)]
        );
        assert!(UserUpdate::default().assignments().is_empty());
    }
}
