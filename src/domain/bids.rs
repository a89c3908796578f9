use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{ProjectWhere, UserWhere};
use crate::client::{
    nullable, Assignment, Changes, Clause, CreateInput, DecimalUpdate, FieldKind, Join, Model,
    RelationFilter, ScalarField, ScalarFilter, StringFilter, UniqueInput, UpdateInput, Value,
    Values, WhereInput,
};

/// Bid status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "bid_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

pg_enum!(BidStatus, "bid_status", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Withdrawn => "WITHDRAWN",
});

/// Bid entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub amount: Decimal,
    pub status: BidStatus,
    pub notes: Option<String>,
    pub project_id: Uuid,
    pub bidder_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Bid {
    const NAME: &'static str = "Bid";
    const TABLE: &'static str = "bids";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "amount",
        "status",
        "notes",
        "project_id",
        "bidder_id",
        "created_at",
        "updated_at",
    ];

    type Field = BidField;
    type Where = BidWhere;
    type Unique = BidUnique;
    type Create = BidCreate;
    type Update = BidUpdate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidField {
    Id,
    Amount,
    Status,
    Notes,
    ProjectId,
    BidderId,
    CreatedAt,
    UpdatedAt,
}

impl ScalarField for BidField {
    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Amount => "amount",
            Self::Status => "status",
            Self::Notes => "notes",
            Self::ProjectId => "project_id",
            Self::BidderId => "bidder_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Id | Self::ProjectId | Self::BidderId => FieldKind::Uuid,
            Self::Amount => FieldKind::Decimal,
            Self::Status => FieldKind::Enum,
            Self::Notes => FieldKind::Text,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::DateTime,
        }
    }

    fn id() -> Self {
        Self::Id
    }
}

const PROJECT: Join = Join {
    table: "projects",
    on: "projects.id = bids.project_id",
};
const BIDDER: Join = Join {
    table: "users",
    on: "users.id = bids.bidder_id",
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BidWhere {
    pub and: Vec<BidWhere>,
    pub or: Option<Vec<BidWhere>>,
    pub not: Vec<BidWhere>,
    pub id: Option<ScalarFilter<Uuid>>,
    pub amount: Option<ScalarFilter<Decimal>>,
    pub status: Option<ScalarFilter<BidStatus>>,
    pub notes: Option<StringFilter>,
    pub project_id: Option<ScalarFilter<Uuid>>,
    pub bidder_id: Option<ScalarFilter<Uuid>>,
    pub created_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub updated_at: Option<ScalarFilter<DateTime<Utc>>>,
    pub project: Option<RelationFilter<ProjectWhere>>,
    pub bidder: Option<RelationFilter<UserWhere>>,
}

impl WhereInput for BidWhere {
    fn push_conditions(&self, clause: &mut Clause<'_, '_>) {
        clause.logical(&self.and, self.or.as_deref(), &self.not);
        clause.field("id", &self.id);
        clause.field("amount", &self.amount);
        clause.field("status", &self.status);
        clause.field("notes", &self.notes);
        clause.field("project_id", &self.project_id);
        clause.field("bidder_id", &self.bidder_id);
        clause.field("created_at", &self.created_at);
        clause.field("updated_at", &self.updated_at);
        clause.relation(PROJECT, &self.project);
        clause.relation(BIDDER, &self.bidder);
    }
}

impl BidWhere {
    pub fn for_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(ScalarFilter::equals(project_id)),
            ..Default::default()
        }
    }

    pub fn by_bidder(bidder_id: Uuid) -> Self {
        Self {
            bidder_id: Some(ScalarFilter::equals(bidder_id)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidUnique {
    Id(Uuid),
}

impl UniqueInput for BidUnique {
    fn condition(&self) -> (&'static str, Value) {
        match self {
            Self::Id(id) => ("id", (*id).into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidCreate {
    pub amount: Decimal,
    #[serde(default)]
    pub status: Option<BidStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    pub project_id: Uuid,
    pub bidder_id: Uuid,
}

impl CreateInput for BidCreate {
    fn values(&self) -> Vec<(&'static str, Value)> {
        Values::new()
            .required("amount", self.amount)
            .optional("status", &self.status)
            .optional("notes", &self.notes)
            .required("project_id", self.project_id)
            .required("bidder_id", self.bidder_id)
            .into_vec()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BidUpdate {
    pub amount: Option<DecimalUpdate>,
    pub status: Option<BidStatus>,
    #[serde(deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    pub project_id: Option<Uuid>,
    pub bidder_id: Option<Uuid>,
}

impl UpdateInput for BidUpdate {
    fn assignments(&self) -> Vec<Assignment> {
        Changes::new()
            .decimal("amount", &self.amount)
            .set("status", &self.status)
            .set_nullable("notes", &self.notes)
            .set("project_id", &self.project_id)
            .set("bidder_id", &self.bidder_id)
            .into_vec()
    }
}

/// Request DTO for placing a bid
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBidRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request DTO for updating a bid
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBidRequest {
    pub amount: Option<Decimal>,
    #[serde(deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    pub status: Option<BidStatus>,
}

impl UpdateBidRequest {
    /// Whether the request touches fields only the bidder may change.
    pub fn edits_terms(&self) -> bool {
        self.amount.is_some() || self.notes.is_some()
    }
}

impl From<UpdateBidRequest> for BidUpdate {
    fn from(req: UpdateBidRequest) -> Self {
        Self {
            amount: req.amount.map(DecimalUpdate::from),
            status: req.status,
            notes: req.notes,
            ..Default::default()
        }
    }
}

/// Amount statistics for a project's bids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidSummary {
    pub count: i64,
    pub lowest_amount: Option<Decimal>,
    pub highest_amount: Option<Decimal>,
    pub average_amount: Option<Decimal>,
    pub by_status: BTreeMap<String, i64>,
}

/// Bidding history of the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidAnalytics {
    pub total_bids: i64,
    pub by_status: BTreeMap<String, i64>,
    /// Approved bids as a percentage of all bids, two decimals.
    pub approval_rate: Decimal,
    pub total_amount: Decimal,
    pub approved_amount: Decimal,
    pub recent: Vec<Bid>,
}

impl BidAnalytics {
    pub fn approval_rate(approved: i64, total: i64) -> Decimal {
        if total == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(approved) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_values_skip_absent_optionals() {
        let create = BidCreate {
            amount: Decimal::from(250_000),
            status: None,
            notes: None,
            project_id: Uuid::nil(),
            bidder_id: Uuid::nil(),
        };
        let columns: Vec<_> = create.values().into_iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["amount", "project_id", "bidder_id"]);
    }

    #[test]
    fn to_one_relation_filters_use_exists() {
        let filter: BidWhere = serde_json::from_str(
            r#"{
                "project": {"is": {"status": {"equals": "BIDDING"}}},
                "bidder": {"is_not": {"role": {"equals": "ADMIN"}}}
            }"#,
        )
        .unwrap();
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new("");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "(EXISTS (SELECT 1 FROM projects WHERE projects.id = bids.project_id AND (status = $1::project_status)) \
             AND NOT EXISTS (SELECT 1 FROM users WHERE users.id = bids.bidder_id AND (role = $2::user_role)))"
        );
    }

    #[test]
    fn status_is_bound_with_cast() {
        let value: Value = BidStatus::Withdrawn.into();
        assert_eq!(
            value,
            Value::Enum {
                pg_type: "bid_status",
                label: "WITHDRAWN"
            }
        );
    }

    #[test]
    fn request_only_changes_status_when_given() {
        let req: UpdateBidRequest = serde_json::from_str(r#"{"status": "APPROVED"}"#).unwrap();
        assert!(!req.edits_terms());
        let update = BidUpdate::from(req);
        assert_eq!(
            update.assignments(),
            vec![Assignment::set("status", BidStatus::Approved)]
        );
    }

    #[test]
    fn approval_rate_is_a_percentage() {
        assert_eq!(BidAnalytics::approval_rate(0, 0), Decimal::ZERO);
        assert_eq!(BidAnalytics::approval_rate(1, 3), Decimal::new(3333, 2));
        assert_eq!(BidAnalytics::approval_rate(2, 2), Decimal::ONE_HUNDRED);
    }
}
