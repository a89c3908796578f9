//! Admin query console
//!
//! Exposes the read side of the data-access client over HTTP so admins can
//! run typed `find-many`, `count`, `aggregate` and `group-by` queries against
//! any model. Request bodies use the same argument shapes as the client:
//!
//! ```json
//! POST /admin/bids/group-by
//! { "by": ["status"], "_count": { "_all": true }, "_avg": ["amount"] }
//! ```

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAdmin;
use crate::client::{AggregateArgs, Client, FindManyArgs, GroupByArgs, Model};
use crate::domain::{
    Bid, CivilEngineeringDesign, ComplianceCheck, Material, Project, Task, User,
};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleModel {
    Users,
    Projects,
    Bids,
    Materials,
    Tasks,
    Designs,
    ComplianceChecks,
}

impl FromStr for ConsoleModel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Self::Users),
            "projects" => Ok(Self::Projects),
            "bids" => Ok(Self::Bids),
            "materials" => Ok(Self::Materials),
            "tasks" => Ok(Self::Tasks),
            "designs" => Ok(Self::Designs),
            "compliance-checks" => Ok(Self::ComplianceChecks),
            other => Err(ApiError::not_found(format!("Unknown model: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOperation {
    FindMany,
    Count,
    Aggregate,
    GroupBy,
}

impl FromStr for ConsoleOperation {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find-many" => Ok(Self::FindMany),
            "count" => Ok(Self::Count),
            "aggregate" => Ok(Self::Aggregate),
            "group-by" => Ok(Self::GroupBy),
            other => Err(ApiError::not_found(format!("Unknown operation: {}", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CountArgs<W> {
    #[serde(rename = "where", default)]
    filter: W,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: i64,
}

fn parse_args<T: serde::de::DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("Invalid arguments: {}", e)))
}

fn encode<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal(format!("Failed to encode result: {}", e)))
}

async fn run<M: Model>(client: &Client, operation: ConsoleOperation, body: Value) -> ApiResult<Value> {
    let mut delegate = client.delegate::<M>();
    match operation {
        ConsoleOperation::FindMany => {
            let args: FindManyArgs<M> = parse_args(body)?;
            encode(&delegate.find_many(args).await?)
        }
        ConsoleOperation::Count => {
            let args: CountArgs<M::Where> = parse_args(body)?;
            let count = delegate.count(args.filter).await?;
            encode(&CountResponse { count })
        }
        ConsoleOperation::Aggregate => {
            let args: AggregateArgs<M> = parse_args(body)?;
            encode(&delegate.aggregate(args).await?)
        }
        ConsoleOperation::GroupBy => {
            let args: GroupByArgs<M> = parse_args(body)?;
            encode(&delegate.group_by(args).await?)
        }
    }
}

/// Run a console query; the body carries the operation's typed arguments
pub async fn console_query(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((model, operation)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<DataResponse<Value>> {
    let target: ConsoleModel = model.parse()?;
    let operation: ConsoleOperation = operation.parse()?;

    tracing::info!(
        admin_id = %admin.user_id(),
        model = %model,
        operation = ?operation,
        "Admin console query"
    );

    let client = &state.client;
    let result = match target {
        ConsoleModel::Users => run::<User>(client, operation, body).await?,
        ConsoleModel::Projects => run::<Project>(client, operation, body).await?,
        ConsoleModel::Bids => run::<Bid>(client, operation, body).await?,
        ConsoleModel::Materials => run::<Material>(client, operation, body).await?,
        ConsoleModel::Tasks => run::<Task>(client, operation, body).await?,
        ConsoleModel::Designs => run::<CivilEngineeringDesign>(client, operation, body).await?,
        ConsoleModel::ComplianceChecks => {
            run::<ComplianceCheck>(client, operation, body).await?
        }
    };

    Ok(DataResponse::new(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidField, BidWhere};
    use serde_json::json;

    #[test]
    fn console_paths_parse() {
        assert_eq!(
            "compliance-checks".parse::<ConsoleModel>().unwrap(),
            ConsoleModel::ComplianceChecks
        );
        assert_eq!(
            "group-by".parse::<ConsoleOperation>().unwrap(),
            ConsoleOperation::GroupBy
        );
        assert!("documents".parse::<ConsoleModel>().is_err());
        assert!("delete-many".parse::<ConsoleOperation>().is_err());
    }

    #[test]
    fn count_body_defaults_to_everything() {
        let args: CountArgs<BidWhere> = parse_args(json!({})).unwrap();
        assert!(args.filter.status.is_none());

        let err = parse_args::<CountArgs<BidWhere>>(json!({ "filter": {} })).unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn group_by_body_parses_into_typed_args() {
        let args: GroupByArgs<Bid> = parse_args(json!({
            "by": ["status"],
            "where": { "amount": { "gt": "1000" } },
            "_count": { "_all": true },
            "_avg": ["amount"]
        }))
        .unwrap();
        assert_eq!(args.by, vec![BidField::Status]);
        assert_eq!(args.aggregates.avg, vec![BidField::Amount]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = parse_args::<FindManyArgs<Bid>>(json!({ "limit": 5 }));
        assert!(result.is_err());
    }
}
