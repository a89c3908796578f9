use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::counts_by_status;
use super::projects::{authorized_project, invalidate_project};
use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::client::{
    AggregateArgs, Aggregates, ClientError, FindManyArgs, GroupByArgs, KnownErrorCode, OrderBy,
    ScalarFilter,
};
use crate::domain::{
    Bid, BidAnalytics, BidCreate, BidField, BidStatus, BidSummary, BidUnique, BidUpdate,
    BidWhere, CreateBidRequest, Project, ProjectStatus, ProjectUnique, ProjectUpdate,
    UpdateBidRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::services::cache::keys;
use crate::services::estimator::{self, BidEstimate, EstimateRequest};

const RECENT_BIDS: i64 = 5;

fn status_groups(filter: BidWhere) -> GroupByArgs<Bid> {
    GroupByArgs::new(vec![BidField::Status], Aggregates::count_all()).filter(filter)
}

/// Place a bid on a project that is open for bidding
pub async fn create_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateBidRequest>,
) -> ApiResult<Created<Bid>> {
    if req.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Bid amount must be greater than zero"));
    }

    let project = state
        .client
        .project()
        .find_unique(ProjectUnique::Id(project_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if project.status != ProjectStatus::Bidding {
        return Err(ApiError::bad_request(format!(
            "Project is not accepting bids (status {})",
            project.status
        )));
    }
    if project.owner_id == auth.user_id() {
        return Err(ApiError::forbidden("You cannot bid on your own project"));
    }

    let bid = state
        .client
        .bid()
        .create(BidCreate {
            amount: req.amount,
            status: None,
            notes: req.notes,
            project_id,
            bidder_id: auth.user_id(),
        })
        .await?;

    tracing::info!(
        bid_id = %bid.id,
        project_id = %project_id,
        bidder_id = %auth.user_id(),
        amount = %bid.amount,
        "Bid placed"
    );
    invalidate_project(&state, project_id).await;
    Ok(Created(bid))
}

/// Bids on a project, lowest amount first
pub async fn list_bids(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<Vec<Bid>>> {
    authorized_project(&state, &auth, project_id).await?;

    let bids = state
        .client
        .bid()
        .find_many(
            FindManyArgs::new()
                .filter(BidWhere::for_project(project_id))
                .order_by(OrderBy::asc(BidField::Amount))
                .order_by(OrderBy::asc(BidField::CreatedAt)),
        )
        .await?;

    Ok(DataResponse::new(bids))
}

/// Amount range, average and status breakdown of a project's bids
pub async fn bid_summary(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<DataResponse<BidSummary>> {
    authorized_project(&state, &auth, project_id).await?;

    let cache_key = keys::bid_summary(project_id);
    if let Some(cache) = &state.cache {
        if let Some(summary) = cache.get::<BidSummary>(&cache_key).await {
            return Ok(DataResponse::new(summary));
        }
    }

    let amounts = state
        .client
        .bid()
        .aggregate(AggregateArgs::new(
            BidWhere::for_project(project_id),
            Aggregates {
                avg: vec![BidField::Amount],
                min: vec![BidField::Amount],
                max: vec![BidField::Amount],
                ..Aggregates::count_all()
            },
        ))
        .await?;
    let groups = state
        .client
        .bid()
        .group_by(status_groups(BidWhere::for_project(project_id)))
        .await?;

    let summary = BidSummary {
        count: amounts.count_all(),
        lowest_amount: amounts.min("amount").and_then(|v| v.as_decimal()),
        highest_amount: amounts.max("amount").and_then(|v| v.as_decimal()),
        average_amount: amounts.avg("amount").map(|avg| avg.round_dp(2)),
        by_status: counts_by_status(&groups),
    };

    if let Some(cache) = &state.cache {
        cache.put(&cache_key, &summary).await;
    }
    Ok(DataResponse::new(summary))
}

/// Who may apply `req` to `bid`.
///
/// The bidder edits terms or withdraws while the bid is pending; the project
/// owner approves or rejects a pending bid. Admins act as either.
fn check_bid_update(
    bid: &Bid,
    project: &Project,
    caller: Uuid,
    is_admin: bool,
    req: &UpdateBidRequest,
) -> ApiResult<()> {
    let is_bidder = bid.bidder_id == caller || is_admin;
    let is_owner = project.owner_id == caller || is_admin;

    if !is_bidder && !is_owner {
        return Err(ApiError::forbidden("You don't have access to this bid"));
    }
    if bid.status != BidStatus::Pending && (req.edits_terms() || req.status.is_some()) {
        return Err(ApiError::conflict(format!(
            "Bid is already {} and can no longer change",
            bid.status
        )));
    }
    if req.edits_terms() && !is_bidder {
        return Err(ApiError::forbidden("Only the bidder can change the bid terms"));
    }
    if matches!(req.amount, Some(amount) if amount <= Decimal::ZERO) {
        return Err(ApiError::bad_request("Bid amount must be greater than zero"));
    }

    if req.status == Some(BidStatus::Approved) && project.status != ProjectStatus::Bidding {
        return Err(ApiError::conflict(format!(
            "Project is {} and can no longer be awarded",
            project.status
        )));
    }

    match req.status {
        None | Some(BidStatus::Pending) => Ok(()),
        Some(BidStatus::Withdrawn) if is_bidder => Ok(()),
        Some(BidStatus::Approved | BidStatus::Rejected) if is_owner => Ok(()),
        Some(status) => Err(ApiError::forbidden(format!(
            "You cannot mark this bid as {}",
            status
        ))),
    }
}

/// Matches the bid only while it is still pending, so a status change
/// applies at most once.
fn still_pending(bid_id: Uuid) -> BidWhere {
    BidWhere {
        id: Some(ScalarFilter::equals(bid_id)),
        status: Some(ScalarFilter::equals(BidStatus::Pending)),
        ..Default::default()
    }
}

fn conflict(message: impl Into<String>) -> ClientError {
    ClientError::known(KnownErrorCode::TransactionConflict, message)
}

/// Apply a bid change under the project's row lock.
///
/// Approving awards the project: competing pending bids are rejected and the
/// project moves to `APPROVED`. Concurrent changes to bids of the same project
/// queue on the lock, and whichever runs second sees the bid or the project
/// already decided and fails with a conflict.
async fn apply_bid_update(state: &AppState, bid: &Bid, req: UpdateBidRequest) -> ApiResult<Bid> {
    let bid_id = bid.id;
    let project_id = bid.project_id;
    let approving = req.status == Some(BidStatus::Approved);
    let competing = BidWhere {
        id: Some(ScalarFilter::not_equals(bid_id)),
        status: Some(ScalarFilter::equals(BidStatus::Pending)),
        ..BidWhere::for_project(project_id)
    };
    let update: BidUpdate = req.into();

    let (updated, rejected) = state
        .client
        .transaction(state.client.transaction_defaults(), move |tx| {
            Box::pin(async move {
                let project = tx
                    .project()
                    .find_unique_for_update(ProjectUnique::Id(project_id))
                    .await?
                    .ok_or(ClientError::NotFound { model: "Project" })?;
                if approving && project.status != ProjectStatus::Bidding {
                    return Err(conflict(format!(
                        "Project is {} and can no longer be awarded",
                        project.status
                    )));
                }

                let changed = tx.bid().update_many(still_pending(bid_id), update).await?;
                if changed.count != 1 {
                    return Err(conflict("Bid is no longer pending"));
                }

                let mut rejected = 0;
                if approving {
                    rejected = tx
                        .bid()
                        .update_many(
                            competing,
                            BidUpdate {
                                status: Some(BidStatus::Rejected),
                                ..Default::default()
                            },
                        )
                        .await?
                        .count;
                    tx.project()
                        .update(
                            ProjectUnique::Id(project_id),
                            ProjectUpdate {
                                status: Some(ProjectStatus::Approved),
                                ..Default::default()
                            },
                        )
                        .await?;
                }

                let updated = tx.bid().find_unique_or_throw(BidUnique::Id(bid_id)).await?;
                Ok((updated, rejected))
            })
        })
        .await?;

    if approving {
        tracing::info!(
            bid_id = %bid_id,
            project_id = %project_id,
            rejected,
            "Bid approved and project awarded"
        );
    }
    Ok(updated)
}

pub async fn update_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(req): Json<UpdateBidRequest>,
) -> ApiResult<DataResponse<Bid>> {
    let bid = state
        .client
        .bid()
        .find_unique(BidUnique::Id(bid_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Bid not found"))?;
    let project = state
        .client
        .project()
        .find_unique_or_throw(ProjectUnique::Id(bid.project_id))
        .await?;

    check_bid_update(&bid, &project, auth.user_id(), auth.is_admin(), &req)?;
    if !req.edits_terms() && req.status.is_none() {
        return Ok(DataResponse::new(bid));
    }

    let updated = apply_bid_update(&state, &bid, req).await?;

    tracing::info!(bid_id = %bid_id, status = %updated.status, "Bid updated");
    invalidate_project(&state, bid.project_id).await;
    Ok(DataResponse::new(updated))
}

pub async fn delete_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let bid = state
        .client
        .bid()
        .find_unique(BidUnique::Id(bid_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Bid not found"))?;

    if bid.bidder_id != auth.user_id() && !auth.is_admin() {
        return Err(ApiError::forbidden("Only the bidder can delete this bid"));
    }

    state.client.bid().delete(BidUnique::Id(bid_id)).await?;
    tracing::info!(bid_id = %bid_id, "Bid deleted");
    invalidate_project(&state, bid.project_id).await;
    Ok(NoContent)
}

/// Bidding history of the caller
pub async fn bid_analytics(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<DataResponse<BidAnalytics>> {
    let mine = || BidWhere::by_bidder(auth.user_id());

    let groups = state.client.bid().group_by(status_groups(mine())).await?;
    let by_status = counts_by_status(&groups);

    let totals = state
        .client
        .bid()
        .aggregate(AggregateArgs::new(
            mine(),
            Aggregates {
                sum: vec![BidField::Amount],
                ..Aggregates::count_all()
            },
        ))
        .await?;
    let approved = state
        .client
        .bid()
        .aggregate(AggregateArgs::new(
            BidWhere {
                status: Some(ScalarFilter::equals(BidStatus::Approved)),
                ..mine()
            },
            Aggregates {
                sum: vec![BidField::Amount],
                ..Aggregates::count_all()
            },
        ))
        .await?;

    let recent = state
        .client
        .bid()
        .find_many(
            FindManyArgs::new()
                .filter(mine())
                .order_by(OrderBy::desc(BidField::CreatedAt))
                .take(RECENT_BIDS),
        )
        .await?;

    let total_bids = totals.count_all();
    Ok(DataResponse::new(BidAnalytics {
        total_bids,
        by_status,
        approval_rate: BidAnalytics::approval_rate(approved.count_all(), total_bids),
        total_amount: totals.sum("amount").unwrap_or_default(),
        approved_amount: approved.sum("amount").unwrap_or_default(),
        recent,
    }))
}

/// Price a job without storing anything
pub async fn estimate_bid(
    auth: RequireAuth,
    Json(req): Json<EstimateRequest>,
) -> ApiResult<DataResponse<BidEstimate>> {
    let estimate = estimator::estimate(req, Utc::now())?;
    tracing::info!(
        user_id = %auth.user_id(),
        total_cost = %estimate.total_cost,
        "Generated bid estimate"
    );
    Ok(DataResponse::new(estimate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WhereInput;

    fn fixtures() -> (Bid, Project, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let bidder = Uuid::new_v4();
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: "Clinic extension".into(),
            description: None,
            status: ProjectStatus::Bidding,
            budget: None,
            start_date: None,
            end_date: None,
            owner_id: owner,
            created_at: now,
            updated_at: now,
        };
        let bid = Bid {
            id: Uuid::new_v4(),
            amount: Decimal::from(120_000),
            status: BidStatus::Pending,
            notes: None,
            project_id: project.id,
            bidder_id: bidder,
            created_at: now,
            updated_at: now,
        };
        (bid, project, owner, bidder)
    }

    fn status(status: BidStatus) -> UpdateBidRequest {
        UpdateBidRequest {
            status: Some(status),
            ..Default::default()
        }
    }

    #[test]
    fn owner_approves_bidder_withdraws() {
        let (bid, project, owner, bidder) = fixtures();
        assert!(check_bid_update(&bid, &project, owner, false, &status(BidStatus::Approved)).is_ok());
        assert!(check_bid_update(&bid, &project, bidder, false, &status(BidStatus::Withdrawn)).is_ok());

        let err = check_bid_update(&bid, &project, bidder, false, &status(BidStatus::Approved))
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let err = check_bid_update(&bid, &project, owner, false, &status(BidStatus::Withdrawn))
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn only_the_bidder_edits_terms() {
        let (bid, project, owner, bidder) = fixtures();
        let edit = UpdateBidRequest {
            amount: Some(Decimal::from(110_000)),
            ..Default::default()
        };
        assert!(check_bid_update(&bid, &project, bidder, false, &edit).is_ok());
        assert!(check_bid_update(&bid, &project, owner, false, &edit).is_err());
        assert!(check_bid_update(&bid, &project, Uuid::new_v4(), false, &edit).is_err());
    }

    #[test]
    fn decided_bids_are_frozen() {
        let (mut bid, project, owner, _) = fixtures();
        bid.status = BidStatus::Rejected;
        let err = check_bid_update(&bid, &project, owner, false, &status(BidStatus::Approved))
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn only_projects_open_for_bidding_are_awarded() {
        let (bid, mut project, owner, bidder) = fixtures();
        project.status = ProjectStatus::Cancelled;

        let err = check_bid_update(&bid, &project, owner, false, &status(BidStatus::Approved))
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(check_bid_update(&bid, &project, bidder, false, &status(BidStatus::Withdrawn)).is_ok());
    }

    #[test]
    fn status_changes_are_conditional_on_pending() {
        let bid_id = Uuid::new_v4();
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new("");
        still_pending(bid_id).push_where(&mut qb);
        assert_eq!(qb.sql(), "(id = $1 AND status = $2::bid_status)");

        let err = ApiError::from(conflict("Bid is no longer pending"));
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let (bid, project, _, bidder) = fixtures();
        let edit = UpdateBidRequest {
            amount: Some(Decimal::ZERO),
            ..Default::default()
        };
        let err = check_bid_update(&bid, &project, bidder, false, &edit).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
