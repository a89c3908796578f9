//! Per-model operation namespace.
//!
//! A `Delegate` is cheap to create and borrows its connection: either the
//! shared pool (`Client::project()`) or an open transaction
//! (`TxClient::project()`).

use sqlx::{Postgres, QueryBuilder, Row};
use std::marker::PhantomData;
use tracing::{debug, instrument};

use super::aggregate::{
    build_aggregate, build_group_by, decode_group, AggregateArgs, AggregateResult, GroupByArgs,
    GroupByRow,
};
use super::args::{push_order_by, push_window, BatchPayload, FindManyArgs};
use super::conn::Conn;
use super::error::{ClientError, ClientResult};
use super::model::{CreateInput, Model, UniqueInput, UpdateInput, WhereInput};
use super::value::{Assignment, Value};

/// Rows per INSERT statement in `create_many`, keeping bind counts well below
/// the protocol limit of 65535.
const CREATE_MANY_CHUNK: usize = 1000;

pub struct Delegate<'a, M: Model> {
    conn: Conn<'a>,
    model: PhantomData<fn() -> M>,
}

impl<'a, M: Model> Delegate<'a, M> {
    pub(crate) fn new(conn: Conn<'a>) -> Self {
        Self {
            conn,
            model: PhantomData,
        }
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn find_unique(&mut self, unique: M::Unique) -> ClientResult<Option<M>> {
        let mut qb = select_unique::<M>(&unique, false);
        log_statement(&qb);
        self.conn.fetch_optional(&mut qb).await
    }

    /// `find_unique` that also locks the row until the enclosing transaction
    /// ends.
    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn find_unique_for_update(&mut self, unique: M::Unique) -> ClientResult<Option<M>> {
        let mut qb = select_unique::<M>(&unique, true);
        log_statement(&qb);
        self.conn.fetch_optional(&mut qb).await
    }

    pub async fn find_unique_or_throw(&mut self, unique: M::Unique) -> ClientResult<M> {
        self.find_unique(unique)
            .await?
            .ok_or(ClientError::NotFound { model: M::NAME })
    }

    pub async fn find_first(&mut self, mut args: FindManyArgs<M>) -> ClientResult<Option<M>> {
        args.take = Some(if args.is_backwards() { -1 } else { 1 });
        Ok(self.find_many(args).await?.into_iter().next())
    }

    pub async fn find_first_or_throw(&mut self, args: FindManyArgs<M>) -> ClientResult<M> {
        self.find_first(args)
            .await?
            .ok_or(ClientError::NotFound { model: M::NAME })
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn find_many(&mut self, args: FindManyArgs<M>) -> ClientResult<Vec<M>> {
        args.validate()?;
        let mut qb = select_many::<M>(&args);
        log_statement(&qb);

        let mut rows = self.conn.fetch_all::<M>(&mut qb).await?;
        if args.is_backwards() {
            rows.reverse();
        }
        Ok(rows)
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn create(&mut self, data: M::Create) -> ClientResult<M> {
        let mut qb = insert_one::<M>(data.values());
        log_statement(&qb);
        self.conn.fetch_one(&mut qb).await
    }

    /// Insert several rows. With `skip_duplicates`, rows violating a unique
    /// constraint are skipped and not counted.
    #[instrument(skip_all, fields(model = M::NAME, rows = data.len()))]
    pub async fn create_many(
        &mut self,
        data: Vec<M::Create>,
        skip_duplicates: bool,
    ) -> ClientResult<BatchPayload> {
        if data.is_empty() {
            return Ok(BatchPayload { count: 0 });
        }

        let rows: Vec<_> = data.iter().map(CreateInput::values).collect();
        if rows.len() <= CREATE_MANY_CHUNK {
            let mut qb = insert_many::<M>(rows, skip_duplicates);
            log_statement(&qb);
            let count = self.conn.execute(&mut qb).await?;
            return Ok(BatchPayload { count });
        }

        let mut tx = self.conn.begin().await?;
        let mut count = 0;
        {
            let mut conn = Conn::Tx(&mut *tx);
            let mut rows = rows.into_iter().peekable();
            while rows.peek().is_some() {
                let chunk: Vec<_> = rows.by_ref().take(CREATE_MANY_CHUNK).collect();
                let mut qb = insert_many::<M>(chunk, skip_duplicates);
                log_statement(&qb);
                count += conn.execute(&mut qb).await?;
            }
        }
        tx.commit().await?;
        Ok(BatchPayload { count })
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn update(&mut self, unique: M::Unique, data: M::Update) -> ClientResult<M> {
        let mut qb = update_returning::<M>(&unique, data.assignments());
        log_statement(&qb);
        self.conn
            .fetch_optional(&mut qb)
            .await?
            .ok_or_else(|| ClientError::record_not_found(M::NAME, "update"))
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn update_many(
        &mut self,
        filter: M::Where,
        data: M::Update,
    ) -> ClientResult<BatchPayload> {
        let mut qb = update_where::<M>(&filter, data.assignments());
        log_statement(&qb);
        let count = self.conn.execute(&mut qb).await?;
        Ok(BatchPayload { count })
    }

    /// Update the row matching `unique`, or create it. The lookup locks the
    /// row so a concurrent upsert of the same key waits.
    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn upsert(
        &mut self,
        unique: M::Unique,
        create: M::Create,
        update: M::Update,
    ) -> ClientResult<M> {
        let mut tx = self.conn.begin().await?;
        let row = {
            let mut conn = Conn::Tx(&mut *tx);
            let mut lookup = select_unique::<M>(&unique, true);
            log_statement(&lookup);

            let mut qb = match conn.fetch_optional::<M>(&mut lookup).await? {
                Some(_) => update_returning::<M>(&unique, update.assignments()),
                None => insert_one::<M>(create.values()),
            };
            log_statement(&qb);
            conn.fetch_one::<M>(&mut qb).await?
        };
        tx.commit().await?;
        Ok(row)
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn delete(&mut self, unique: M::Unique) -> ClientResult<M> {
        let mut qb = QueryBuilder::new("DELETE FROM ");
        qb.push(M::TABLE);
        push_unique(&mut qb, &unique);
        push_returning::<M>(&mut qb);
        log_statement(&qb);
        self.conn
            .fetch_optional(&mut qb)
            .await?
            .ok_or_else(|| ClientError::record_not_found(M::NAME, "delete"))
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn delete_many(&mut self, filter: M::Where) -> ClientResult<BatchPayload> {
        let mut qb = QueryBuilder::new("DELETE FROM ");
        qb.push(M::TABLE);
        qb.push(" WHERE ");
        filter.push_where(&mut qb);
        log_statement(&qb);
        let count = self.conn.execute(&mut qb).await?;
        Ok(BatchPayload { count })
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn count(&mut self, filter: M::Where) -> ClientResult<i64> {
        let mut qb = count_where::<M>(&filter);
        log_statement(&qb);
        let row = self.conn.fetch_one_row(&mut qb).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn aggregate(&mut self, args: AggregateArgs<M>) -> ClientResult<AggregateResult> {
        let mut qb = build_aggregate(&args)?;
        log_statement(&qb);
        let row = self.conn.fetch_one_row(&mut qb).await?;
        args.aggregates.decode(&row)
    }

    #[instrument(skip_all, fields(model = M::NAME))]
    pub async fn group_by(&mut self, args: GroupByArgs<M>) -> ClientResult<Vec<GroupByRow>> {
        let mut qb = build_group_by(&args)?;
        log_statement(&qb);
        let rows = self.conn.fetch_rows(&mut qb).await?;
        rows.iter().map(|row| decode_group(&args, row)).collect()
    }
}

fn log_statement(qb: &QueryBuilder<'_, Postgres>) {
    debug!(sql = qb.sql(), "Executing statement");
}

fn push_returning<M: Model>(qb: &mut QueryBuilder<'_, Postgres>) {
    qb.push(" RETURNING ");
    qb.push(M::COLUMNS.join(", "));
}

fn push_unique<U: UniqueInput>(qb: &mut QueryBuilder<'_, Postgres>, unique: &U) {
    let (column, value) = unique.condition();
    qb.push(" WHERE ");
    qb.push(column);
    qb.push(" = ");
    value.push_bind(qb);
}

fn select_from<M: Model>() -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(M::COLUMNS.join(", "));
    qb.push(" FROM ");
    qb.push(M::TABLE);
    qb
}

pub(crate) fn select_unique<M: Model>(
    unique: &M::Unique,
    for_update: bool,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = select_from::<M>();
    push_unique(&mut qb, unique);
    if for_update {
        qb.push(" FOR UPDATE");
    }
    qb
}

pub(crate) fn select_many<M: Model>(args: &FindManyArgs<M>) -> QueryBuilder<'static, Postgres> {
    let mut qb = select_from::<M>();
    qb.push(" WHERE ");
    args.filter.push_where(&mut qb);
    push_order_by(&mut qb, &args.effective_order());
    push_window(&mut qb, args.skip, args.take);
    qb
}

pub(crate) fn count_where<M: Model>(filter: &M::Where) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
    qb.push(M::TABLE);
    qb.push(" WHERE ");
    filter.push_where(&mut qb);
    qb
}

pub(crate) fn insert_one<M: Model>(values: Vec<(&'static str, Value)>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(M::TABLE);
    if values.is_empty() {
        qb.push(" DEFAULT VALUES");
    } else {
        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        qb.push(" (");
        qb.push(columns.join(", "));
        qb.push(") VALUES (");
        for (i, (_, value)) in values.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            value.push_bind(&mut qb);
        }
        qb.push(")");
    }
    push_returning::<M>(&mut qb);
    qb
}

/// Multi-row insert over the union of the rows' columns. Columns a row does
/// not set are written as `DEFAULT`.
pub(crate) fn insert_many<M: Model>(
    rows: Vec<Vec<(&'static str, Value)>>,
    skip_duplicates: bool,
) -> QueryBuilder<'static, Postgres> {
    let mut columns: Vec<&'static str> = Vec::new();
    for row in &rows {
        for (column, _) in row {
            if !columns.contains(column) {
                columns.push(column);
            }
        }
    }
    if columns.is_empty() {
        columns.push("id");
    }

    let mut qb = QueryBuilder::new("INSERT INTO ");
    qb.push(M::TABLE);
    qb.push(" (");
    qb.push(columns.join(", "));
    qb.push(") VALUES ");
    for (i, mut row) in rows.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push("(");
        for (j, column) in columns.iter().enumerate() {
            if j > 0 {
                qb.push(", ");
            }
            match row.iter().position(|(c, _)| c == column) {
                Some(pos) => row.swap_remove(pos).1.push_bind(&mut qb),
                None => {
                    qb.push("DEFAULT");
                }
            }
        }
        qb.push(")");
    }
    if skip_duplicates {
        qb.push(" ON CONFLICT DO NOTHING");
    }
    qb
}

fn push_set<M: Model>(qb: &mut QueryBuilder<'_, Postgres>, assignments: Vec<Assignment>) {
    qb.push(" SET ");
    let touched = M::UPDATED_AT
        .filter(|column| !assignments.iter().any(|a| a.column == *column));
    if assignments.is_empty() && touched.is_none() {
        qb.push("id = id");
        return;
    }
    for (i, assignment) in assignments.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        assignment.push(qb);
    }
    if let Some(column) = touched {
        if !qb.sql().ends_with(" SET ") {
            qb.push(", ");
        }
        qb.push(column);
        qb.push(" = NOW()");
    }
}

pub(crate) fn update_returning<M: Model>(
    unique: &M::Unique,
    assignments: Vec<Assignment>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(M::TABLE);
    push_set::<M>(&mut qb, assignments);
    push_unique(&mut qb, unique);
    push_returning::<M>(&mut qb);
    qb
}

pub(crate) fn update_where<M: Model>(
    filter: &M::Where,
    assignments: Vec<Assignment>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(M::TABLE);
    push_set::<M>(&mut qb, assignments);
    qb.push(" WHERE ");
    filter.push_where(&mut qb);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        DecimalOperation, DecimalUpdate, ListOperation, ListUpdate, OrderBy, ScalarFilter,
    };
    use crate::domain::{
        Bid, BidCreate, BidField, BidStatus, BidUnique, BidUpdate, BidWhere, ComplianceCheck,
        ComplianceUnique, ComplianceUpdate,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    const BID_COLUMNS: &str = "id, amount, status, notes, project_id, bidder_id, created_at, updated_at";

    #[test]
    fn find_many_renders_filter_order_and_window() {
        let args = FindManyArgs::<Bid>::new()
            .filter(BidWhere {
                status: Some(ScalarFilter::equals(BidStatus::Pending)),
                ..Default::default()
            })
            .order_by(OrderBy::desc(BidField::Amount))
            .skip(10)
            .take(5);

        assert_eq!(
            select_many(&args).sql(),
            format!(
                "SELECT {} FROM bids WHERE (status = $1::bid_status) ORDER BY amount DESC LIMIT $2 OFFSET $3",
                BID_COLUMNS
            )
        );
    }

    #[test]
    fn negative_take_reverses_the_ordering() {
        let args = FindManyArgs::<Bid>::new().take(-2);
        assert_eq!(
            select_many(&args).sql(),
            format!("SELECT {} FROM bids WHERE (TRUE) ORDER BY id DESC LIMIT $1", BID_COLUMNS)
        );

        let args = FindManyArgs::<Bid>::new()
            .order_by(OrderBy::desc(BidField::CreatedAt))
            .take(-2);
        assert!(select_many(&args).sql().contains("ORDER BY created_at ASC LIMIT $1"));
    }

    #[test]
    fn update_bumps_updated_at_and_applies_operations() {
        let data = BidUpdate {
            amount: Some(DecimalUpdate::Operation(DecimalOperation::Increment(
                Decimal::from(500),
            ))),
            ..Default::default()
        };

        let qb = update_returning::<Bid>(&BidUnique::Id(Uuid::nil()), data.assignments());
        assert_eq!(
            qb.sql(),
            format!(
                "UPDATE bids SET amount = amount + $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
                BID_COLUMNS
            )
        );
    }

    #[test]
    fn empty_update_still_touches_updated_at() {
        let qb = update_where::<Bid>(&BidWhere::default(), Vec::new());
        assert_eq!(qb.sql(), "UPDATE bids SET updated_at = NOW() WHERE (TRUE)");
    }

    #[test]
    fn tables_without_updated_at_keep_a_valid_set_list() {
        let qb = update_returning::<ComplianceCheck>(
            &ComplianceUnique::Id(Uuid::nil()),
            ComplianceUpdate::default().assignments(),
        );
        assert!(qb.sql().starts_with("UPDATE compliance_checks SET id = id WHERE id = $1"));

        let push = ComplianceUpdate {
            issues: Some(ListUpdate::Operation(ListOperation::Push(vec![
                "Insufficient cover".into(),
            ]))),
            ..Default::default()
        };
        let qb = update_returning::<ComplianceCheck>(
            &ComplianceUnique::Id(Uuid::nil()),
            push.assignments(),
        );
        assert!(qb
            .sql()
            .starts_with("UPDATE compliance_checks SET issues = array_cat(issues, $1) WHERE id = $2"));
    }

    #[test]
    fn create_many_fills_missing_columns_with_default() {
        let project_id = Uuid::new_v4();
        let bidder_id = Uuid::new_v4();
        let first = BidCreate {
            amount: Decimal::from(120_000),
            status: None,
            notes: Some("Includes piling".into()),
            project_id,
            bidder_id,
        };
        let second = BidCreate {
            notes: None,
            ..first.clone()
        };

        let qb = insert_many::<Bid>(vec![first.values(), second.values()], true);
        assert_eq!(
            qb.sql(),
            "INSERT INTO bids (amount, notes, project_id, bidder_id) VALUES ($1, $2, $3, $4), ($5, DEFAULT, $6, $7) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn insert_without_values_uses_defaults() {
        let qb = insert_one::<Bid>(Vec::new());
        assert!(qb.sql().starts_with("INSERT INTO bids DEFAULT VALUES RETURNING id"));
    }

    #[test]
    fn unique_lookup_can_lock() {
        let qb = select_unique::<Bid>(&BidUnique::Id(Uuid::nil()), true);
        assert!(qb.sql().ends_with("FROM bids WHERE id = $1 FOR UPDATE"));
    }

    #[test]
    fn count_renders_filter() {
        let filter = BidWhere {
            bidder_id: Some(ScalarFilter::equals(Uuid::nil())),
            ..Default::default()
        };
        assert_eq!(
            count_where::<Bid>(&filter).sql(),
            "SELECT COUNT(*) FROM bids WHERE (bidder_id = $1)"
        );
    }
}
