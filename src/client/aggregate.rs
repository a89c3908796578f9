//! `aggregate` and `group_by`: argument types, validation, SQL and decoding.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::args::{effective_order, push_order_by, push_window, validate_skip, OrderBy, SortOrder};
use super::error::{ClientError, ClientResult};
use super::filter::{Clause, FieldFilter, ScalarFilter};
use super::model::{FieldKind, Model, ScalarField, WhereInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFn {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFn {
    fn sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Avg => "AVG",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Count => "_count",
            Self::Avg => "_avg",
            Self::Sum => "_sum",
            Self::Min => "_min",
            Self::Max => "_max",
        }
    }

    fn expression(self, column: &str) -> String {
        format!("{}({})", self.sql(), column)
    }

    fn check<F: ScalarField>(self, field: F) -> ClientResult<()> {
        let kind = field.kind();
        let allowed = match self {
            Self::Count => true,
            Self::Avg | Self::Sum => kind.is_numeric(),
            Self::Min | Self::Max => kind.is_orderable(),
        };
        if allowed {
            Ok(())
        } else {
            Err(ClientError::validation(format!(
                "{} is not available for field `{}` of kind {:?}",
                self.label(),
                field.column(),
                kind
            )))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, bound(deserialize = "F: Deserialize<'de>"))]
pub struct CountSelection<F> {
    #[serde(default, rename = "_all")]
    pub all: bool,
    #[serde(default)]
    pub fields: Vec<F>,
}

/// Which aggregates to compute and over which fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, bound(deserialize = "F: Deserialize<'de>"))]
pub struct Aggregates<F> {
    #[serde(rename = "_count")]
    pub count: Option<CountSelection<F>>,
    #[serde(rename = "_avg")]
    pub avg: Vec<F>,
    #[serde(rename = "_sum")]
    pub sum: Vec<F>,
    #[serde(rename = "_min")]
    pub min: Vec<F>,
    #[serde(rename = "_max")]
    pub max: Vec<F>,
}

impl<F> Default for Aggregates<F> {
    fn default() -> Self {
        Self {
            count: None,
            avg: Vec::new(),
            sum: Vec::new(),
            min: Vec::new(),
            max: Vec::new(),
        }
    }
}

impl<F: ScalarField> Aggregates<F> {
    pub fn count_all() -> Self {
        Self {
            count: Some(CountSelection {
                all: true,
                fields: Vec::new(),
            }),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    pub(crate) fn validate(&self) -> ClientResult<()> {
        for (func, fields) in [
            (AggregateFn::Avg, &self.avg),
            (AggregateFn::Sum, &self.sum),
            (AggregateFn::Min, &self.min),
            (AggregateFn::Max, &self.max),
        ] {
            for field in fields {
                func.check(*field)?;
            }
        }
        Ok(())
    }

    /// Select-list entries, each aliased `_<fn>_<column>`.
    pub(crate) fn select_items(&self) -> Vec<String> {
        let mut items = Vec::new();
        if let Some(count) = &self.count {
            if count.all {
                items.push("COUNT(*) AS _count__all".to_string());
            }
            for field in &count.fields {
                items.push(format!("COUNT({0}) AS _count_{0}", field.column()));
            }
        }
        for (func, fields) in [
            (AggregateFn::Avg, &self.avg),
            (AggregateFn::Sum, &self.sum),
            (AggregateFn::Min, &self.min),
            (AggregateFn::Max, &self.max),
        ] {
            for field in fields {
                let column = field.column();
                let cast = if field.kind() == FieldKind::Enum { "::text" } else { "" };
                items.push(format!(
                    "{}({}){} AS {}_{}",
                    func.sql(),
                    column,
                    cast,
                    func.label(),
                    column
                ));
            }
        }
        items
    }

    pub(crate) fn decode(&self, row: &PgRow) -> ClientResult<AggregateResult> {
        let mut result = AggregateResult::default();

        if let Some(selection) = &self.count {
            let mut count = CountResult::default();
            if selection.all {
                count.all = Some(row.try_get::<i64, _>("_count__all")?);
            }
            for field in &selection.fields {
                let column = field.column();
                let alias = format!("_count_{}", column);
                count.fields.insert(column, row.try_get::<i64, _>(alias.as_str())?);
            }
            result.count = Some(count);
        }
        for field in &self.avg {
            let alias = format!("_avg_{}", field.column());
            result
                .avg
                .insert(field.column(), row.try_get(alias.as_str())?);
        }
        for field in &self.sum {
            let alias = format!("_sum_{}", field.column());
            result
                .sum
                .insert(field.column(), row.try_get(alias.as_str())?);
        }
        for field in &self.min {
            let alias = format!("_min_{}", field.column());
            result
                .min
                .insert(field.column(), decode_scalar(row, &alias, field.kind())?);
        }
        for field in &self.max {
            let alias = format!("_max_{}", field.column());
            result
                .max
                .insert(field.column(), decode_scalar(row, &alias, field.kind())?);
        }
        Ok(result)
    }
}

fn decode_scalar(row: &PgRow, alias: &str, kind: FieldKind) -> ClientResult<Option<ScalarValue>> {
    let value = match kind {
        FieldKind::Decimal => row
            .try_get::<Option<Decimal>, _>(alias)?
            .map(ScalarValue::Decimal),
        FieldKind::DateTime => row
            .try_get::<Option<DateTime<Utc>>, _>(alias)?
            .map(ScalarValue::DateTime),
        _ => row
            .try_get::<Option<String>, _>(alias)?
            .map(ScalarValue::Text),
    };
    Ok(value)
}

/// Result of `min`/`max`, shaped by the field kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Text(String),
}

impl ScalarValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountResult {
    #[serde(rename = "_all", skip_serializing_if = "Option::is_none")]
    pub all: Option<i64>,
    #[serde(flatten)]
    pub fields: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    #[serde(rename = "_count", skip_serializing_if = "Option::is_none")]
    pub count: Option<CountResult>,
    #[serde(rename = "_avg", skip_serializing_if = "BTreeMap::is_empty")]
    pub avg: BTreeMap<&'static str, Option<Decimal>>,
    #[serde(rename = "_sum", skip_serializing_if = "BTreeMap::is_empty")]
    pub sum: BTreeMap<&'static str, Option<Decimal>>,
    #[serde(rename = "_min", skip_serializing_if = "BTreeMap::is_empty")]
    pub min: BTreeMap<&'static str, Option<ScalarValue>>,
    #[serde(rename = "_max", skip_serializing_if = "BTreeMap::is_empty")]
    pub max: BTreeMap<&'static str, Option<ScalarValue>>,
}

impl AggregateResult {
    pub fn count_all(&self) -> i64 {
        self.count.as_ref().and_then(|c| c.all).unwrap_or(0)
    }

    pub fn avg(&self, column: &str) -> Option<Decimal> {
        self.avg.get(column).copied().flatten()
    }

    pub fn sum(&self, column: &str) -> Option<Decimal> {
        self.sum.get(column).copied().flatten()
    }

    pub fn min(&self, column: &str) -> Option<&ScalarValue> {
        self.min.get(column).and_then(Option::as_ref)
    }

    pub fn max(&self, column: &str) -> Option<&ScalarValue> {
        self.max.get(column).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, bound(deserialize = ""))]
pub struct AggregateArgs<M: Model> {
    #[serde(rename = "where")]
    pub filter: M::Where,
    pub order_by: Vec<OrderBy<M::Field>>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    #[serde(flatten)]
    pub aggregates: Aggregates<M::Field>,
}

impl<M: Model> Default for AggregateArgs<M> {
    fn default() -> Self {
        Self {
            filter: M::Where::default(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            aggregates: Aggregates::default(),
        }
    }
}

impl<M: Model> AggregateArgs<M> {
    pub fn new(filter: M::Where, aggregates: Aggregates<M::Field>) -> Self {
        Self {
            filter,
            aggregates,
            ..Default::default()
        }
    }
}

pub(crate) fn build_aggregate<M: Model>(
    args: &AggregateArgs<M>,
) -> ClientResult<QueryBuilder<'static, Postgres>> {
    validate_skip(args.skip)?;
    args.aggregates.validate()?;
    let items = args.aggregates.select_items();
    if items.is_empty() {
        return Err(ClientError::validation(
            "aggregate requires at least one of _count, _avg, _sum, _min or _max",
        ));
    }

    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(items.join(", "));
    qb.push(" FROM ");

    let windowed = !args.order_by.is_empty() || args.skip.is_some() || args.take.is_some();
    if windowed {
        qb.push("(SELECT * FROM ");
        qb.push(M::TABLE);
        qb.push(" WHERE ");
        args.filter.push_where(&mut qb);
        push_order_by(&mut qb, &effective_order(&args.order_by, args.take));
        push_window(&mut qb, args.skip, args.take);
        qb.push(") AS ");
        qb.push(M::TABLE);
    } else {
        qb.push(M::TABLE);
        qb.push(" WHERE ");
        args.filter.push_where(&mut qb);
    }
    Ok(qb)
}

/// Condition on an aggregate of a grouped field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Having<F> {
    pub field: F,
    pub aggregate: AggregateFn,
    pub filter: ScalarFilter<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupOrderBy<F> {
    pub field: F,
    #[serde(default)]
    pub direction: SortOrder,
    /// Order by this aggregate of `field` rather than the key itself.
    #[serde(default)]
    pub aggregate: Option<AggregateFn>,
}

impl<F> GroupOrderBy<F> {
    pub fn key(field: F, direction: SortOrder) -> Self {
        Self {
            field,
            direction,
            aggregate: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, bound(deserialize = ""))]
pub struct GroupByArgs<M: Model> {
    pub by: Vec<M::Field>,
    #[serde(rename = "where")]
    pub filter: M::Where,
    pub having: Vec<Having<M::Field>>,
    pub order_by: Vec<GroupOrderBy<M::Field>>,
    pub skip: Option<i64>,
    pub take: Option<i64>,
    #[serde(flatten)]
    pub aggregates: Aggregates<M::Field>,
}

impl<M: Model> Default for GroupByArgs<M> {
    fn default() -> Self {
        Self {
            by: Vec::new(),
            filter: M::Where::default(),
            having: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            aggregates: Aggregates::default(),
        }
    }
}

impl<M: Model> GroupByArgs<M> {
    pub fn new(by: Vec<M::Field>, aggregates: Aggregates<M::Field>) -> Self {
        Self {
            by,
            aggregates,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: M::Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order: GroupOrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub(crate) fn validate(&self) -> ClientResult<()> {
        validate_skip(self.skip)?;
        if self.by.is_empty() {
            return Err(ClientError::validation("group_by requires at least one field in `by`"));
        }
        for field in &self.by {
            if !field.kind().is_groupable() {
                return Err(ClientError::validation(format!(
                    "cannot group by `{}` of kind {:?}",
                    field.column(),
                    field.kind()
                )));
            }
        }
        self.aggregates.validate()?;

        for having in &self.having {
            match having.aggregate {
                AggregateFn::Count => {}
                AggregateFn::Avg | AggregateFn::Sum | AggregateFn::Min | AggregateFn::Max => {
                    if !having.field.kind().is_numeric() {
                        return Err(ClientError::validation(format!(
                            "having on {} requires a numeric field, `{}` is {:?}",
                            having.aggregate.label(),
                            having.field.column(),
                            having.field.kind()
                        )));
                    }
                }
            }
        }

        for order in &self.order_by {
            match order.aggregate {
                Some(func) => func.check(order.field)?,
                None if !self.by.contains(&order.field) => {
                    return Err(ClientError::validation(format!(
                        "order_by field `{}` must be in `by` or use an aggregate",
                        order.field.column()
                    )))
                }
                None => {}
            }
        }

        if (self.skip.is_some() || self.take.is_some()) && self.order_by.is_empty() {
            return Err(ClientError::validation(
                "group_by with skip or take requires order_by",
            ));
        }
        if matches!(self.take, Some(take) if take < 0) {
            return Err(ClientError::validation("group_by take must be non-negative"));
        }
        Ok(())
    }
}

pub(crate) fn build_group_by<M: Model>(
    args: &GroupByArgs<M>,
) -> ClientResult<QueryBuilder<'static, Postgres>> {
    args.validate()?;

    let mut items: Vec<String> = args
        .by
        .iter()
        .map(|field| match field.kind() {
            FieldKind::Enum => format!("{0}::text AS {0}", field.column()),
            _ => field.column().to_string(),
        })
        .collect();
    items.extend(args.aggregates.select_items());

    let mut qb = QueryBuilder::new("SELECT ");
    qb.push(items.join(", "));
    qb.push(" FROM ");
    qb.push(M::TABLE);
    qb.push(" WHERE ");
    args.filter.push_where(&mut qb);

    qb.push(" GROUP BY ");
    let keys: Vec<&str> = args.by.iter().map(|f| f.column()).collect();
    qb.push(keys.join(", "));

    if !args.having.is_empty() {
        qb.push(" HAVING ");
        let mut clause = Clause::all(&mut qb);
        for having in &args.having {
            let expr = having.aggregate.expression(having.field.column());
            having.filter.push(&expr, &mut clause);
        }
        clause.finish();
    }

    if !args.order_by.is_empty() {
        qb.push(" ORDER BY ");
        for (i, order) in args.order_by.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            match order.aggregate {
                Some(func) => qb.push(func.expression(order.field.column())),
                // Qualified so enum keys sort by declaration order, not by label.
                None => qb.push(format!("{}.{}", M::TABLE, order.field.column())),
            };
            qb.push(" ");
            qb.push(order.direction.as_sql());
        }
    }
    push_window(&mut qb, args.skip, args.take);
    Ok(qb)
}

/// One group: its key values plus the requested aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByRow {
    #[serde(flatten)]
    pub keys: BTreeMap<&'static str, serde_json::Value>,
    #[serde(flatten)]
    pub aggregates: AggregateResult,
}

impl GroupByRow {
    pub fn key(&self, column: &str) -> Option<&serde_json::Value> {
        self.keys.get(column)
    }

    pub fn key_str(&self, column: &str) -> Option<&str> {
        self.key(column).and_then(|v| v.as_str())
    }
}

pub(crate) fn decode_group<M: Model>(
    args: &GroupByArgs<M>,
    row: &PgRow,
) -> ClientResult<GroupByRow> {
    let mut keys = BTreeMap::new();
    for field in &args.by {
        let column = field.column();
        let value = match field.kind() {
            FieldKind::Uuid => to_json(row.try_get::<Option<Uuid>, _>(column)?)?,
            FieldKind::Decimal => to_json(row.try_get::<Option<Decimal>, _>(column)?)?,
            FieldKind::DateTime => to_json(row.try_get::<Option<DateTime<Utc>>, _>(column)?)?,
            FieldKind::Text | FieldKind::Enum => {
                to_json(row.try_get::<Option<String>, _>(column)?)?
            }
            FieldKind::Json | FieldKind::TextList => {
                return Err(ClientError::validation(format!(
                    "cannot group by `{}`",
                    column
                )))
            }
        };
        keys.insert(column, value);
    }

    Ok(GroupByRow {
        keys,
        aggregates: args.aggregates.decode(row)?,
    })
}

fn to_json<T: Serialize>(value: T) -> ClientResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ClientError::UnknownRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum Field {
        Id,
        Amount,
        Status,
        Notes,
        Loads,
    }

    impl ScalarField for Field {
        fn column(&self) -> &'static str {
            match self {
                Self::Id => "id",
                Self::Amount => "amount",
                Self::Status => "status",
                Self::Notes => "notes",
                Self::Loads => "loads",
            }
        }

        fn kind(&self) -> FieldKind {
            match self {
                Self::Id => FieldKind::Uuid,
                Self::Amount => FieldKind::Decimal,
                Self::Status => FieldKind::Enum,
                Self::Notes => FieldKind::Text,
                Self::Loads => FieldKind::Json,
            }
        }

        fn id() -> Self {
            Self::Id
        }
    }

    #[test]
    fn select_items_are_aliased() {
        let aggregates = Aggregates {
            count: Some(CountSelection {
                all: true,
                fields: vec![Field::Notes],
            }),
            avg: vec![Field::Amount],
            max: vec![Field::Status],
            ..Default::default()
        };

        assert_eq!(
            aggregates.select_items(),
            vec![
                "COUNT(*) AS _count__all",
                "COUNT(notes) AS _count_notes",
                "AVG(amount) AS _avg_amount",
                "MAX(status)::text AS _max_status",
            ]
        );
    }

    #[test]
    fn numeric_aggregates_reject_other_kinds() {
        let avg_text = Aggregates {
            avg: vec![Field::Notes],
            ..Default::default()
        };
        assert!(matches!(avg_text.validate(), Err(ClientError::Validation(_))));

        let min_json = Aggregates {
            min: vec![Field::Loads],
            ..Default::default()
        };
        assert!(min_json.validate().is_err());

        let min_uuid = Aggregates {
            min: vec![Field::Id],
            ..Default::default()
        };
        assert!(min_uuid.validate().is_err());

        let ok = Aggregates {
            sum: vec![Field::Amount],
            min: vec![Field::Notes, Field::Status],
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn aggregates_deserialize_with_underscored_keys() {
        let aggregates: Aggregates<Field> = serde_json::from_str(
            r#"{"_count": {"_all": true}, "_sum": ["amount"], "_max": ["amount"]}"#,
        )
        .unwrap();

        assert!(aggregates.count.as_ref().is_some_and(|c| c.all));
        assert_eq!(aggregates.sum, vec![Field::Amount]);
        assert!(aggregates.avg.is_empty());
    }

    #[test]
    fn count_selection_takes_fields_without_a_default() {
        let aggregates: Aggregates<Field> =
            serde_json::from_str(r#"{"_count": {"fields": ["notes", "amount"]}}"#).unwrap();
        let count = aggregates.count.unwrap();
        assert!(!count.all);
        assert_eq!(count.fields, vec![Field::Notes, Field::Amount]);

        let unknown = serde_json::from_str::<Aggregates<Field>>(r#"{"_count": {"notes": true}}"#);
        assert!(unknown.is_err());
    }

    mod builders {
        use super::super::*;
        use crate::domain::{
            Bid, BidField, BidStatus, BidWhere, CivilEngineeringDesign, ComplianceCheck,
            ComplianceField, DesignField,
        };

        fn rejected<M: Model>(args: &GroupByArgs<M>) -> bool {
            matches!(args.validate(), Err(ClientError::Validation(_)))
        }

        fn by_status() -> GroupByArgs<Bid> {
            GroupByArgs::new(vec![BidField::Status], Aggregates::count_all())
        }

        #[test]
        fn group_by_renders_keys_having_order_and_window() {
            let mut args = by_status()
                .filter(BidWhere::for_project(uuid::Uuid::nil()))
                .order_by(GroupOrderBy {
                    field: BidField::Amount,
                    direction: SortOrder::Desc,
                    aggregate: Some(AggregateFn::Sum),
                });
            args.aggregates.sum = vec![BidField::Amount];
            args.having = vec![Having {
                field: BidField::Amount,
                aggregate: AggregateFn::Avg,
                filter: ScalarFilter {
                    gt: Some(Decimal::from(1000)),
                    ..Default::default()
                },
            }];
            args.take = Some(3);

            let qb = build_group_by(&args).unwrap();
            assert_eq!(
                qb.sql(),
                "SELECT status::text AS status, COUNT(*) AS _count__all, SUM(amount) AS _sum_amount \
                 FROM bids WHERE (project_id = $1) GROUP BY status \
                 HAVING (AVG(amount) > $2) ORDER BY SUM(amount) DESC LIMIT $3"
            );
        }

        #[test]
        fn group_by_key_ordering_is_table_qualified() {
            let args = by_status().order_by(GroupOrderBy::key(BidField::Status, SortOrder::Asc));
            let qb = build_group_by(&args).unwrap();
            assert!(qb.sql().ends_with("GROUP BY status ORDER BY bids.status ASC"));
        }

        #[test]
        fn group_by_needs_a_key() {
            let args = GroupByArgs::<Bid>::new(Vec::new(), Aggregates::count_all());
            assert!(rejected(&args));
            assert!(build_group_by(&args).is_err());
        }

        #[test]
        fn json_and_list_columns_cannot_be_keys() {
            let json = GroupByArgs::<CivilEngineeringDesign>::new(
                vec![DesignField::Loads],
                Aggregates::count_all(),
            );
            assert!(rejected(&json));

            let list = GroupByArgs::<ComplianceCheck>::new(
                vec![ComplianceField::Issues],
                Aggregates::count_all(),
            );
            assert!(rejected(&list));
        }

        #[test]
        fn order_by_outside_keys_needs_an_aggregate() {
            let args = by_status().order_by(GroupOrderBy::key(BidField::Amount, SortOrder::Asc));
            assert!(rejected(&args));

            let args = by_status().order_by(GroupOrderBy {
                field: BidField::Amount,
                direction: SortOrder::Asc,
                aggregate: Some(AggregateFn::Max),
            });
            assert!(args.validate().is_ok());
        }

        #[test]
        fn window_without_order_is_rejected() {
            let mut args = by_status();
            args.skip = Some(2);
            assert!(rejected(&args));

            let mut args = by_status();
            args.take = Some(2);
            assert!(rejected(&args));

            let mut args = by_status().order_by(GroupOrderBy::key(BidField::Status, SortOrder::Asc));
            args.take = Some(-1);
            assert!(rejected(&args));
            args.take = Some(1);
            assert!(args.validate().is_ok());
        }

        #[test]
        fn having_min_or_max_needs_a_numeric_field() {
            for aggregate in [AggregateFn::Min, AggregateFn::Max] {
                let mut args = by_status();
                args.having = vec![Having {
                    field: BidField::Notes,
                    aggregate,
                    filter: ScalarFilter::equals(Decimal::ONE),
                }];
                assert!(rejected(&args));
            }

            let mut args = by_status();
            args.having = vec![Having {
                field: BidField::Notes,
                aggregate: AggregateFn::Count,
                filter: ScalarFilter::equals(Decimal::ONE),
            }];
            assert!(args.validate().is_ok());
        }

        #[test]
        fn aggregate_without_window_reads_the_table() {
            let mut aggregates = Aggregates::count_all();
            aggregates.avg = vec![BidField::Amount];
            let args = AggregateArgs::<Bid>::new(
                BidWhere {
                    status: Some(ScalarFilter::equals(BidStatus::Pending)),
                    ..Default::default()
                },
                aggregates,
            );

            assert_eq!(
                build_aggregate(&args).unwrap().sql(),
                "SELECT COUNT(*) AS _count__all, AVG(amount) AS _avg_amount \
                 FROM bids WHERE (status = $1::bid_status)"
            );
        }

        #[test]
        fn windowed_aggregate_uses_a_subquery() {
            let mut args = AggregateArgs::<Bid>::new(
                BidWhere::default(),
                Aggregates {
                    max: vec![BidField::Amount],
                    ..Default::default()
                },
            );
            args.order_by = vec![OrderBy::desc(BidField::CreatedAt)];
            args.take = Some(10);

            assert_eq!(
                build_aggregate(&args).unwrap().sql(),
                "SELECT MAX(amount) AS _max_amount FROM (SELECT * FROM bids WHERE (TRUE) \
                 ORDER BY created_at DESC LIMIT $1) AS bids"
            );
        }

        #[test]
        fn aggregate_needs_a_selection() {
            let args = AggregateArgs::<Bid>::new(BidWhere::default(), Aggregates::default());
            assert!(matches!(
                build_aggregate(&args),
                Err(ClientError::Validation(_))
            ));
        }
    }

    #[test]
    fn aggregate_result_serializes_sparse() {
        let mut result = AggregateResult {
            count: Some(CountResult {
                all: Some(4),
                fields: BTreeMap::new(),
            }),
            ..Default::default()
        };
        result.avg.insert("amount", Some(Decimal::new(125050, 2)));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["_count"]["_all"], 4);
        assert_eq!(json["_avg"]["amount"], "1250.50");
        assert!(json.get("_min").is_none());
        assert_eq!(result.count_all(), 4);
    }
}
