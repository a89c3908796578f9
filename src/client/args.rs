//! Arguments for list reads: ordering and pagination.

use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use super::error::{ClientError, ClientResult};
use super::model::{Model, ScalarField};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    fn as_sql(self) -> &'static str {
        match self {
            Self::First => " NULLS FIRST",
            Self::Last => " NULLS LAST",
        }
    }

    fn reverse(self) -> Self {
        match self {
            Self::First => Self::Last,
            Self::Last => Self::First,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderBy<F> {
    pub field: F,
    #[serde(default)]
    pub direction: SortOrder,
    #[serde(default)]
    pub nulls: Option<NullsOrder>,
}

impl<F> OrderBy<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    fn reversed(&self) -> Self
    where
        F: Copy,
    {
        Self {
            field: self.field,
            direction: self.direction.reverse(),
            nulls: self.nulls.map(NullsOrder::reverse),
        }
    }
}

/// Arguments of `find_many`, `find_first` and `aggregate` windows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields, bound(deserialize = ""))]
pub struct FindManyArgs<M: Model> {
    #[serde(rename = "where")]
    pub filter: M::Where,
    pub order_by: Vec<OrderBy<M::Field>>,
    pub skip: Option<i64>,
    /// A negative value reads from the end of the ordering.
    pub take: Option<i64>,
}

impl<M: Model> Default for FindManyArgs<M> {
    fn default() -> Self {
        Self {
            filter: M::Where::default(),
            order_by: Vec::new(),
            skip: None,
            take: None,
        }
    }
}

impl<M: Model> FindManyArgs<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: M::Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, order: OrderBy<M::Field>) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }

    pub(crate) fn validate(&self) -> ClientResult<()> {
        validate_skip(self.skip)
    }

    /// Whether a negative `take` requires reading backwards.
    pub(crate) fn is_backwards(&self) -> bool {
        matches!(self.take, Some(take) if take < 0)
    }

    pub(crate) fn effective_order(&self) -> Vec<OrderBy<M::Field>> {
        effective_order(&self.order_by, self.take)
    }

    pub(crate) fn has_window(&self) -> bool {
        !self.order_by.is_empty() || self.skip.is_some() || self.take.is_some()
    }
}

/// Ordering actually sent to the database. A negative `take` flips every
/// key, defaulting to the primary key, and the caller reverses the rows.
pub(crate) fn effective_order<F: ScalarField>(
    order_by: &[OrderBy<F>],
    take: Option<i64>,
) -> Vec<OrderBy<F>> {
    if !matches!(take, Some(take) if take < 0) {
        return order_by.to_vec();
    }
    if order_by.is_empty() {
        return vec![OrderBy::desc(F::id())];
    }
    order_by.iter().map(OrderBy::reversed).collect()
}

pub(crate) fn validate_skip(skip: Option<i64>) -> ClientResult<()> {
    match skip {
        Some(skip) if skip < 0 => Err(ClientError::validation(format!(
            "skip must be a non-negative integer, got {}",
            skip
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn push_order_by<F: ScalarField>(
    qb: &mut QueryBuilder<'_, Postgres>,
    order: &[OrderBy<F>],
) {
    if order.is_empty() {
        return;
    }
    qb.push(" ORDER BY ");
    for (i, key) in order.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(key.field.column());
        qb.push(" ");
        qb.push(key.direction.as_sql());
        if let Some(nulls) = key.nulls {
            qb.push(nulls.as_sql());
        }
    }
}

/// Row count for `LIMIT`. `i64::MIN` has no positive counterpart and
/// saturates to `i64::MAX`.
pub(crate) fn row_limit(take: i64) -> i64 {
    i64::try_from(take.unsigned_abs()).unwrap_or(i64::MAX)
}

/// `LIMIT`/`OFFSET` with `take` already made non-negative.
pub(crate) fn push_window(
    qb: &mut QueryBuilder<'_, Postgres>,
    skip: Option<i64>,
    take: Option<i64>,
) {
    if let Some(take) = take {
        qb.push(" LIMIT ");
        qb.push_bind(row_limit(take));
    }
    if let Some(skip) = skip.filter(|s| *s > 0) {
        qb.push(" OFFSET ");
        qb.push_bind(skip);
    }
}

/// Rows affected by a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchPayload {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_defaults_to_ascending() {
        let order: OrderBy<String> = serde_json::from_str(r#"{"field": "name"}"#).unwrap();
        assert_eq!(order.direction, SortOrder::Asc);
        assert!(order.nulls.is_none());
    }

    #[test]
    fn negative_skip_is_rejected() {
        assert!(matches!(
            validate_skip(Some(-1)),
            Err(ClientError::Validation(_))
        ));
        assert!(validate_skip(Some(0)).is_ok());
        assert!(validate_skip(None).is_ok());
    }

    #[test]
    fn reversing_flips_explicit_nulls() {
        let order = OrderBy {
            field: 'x',
            direction: SortOrder::Asc,
            nulls: Some(NullsOrder::First),
        };
        let reversed = order.reversed();
        assert_eq!(reversed.direction, SortOrder::Desc);
        assert_eq!(reversed.nulls, Some(NullsOrder::Last));
    }

    #[test]
    fn window_uses_absolute_take() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_window(&mut qb, Some(10), Some(-3));
        assert_eq!(qb.sql(), "SELECT 1 LIMIT $1 OFFSET $2");

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_window(&mut qb, Some(0), None);
        assert_eq!(qb.sql(), "SELECT 1");
    }

    #[test]
    fn most_negative_take_saturates() {
        assert_eq!(row_limit(-3), 3);
        assert_eq!(row_limit(7), 7);
        assert_eq!(row_limit(i64::MIN), i64::MAX);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_window(&mut qb, None, Some(i64::MIN));
        assert_eq!(qb.sql(), "SELECT 1 LIMIT $1");
    }
}
