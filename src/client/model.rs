//! Traits tying a schema model to its table and typed inputs.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, FromRow, Postgres, QueryBuilder};
use std::fmt::Debug;

use super::filter::Clause;
use super::value::{Assignment, Value};

/// A table-backed entity with its typed operation inputs.
pub trait Model:
    for<'r> FromRow<'r, PgRow> + Serialize + Debug + Clone + Send + Sync + Unpin + 'static
{
    /// Name used in error messages, e.g. `Project`.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Columns selected for every returned row, in declaration order.
    const COLUMNS: &'static [&'static str];
    /// Column bumped to `NOW()` on every update, if the table has one.
    const UPDATED_AT: Option<&'static str> = Some("updated_at");

    type Field: ScalarField;
    type Where: WhereInput;
    type Unique: UniqueInput;
    type Create: CreateInput;
    type Update: UpdateInput;
}

/// Storage class of a scalar column. Decides which filters, aggregates and
/// group keys are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Text,
    Decimal,
    DateTime,
    Enum,
    Json,
    TextList,
}

impl FieldKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Decimal)
    }

    /// Whether `MIN`/`MAX` are meaningful.
    pub fn is_orderable(self) -> bool {
        matches!(self, Self::Decimal | Self::DateTime | Self::Text | Self::Enum)
    }

    pub fn is_groupable(self) -> bool {
        !matches!(self, Self::Json | Self::TextList)
    }
}

/// A selectable scalar column of a model, named in JSON by its snake_case
/// column name.
pub trait ScalarField:
    Copy + PartialEq + Eq + Debug + Send + Sync + DeserializeOwned + 'static
{
    fn column(&self) -> &'static str;
    fn kind(&self) -> FieldKind;
    /// Primary key, used as the default ordering.
    fn id() -> Self;
}

pub trait WhereInput: Default + Debug + Clone + Send + Sync + DeserializeOwned {
    /// Push one condition per populated filter into `clause`.
    fn push_conditions(&self, clause: &mut Clause<'_, '_>);

    /// Render as a single parenthesised condition.
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let mut clause = Clause::all(qb);
        self.push_conditions(&mut clause);
        clause.finish();
    }
}

/// Selects exactly one row by the primary key or another unique column.
pub trait UniqueInput: Debug + Clone + Send + Sync + DeserializeOwned {
    fn condition(&self) -> (&'static str, Value);
}

pub trait CreateInput: Debug + Clone + Send + Sync + DeserializeOwned {
    /// Columns to insert. Omitted columns take their database default.
    fn values(&self) -> Vec<(&'static str, Value)>;
}

pub trait UpdateInput: Debug + Clone + Default + Send + Sync + DeserializeOwned {
    fn assignments(&self) -> Vec<Assignment>;
}
