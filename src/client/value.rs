//! Bindable values and column assignments.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// A single SQL parameter. Enum labels are bound as text and cast to their
/// Postgres enum type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
    TextList(Vec<String>),
    Enum {
        pg_type: &'static str,
        label: &'static str,
    },
}

impl Value {
    pub fn push_bind(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Value::Null => {
                qb.push("NULL");
            }
            Value::Bool(v) => {
                qb.push_bind(v);
            }
            Value::Int(v) => {
                qb.push_bind(v);
            }
            Value::Decimal(v) => {
                qb.push_bind(v);
            }
            Value::Text(v) => {
                qb.push_bind(v);
            }
            Value::Uuid(v) => {
                qb.push_bind(v);
            }
            Value::DateTime(v) => {
                qb.push_bind(v);
            }
            Value::Json(v) => {
                qb.push_bind(sqlx::types::Json(v));
            }
            Value::TextList(v) => {
                qb.push_bind(v);
            }
            Value::Enum { pg_type, label } => {
                qb.push_bind(label);
                qb.push("::");
                qb.push(pg_type);
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextList(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Deserializes `Option<Option<T>>` so that an absent field stays `None`
/// while an explicit `null` becomes `Some(None)`.
///
/// Use together with `#[serde(default)]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Right-hand side of a `SET column = ...` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    Set(Value),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
    Append(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: &'static str,
    pub expr: SetExpr,
}

impl Assignment {
    pub fn set(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            expr: SetExpr::Set(value.into()),
        }
    }

    pub fn push(self, qb: &mut QueryBuilder<'_, Postgres>) {
        let column = self.column;
        qb.push(column);
        qb.push(" = ");

        let (operator, value) = match self.expr {
            SetExpr::Set(value) => {
                value.push_bind(qb);
                return;
            }
            SetExpr::Append(value) => {
                qb.push("array_cat(");
                qb.push(column);
                qb.push(", ");
                value.push_bind(qb);
                qb.push(")");
                return;
            }
            SetExpr::Increment(value) => (" + ", value),
            SetExpr::Decrement(value) => (" - ", value),
            SetExpr::Multiply(value) => (" * ", value),
            SetExpr::Divide(value) => (" / ", value),
        };

        qb.push(column);
        qb.push(operator);
        value.push_bind(qb);
    }
}

/// Atomic operation on a numeric column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum DecimalOperation {
    Set(Decimal),
    Increment(Decimal),
    Decrement(Decimal),
    Multiply(Decimal),
    Divide(Decimal),
}

/// Numeric update input: a plain value or an atomic operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DecimalUpdate {
    Value(Decimal),
    Operation(DecimalOperation),
}

impl DecimalUpdate {
    fn into_expr(self) -> SetExpr {
        match self {
            DecimalUpdate::Value(v) | DecimalUpdate::Operation(DecimalOperation::Set(v)) => {
                SetExpr::Set(v.into())
            }
            DecimalUpdate::Operation(DecimalOperation::Increment(v)) => {
                SetExpr::Increment(v.into())
            }
            DecimalUpdate::Operation(DecimalOperation::Decrement(v)) => {
                SetExpr::Decrement(v.into())
            }
            DecimalUpdate::Operation(DecimalOperation::Multiply(v)) => SetExpr::Multiply(v.into()),
            DecimalUpdate::Operation(DecimalOperation::Divide(v)) => SetExpr::Divide(v.into()),
        }
    }
}

impl From<Decimal> for DecimalUpdate {
    fn from(v: Decimal) -> Self {
        DecimalUpdate::Value(v)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ListOperation {
    Set(Vec<String>),
    Push(Vec<String>),
}

/// Text-array update input: a replacement list or an operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListUpdate {
    Value(Vec<String>),
    Operation(ListOperation),
}

impl ListUpdate {
    fn into_expr(self) -> SetExpr {
        match self {
            ListUpdate::Value(v) | ListUpdate::Operation(ListOperation::Set(v)) => {
                SetExpr::Set(v.into())
            }
            ListUpdate::Operation(ListOperation::Push(v)) => SetExpr::Append(v.into()),
        }
    }
}

/// Column/value pairs for an INSERT.
#[derive(Debug, Default)]
pub struct Values(Vec<(&'static str, Value)>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.0.push((column, value.into()));
        self
    }

    /// Omitted when `None`, letting the column default apply.
    pub fn optional<T>(mut self, column: &'static str, value: &Option<T>) -> Self
    where
        T: Clone + Into<Value>,
    {
        if let Some(v) = value {
            self.0.push((column, v.clone().into()));
        }
        self
    }

    pub fn into_vec(self) -> Vec<(&'static str, Value)> {
        self.0
    }
}

/// Assignments for an UPDATE, collected from a partial update input.
#[derive(Debug, Default)]
pub struct Changes(Vec<Assignment>);

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T>(mut self, column: &'static str, value: &Option<T>) -> Self
    where
        T: Clone + Into<Value>,
    {
        if let Some(v) = value {
            self.0.push(Assignment::set(column, v.clone()));
        }
        self
    }

    pub fn set_nullable<T>(mut self, column: &'static str, value: &Option<Option<T>>) -> Self
    where
        T: Clone + Into<Value>,
    {
        if let Some(v) = value {
            self.0.push(Assignment::set(column, v.clone()));
        }
        self
    }

    pub fn decimal(mut self, column: &'static str, value: &Option<DecimalUpdate>) -> Self {
        if let Some(v) = value {
            self.0.push(Assignment {
                column,
                expr: v.clone().into_expr(),
            });
        }
        self
    }

    pub fn nullable_decimal(
        mut self,
        column: &'static str,
        value: &Option<Option<DecimalUpdate>>,
    ) -> Self {
        match value {
            Some(Some(v)) => self.0.push(Assignment {
                column,
                expr: v.clone().into_expr(),
            }),
            Some(None) => self.0.push(Assignment::set(column, Value::Null)),
            None => {}
        }
        self
    }

    pub fn list(mut self, column: &'static str, value: &Option<ListUpdate>) -> Self {
        if let Some(v) = value {
            self.0.push(Assignment {
                column,
                expr: v.clone().into_expr(),
            });
        }
        self
    }

    pub fn into_vec(self) -> Vec<Assignment> {
        self.0
    }
}
