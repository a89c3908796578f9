//! Filter inputs and the condition builder they render into.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use super::model::WhereInput;
use super::value::Value;

/// Joins conditions with `AND` (or `OR`) inside one pair of parentheses.
///
/// An empty conjunction renders `TRUE`, an empty disjunction `FALSE`.
pub struct Clause<'q, 'args> {
    qb: &'q mut QueryBuilder<'args, Postgres>,
    separator: &'static str,
    empty: &'static str,
    first: bool,
}

impl<'q, 'args> Clause<'q, 'args> {
    pub fn all(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self::open(qb, " AND ", "TRUE")
    }

    pub fn any(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self::open(qb, " OR ", "FALSE")
    }

    fn open(
        qb: &'q mut QueryBuilder<'args, Postgres>,
        separator: &'static str,
        empty: &'static str,
    ) -> Self {
        qb.push("(");
        Self {
            qb,
            separator,
            empty,
            first: true,
        }
    }

    /// Start the next condition and return the builder to write it into.
    pub fn item(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        if !self.first {
            self.qb.push(self.separator);
        }
        self.first = false;
        self.qb
    }

    pub fn finish(self) {
        if self.first {
            self.qb.push(self.empty);
        }
        self.qb.push(")");
    }

    pub fn field<F: FieldFilter>(&mut self, column: &str, filter: &Option<F>) {
        if let Some(filter) = filter {
            filter.push(column, self);
        }
    }

    pub fn logical<W: WhereInput>(&mut self, and: &[W], or: Option<&[W]>, not: &[W]) {
        for filter in and {
            filter.push_where(self.item());
        }
        if let Some(branches) = or {
            let mut any = Clause::any(self.item());
            for filter in branches {
                filter.push_where(any.item());
            }
            any.finish();
        }
        for filter in not {
            let qb = self.item();
            qb.push("NOT ");
            filter.push_where(qb);
        }
    }

    pub fn relation<W: WhereInput>(&mut self, join: Join, filter: &Option<RelationFilter<W>>) {
        let Some(filter) = filter else { return };
        if let Some(is) = &filter.is {
            self.exists(join, &**is, false, false);
        }
        if let Some(is_not) = &filter.is_not {
            self.exists(join, &**is_not, true, false);
        }
    }

    pub fn list_relation<W: WhereInput>(
        &mut self,
        join: Join,
        filter: &Option<ListRelationFilter<W>>,
    ) {
        let Some(filter) = filter else { return };
        if let Some(some) = &filter.some {
            self.exists(join, &**some, false, false);
        }
        if let Some(every) = &filter.every {
            self.exists(join, &**every, true, true);
        }
        if let Some(none) = &filter.none {
            self.exists(join, &**none, true, false);
        }
    }

    fn exists<W: WhereInput>(&mut self, join: Join, filter: &W, negated: bool, invert: bool) {
        let qb = self.item();
        qb.push(if negated { "NOT EXISTS (SELECT 1 FROM " } else { "EXISTS (SELECT 1 FROM " });
        qb.push(join.table);
        qb.push(" WHERE ");
        qb.push(join.on);
        qb.push(" AND ");
        if invert {
            qb.push("NOT ");
        }
        filter.push_where(qb);
        qb.push(")");
    }

    fn compare(&mut self, lhs: &str, op: &str, value: Value, fold: bool) {
        let qb = self.item();
        qb.push(lhs);
        qb.push(op);
        push_value(qb, value, fold);
    }

    fn in_list(&mut self, lhs: &str, values: Vec<Value>, negated: bool, fold: bool) {
        let qb = self.item();
        if values.is_empty() {
            qb.push(if negated { "TRUE" } else { "FALSE" });
            return;
        }
        qb.push(lhs);
        qb.push(if negated { " NOT IN (" } else { " IN (" });
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(qb, value, fold);
        }
        qb.push(")");
    }

    fn null_check(&mut self, column: &str, is_null: bool) {
        let qb = self.item();
        qb.push(column);
        qb.push(if is_null { " IS NULL" } else { " IS NOT NULL" });
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: Value, fold: bool) {
    if fold {
        qb.push("LOWER(");
        value.push_bind(qb);
        qb.push(")");
    } else {
        value.push_bind(qb);
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Correlates a related table with the row being filtered.
#[derive(Debug, Clone, Copy)]
pub struct Join {
    pub table: &'static str,
    pub on: &'static str,
}

/// A filter on a single column.
pub trait FieldFilter {
    fn push(&self, column: &str, clause: &mut Clause<'_, '_>);
}

/// Filter for uuid, numeric, timestamp and enum columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarFilter<T> {
    pub equals: Option<T>,
    pub not: Option<T>,
    #[serde(rename = "in")]
    pub in_: Option<Vec<T>>,
    pub not_in: Option<Vec<T>>,
    pub lt: Option<T>,
    pub lte: Option<T>,
    pub gt: Option<T>,
    pub gte: Option<T>,
    pub is_null: Option<bool>,
}

impl<T> Default for ScalarFilter<T> {
    fn default() -> Self {
        Self {
            equals: None,
            not: None,
            in_: None,
            not_in: None,
            lt: None,
            lte: None,
            gt: None,
            gte: None,
            is_null: None,
        }
    }
}

impl<T> ScalarFilter<T> {
    pub fn equals(value: T) -> Self {
        Self {
            equals: Some(value),
            ..Default::default()
        }
    }

    pub fn one_of(values: Vec<T>) -> Self {
        Self {
            in_: Some(values),
            ..Default::default()
        }
    }

    pub fn not_equals(value: T) -> Self {
        Self {
            not: Some(value),
            ..Default::default()
        }
    }
}

impl<T: Clone + Into<Value>> FieldFilter for ScalarFilter<T> {
    fn push(&self, column: &str, clause: &mut Clause<'_, '_>) {
        let value = |v: &T| -> Value { v.clone().into() };

        if let Some(v) = &self.equals {
            clause.compare(column, " = ", value(v), false);
        }
        if let Some(v) = &self.not {
            clause.compare(column, " <> ", value(v), false);
        }
        if let Some(vs) = &self.in_ {
            clause.in_list(column, vs.iter().map(value).collect(), false, false);
        }
        if let Some(vs) = &self.not_in {
            clause.in_list(column, vs.iter().map(value).collect(), true, false);
        }
        for (op, bound) in [
            (" < ", &self.lt),
            (" <= ", &self.lte),
            (" > ", &self.gt),
            (" >= ", &self.gte),
        ] {
            if let Some(v) = bound {
                clause.compare(column, op, value(v), false);
            }
        }
        if let Some(is_null) = self.is_null {
            clause.null_check(column, is_null);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// Filter for text columns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringFilter {
    pub equals: Option<String>,
    pub not: Option<String>,
    #[serde(rename = "in")]
    pub in_: Option<Vec<String>>,
    pub not_in: Option<Vec<String>>,
    pub lt: Option<String>,
    pub lte: Option<String>,
    pub gt: Option<String>,
    pub gte: Option<String>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    #[serde(default)]
    pub mode: QueryMode,
    pub is_null: Option<bool>,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            equals: Some(value.into()),
            ..Default::default()
        }
    }

    /// Case-insensitive substring match.
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            contains: Some(term.into()),
            mode: QueryMode::Insensitive,
            ..Default::default()
        }
    }
}

impl FieldFilter for StringFilter {
    fn push(&self, column: &str, clause: &mut Clause<'_, '_>) {
        let fold = self.mode == QueryMode::Insensitive;
        let lhs = if fold {
            format!("LOWER({})", column)
        } else {
            column.to_string()
        };
        let text = |v: &String| Value::Text(v.clone());

        if let Some(v) = &self.equals {
            clause.compare(&lhs, " = ", text(v), fold);
        }
        if let Some(v) = &self.not {
            clause.compare(&lhs, " <> ", text(v), fold);
        }
        if let Some(vs) = &self.in_ {
            clause.in_list(&lhs, vs.iter().map(text).collect(), false, fold);
        }
        if let Some(vs) = &self.not_in {
            clause.in_list(&lhs, vs.iter().map(text).collect(), true, fold);
        }
        for (op, bound) in [
            (" < ", &self.lt),
            (" <= ", &self.lte),
            (" > ", &self.gt),
            (" >= ", &self.gte),
        ] {
            if let Some(v) = bound {
                clause.compare(&lhs, op, text(v), fold);
            }
        }

        let like = if fold { " ILIKE " } else { " LIKE " };
        if let Some(v) = &self.contains {
            let pattern = format!("%{}%", escape_like(v));
            clause.compare(column, like, Value::Text(pattern), false);
        }
        if let Some(v) = &self.starts_with {
            let pattern = format!("{}%", escape_like(v));
            clause.compare(column, like, Value::Text(pattern), false);
        }
        if let Some(v) = &self.ends_with {
            let pattern = format!("%{}", escape_like(v));
            clause.compare(column, like, Value::Text(pattern), false);
        }
        if let Some(is_null) = self.is_null {
            clause.null_check(column, is_null);
        }
    }
}

/// Filter for `TEXT[]` columns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringListFilter {
    pub equals: Option<Vec<String>>,
    pub has: Option<String>,
    pub has_every: Option<Vec<String>>,
    pub has_some: Option<Vec<String>>,
    pub is_empty: Option<bool>,
}

impl FieldFilter for StringListFilter {
    fn push(&self, column: &str, clause: &mut Clause<'_, '_>) {
        if let Some(v) = &self.equals {
            clause.compare(column, " = ", Value::TextList(v.clone()), false);
        }
        if let Some(v) = &self.has {
            let qb = clause.item();
            Value::Text(v.clone()).push_bind(qb);
            qb.push(" = ANY(");
            qb.push(column);
            qb.push(")");
        }
        if let Some(v) = &self.has_every {
            clause.compare(column, " @> ", Value::TextList(v.clone()), false);
        }
        if let Some(v) = &self.has_some {
            clause.compare(column, " && ", Value::TextList(v.clone()), false);
        }
        if let Some(is_empty) = self.is_empty {
            let qb = clause.item();
            qb.push("cardinality(");
            qb.push(column);
            qb.push(if is_empty { ") = 0" } else { ") > 0" });
        }
    }
}

/// Filter for `JSONB` columns.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonFilter {
    pub equals: Option<serde_json::Value>,
    pub contains: Option<serde_json::Value>,
    pub has_key: Option<String>,
    pub is_null: Option<bool>,
}

impl FieldFilter for JsonFilter {
    fn push(&self, column: &str, clause: &mut Clause<'_, '_>) {
        if let Some(v) = &self.equals {
            clause.compare(column, " = ", Value::Json(v.clone()), false);
        }
        if let Some(v) = &self.contains {
            clause.compare(column, " @> ", Value::Json(v.clone()), false);
        }
        if let Some(key) = &self.has_key {
            clause.compare(column, " ? ", Value::Text(key.clone()), false);
        }
        if let Some(is_null) = self.is_null {
            clause.null_check(column, is_null);
        }
    }
}

/// Filter across a to-one relation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationFilter<W> {
    pub is: Option<Box<W>>,
    pub is_not: Option<Box<W>>,
}

/// Filter across a to-many relation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListRelationFilter<W> {
    pub some: Option<Box<W>>,
    pub every: Option<Box<W>>,
    pub none: Option<Box<W>>,
}

impl<W> ListRelationFilter<W> {
    pub fn some(filter: W) -> Self {
        Self {
            some: Some(Box::new(filter)),
            every: None,
            none: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn render(build: impl FnOnce(&mut Clause<'_, '_>)) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        let mut clause = Clause::all(&mut qb);
        build(&mut clause);
        clause.finish();
        qb.sql().to_string()
    }

    #[test]
    fn empty_conjunction_is_true() {
        assert_eq!(render(|_| {}), "(TRUE)");

        let mut qb = QueryBuilder::<Postgres>::new("");
        Clause::any(&mut qb).finish();
        assert_eq!(qb.sql(), "(FALSE)");
    }

    #[test]
    fn scalar_filter_renders_each_operation() {
        let filter = ScalarFilter {
            gte: Some(Decimal::from(1000)),
            lt: Some(Decimal::from(5000)),
            not: Some(Decimal::from(2500)),
            ..Default::default()
        };

        let sql = render(|c| c.field("amount", &Some(filter)));
        assert_eq!(sql, "(amount <> $1 AND amount < $2 AND amount >= $3)");
    }

    #[test]
    fn empty_in_lists_short_circuit() {
        let none_match = ScalarFilter::<Uuid>::one_of(vec![]);
        assert_eq!(render(|c| c.field("id", &Some(none_match))), "(FALSE)");

        let all_match = ScalarFilter::<Uuid> {
            not_in: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(render(|c| c.field("id", &Some(all_match))), "(TRUE)");

        let two = ScalarFilter::one_of(vec![Uuid::nil(), Uuid::nil()]);
        assert_eq!(render(|c| c.field("id", &Some(two))), "(id IN ($1, $2))");
    }

    #[test]
    fn insensitive_string_filter_folds_case() {
        let filter = StringFilter {
            equals: Some("Jalan Ampang Tower".into()),
            contains: Some("tower".into()),
            mode: QueryMode::Insensitive,
            ..Default::default()
        };

        let sql = render(|c| c.field("name", &Some(filter)));
        assert_eq!(sql, "(LOWER(name) = LOWER($1) AND name ILIKE $2)");
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn null_checks() {
        let filter = StringFilter {
            is_null: Some(false),
            ..Default::default()
        };
        assert_eq!(
            render(|c| c.field("description", &Some(filter))),
            "(description IS NOT NULL)"
        );
    }

    #[test]
    fn list_and_json_filters() {
        let list = StringListFilter {
            has: Some("cover".into()),
            is_empty: Some(false),
            ..Default::default()
        };
        assert_eq!(
            render(|c| c.field("issues", &Some(list))),
            "($1 = ANY(issues) AND cardinality(issues) > 0)"
        );

        let json = JsonFilter {
            has_key: Some("wind".into()),
            contains: Some(serde_json::json!({ "dead": 10 })),
            ..Default::default()
        };
        assert_eq!(
            render(|c| c.field("loads", &Some(json))),
            "(loads @> $1 AND loads ? $2)"
        );
    }

    #[test]
    fn filters_deserialize_from_snake_case() {
        let filter: ScalarFilter<Decimal> =
            serde_json::from_str(r#"{"in": [1, 2], "is_null": false}"#).unwrap();
        assert_eq!(filter.in_.map(|v| v.len()), Some(2));
        assert_eq!(filter.is_null, Some(false));

        let err = serde_json::from_str::<StringFilter>(r#"{"like": "x"}"#);
        assert!(err.is_err());
    }
}
