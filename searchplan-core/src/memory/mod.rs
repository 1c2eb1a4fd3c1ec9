// searchplan-core/src/memory/mod.rs
//! In-memory reference cursor over JSON rows.
//!
//! `MemoryTable` holds the rows of one model; `MemoryQuery` implements the
//! full [`QueryCursor`] contract against them so that compiled plans can be
//! executed and counted without a database. Relations are nested objects
//! (to-one) or arrays of objects (to-many) stored under the relation name.

pub mod matching;
pub mod raw;

use std::sync::Arc;

use ahash::AHashMap;
use heck::ToSnakeCase;
use serde_json::{Map, Value};

use crate::condition::{GroupBy, RawExpression};
use crate::cursor::{Direction, Nested, QueryCursor, RowSource};
use crate::error::{Result, SearchError};
use crate::operator::{Combinator, Comparison};
use crate::schema::ModelSchema;
use crate::value_utils::{canonical_json_string, compare_values_with_none, get_nested_value};
use crate::log_debug;

use matching::{in_list, matcher_for, Matcher};
use raw::{parse_column_list, parse_order_list, RawPredicate};

/// Column holding the row count of each group after `group_by`
pub const COUNT_COLUMN: &str = "count";

#[derive(Debug, Clone)]
pub struct MemoryTable {
    schema: ModelSchema,
    rows: Arc<Vec<Value>>,
}

impl MemoryTable {
    pub fn new(schema: ModelSchema, rows: Vec<Value>) -> Self {
        MemoryTable {
            schema,
            rows: Arc::new(rows),
        }
    }

    /// Table whose columns are the keys found in `rows`, first seen first.
    pub fn from_rows(name: &str, rows: Vec<Value>) -> Self {
        let columns: Vec<String> = rows
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|obj| obj.keys().cloned())
            .collect();
        MemoryTable::new(ModelSchema::new(name).with_columns(columns), rows)
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// Replace the schema, keeping the rows (used to attach scopes).
    pub fn with_schema(mut self, schema: ModelSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn query(&self) -> MemoryQuery {
        MemoryQuery::new(Arc::clone(&self.rows))
    }
}

#[derive(Clone)]
enum Predicate {
    Compare {
        field: String,
        matcher: &'static dyn Matcher,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        field: String,
        negated: bool,
    },
    Group(Vec<Clause>),
    Has {
        relation: String,
        clauses: Vec<Clause>,
    },
    Raw(RawPredicate),
}

#[derive(Clone)]
struct Clause {
    boolean: Combinator,
    predicate: Predicate,
}

impl Predicate {
    fn eval(&self, row: &Value) -> Result<bool> {
        match self {
            Predicate::Compare { field, matcher, value } => {
                matcher.matches(get_nested_value(row, field), value)
            }
            Predicate::In { field, values, negated } => {
                let actual = get_nested_value(row, field).filter(|v| !v.is_null());
                Ok(actual.is_some() && in_list(actual, values) != *negated)
            }
            Predicate::Null { field, negated } => {
                let is_null = get_nested_value(row, field).map_or(true, Value::is_null);
                Ok(is_null != *negated)
            }
            Predicate::Group(clauses) => eval_clauses(row, clauses),
            Predicate::Has { relation, clauses } => match related(row, relation) {
                Some(target @ Value::Object(_)) => eval_clauses(target, clauses),
                Some(Value::Array(items)) => {
                    for item in items {
                        if eval_clauses(item, clauses)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Ok(false),
            },
            Predicate::Raw(raw) => raw.eval(row),
        }
    }
}

/// Relation accessors are camelCase; stored keys may be either spelling.
fn related<'a>(row: &'a Value, relation: &str) -> Option<&'a Value> {
    row.get(relation)
        .or_else(|| row.get(relation.to_snake_case().as_str()))
}

/// SQL precedence: `a AND b OR c` is `(a AND b) OR c`.
fn eval_clauses(row: &Value, clauses: &[Clause]) -> Result<bool> {
    let mut run = true;
    for (idx, clause) in clauses.iter().enumerate() {
        if idx > 0 && clause.boolean == Combinator::Or {
            if run {
                return Ok(true);
            }
            run = true;
        }
        if run {
            run = clause.predicate.eval(row)?;
        }
    }
    Ok(run)
}

/// Cursor over a shared, immutable row set
#[derive(Clone)]
pub struct MemoryQuery {
    rows: Arc<Vec<Value>>,
    wheres: Vec<Clause>,
    groups: Vec<String>,
    having: Vec<Clause>,
    sort: Vec<(String, Direction)>,
    offset: u64,
    limit: Option<u64>,
}

impl MemoryQuery {
    fn new(rows: Arc<Vec<Value>>) -> Self {
        MemoryQuery {
            rows,
            wheres: Vec::new(),
            groups: Vec::new(),
            having: Vec::new(),
            sort: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    fn push_where(&mut self, boolean: Combinator, predicate: Predicate) {
        self.wheres.push(Clause { boolean, predicate });
    }

    /// Clauses recorded by a nested builder; anything but wheres is ignored.
    fn nested_clauses(&self, nested: Nested<'_>) -> Result<Vec<Clause>> {
        let mut inner = MemoryQuery::new(Arc::clone(&self.rows));
        nested(&mut inner)?;
        if !inner.sort.is_empty() || !inner.groups.is_empty() || inner.limit.is_some() {
            log_debug!("ignoring order/group/window inside a nested where");
        }
        Ok(inner.wheres)
    }

    /// Filtered, grouped, having-filtered and sorted rows, no window.
    fn matching_rows(&self) -> Result<Vec<Value>> {
        let mut rows = Vec::new();
        for row in self.rows.iter() {
            if eval_clauses(row, &self.wheres)? {
                rows.push(row.clone());
            }
        }

        if !self.groups.is_empty() {
            rows = group_rows(rows, &self.groups);
        }

        if !self.having.is_empty() {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if eval_clauses(&row, &self.having)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        apply_sort(&mut rows, &self.sort);
        Ok(rows)
    }
}

fn group_rows(rows: Vec<Value>, groups: &[String]) -> Vec<Value> {
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut grouped: Vec<Map<String, Value>> = Vec::new();

    for row in rows {
        let key_values: Vec<Value> = groups
            .iter()
            .map(|column| get_nested_value(&row, column).cloned().unwrap_or(Value::Null))
            .collect();
        let key = canonical_json_string(&Value::Array(key_values.clone()));

        match index.get(&key) {
            Some(&slot) => {
                let count = grouped[slot]
                    .get(COUNT_COLUMN)
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                grouped[slot].insert(COUNT_COLUMN.to_string(), Value::from(count + 1));
            }
            None => {
                let mut group = Map::new();
                for (column, value) in groups.iter().zip(key_values) {
                    group.insert(column.clone(), value);
                }
                group.insert(COUNT_COLUMN.to_string(), Value::from(1u64));
                index.insert(key, grouped.len());
                grouped.push(group);
            }
        }
    }

    grouped.into_iter().map(Value::Object).collect()
}

/// Stable multi-key sort; missing and null values sort first.
fn apply_sort(rows: &mut [Value], sort: &[(String, Direction)]) {
    if sort.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for (field, direction) in sort {
            let cmp = compare_values_with_none(get_nested_value(a, field), get_nested_value(b, field));
            if cmp != std::cmp::Ordering::Equal {
                return match direction {
                    Direction::Asc => cmp,
                    Direction::Desc => cmp.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn set_sort_key(sort: &mut Vec<(String, Direction)>, field: String, direction: Direction) {
    sort.retain(|(existing, _)| *existing != field);
    sort.push((field, direction));
}

impl QueryCursor for MemoryQuery {
    fn where_compare(
        &mut self,
        boolean: Combinator,
        field: &str,
        comparison: &Comparison,
        value: &Value,
    ) -> Result<()> {
        let matcher = matcher_for(comparison.as_sql())?;
        self.push_where(
            boolean,
            Predicate::Compare {
                field: field.to_string(),
                matcher,
                value: value.clone(),
            },
        );
        Ok(())
    }

    fn where_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()> {
        self.push_where(
            boolean,
            Predicate::In {
                field: field.to_string(),
                values: values.to_vec(),
                negated: false,
            },
        );
        Ok(())
    }

    fn where_not_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()> {
        self.push_where(
            boolean,
            Predicate::In {
                field: field.to_string(),
                values: values.to_vec(),
                negated: true,
            },
        );
        Ok(())
    }

    fn where_null(&mut self, boolean: Combinator, field: &str) -> Result<()> {
        self.push_where(
            boolean,
            Predicate::Null {
                field: field.to_string(),
                negated: false,
            },
        );
        Ok(())
    }

    fn where_not_null(&mut self, boolean: Combinator, field: &str) -> Result<()> {
        self.push_where(
            boolean,
            Predicate::Null {
                field: field.to_string(),
                negated: true,
            },
        );
        Ok(())
    }

    fn where_group(&mut self, boolean: Combinator, nested: Nested<'_>) -> Result<()> {
        let clauses = self.nested_clauses(nested)?;
        // an empty group constrains nothing
        if !clauses.is_empty() {
            self.push_where(boolean, Predicate::Group(clauses));
        }
        Ok(())
    }

    fn where_has(&mut self, relation: &str, nested: Nested<'_>) -> Result<()> {
        let clauses = self.nested_clauses(nested)?;
        self.push_where(
            Combinator::And,
            Predicate::Has {
                relation: relation.to_string(),
                clauses,
            },
        );
        Ok(())
    }

    fn where_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()> {
        let predicate = RawPredicate::parse(&expr.sql, &expr.bindings)?;
        self.push_where(boolean, Predicate::Raw(predicate));
        Ok(())
    }

    fn order_by(&mut self, field: &str, direction: Direction) -> Result<()> {
        set_sort_key(&mut self.sort, field.to_string(), direction);
        Ok(())
    }

    fn order_by_raw(&mut self, expr: &RawExpression) -> Result<()> {
        for (field, direction) in parse_order_list(&expr.sql)? {
            set_sort_key(&mut self.sort, field, direction);
        }
        Ok(())
    }

    fn group_by(&mut self, groups: &[GroupBy]) -> Result<()> {
        for group in groups {
            let columns = match group {
                GroupBy::Column(column) => vec![column.clone()],
                GroupBy::Raw(expr) => parse_column_list(&expr.sql)?,
            };
            for column in columns {
                if !self.groups.contains(&column) {
                    self.groups.push(column);
                }
            }
        }
        Ok(())
    }

    fn having_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()> {
        let predicate = RawPredicate::parse(&expr.sql, &expr.bindings)?;
        self.having.push(Clause {
            boolean,
            predicate: Predicate::Raw(predicate),
        });
        Ok(())
    }

    fn skip(&mut self, offset: u64) -> Result<()> {
        self.offset = offset;
        Ok(())
    }

    fn take(&mut self, limit: u64) -> Result<()> {
        self.limit = Some(limit);
        Ok(())
    }
}

impl RowSource for MemoryQuery {
    fn count(&self) -> Result<u64> {
        Ok(self.matching_rows()?.len() as u64)
    }

    fn fetch(&self) -> Result<Vec<Value>> {
        let rows = self.matching_rows()?;
        let offset = usize::try_from(self.offset)
            .map_err(|_| SearchError::InvalidQuery(format!("offset {} out of range", self.offset)))?;
        let limit = match self.limit {
            Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
            None => usize::MAX,
        };
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> MemoryTable {
        MemoryTable::from_rows(
            "User",
            vec![
                json!({"id": 1, "name": "ann", "age": 31, "company": {"name": "acme"}, "posts": [{"id": 10}, {"id": 11}]}),
                json!({"id": 2, "name": "bob", "age": 17, "company": {"name": "initech"}, "posts": []}),
                json!({"id": 3, "name": null, "age": 45, "company": null, "posts": [{"id": 12}]}),
                json!({"id": 4, "name": "cid", "age": 31, "company": {"name": "acme"}}),
            ],
        )
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_from_rows_infers_columns() {
        let table = people();
        assert_eq!(table.len(), 4);
        assert!(table.schema().has_column("name"));
        assert!(table.schema().has_column("posts"));
        assert_eq!(table.schema().name(), "User");
    }

    #[test]
    fn test_compare_and_groups() {
        let table = people();
        let mut query = table.query();
        query
            .where_group(Combinator::And, &mut |q| {
                q.where_compare(Combinator::Or, "age", &Comparison::Lt, &json!(18))?;
                q.where_compare(Combinator::Or, "age", &Comparison::Gt, &json!(40))
            })
            .unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![2, 3]);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let table = people();
        let mut query = table.query();
        query.where_compare(Combinator::And, "age", &Comparison::Eq, &json!(31)).unwrap();
        query.where_compare(Combinator::And, "name", &Comparison::Eq, &json!("cid")).unwrap();
        query.where_compare(Combinator::Or, "id", &Comparison::Eq, &json!(2)).unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_where_has_object_and_array() {
        let table = people();

        let mut query = table.query();
        query
            .where_has("company", &mut |q| {
                q.where_compare(Combinator::And, "name", &Comparison::Eq, &json!("acme"))
            })
            .unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![1, 4]);

        let mut query = table.query();
        query
            .where_has("posts", &mut |q| {
                q.where_compare(Combinator::And, "id", &Comparison::Gte, &json!(12))
            })
            .unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![3]);
    }

    #[test]
    fn test_null_tests_and_in() {
        let table = people();

        let mut query = table.query();
        query.where_null(Combinator::And, "name").unwrap();
        assert_eq!(query.count().unwrap(), 1);

        let mut query = table.query();
        query.where_not_null(Combinator::And, "name").unwrap();
        assert_eq!(query.count().unwrap(), 3);

        let mut query = table.query();
        query.where_not_in(Combinator::And, "name", &[json!("ann")]).unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![2, 4]);
    }

    #[test]
    fn test_unsupported_operator() {
        let table = people();
        let err = table
            .query()
            .where_compare(Combinator::And, "name", &Comparison::Verbatim("regexp".into()), &json!("a"))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[test]
    fn test_sort_and_window() {
        let table = people();
        let mut query = table.query();
        query.order_by("age", Direction::Desc).unwrap();
        query.order_by_raw(&RawExpression::new("id desc")).unwrap();
        query.skip(1).unwrap();
        query.take(2).unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![4, 1]);
        assert_eq!(query.count().unwrap(), 4);
    }

    #[test]
    fn test_group_by_with_having() {
        let table = people();
        let mut query = table.query();
        query.group_by(&[GroupBy::Column("age".into())]).unwrap();
        query
            .having_raw(Combinator::And, &RawExpression::with_bindings("count(*) > ?", vec![json!(1)]))
            .unwrap();
        assert_eq!(query.fetch().unwrap(), vec![json!({"age": 31, "count": 2})]);
    }

    #[test]
    fn test_raw_where() {
        let table = people();
        let mut query = table.query();
        query
            .where_raw(Combinator::And, &RawExpression::with_bindings("age > ? and name like 'a%'", vec![json!(20)]))
            .unwrap();
        assert_eq!(ids(&query.fetch().unwrap()), vec![1]);
    }

    #[test]
    fn test_empty_group_matches_everything() {
        let table = people();
        let mut query = table.query();
        query.where_group(Combinator::And, &mut |_| Ok(())).unwrap();
        assert_eq!(query.count().unwrap(), 4);
    }
}
