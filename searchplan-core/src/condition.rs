// searchplan-core/src/condition.rs
//! Canonical condition tree
//!
//! Every entry of a search is resolved ONCE, during normalization, into one
//! of the [`Condition`] variants. Nothing downstream inspects raw value shapes
//! again.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::cursor::{Direction, QueryCursor};
use crate::error::Result;
use crate::operator::{Combinator, Operator};
use crate::path::FieldPath;

/// Opaque SQL fragment with positional `?` bindings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawExpression {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Value>,
}

impl RawExpression {
    pub fn new(sql: impl Into<String>) -> Self {
        RawExpression {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        RawExpression {
            sql: sql.into(),
            bindings,
        }
    }
}

impl fmt::Display for RawExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

type MutatorFn = dyn Fn(&mut dyn QueryCursor) -> Result<()> + Send + Sync;

/// Caller-supplied function applied to the cursor as one where clause
///
/// Two mutators are equal only when they share the same function object.
#[derive(Clone)]
pub struct QueryMutator(Arc<MutatorFn>);

impl QueryMutator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn QueryCursor) -> Result<()> + Send + Sync + 'static,
    {
        QueryMutator(Arc::new(f))
    }

    pub fn call(&self, cursor: &mut dyn QueryCursor) -> Result<()> {
        (self.0)(cursor)
    }
}

impl fmt::Debug for QueryMutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryMutator({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for QueryMutator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Reference to a reusable predicate declared on a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedScope {
    pub name: String,
    /// Model declaring the scope; `None` means the searched model
    pub owner: Option<String>,
    pub args: Vec<Value>,
}

impl NamedScope {
    pub fn new(name: impl Into<String>) -> Self {
        NamedScope {
            name: name.into(),
            owner: None,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn owned_by(mut self, model: impl Into<String>) -> Self {
        self.owner = Some(model.into());
        self
    }
}

/// All operators declared for one field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub path: FieldPath,
    pub comparisons: Vec<(Operator, Value)>,
    pub combinator: Combinator,
}

impl FieldCondition {
    pub fn new(path: FieldPath, combinator: Combinator) -> Self {
        FieldCondition {
            path,
            comparisons: Vec::new(),
            combinator,
        }
    }

    pub fn with(mut self, operator: Operator, value: Value) -> Self {
        self.comparisons.push((operator, value));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field(FieldCondition),
    Raw(RawExpression),
    Callback(QueryMutator),
    Scope(NamedScope),
}

impl Condition {
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Field(_) => "field",
            Condition::Raw(_) => "raw",
            Condition::Callback(_) => "callback",
            Condition::Scope(_) => "scope",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrderBy {
    Column { field: String, direction: Direction },
    Raw(RawExpression),
}

impl OrderBy {
    pub fn column(field: impl Into<String>, direction: Direction) -> Self {
        OrderBy::Column {
            field: field.into(),
            direction,
        }
    }

    /// `+field` sorts ascending, `-field` descending; anything else is dropped.
    pub fn from_sort_token(token: &str) -> Option<Self> {
        let direction = match token.chars().next()? {
            '+' => Direction::Asc,
            '-' => Direction::Desc,
            _ => return None,
        };
        let field = token[1..].trim();
        if field.is_empty() {
            return None;
        }
        Some(OrderBy::column(field, direction))
    }

    /// Column name; `None` for raw expressions
    pub fn field(&self) -> Option<&str> {
        match self {
            OrderBy::Column { field, .. } => Some(field),
            OrderBy::Raw(_) => None,
        }
    }
}

/// Ordered sort list where a later entry for a field replaces the earlier
/// one and moves to the end
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OrderSpec(Vec<OrderBy>);

impl OrderSpec {
    pub fn push(&mut self, order: OrderBy) {
        if let OrderBy::Column { field, .. } = &order {
            self.0
                .retain(|existing| !matches!(existing, OrderBy::Column { field: f, .. } if f == field));
        }
        self.0.push(order);
    }

    pub fn extend(&mut self, other: OrderSpec) {
        for order in other.0 {
            self.push(order);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderBy> {
        self.0.iter()
    }

    /// Direction currently recorded for a column
    pub fn direction_of(&self, field: &str) -> Option<Direction> {
        self.0.iter().find_map(|order| match order {
            OrderBy::Column { field: f, direction } if f == field => Some(*direction),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupBy {
    Column(String),
    Raw(RawExpression),
}

/// Deduplicated, order-preserving group-by list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupSpec(Vec<GroupBy>);

impl GroupSpec {
    pub fn push(&mut self, group: GroupBy) {
        if !self.0.contains(&group) {
            self.0.push(group);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[GroupBy] {
        &self.0
    }
}

/// The compiled root consumed by the plan builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    pub wheres: Vec<Condition>,
    pub order: OrderSpec,
    pub group_by: GroupSpec,
    /// Field and raw conditions only
    pub having: Vec<Condition>,
    pub keyword: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub offset: u64,
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_tokens() {
        assert_eq!(
            OrderBy::from_sort_token("+rank"),
            Some(OrderBy::column("rank", Direction::Asc))
        );
        assert_eq!(
            OrderBy::from_sort_token("-id"),
            Some(OrderBy::column("id", Direction::Desc))
        );
        assert_eq!(OrderBy::from_sort_token("rank"), None);
        assert_eq!(OrderBy::from_sort_token("+"), None);
        assert_eq!(OrderBy::from_sort_token(""), None);
    }

    #[test]
    fn test_order_spec_last_write_wins() {
        let mut order = OrderSpec::default();
        order.push(OrderBy::column("id", Direction::Asc));
        order.push(OrderBy::column("rank", Direction::Asc));
        order.push(OrderBy::column("id", Direction::Desc));

        let fields: Vec<_> = order
            .iter()
            .map(|o| match o {
                OrderBy::Column { field, direction } => (field.as_str(), *direction),
                OrderBy::Raw(_) => unreachable!(),
            })
            .collect();
        assert_eq!(fields, vec![("rank", Direction::Asc), ("id", Direction::Desc)]);
        assert_eq!(order.direction_of("id"), Some(Direction::Desc));
    }

    #[test]
    fn test_raw_orders_are_never_merged() {
        let mut order = OrderSpec::default();
        order.push(OrderBy::Raw(RawExpression::new("field(id, 3, 1)")));
        order.push(OrderBy::Raw(RawExpression::new("field(id, 3, 1)")));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_group_spec_dedup() {
        let mut groups = GroupSpec::default();
        groups.push(GroupBy::Column("company_id".into()));
        groups.push(GroupBy::Raw(RawExpression::new("date(created_at)")));
        groups.push(GroupBy::Column("company_id".into()));
        assert_eq!(groups.as_slice().len(), 2);
    }

    #[test]
    fn test_mutator_identity() {
        let a = QueryMutator::new(|_| Ok(()));
        let b = a.clone();
        let c = QueryMutator::new(|_| Ok(()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_named_scope_builder() {
        let scope = NamedScope::new("name").with_args(vec![json!("acme")]).owned_by("Company");
        assert_eq!(scope.owner.as_deref(), Some("Company"));
        assert_eq!(scope.args, vec![json!("acme")]);
    }
}
