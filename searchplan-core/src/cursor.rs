// searchplan-core/src/cursor.rs
//! The abstract query cursor the compiler drives.
//!
//! A cursor accumulates predicates, sorts, grouping and windowing the way a
//! relational query builder does. The compiler never reads data through it;
//! [`RowSource`] is the separate read side used by pagination.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::condition::{GroupBy, RawExpression};
use crate::error::Result;
use crate::operator::{Combinator, Comparison};

/// Body of a nested predicate group or relation scope
pub type Nested<'a> = &'a mut dyn FnMut(&mut dyn QueryCursor) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `asc` / `desc`
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable query under construction
///
/// Every `boolean` argument says how the clause joins the clauses before it,
/// mirroring `where` versus `orWhere` on a relational query builder. Cursors
/// may reject operators or SQL they cannot honor with
/// [`SearchError::InvalidQuery`](crate::error::SearchError::InvalidQuery).
pub trait QueryCursor {
    fn where_compare(
        &mut self,
        boolean: Combinator,
        field: &str,
        comparison: &Comparison,
        value: &Value,
    ) -> Result<()>;

    fn where_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()>;

    fn where_not_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()>;

    fn where_null(&mut self, boolean: Combinator, field: &str) -> Result<()>;

    fn where_not_null(&mut self, boolean: Combinator, field: &str) -> Result<()>;

    /// Parenthesized group of clauses
    fn where_group(&mut self, boolean: Combinator, nested: Nested<'_>) -> Result<()>;

    /// Restrict to rows with at least one related record matching `nested`
    fn where_has(&mut self, relation: &str, nested: Nested<'_>) -> Result<()>;

    fn where_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()>;

    fn order_by(&mut self, field: &str, direction: Direction) -> Result<()>;

    fn order_by_raw(&mut self, expr: &RawExpression) -> Result<()>;

    fn group_by(&mut self, groups: &[GroupBy]) -> Result<()>;

    fn having_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()>;

    fn skip(&mut self, offset: u64) -> Result<()>;

    fn take(&mut self, limit: u64) -> Result<()>;
}

/// Read side of a cursor
pub trait RowSource {
    /// Matching rows, ignoring any skip/take window
    fn count(&self) -> Result<u64>;

    /// Matching rows inside the current window
    fn fetch(&self) -> Result<Vec<Value>>;
}
