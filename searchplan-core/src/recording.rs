// searchplan-core/src/recording.rs
//! Cursor that records every call instead of querying anything.
//!
//! Used by the CLI `compile` command and by tests asserting on the exact
//! operation sequence a plan emits.

use serde::Serialize;
use serde_json::Value;

use crate::condition::{GroupBy, RawExpression};
use crate::cursor::{Direction, Nested, QueryCursor};
use crate::error::Result;
use crate::operator::{Combinator, Comparison};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CursorOp {
    Where {
        boolean: Combinator,
        field: String,
        operator: String,
        value: Value,
    },
    WhereIn {
        boolean: Combinator,
        field: String,
        values: Vec<Value>,
    },
    WhereNotIn {
        boolean: Combinator,
        field: String,
        values: Vec<Value>,
    },
    WhereNull {
        boolean: Combinator,
        field: String,
    },
    WhereNotNull {
        boolean: Combinator,
        field: String,
    },
    WhereGroup {
        boolean: Combinator,
        ops: Vec<CursorOp>,
    },
    WhereHas {
        relation: String,
        ops: Vec<CursorOp>,
    },
    WhereRaw {
        boolean: Combinator,
        sql: String,
        bindings: Vec<Value>,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    OrderByRaw {
        sql: String,
        bindings: Vec<Value>,
    },
    GroupBy {
        groups: Vec<GroupBy>,
    },
    HavingRaw {
        boolean: Combinator,
        sql: String,
        bindings: Vec<Value>,
    },
    Skip {
        offset: u64,
    },
    Take {
        limit: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingCursor {
    ops: Vec<CursorOp>,
}

impl RecordingCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[CursorOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<CursorOp> {
        self.ops
    }

    /// Total number of recorded calls, nested ones included
    pub fn call_count(&self) -> usize {
        fn count(ops: &[CursorOp]) -> usize {
            ops.iter()
                .map(|op| match op {
                    CursorOp::WhereGroup { ops, .. } | CursorOp::WhereHas { ops, .. } => 1 + count(ops),
                    _ => 1,
                })
                .sum()
        }
        count(&self.ops)
    }

    fn record_nested(nested: Nested<'_>) -> Result<Vec<CursorOp>> {
        let mut inner = RecordingCursor::new();
        nested(&mut inner)?;
        Ok(inner.ops)
    }
}

impl QueryCursor for RecordingCursor {
    fn where_compare(
        &mut self,
        boolean: Combinator,
        field: &str,
        comparison: &Comparison,
        value: &Value,
    ) -> Result<()> {
        self.ops.push(CursorOp::Where {
            boolean,
            field: field.to_string(),
            operator: comparison.as_sql().to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn where_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()> {
        self.ops.push(CursorOp::WhereIn {
            boolean,
            field: field.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn where_not_in(&mut self, boolean: Combinator, field: &str, values: &[Value]) -> Result<()> {
        self.ops.push(CursorOp::WhereNotIn {
            boolean,
            field: field.to_string(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn where_null(&mut self, boolean: Combinator, field: &str) -> Result<()> {
        self.ops.push(CursorOp::WhereNull {
            boolean,
            field: field.to_string(),
        });
        Ok(())
    }

    fn where_not_null(&mut self, boolean: Combinator, field: &str) -> Result<()> {
        self.ops.push(CursorOp::WhereNotNull {
            boolean,
            field: field.to_string(),
        });
        Ok(())
    }

    fn where_group(&mut self, boolean: Combinator, nested: Nested<'_>) -> Result<()> {
        let ops = Self::record_nested(nested)?;
        self.ops.push(CursorOp::WhereGroup { boolean, ops });
        Ok(())
    }

    fn where_has(&mut self, relation: &str, nested: Nested<'_>) -> Result<()> {
        let ops = Self::record_nested(nested)?;
        self.ops.push(CursorOp::WhereHas {
            relation: relation.to_string(),
            ops,
        });
        Ok(())
    }

    fn where_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()> {
        self.ops.push(CursorOp::WhereRaw {
            boolean,
            sql: expr.sql.clone(),
            bindings: expr.bindings.clone(),
        });
        Ok(())
    }

    fn order_by(&mut self, field: &str, direction: Direction) -> Result<()> {
        self.ops.push(CursorOp::OrderBy {
            field: field.to_string(),
            direction,
        });
        Ok(())
    }

    fn order_by_raw(&mut self, expr: &RawExpression) -> Result<()> {
        self.ops.push(CursorOp::OrderByRaw {
            sql: expr.sql.clone(),
            bindings: expr.bindings.clone(),
        });
        Ok(())
    }

    fn group_by(&mut self, groups: &[GroupBy]) -> Result<()> {
        self.ops.push(CursorOp::GroupBy {
            groups: groups.to_vec(),
        });
        Ok(())
    }

    fn having_raw(&mut self, boolean: Combinator, expr: &RawExpression) -> Result<()> {
        self.ops.push(CursorOp::HavingRaw {
            boolean,
            sql: expr.sql.clone(),
            bindings: expr.bindings.clone(),
        });
        Ok(())
    }

    fn skip(&mut self, offset: u64) -> Result<()> {
        self.ops.push(CursorOp::Skip { offset });
        Ok(())
    }

    fn take(&mut self, limit: u64) -> Result<()> {
        self.ops.push(CursorOp::Take { limit });
        Ok(())
    }
}
