// searchplan-core/src/plan.rs
//! Query plan: a resolved, ordered list of cursor steps.
//!
//! Building a plan resolves every named scope up front, so a missing scope
//! fails the compilation before the cursor sees a single call. Applying a
//! plan only replays steps.
//!
//! Step order: keyword, wheres, group by, having, order, window.
//!
//! Callbacks and scopes run inside their own AND group, so an `or` clause
//! they emit never joins the sibling filters.

use std::fmt;
use std::sync::Arc;

use heck::ToLowerCamelCase;
use serde_json::Value;

use crate::condition::{Condition, ConditionSet, FieldCondition, GroupBy, NamedScope, OrderBy, QueryMutator, RawExpression};
use crate::cursor::QueryCursor;
use crate::error::{Result, SearchError};
use crate::operator::{Combinator, Comparison, Operator};
use crate::path::FieldPath;
use crate::schema::{ModelIntrospector, ModelSchema, ScopeFn};
use crate::{log_debug, log_trace};

/// Scope a model may declare to take over keyword search
pub const KEYWORD_SCOPE: &str = "searchKeyword";

/// Column searched with `like` when no keyword scope exists
pub const KEYWORD_COLUMN: &str = "name";

#[derive(Clone)]
pub struct ResolvedScope {
    pub scope: NamedScope,
    pub owner: String,
    body: Arc<ScopeFn>,
}

impl ResolvedScope {
    pub fn apply(&self, cursor: &mut dyn QueryCursor) -> Result<()> {
        (self.body)(cursor, &self.scope.args)
    }
}

impl fmt::Debug for ResolvedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedScope")
            .field("scope", &self.scope)
            .field("owner", &self.owner)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum PlanStep {
    Field(FieldCondition),
    Raw(RawExpression),
    Callback(QueryMutator),
    Scope(ResolvedScope),
    GroupBy(Vec<GroupBy>),
    Having(RawExpression),
    Order(OrderBy),
    Window { offset: u64, limit: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    steps: Vec<PlanStep>,
}

impl QueryPlan {
    /// Resolve a condition set against a model.
    ///
    /// Fails with [`SearchError::ScopeNotFound`] when any scope cannot be
    /// resolved; nothing has touched a cursor at that point.
    pub fn build(
        set: &ConditionSet,
        model: &ModelSchema,
        registry: &dyn ModelIntrospector,
    ) -> Result<QueryPlan> {
        let mut steps = Vec::new();

        if let Some(keyword) = &set.keyword {
            match keyword_step(keyword, model) {
                Some(step) => steps.push(step),
                None => log_debug!(
                    "model '{}' has neither a {} scope nor a '{}' column; keyword ignored",
                    model.name(),
                    KEYWORD_SCOPE,
                    KEYWORD_COLUMN
                ),
            }
        }

        for condition in &set.wheres {
            steps.push(match condition {
                Condition::Field(field) => PlanStep::Field(field.clone()),
                Condition::Raw(expr) => PlanStep::Raw(expr.clone()),
                Condition::Callback(f) => PlanStep::Callback(f.clone()),
                Condition::Scope(scope) => PlanStep::Scope(resolve_scope(scope, model, registry)?),
            });
        }

        if !set.group_by.is_empty() {
            steps.push(PlanStep::GroupBy(set.group_by.as_slice().to_vec()));
        }

        for condition in &set.having {
            match condition {
                Condition::Field(field) => match having_fragment(field) {
                    Some(expr) => steps.push(PlanStep::Having(expr)),
                    None => log_debug!("having on '{}' has no applicable operators", field.path),
                },
                Condition::Raw(expr) => steps.push(PlanStep::Having(expr.clone())),
                other => {
                    return Err(SearchError::malformed(
                        "having",
                        format!("{} conditions are not allowed in having", other.kind()),
                    ))
                }
            }
        }

        steps.extend(set.order.iter().cloned().map(PlanStep::Order));

        if set.limit > 0 {
            steps.push(PlanStep::Window {
                offset: set.offset,
                limit: set.limit,
            });
        }

        Ok(QueryPlan { steps })
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply(&self, cursor: &mut dyn QueryCursor) -> Result<()> {
        for step in &self.steps {
            log_trace!("apply {:?}", step);
            match step {
                PlanStep::Field(field) => apply_field(cursor, field)?,
                PlanStep::Raw(expr) => cursor.where_raw(Combinator::And, expr)?,
                PlanStep::Callback(f) => {
                    cursor.where_group(Combinator::And, &mut |group| f.call(group))?
                }
                PlanStep::Scope(scope) => {
                    cursor.where_group(Combinator::And, &mut |group| scope.apply(group))?
                }
                PlanStep::GroupBy(groups) => cursor.group_by(groups)?,
                PlanStep::Having(expr) => cursor.having_raw(Combinator::And, expr)?,
                PlanStep::Order(OrderBy::Column { field, direction }) => {
                    cursor.order_by(field, *direction)?
                }
                PlanStep::Order(OrderBy::Raw(expr)) => cursor.order_by_raw(expr)?,
                PlanStep::Window { offset, limit } => {
                    cursor.skip(*offset)?;
                    cursor.take(*limit)?;
                }
            }
        }
        Ok(())
    }
}

fn resolve_scope(
    scope: &NamedScope,
    model: &ModelSchema,
    registry: &dyn ModelIntrospector,
) -> Result<ResolvedScope> {
    let owner = match scope.owner.as_deref() {
        Some(owner) if owner != model.name() => {
            registry.model(owner).ok_or_else(|| SearchError::ScopeNotFound {
                scope: scope.name.clone(),
                model: owner.to_string(),
            })?
        }
        _ => model,
    };

    let body = owner.scope(&scope.name).ok_or_else(|| SearchError::ScopeNotFound {
        scope: scope.name.clone(),
        model: owner.name().to_string(),
    })?;

    Ok(ResolvedScope {
        scope: scope.clone(),
        owner: owner.name().to_string(),
        body,
    })
}

fn keyword_step(keyword: &str, model: &ModelSchema) -> Option<PlanStep> {
    if let Some(body) = model.scope(KEYWORD_SCOPE) {
        return Some(PlanStep::Scope(ResolvedScope {
            scope: NamedScope::new(KEYWORD_SCOPE).with_args(vec![Value::String(keyword.to_string())]),
            owner: model.name().to_string(),
            body,
        }));
    }

    if model.has_column(KEYWORD_COLUMN) {
        let pattern = format!("%{}%", keyword.trim_matches('%'));
        return Some(PlanStep::Field(
            FieldCondition::new(FieldPath::column(KEYWORD_COLUMN), Combinator::And).with(
                Operator::Compare(Comparison::Verbatim("like".to_string())),
                Value::String(pattern),
            ),
        ));
    }

    None
}

/// One grouped predicate per field; relation-scoped fields nest one
/// `where_has` per relation segment.
fn apply_field(cursor: &mut dyn QueryCursor, field: &FieldCondition) -> Result<()> {
    let relations = field.path.relations.segments();
    if relations.is_empty() {
        cursor.where_group(Combinator::And, &mut |group| apply_comparisons(group, field))
    } else {
        apply_scoped(cursor, relations, field)
    }
}

fn apply_scoped(cursor: &mut dyn QueryCursor, relations: &[String], field: &FieldCondition) -> Result<()> {
    match relations.split_first() {
        Some((relation, rest)) => cursor.where_has(&relation.to_lower_camel_case(), &mut |scoped| {
            apply_scoped(scoped, rest, field)
        }),
        None => apply_comparisons(cursor, field),
    }
}

fn apply_comparisons(cursor: &mut dyn QueryCursor, field: &FieldCondition) -> Result<()> {
    let boolean = field.combinator;
    let column = field.path.field.as_str();

    for (operator, value) in &field.comparisons {
        if !operator.accepts_value(value) {
            log_debug!("skipping '{} {}': not a non-empty list", column, operator);
            continue;
        }
        match operator {
            Operator::Compare(cmp) => cursor.where_compare(boolean, column, cmp, value)?,
            Operator::In => cursor.where_in(boolean, column, as_list(value))?,
            Operator::NotIn => cursor.where_not_in(boolean, column, as_list(value))?,
            Operator::Is => cursor.where_null(boolean, column)?,
            Operator::IsNot => cursor.where_not_null(boolean, column)?,
        }
    }
    Ok(())
}

fn as_list(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Render a field condition as `field op ? and field op ?`
fn having_fragment(field: &FieldCondition) -> Option<RawExpression> {
    let column = field.path.to_string();
    let mut parts = Vec::new();
    let mut bindings = Vec::new();

    for (operator, value) in &field.comparisons {
        if !operator.accepts_value(value) {
            continue;
        }
        match operator {
            Operator::Compare(cmp) => {
                parts.push(format!("{} {} ?", column, cmp.as_sql()));
                bindings.push(value.clone());
            }
            Operator::In | Operator::NotIn => {
                let items = as_list(value);
                let placeholders = vec!["?"; items.len()].join(", ");
                let keyword = if *operator == Operator::In { "in" } else { "not in" };
                parts.push(format!("{} {} ({})", column, keyword, placeholders));
                bindings.extend(items.iter().cloned());
            }
            Operator::Is => parts.push(format!("{} is null", column)),
            Operator::IsNot => parts.push(format!("{} is not null", column)),
        }
    }

    if parts.is_empty() {
        return None;
    }
    let joiner = format!(" {} ", field.combinator.keyword());
    Some(RawExpression::with_bindings(parts.join(&joiner), bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{CursorOp, RecordingCursor};
    use crate::request::{SearchRequest, WhereEntry};
    use crate::schema::ModelRegistry;
    use serde_json::json;

    fn plan_for(request: serde_json::Value, model: &ModelSchema) -> Result<QueryPlan> {
        let request = SearchRequest::from_json(&request)?;
        let set = ConditionSet::compile(&request)?;
        QueryPlan::build(&set, model, &ModelRegistry::new())
    }

    fn record(plan: &QueryPlan) -> Vec<CursorOp> {
        let mut cursor = RecordingCursor::new();
        plan.apply(&mut cursor).unwrap();
        cursor.into_ops()
    }

    #[test]
    fn test_scalar_wrapped_in_group() {
        let plan = plan_for(json!({"wheres": {"name": "ann"}}), &ModelSchema::new("User")).unwrap();
        let ops = record(&plan);
        assert_eq!(
            ops,
            vec![CursorOp::WhereGroup {
                boolean: Combinator::And,
                ops: vec![CursorOp::Where {
                    boolean: Combinator::And,
                    field: "name".into(),
                    operator: "=".into(),
                    value: json!("ann"),
                }],
            }]
        );
    }

    #[test]
    fn test_or_mix_applies_inside_group() {
        let plan = plan_for(
            json!({"wheres": {"age": {"lt": 18, "gt": 65, "mix": "or"}}}),
            &ModelSchema::new("User"),
        )
        .unwrap();
        match &record(&plan)[0] {
            CursorOp::WhereGroup { boolean, ops } => {
                assert_eq!(*boolean, Combinator::And);
                assert!(ops.iter().all(|op| matches!(op, CursorOp::Where { boolean: Combinator::Or, .. })));
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_relations_nest_per_segment() {
        let plan = plan_for(
            json!({"wheres": {"company$owner_profile$name.like": "%a%"}}),
            &ModelSchema::new("User"),
        )
        .unwrap();
        let ops = record(&plan);
        match &ops[0] {
            CursorOp::WhereHas { relation, ops } => {
                assert_eq!(relation, "company");
                match &ops[0] {
                    CursorOp::WhereHas { relation, ops } => {
                        assert_eq!(relation, "ownerProfile");
                        assert!(matches!(&ops[0], CursorOp::Where { field, operator, .. } if field == "name" && operator == "like"));
                    }
                    other => panic!("unexpected op {:?}", other),
                }
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_empty_in_is_skipped() {
        let plan = plan_for(json!({"wheres": {"name.in": []}}), &ModelSchema::new("User")).unwrap();
        assert_eq!(
            record(&plan),
            vec![CursorOp::WhereGroup {
                boolean: Combinator::And,
                ops: vec![]
            }]
        );
    }

    #[test]
    fn test_missing_scope_fails_before_apply() {
        let err = plan_for(
            json!({"wheres": [{"$scope": "archived"}]}),
            &ModelSchema::new("User"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SearchError::ScopeNotFound {
                scope: "archived".into(),
                model: "User".into()
            }
        );
    }

    #[test]
    fn test_scope_on_other_model() {
        let registry = ModelRegistry::new().with_model(
            ModelSchema::new("Company").with_scope("big", |cursor, _| {
                cursor.where_compare(Combinator::And, "size", &Comparison::Gt, &json!(100))
            }),
        );
        let request = SearchRequest::from_json(&json!({
            "wheres": [{"$scope": "big", "model": "Company"}]
        }))
        .unwrap();
        let set = ConditionSet::compile(&request).unwrap();
        let plan = QueryPlan::build(&set, &ModelSchema::new("User"), &registry).unwrap();
        assert!(matches!(
            &record(&plan)[0],
            CursorOp::WhereGroup { ops, .. } if matches!(&ops[0], CursorOp::Where { field, .. } if field == "size")
        ));

        let missing = QueryPlan::build(&set, &ModelSchema::new("User"), &ModelRegistry::new());
        assert!(matches!(missing, Err(SearchError::ScopeNotFound { model, .. }) if model == "Company"));
    }

    #[test]
    fn test_callback_and_scope_are_grouped() {
        let either = |cursor: &mut dyn QueryCursor| -> Result<()> {
            cursor.where_compare(Combinator::And, "b", &Comparison::Eq, &json!(9))?;
            cursor.where_compare(Combinator::Or, "b", &Comparison::Eq, &json!(2))
        };
        let model = ModelSchema::new("Thing").with_scope("either", move |cursor, _| either(cursor));
        let request = SearchRequest::new()
            .with_where("a", json!(1))
            .with_entry(WhereEntry::callback(QueryMutator::new(either)))
            .with_entry(WhereEntry::scope(NamedScope::new("either")));
        let set = ConditionSet::compile(&request).unwrap();
        let ops = record(&QueryPlan::build(&set, &model, &ModelRegistry::new()).unwrap());

        assert_eq!(ops.len(), 3);
        for op in &ops[1..] {
            match op {
                CursorOp::WhereGroup { boolean, ops } => {
                    assert_eq!(*boolean, Combinator::And);
                    assert!(matches!(&ops[1], CursorOp::Where { boolean: Combinator::Or, .. }));
                }
                other => panic!("unexpected op {:?}", other),
            }
        }
    }

    #[test]
    fn test_having_fragment() {
        let plan = plan_for(
            json!({"having": {"count": {"gt": 1, "lt": 5, "mix": "or"}, "total.is_not": null}}),
            &ModelSchema::new("User"),
        )
        .unwrap();
        assert_eq!(
            record(&plan),
            vec![
                CursorOp::HavingRaw {
                    boolean: Combinator::And,
                    sql: "count > ? or count < ?".into(),
                    bindings: vec![json!(1), json!(5)],
                },
                CursorOp::HavingRaw {
                    boolean: Combinator::And,
                    sql: "total is not null".into(),
                    bindings: vec![],
                },
            ]
        );
    }

    #[test]
    fn test_keyword_prefers_scope() {
        let with_scope = ModelSchema::new("User")
            .with_columns(["name"])
            .with_scope("searchKeyword", |cursor, args| {
                cursor.where_compare(Combinator::And, "email", &Comparison::Eq, &args[0])
            });
        let plan = plan_for(json!({"keyword": "ann"}), &with_scope).unwrap();
        assert!(matches!(
            &record(&plan)[0],
            CursorOp::WhereGroup { ops, .. } if matches!(&ops[0], CursorOp::Where { field, .. } if field == "email")
        ));

        let by_name = ModelSchema::new("User").with_columns(["name"]);
        let plan = plan_for(json!({"search": "ann"}), &by_name).unwrap();
        match &record(&plan)[0] {
            CursorOp::WhereGroup { ops, .. } => assert!(matches!(
                &ops[0],
                CursorOp::Where { operator, value, .. } if operator == "like" && value == &json!("%ann%")
            )),
            other => panic!("unexpected op {:?}", other),
        }

        let neither = plan_for(json!({"key": "ann"}), &ModelSchema::new("User")).unwrap();
        assert!(neither.is_empty());
    }

    #[test]
    fn test_window_only_with_limit() {
        let plan = plan_for(json!({"offset": 20}), &ModelSchema::new("User")).unwrap();
        assert!(plan.is_empty());

        let plan = plan_for(json!({"offset": 20, "limit": 10}), &ModelSchema::new("User")).unwrap();
        assert_eq!(
            record(&plan),
            vec![CursorOp::Skip { offset: 20 }, CursorOp::Take { limit: 10 }]
        );
    }

    #[test]
    fn test_step_order() {
        let plan = plan_for(
            json!({
                "order": ["-id"],
                "group_by": "company_id",
                "having": {"count.gt": 1},
                "wheres": {"age.gt": 3},
                "limit": 5
            }),
            &ModelSchema::new("User"),
        )
        .unwrap();
        let kinds: Vec<_> = plan
            .steps()
            .iter()
            .map(|s| match s {
                PlanStep::Field(_) => "field",
                PlanStep::GroupBy(_) => "group",
                PlanStep::Having(_) => "having",
                PlanStep::Order(_) => "order",
                PlanStep::Window { .. } => "window",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["field", "group", "having", "order", "window"]);
    }
}
