// Compile-path tests: request -> condition set -> plan -> recorded cursor calls
use searchplan_core::{
    Combinator, ConditionSet, CursorOp, Direction, ModelRegistry, ModelSchema, QueryCursor, QueryPlan,
    RecordingCursor, SearchError, SearchRequest,
};
use serde_json::{json, Value};

fn users() -> ModelSchema {
    ModelSchema::new("User")
        .with_columns(["id", "name", "age", "rank", "status"])
        .with_scope("active", |cursor: &mut dyn QueryCursor, _args: &[Value]| {
            cursor.where_compare(
                Combinator::And,
                "status",
                &searchplan_core::Comparison::Eq,
                &json!("active"),
            )
        })
}

fn record(request: Value) -> Vec<CursorOp> {
    try_record(request).unwrap()
}

fn try_record(request: Value) -> searchplan_core::Result<Vec<CursorOp>> {
    let request = SearchRequest::from_json(&request)?;
    let set = ConditionSet::compile(&request)?;
    let plan = QueryPlan::build(&set, &users(), &ModelRegistry::new())?;
    let mut cursor = RecordingCursor::new();
    plan.apply(&mut cursor)?;
    Ok(cursor.into_ops())
}

fn only_group(ops: &[CursorOp]) -> &[CursorOp] {
    match ops {
        [CursorOp::WhereGroup { ops, .. }] => ops,
        other => panic!("expected a single where group, got {:?}", other),
    }
}

#[test]
fn test_scalar_key_is_equality() {
    let ops = record(json!({"wheres": {"name": "ann"}}));
    assert_eq!(
        only_group(&ops),
        &[CursorOp::Where {
            boolean: Combinator::And,
            field: "name".into(),
            operator: "=".into(),
            value: json!("ann"),
        }]
    );
}

#[test]
fn test_operator_suffixes() {
    let ops = record(json!({"wheres": {"age.gte": 18, "name.like": "%an%", "rank.ne": 3}}));
    let operators: Vec<_> = ops
        .iter()
        .map(|op| match only_group(std::slice::from_ref(op)) {
            [CursorOp::Where { operator, .. }] => operator.clone(),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(operators, vec![">=", "like", "<>"]);
}

#[test]
fn test_empty_in_is_noop() {
    let ops = record(json!({"wheres": {"id.in": []}}));
    assert!(only_group(&ops).is_empty());

    let ops = record(json!({"wheres": {"name.in": ["ann"]}}));
    assert_eq!(
        only_group(&ops),
        &[CursorOp::WhereIn {
            boolean: Combinator::And,
            field: "name".into(),
            values: vec![json!("ann")],
        }]
    );
}

#[test]
fn test_is_and_is_not_ignore_value() {
    let ops = record(json!({"wheres": {"deleted_at.is": "anything", "email.is_not": null}}));
    assert_eq!(ops.len(), 2);
    assert_eq!(
        only_group(&ops[..1]),
        &[CursorOp::WhereNull {
            boolean: Combinator::And,
            field: "deleted_at".into()
        }]
    );
    assert_eq!(
        only_group(&ops[1..]),
        &[CursorOp::WhereNotNull {
            boolean: Combinator::And,
            field: "email".into()
        }]
    );
}

#[test]
fn test_operator_map_with_or_mix() {
    let ops = record(json!({"wheres": {"age": {"lt": 18, "gt": 65, "mix": "or"}}}));
    let inner = only_group(&ops);
    assert_eq!(inner.len(), 2);
    assert!(inner
        .iter()
        .all(|op| matches!(op, CursorOp::Where { boolean: Combinator::Or, .. })));
}

#[test]
fn test_relation_dollar_matches_positional_dot() {
    let keyed = record(json!({"wheres": {"company$name": "acme"}}));
    let positional = record(json!({"wheres": [{"field": "company.name", "value": {"eq": "acme"}}]}));
    assert_eq!(keyed, positional);
    assert_eq!(
        keyed,
        vec![CursorOp::WhereHas {
            relation: "company".into(),
            ops: vec![CursorOp::Where {
                boolean: Combinator::And,
                field: "name".into(),
                operator: "=".into(),
                value: json!("acme"),
            }],
        }]
    );
}

#[test]
fn test_nested_relations_camel_case() {
    let ops = record(json!({"wheres": {"parent_company$head_office$city": "Oslo"}}));
    match ops.as_slice() {
        [CursorOp::WhereHas { relation, ops }] => {
            assert_eq!(relation, "parentCompany");
            assert!(matches!(
                ops.as_slice(),
                [CursorOp::WhereHas { relation, .. }] if relation == "headOffice"
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_sort_tokens() {
    let ops = record(json!({"order": ["+rank", "rank", "-id"]}));
    assert_eq!(
        ops,
        vec![
            CursorOp::OrderBy {
                field: "rank".into(),
                direction: Direction::Asc
            },
            CursorOp::OrderBy {
                field: "id".into(),
                direction: Direction::Desc
            },
        ]
    );
}

#[test]
fn test_raw_group_and_having() {
    let ops = record(json!({
        "wheres": [{"$raw": "age > ?", "bindings": [30]}],
        "group_by": ["status"],
        "having": {"count.gt": 1}
    }));
    assert_eq!(
        ops,
        vec![
            CursorOp::WhereRaw {
                boolean: Combinator::And,
                sql: "age > ?".into(),
                bindings: vec![json!(30)],
            },
            CursorOp::GroupBy {
                groups: vec![searchplan_core::GroupBy::Column("status".into())],
            },
            CursorOp::HavingRaw {
                boolean: Combinator::And,
                sql: "count > ?".into(),
                bindings: vec![json!(1)],
            },
        ]
    );
}

#[test]
fn test_scope_applied() {
    let ops = record(json!({"wheres": [{"$scope": "active"}]}));
    assert!(matches!(
        only_group(&ops),
        [CursorOp::Where { field, .. }] if field == "status"
    ));
}

#[test]
fn test_missing_scope_fails_before_any_cursor_call() {
    let request = SearchRequest::from_json(&json!({
        "wheres": {"name": "ann"},
        "order": "-id"
    }))
    .unwrap()
    .with_entry(searchplan_core::WhereEntry::scope(searchplan_core::NamedScope::new("vip")));

    let set = ConditionSet::compile(&request).unwrap();
    let mut cursor = RecordingCursor::new();
    let err = QueryPlan::build(&set, &users(), &ModelRegistry::new())
        .and_then(|plan| plan.apply(&mut cursor))
        .unwrap_err();

    assert!(matches!(err, SearchError::ScopeNotFound { ref scope, .. } if scope == "vip"));
    assert_eq!(cursor.call_count(), 0);
}

#[test]
fn test_keyword_falls_back_to_name_like() {
    let ops = record(json!({"keyword": "  ann "}));
    assert_eq!(
        only_group(&ops),
        &[CursorOp::Where {
            boolean: Combinator::And,
            field: "name".into(),
            operator: "like".into(),
            value: json!("%ann%"),
        }]
    );
}

#[test]
fn test_structured_entry_needs_string_field() {
    let err = try_record(json!({"wheres": [{"field": 3, "value": {"eq": 1}}]})).unwrap_err();
    assert!(matches!(err, SearchError::MalformedCondition { .. }));
}

#[test]
fn test_offset_and_limit_window() {
    let ops = record(json!({"offset": 20, "limit": 10}));
    assert_eq!(ops, vec![CursorOp::Skip { offset: 20 }, CursorOp::Take { limit: 10 }]);
}
