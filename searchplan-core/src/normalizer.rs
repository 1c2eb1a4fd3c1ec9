// searchplan-core/src/normalizer.rs
//! Mixed-shape request entries -> canonical [`Condition`] list.
//!
//! Precedence per entry:
//! 1. positional callback / raw / scope: emitted unchanged
//! 2. positional `{field, value}`: field verbatim, value must be an operator map
//! 3. key with an operator suffix (`age.gt`): `{gt: value}`
//! 4. scalar or list value: `{eq: value}`
//! 5. map value: used as the operator map
//!
//! Relation segments (`$` or `.` before the operator) are split off the field
//! by [`ConditionKey`]. Entry order is preserved.

use serde_json::{Map, Value};

use crate::condition::{Condition, ConditionSet, FieldCondition};
use crate::error::{Result, SearchError};
use crate::operator::{Combinator, Operator, MIX_KEY};
use crate::path::{ConditionKey, FieldPath};
use crate::request::{SearchRequest, WhereEntry, WhereItem, WhereKey};
use crate::{log_debug, log_trace};

impl ConditionSet {
    /// Normalize a bound request.
    ///
    /// Pure: compiling the same request twice yields equal sets.
    pub fn compile(request: &SearchRequest) -> Result<ConditionSet> {
        let wheres = normalize_wheres(&request.wheres)?;
        let having = normalize_having(&request.having)?;

        let keyword = request
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        log_trace!(
            "normalized {} where and {} having conditions",
            wheres.len(),
            having.len()
        );

        Ok(ConditionSet {
            wheres,
            order: request.order.clone(),
            group_by: request.group_by.clone(),
            having,
            keyword,
            page: request.page,
            page_size: request.page_size,
            offset: request.offset,
            limit: request.limit,
        })
    }
}

pub fn normalize_wheres(entries: &[WhereEntry]) -> Result<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(condition) = normalize_entry(entry)? {
            conditions.push(condition);
        }
    }
    Ok(conditions)
}

/// Having accepts field conditions and raw fragments only.
pub fn normalize_having(entries: &[WhereEntry]) -> Result<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(entries.len());
    for entry in entries {
        match normalize_entry(entry)? {
            Some(condition @ (Condition::Field(_) | Condition::Raw(_))) => conditions.push(condition),
            Some(other) => {
                return Err(SearchError::malformed(
                    entry.label(),
                    format!("having does not accept {} conditions", other.kind()),
                ))
            }
            None => {}
        }
    }
    Ok(conditions)
}

fn normalize_entry(entry: &WhereEntry) -> Result<Option<Condition>> {
    match (&entry.key, &entry.item) {
        (WhereKey::Positional, WhereItem::Raw(expr)) => Ok(Some(Condition::Raw(expr.clone()))),
        (WhereKey::Positional, WhereItem::Callback(f)) => Ok(Some(Condition::Callback(f.clone()))),
        (WhereKey::Positional, WhereItem::Scope(scope)) => Ok(Some(Condition::Scope(scope.clone()))),
        (WhereKey::Positional, WhereItem::Value(value)) => normalize_structured(value),
        (WhereKey::Field(key), WhereItem::Value(value)) => normalize_keyed(key, value),
        (WhereKey::Field(key), _) => Err(SearchError::malformed(
            key.as_str(),
            "callbacks, raw expressions and scopes must be positional",
        )),
    }
}

fn normalize_keyed(key: &str, value: &Value) -> Result<Option<Condition>> {
    let key_parts = ConditionKey::parse(key)?;

    let operators = match (key_parts.operator, value) {
        (Some(op), _) => single_operator(op, value.clone()),
        (None, Value::Object(map)) => map.clone(),
        (None, _) => single_operator("eq".to_string(), value.clone()),
    };

    field_condition(key, key_parts.path, &operators)
}

fn normalize_structured(value: &Value) -> Result<Option<Condition>> {
    let obj = value.as_object().ok_or_else(|| {
        SearchError::malformed("<positional>", format!("unsupported positional entry {}", value))
    })?;

    let field = obj.get("field").and_then(Value::as_str).ok_or_else(|| {
        SearchError::malformed("<positional>", "structured entries need a string 'field'")
    })?;

    let operators = match obj.get("value") {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(SearchError::malformed(
                field,
                format!("operator map expected, got {}", other),
            ))
        }
        None => return Err(SearchError::malformed(field, "missing operator map 'value'")),
    };

    field_condition(field, FieldPath::parse_positional(field)?, operators)
}

fn single_operator(token: String, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(token, value);
    map
}

fn field_condition(
    key: &str,
    path: FieldPath,
    operators: &Map<String, Value>,
) -> Result<Option<Condition>> {
    let mut condition = FieldCondition::new(path, Combinator::from_mix(operators.get(MIX_KEY)));

    for (token, value) in operators {
        if token == MIX_KEY {
            continue;
        }
        condition.comparisons.push((Operator::parse(token), value.clone()));
    }

    if condition.comparisons.is_empty() {
        log_debug!("dropping '{}': operator map has no operators", key);
        return Ok(None);
    }
    Ok(Some(Condition::Field(condition)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{NamedScope, QueryMutator, RawExpression};
    use crate::operator::Comparison;
    use serde_json::json;

    fn field(condition: &Condition) -> &FieldCondition {
        match condition {
            Condition::Field(f) => f,
            other => panic!("expected field condition, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_becomes_eq() {
        let conditions = normalize_wheres(&[WhereEntry::keyed("name", json!("ann"))]).unwrap();
        let cond = field(&conditions[0]);
        assert_eq!(cond.path, FieldPath::column("name"));
        assert_eq!(
            cond.comparisons,
            vec![(Operator::Compare(Comparison::Eq), json!("ann"))]
        );
        assert_eq!(cond.combinator, Combinator::And);
    }

    #[test]
    fn test_list_value_without_operator_is_eq() {
        let conditions = normalize_wheres(&[WhereEntry::keyed("tags", json!(["a"]))]).unwrap();
        assert_eq!(
            field(&conditions[0]).comparisons[0].0,
            Operator::Compare(Comparison::Eq)
        );
    }

    #[test]
    fn test_operator_suffix_wraps_value() {
        let conditions = normalize_wheres(&[WhereEntry::keyed("name.in", json!(["a", "b"]))]).unwrap();
        assert_eq!(
            field(&conditions[0]).comparisons,
            vec![(Operator::In, json!(["a", "b"]))]
        );
    }

    #[test]
    fn test_operator_map_with_mix() {
        let conditions = normalize_wheres(&[WhereEntry::keyed(
            "age",
            json!({"lt": 18, "gt": 65, "mix": "or"}),
        )])
        .unwrap();
        let cond = field(&conditions[0]);
        assert_eq!(cond.combinator, Combinator::Or);
        assert_eq!(cond.comparisons.len(), 2);
        assert_eq!(cond.comparisons[0].0, Operator::Compare(Comparison::Lt));
    }

    #[test]
    fn test_mix_only_map_is_dropped() {
        let conditions = normalize_wheres(&[WhereEntry::keyed("age", json!({"mix": "or"}))]).unwrap();
        assert!(conditions.is_empty());
    }

    #[test]
    fn test_dollar_equals_positional_dot() {
        let keyed = normalize_wheres(&[WhereEntry::keyed("company$name", json!({"eq": "acme"}))]).unwrap();
        let positional =
            normalize_wheres(&[WhereEntry::positional("company.name", json!({"eq": "acme"}))]).unwrap();
        assert_eq!(keyed, positional);
    }

    #[test]
    fn test_positional_non_map_value_is_malformed() {
        let err = normalize_wheres(&[WhereEntry::positional("name", json!("ann"))]).unwrap_err();
        assert!(matches!(err, SearchError::MalformedCondition { key, .. } if key == "name"));
    }

    #[test]
    fn test_passthrough_nodes_keep_order() {
        let mutator = QueryMutator::new(|_| Ok(()));
        let entries = vec![
            WhereEntry::raw(RawExpression::new("1 = 1")),
            WhereEntry::keyed("a", json!(1)),
            WhereEntry::callback(mutator.clone()),
            WhereEntry::scope(NamedScope::new("active")),
        ];
        let kinds: Vec<_> = normalize_wheres(&entries)
            .unwrap()
            .iter()
            .map(Condition::kind)
            .collect();
        assert_eq!(kinds, vec!["raw", "field", "callback", "scope"]);
    }

    #[test]
    fn test_keyed_raw_is_rejected() {
        let entry = WhereEntry {
            key: WhereKey::Field("name".into()),
            item: WhereItem::Raw(RawExpression::new("1 = 1")),
        };
        assert!(normalize_wheres(&[entry]).is_err());
    }

    #[test]
    fn test_having_rejects_scopes() {
        let err = normalize_having(&[WhereEntry::scope(NamedScope::new("busy"))]).unwrap_err();
        assert!(matches!(err, SearchError::MalformedCondition { .. }));

        let ok = normalize_having(&[
            WhereEntry::keyed("count.gt", json!(1)),
            WhereEntry::raw(RawExpression::new("sum(total) > 10")),
        ])
        .unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[test]
    fn test_compile_is_idempotent() {
        let request = SearchRequest::from_json(&json!({
            "wheres": {"name.like": "%a%", "posts$id.gte": 3},
            "order": ["+rank", "-id"],
            "keyword": "  ann ",
            "page": 1
        }))
        .unwrap();
        let first = ConditionSet::compile(&request).unwrap();
        let second = ConditionSet::compile(&request).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.keyword.as_deref(), Some("ann"));
    }
}
