//! JSON value helpers shared by the generator, the normalizer and the
//! reference cursor.
//!
//! Request input is addressed with dot paths (`paginator.sort`), the same way
//! row fields are addressed when sorting or filtering in memory.

use serde_json::Value;
use std::cmp::Ordering;

/// Get a nested value with dot notation support
///
/// Supports:
/// - Simple fields: "page"
/// - Nested objects: "paginator.sort"
/// - Array indexing: "paginator.sorts.0"
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use searchplan_core::value_utils::get_nested_value;
///
/// let input = json!({"paginator": {"page": 2}});
/// assert_eq!(get_nested_value(&input, "paginator.page"), Some(&json!(2)));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            Value::Array(arr) => value = arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        }
    }
    Some(value)
}

/// True when the path resolves to a value, `null` included
pub fn has_path(doc: &Value, path: &str) -> bool {
    get_nested_value(doc, path).is_some()
}

/// Remove the value at a dot path and return it.
///
/// Only object keys are removed; array elements are left in place.
pub fn remove_path(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent_path, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    };

    let parent = match parent_path {
        Some(parent) => get_nested_value_mut(doc, parent)?,
        None => doc,
    };

    parent.as_object_mut()?.shift_remove(last)
}

fn get_nested_value_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut value = doc;
    for part in path.split('.') {
        value = match value {
            Value::Object(map) => map.get_mut(part)?,
            Value::Array(arr) => arr.get_mut(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

/// Absent, `null` or the empty string: the values a soft filter ignores.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Blank after trimming strings, or an empty array.
///
/// Used for `when`-style truthiness checks on request input.
pub fn is_empty_input(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(arr)) => arr.is_empty(),
        _ => false,
    }
}

/// Loose truthiness of a JSON value.
///
/// `false`, `0`, `""`, `"0"`, `null`, `[]` and `{}` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a scalar for string concatenation (`append_input`).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Compare two JSON values
///
/// Returns `Some(Ordering)` for comparable types (numbers, strings, booleans),
/// `None` for incompatible types. Numeric strings compare numerically against
/// numbers, the way a relational engine coerces `'1' >= 1`.
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use searchplan_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(10), &json!(5)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!("2"), &json!(10)), Some(Ordering::Less));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => n1.as_f64()?.partial_cmp(&n2.as_f64()?),
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        (Value::Number(n), Value::String(s)) => {
            n.as_f64()?.partial_cmp(&s.trim().parse::<f64>().ok()?)
        }
        (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok()?.partial_cmp(&n.as_f64()?)
        }
        _ => None,
    }
}

/// Equality with the same numeric-string coercion as [`compare_values`]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare_values(a, b) == Some(Ordering::Equal)
}

/// Compare two optional values with None handling
///
/// None (and `null`) sorts before any actual value; incompatible types are
/// Equal so that sorting stays stable.
pub fn compare_values_with_none(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values(av, bv).unwrap_or(Ordering::Equal),
    }
}

/// Canonical string form of a JSON value with object keys sorted.
///
/// Used as the grouping key when rows are grouped in memory, so that
/// `{"a":1,"b":2}` and `{"b":2,"a":1}` land in the same group.
pub fn canonical_json_string(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));

            let inner = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", k, canonical_json_string(v)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", inner)
        }
        Value::Array(arr) => {
            let inner = arr
                .iter()
                .map(canonical_json_string)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{}]", inner)
        }
        _ => value.to_string(),
    }
}
