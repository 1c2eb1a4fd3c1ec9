// searchplan-core/src/memory/matching.rs
// Comparison operators understood by the in-memory cursor

use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use lazy_static::lazy_static;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, SearchError};
use crate::value_utils::{compare_values, scalar_to_string, values_equal};

// ============================================================================
// LIKE PATTERNS
// ============================================================================

lazy_static! {
    /// Compiled LIKE patterns, keyed by "flags:pattern"
    static ref LIKE_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(NonZeroUsize::MIN.saturating_add(127)));
}

/// Translate a SQL LIKE pattern: `%` is any run, `_` any single character,
/// `\` escapes the next character.
fn like_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        out.push_str("(?i)");
    }
    out.push_str("(?s)^");

    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

fn compile_like(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    let cache_key = format!("{}:{}", if case_insensitive { "i" } else { "" }, pattern);

    if let Some(regex) = LIKE_CACHE.lock().get(&cache_key) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&like_to_regex(pattern, case_insensitive)).map_err(|e| {
        SearchError::InvalidQuery(format!("Invalid LIKE pattern '{}': {}", pattern, e))
    })?;
    LIKE_CACHE.lock().put(cache_key, regex.clone());
    Ok(regex)
}

pub(crate) fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> Result<bool> {
    Ok(compile_like(pattern, case_insensitive)?.is_match(text))
}

// ============================================================================
// MATCHERS
// ============================================================================

/// One comparison operator
///
/// `actual` is the row's value (`None` when the field is absent). SQL null
/// semantics apply: comparing against a missing or null value never matches.
pub(crate) trait Matcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool>;
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn compare_with<F>(actual: Option<&Value>, expected: &Value, predicate: F) -> Result<bool>
where
    F: Fn(Ordering) -> bool,
{
    match (present(actual), expected) {
        (None, _) | (_, Value::Null) => Ok(false),
        (Some(v), e) => Ok(compare_values(v, e).map(predicate).unwrap_or(false)),
    }
}

struct EqMatcher;

impl Matcher for EqMatcher {
    fn name(&self) -> &'static str {
        "="
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        match (present(actual), expected) {
            (None, _) | (_, Value::Null) => Ok(false),
            (Some(v), e) => Ok(values_equal(v, e)),
        }
    }
}

struct NeMatcher;

impl Matcher for NeMatcher {
    fn name(&self) -> &'static str {
        "<>"
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        match (present(actual), expected) {
            (None, _) | (_, Value::Null) => Ok(false),
            (Some(v), e) => Ok(!values_equal(v, e)),
        }
    }
}

struct GtMatcher;

impl Matcher for GtMatcher {
    fn name(&self) -> &'static str {
        ">"
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        compare_with(actual, expected, |ord| ord == Ordering::Greater)
    }
}

struct GteMatcher;

impl Matcher for GteMatcher {
    fn name(&self) -> &'static str {
        ">="
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        compare_with(actual, expected, |ord| ord != Ordering::Less)
    }
}

struct LtMatcher;

impl Matcher for LtMatcher {
    fn name(&self) -> &'static str {
        "<"
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        compare_with(actual, expected, |ord| ord == Ordering::Less)
    }
}

struct LteMatcher;

impl Matcher for LteMatcher {
    fn name(&self) -> &'static str {
        "<="
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        compare_with(actual, expected, |ord| ord != Ordering::Greater)
    }
}

/// `like` is case-sensitive, `ilike` is not
struct LikeMatcher {
    name: &'static str,
    negated: bool,
    case_insensitive: bool,
}

impl Matcher for LikeMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn matches(&self, actual: Option<&Value>, expected: &Value) -> Result<bool> {
        let text = match present(actual).and_then(scalar_to_string) {
            Some(text) => text,
            None => return Ok(false),
        };
        let pattern = scalar_to_string(expected).ok_or_else(|| {
            SearchError::InvalidQuery(format!("{} needs a scalar pattern, got {}", self.name, expected))
        })?;
        Ok(like_match(&text, &pattern, self.case_insensitive)? != self.negated)
    }
}

lazy_static! {
    /// Operators by SQL spelling (lowercase)
    static ref MATCHERS: HashMap<&'static str, Box<dyn Matcher>> = {
        let mut registry: HashMap<&'static str, Box<dyn Matcher>> = HashMap::new();

        registry.insert("=", Box::new(EqMatcher));
        registry.insert("==", Box::new(EqMatcher));
        registry.insert("<>", Box::new(NeMatcher));
        registry.insert("!=", Box::new(NeMatcher));
        registry.insert(">", Box::new(GtMatcher));
        registry.insert(">=", Box::new(GteMatcher));
        registry.insert("<", Box::new(LtMatcher));
        registry.insert("<=", Box::new(LteMatcher));

        for (name, negated, case_insensitive) in [
            ("like", false, false),
            ("not like", true, false),
            ("ilike", false, true),
            ("not ilike", true, true),
        ] {
            registry.insert(name, Box::new(LikeMatcher { name, negated, case_insensitive }));
        }

        registry
    };
}

/// Look up an operator by its SQL spelling, case and spacing insensitive.
pub(crate) fn matcher_for(op: &str) -> Result<&'static dyn Matcher> {
    let normalized = op.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    MATCHERS
        .get(normalized.as_str())
        .map(|m| m.as_ref())
        .ok_or_else(|| SearchError::InvalidQuery(format!("Unsupported operator: {}", op)))
}

pub(crate) fn in_list(actual: Option<&Value>, values: &[Value]) -> bool {
    present(actual).is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_like_translation() {
        assert!(like_match("annabel", "ann%", false).unwrap());
        assert!(like_match("ann", "a_n", false).unwrap());
        assert!(!like_match("Ann", "ann%", false).unwrap());
        assert!(like_match("Ann", "ann%", true).unwrap());
        assert!(like_match("50%", "50\\%", false).unwrap());
        assert!(!like_match("500", "50\\%", false).unwrap());
        assert!(like_match("a.b", "a.b", false).unwrap());
        assert!(!like_match("axb", "a.b", false).unwrap());
    }

    #[test]
    fn test_null_never_matches() {
        let eq = matcher_for("=").unwrap();
        assert!(!eq.matches(None, &json!(1)).unwrap());
        assert!(!eq.matches(Some(&json!(null)), &json!(null)).unwrap());
        let ne = matcher_for("<>").unwrap();
        assert!(!ne.matches(Some(&json!(null)), &json!(1)).unwrap());
        assert!(ne.matches(Some(&json!(2)), &json!(1)).unwrap());
    }

    #[test]
    fn test_ordering_matchers() {
        let gte = matcher_for(">=").unwrap();
        assert!(gte.matches(Some(&json!(3)), &json!(3)).unwrap());
        assert!(gte.matches(Some(&json!("4")), &json!(3)).unwrap());
        assert!(!gte.matches(Some(&json!("abc")), &json!(3)).unwrap());
        assert_eq!(gte.name(), ">=");
    }

    #[test]
    fn test_registry_lookup() {
        assert_eq!(matcher_for("NOT  LIKE").unwrap().name(), "not like");
        assert_eq!(matcher_for("!=").unwrap().name(), "<>");
        assert!(matches!(matcher_for("regexp"), Err(SearchError::InvalidQuery(_))));
    }

    #[test]
    fn test_like_on_numbers() {
        let like = matcher_for("like").unwrap();
        assert!(like.matches(Some(&json!(1234)), &json!("12%")).unwrap());
        assert!(!like.matches(Some(&json!(null)), &json!("%")).unwrap());
    }

    #[test]
    fn test_in_list() {
        assert!(in_list(Some(&json!("a")), &[json!("a"), json!("b")]));
        assert!(in_list(Some(&json!(2)), &[json!("2")]));
        assert!(!in_list(None, &[json!("a")]));
        assert!(!in_list(Some(&json!(null)), &[json!(null)]));
    }
}
