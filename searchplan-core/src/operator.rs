// searchplan-core/src/operator.rs
//! Operator tokens used in condition keys and operator maps.
//!
//! ```text
//! token            Operator                 cursor call
//! eq|ne|gt|...  -> Compare(Comparison)   -> where_compare(field, "=", v)
//! in / not_in   -> In / NotIn            -> where_in / where_not_in
//! is / is_not   -> Is / IsNot            -> where_null / where_not_null
//! anything else -> Compare(Verbatim)     -> where_compare(field, token, v)
//! ```
//!
//! Unknown tokens are not rejected here: the cursor decides whether `like`,
//! `ilike` or `regexp` mean anything to it.

use std::fmt;

use heck::ToSnakeCase;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Reserved operator-map key selecting how one field's operators combine
pub const MIX_KEY: &str = "mix";

/// Binary comparison passed to `where_compare`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Unrecognized token, forwarded as-is
    Verbatim(String),
}

impl Comparison {
    /// SQL spelling of the comparison
    pub fn as_sql(&self) -> &str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Verbatim(token) => token.as_str(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

/// Map an operator token to its comparison.
///
/// Total over all strings: `resolve("like")` is `Verbatim("like")`.
pub fn resolve(token: &str) -> Comparison {
    match token {
        "eq" => Comparison::Eq,
        "ne" => Comparison::Ne,
        "gt" => Comparison::Gt,
        "gte" | "ge" => Comparison::Gte,
        "lt" => Comparison::Lt,
        "lte" | "le" => Comparison::Lte,
        other => Comparison::Verbatim(other.to_string()),
    }
}

/// One entry of an operator map, after token resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    Compare(Comparison),
    In,
    NotIn,
    Is,
    IsNot,
}

impl Operator {
    pub fn parse(token: &str) -> Operator {
        match token {
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "is" => Operator::Is,
            _ if token.to_snake_case() == "is_not" => Operator::IsNot,
            _ => Operator::Compare(resolve(token)),
        }
    }

    /// True for operators that never look at their value
    pub fn ignores_value(&self) -> bool {
        matches!(self, Operator::Is | Operator::IsNot)
    }

    /// Collection operators silently skip values that are not a non-empty array
    pub fn accepts_value(&self, value: &Value) -> bool {
        match self {
            Operator::In | Operator::NotIn => {
                matches!(value, Value::Array(items) if !items.is_empty())
            }
            _ => true,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Compare(cmp) => write!(f, "{}", cmp),
            Operator::In => f.write_str("in"),
            Operator::NotIn => f.write_str("not in"),
            Operator::Is => f.write_str("is null"),
            Operator::IsNot => f.write_str("is not null"),
        }
    }
}

/// How the operators of one field combine (`mix` key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    /// `"or"` (any case) selects Or; everything else, absence included, is And.
    pub fn from_mix(mix: Option<&Value>) -> Combinator {
        match mix.and_then(Value::as_str) {
            Some(s) if s.eq_ignore_ascii_case("or") => Combinator::Or,
            _ => Combinator::And,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_vocabulary() {
        assert_eq!(resolve("eq").as_sql(), "=");
        assert_eq!(resolve("ne").as_sql(), "<>");
        assert_eq!(resolve("gt").as_sql(), ">");
        assert_eq!(resolve("gte"), resolve("ge"));
        assert_eq!(resolve("ge").as_sql(), ">=");
        assert_eq!(resolve("lt").as_sql(), "<");
        assert_eq!(resolve("lte"), resolve("le"));
        assert_eq!(resolve("le").as_sql(), "<=");
    }

    #[test]
    fn test_unknown_token_passes_through() {
        assert_eq!(resolve("like"), Comparison::Verbatim("like".to_string()));
        assert_eq!(resolve("not like").as_sql(), "not like");
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("in"), Operator::In);
        assert_eq!(Operator::parse("not_in"), Operator::NotIn);
        assert_eq!(Operator::parse("is"), Operator::Is);
        assert_eq!(Operator::parse("is_not"), Operator::IsNot);
        assert_eq!(Operator::parse("isNot"), Operator::IsNot);
        assert_eq!(Operator::parse("gte"), Operator::Compare(Comparison::Gte));
    }

    #[test]
    fn test_collection_operators_need_non_empty_arrays() {
        assert!(Operator::In.accepts_value(&json!(["a"])));
        assert!(!Operator::In.accepts_value(&json!([])));
        assert!(!Operator::NotIn.accepts_value(&json!("a")));
        assert!(Operator::Is.accepts_value(&json!(null)));
        assert!(Operator::Is.ignores_value());
    }

    #[test]
    fn test_combinator_from_mix() {
        assert_eq!(Combinator::from_mix(None), Combinator::And);
        assert_eq!(Combinator::from_mix(Some(&json!("OR"))), Combinator::Or);
        assert_eq!(Combinator::from_mix(Some(&json!("xor"))), Combinator::And);
        assert_eq!(Combinator::Or.keyword(), "or");
    }
}
