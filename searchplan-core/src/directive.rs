// searchplan-core/src/directive.rs
//! List field declaration: a model plus static filter arguments.
//!
//! The declaration's own `args` are merged with the request input (input
//! wins), paging keys are dropped and every truthy entry becomes an equality
//! filter keyed by its name.
//!
//! ```json
//! {"field": "users", "type": "UserPaginator", "args": {"status": "active"}}
//! ```

use serde_json::{Map, Value};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::generator::ConditionGenerator;
use crate::input::InputArgs;
use crate::request::SearchRequest;
use crate::template::{ConditionTemplate, TemplateEntry};
use crate::value_utils::truthy;

pub const DIRECTIVE_NAME: &str = "getlist";

/// Input key holding paging and sort arguments
pub const PAGINATOR_KEY: &str = "paginator";

/// Suffixes stripped from a return type to find the model
const TYPE_SUFFIXES: [&str; 2] = ["Paginator", "Connection"];

#[derive(Debug, Clone, PartialEq)]
pub struct ListDirective {
    field: String,
    return_type: String,
    model: Option<String>,
    args: Map<String, Value>,
}

impl ListDirective {
    pub fn new(field: impl Into<String>, return_type: impl Into<String>) -> Self {
        ListDirective {
            field: field.into(),
            return_type: return_type.into(),
            model: None,
            args: Map::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    /// Parse `{"field", "type", "model", "args"}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| SearchError::InvalidTemplate("list directive must be a JSON object".to_string()))?;
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        let mut directive = ListDirective::new(
            text("field").unwrap_or_default(),
            text("type").unwrap_or_default(),
        );
        directive.model = text("model").filter(|m| !m.trim().is_empty());
        match obj.get("args") {
            Some(Value::Object(args)) => directive.args = args.clone(),
            Some(Value::Null) | None => {}
            Some(other) => {
                return Err(SearchError::InvalidTemplate(format!(
                    "directive args must be an object, got {}",
                    other
                )))
            }
        }
        Ok(directive)
    }

    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// Explicit `model`, else the return type up to `Paginator` or
    /// `Connection` (`[UserPaginator!]!` gives `User`).
    pub fn model_name(&self) -> Result<String> {
        if let Some(model) = &self.model {
            return Ok(model.clone());
        }

        let mut name = self.return_type.trim_matches(|c| c == '[' || c == ']' || c == '!');
        for suffix in TYPE_SUFFIXES {
            if let Some(idx) = name.find(suffix) {
                name = &name[..idx];
            }
        }
        if name.is_empty() {
            return Err(SearchError::MissingModelArgument(format!(
                "a `model` argument must be assigned to the '{}' directive on '{}'",
                DIRECTIVE_NAME, self.field
            )));
        }
        Ok(name.to_string())
    }

    /// Bind against one request's input.
    pub fn bind(&self, config: &SearchConfig, input: &Value) -> Result<SearchRequest> {
        ConditionGenerator::new(config).generate(self, input)
    }
}

impl ConditionTemplate for ListDirective {
    fn wheres(&self, input: &InputArgs) -> Vec<TemplateEntry> {
        let mut merged = self.args.clone();
        if let Some(map) = input.as_map() {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged.shift_remove(PAGINATOR_KEY);

        merged
            .into_iter()
            .filter(|(_, value)| truthy(value))
            .map(|(key, value)| TemplateEntry::field(key, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{WhereEntry, WhereItem};
    use serde_json::json;

    #[test]
    fn test_model_name() {
        assert_eq!(ListDirective::new("users", "UserPaginator").model_name().unwrap(), "User");
        assert_eq!(ListDirective::new("posts", "[PostConnection!]!").model_name().unwrap(), "Post");
        assert_eq!(ListDirective::new("tags", "Tag").model_name().unwrap(), "Tag");
        assert_eq!(
            ListDirective::new("users", "UserPaginator").with_model("Account").model_name().unwrap(),
            "Account"
        );
    }

    #[test]
    fn test_missing_model() {
        let err = ListDirective::new("things", "Paginator").model_name().unwrap_err();
        assert!(matches!(err, SearchError::MissingModelArgument(msg) if msg.contains("things")));
    }

    #[test]
    fn test_input_overrides_args_and_falsy_dropped() {
        let args = json!({"status": "active", "role": "user", "archived": false});
        let directive = ListDirective::new("users", "UserPaginator").with_args(args.as_object().cloned().unwrap());

        let request = directive
            .bind(
                &SearchConfig::default(),
                &json!({"role": "admin", "name": "", "paginator": {"page": 2}}),
            )
            .unwrap();

        let keys: Vec<_> = request.wheres.iter().map(WhereEntry::label).collect();
        assert_eq!(keys, vec!["status", "role"]);
        assert_eq!(request.wheres[1].item, WhereItem::Value(json!("admin")));
        assert_eq!(request.page, Some(2));
    }

    #[test]
    fn test_from_json() {
        let directive = ListDirective::from_json(&json!({
            "field": "users", "type": "UserPaginator", "model": "", "args": {"a": 1}
        }))
        .unwrap();
        assert_eq!(directive.field_name(), "users");
        assert_eq!(directive.model_name().unwrap(), "User");

        assert!(ListDirective::from_json(&json!({"args": [1]})).is_err());
        assert!(ListDirective::from_json(&json!("users")).is_err());
    }
}
