// searchplan-core/src/input.rs
//! Request input as seen by templates.
//!
//! The generator owns a private copy and consumes pagination and sort keys
//! from it while binding; templates only ever get a shared reference.

use serde_json::{Map, Value};

use crate::error::{Result, SearchError};
use crate::value_utils::{get_nested_value, has_path, is_blank, is_empty_input, remove_path, scalar_to_string, truthy};

/// Sub-map whose keys are lifted to the top level before binding
pub const MORE_KEY: &str = "more";

#[derive(Debug, Clone, PartialEq)]
pub struct InputArgs(Value);

impl Default for InputArgs {
    fn default() -> Self {
        InputArgs(Value::Object(Map::new()))
    }
}

impl InputArgs {
    /// Wrap a request map; `null` is an empty request.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(InputArgs(value)),
            Value::Null => Ok(InputArgs::default()),
            other => Err(SearchError::InvalidQuery(format!(
                "request input must be an object, got {}",
                other
            ))),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Value at a dot path
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_nested_value(&self.0, path)
    }

    /// True when the path exists, even holding `null`
    pub fn has(&self, path: &str) -> bool {
        has_path(&self.0, path)
    }

    /// Present, not null and not the empty string
    pub fn is_valid_input(&self, path: &str) -> bool {
        !is_blank(self.get(path))
    }

    /// Remove and return the value at a dot path.
    pub(crate) fn take(&mut self, path: &str) -> Option<Value> {
        remove_path(&mut self.0, path)
    }

    /// Lift the keys of `more` to the top level (one level, existing keys
    /// are overwritten) and drop `more` itself.
    pub(crate) fn flatten_more(&mut self) {
        let more = match self.take(MORE_KEY) {
            Some(Value::Object(more)) => more,
            Some(_) | None => return,
        };
        if let Value::Object(top) = &mut self.0 {
            for (key, value) in more {
                top.insert(key, value);
            }
        }
    }

    /// Map the input at `path` through `f`; `None` when the input is blank.
    pub fn fire_input<F>(&self, path: &str, f: F) -> Option<Value>
    where
        F: FnOnce(&Value) -> Value,
    {
        self.get(path).filter(|v| !is_blank(Some(v))).map(f)
    }

    /// Input at `path` with `suffix` appended, e.g. `"2024-01-01" + " 23:59:59"`.
    pub fn append_input(&self, path: &str, suffix: &str) -> Option<Value> {
        self.get(path)
            .filter(|v| !is_blank(Some(v)))
            .and_then(scalar_to_string)
            .map(|s| Value::String(format!("{}{}", s, suffix)))
    }

    /// Run `success` when the input at `path` is non-empty.
    pub fn when<T, F>(&self, path: &str, success: F) -> Option<T>
    where
        F: FnOnce(&Self) -> T,
    {
        if self.filled(path) {
            Some(success(self))
        } else {
            None
        }
    }

    /// Run `success` or `fail` depending on the input at `path`.
    pub fn when_else<T, S, F>(&self, path: &str, success: S, fail: F) -> T
    where
        S: FnOnce(&Self) -> T,
        F: FnOnce(&Self) -> T,
    {
        if self.filled(path) {
            success(self)
        } else {
            fail(self)
        }
    }

    fn filled(&self, path: &str) -> bool {
        let value = self.get(path);
        !is_empty_input(value) && value.is_some_and(|v| !matches!(v, Value::Bool(_)) || truthy(v))
    }
}
