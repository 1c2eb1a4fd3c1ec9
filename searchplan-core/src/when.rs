// searchplan-core/src/when.rs
//! Conditional template values.
//!
//! ```ignore
//! When::make_with(|| input.is_valid_input("vip"))
//!     .success(json!({"gt": 1000}))
//!     .fail(TemplateValue::producer(|| json!({"gt": 0}).into()))
//! ```
//!
//! The branch is chosen when the `When` is built; a branch that is itself a
//! producer runs only when the template is bound.

use serde_json::Value;

use crate::error::Result;
use crate::template::TemplateValue;
use crate::value_utils::truthy;

#[derive(Debug, Clone)]
pub struct When {
    met: bool,
    success: Option<TemplateValue>,
    fail: Option<TemplateValue>,
}

impl When {
    pub fn make(condition: bool) -> Self {
        When {
            met: condition,
            success: None,
            fail: None,
        }
    }

    /// Evaluate a predicate closure; captured values play the role of
    /// arguments.
    pub fn make_with<F>(predicate: F) -> Self
    where
        F: FnOnce() -> bool,
    {
        When::make(predicate())
    }

    /// Loose truthiness of an input value; absent is false.
    pub fn from_value(value: Option<&Value>) -> Self {
        When::make(value.is_some_and(truthy))
    }

    pub fn success(mut self, value: impl Into<TemplateValue>) -> Self {
        self.success = Some(value.into());
        self
    }

    pub fn fail(mut self, value: impl Into<TemplateValue>) -> Self {
        self.fail = Some(value.into());
        self
    }

    pub fn is_met(&self) -> bool {
        self.met
    }

    /// The selected branch, unevaluated
    pub fn result(&self) -> Option<&TemplateValue> {
        if self.met {
            self.success.as_ref()
        } else {
            self.fail.as_ref()
        }
    }

    pub(crate) fn into_branch(self) -> Option<TemplateValue> {
        if self.met {
            self.success
        } else {
            self.fail
        }
    }

    /// The selected branch with producers run; `None` when that branch was
    /// never set.
    pub fn resolve(&self) -> Result<Option<TemplateValue>> {
        self.result().cloned().map(TemplateValue::resolve).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_of(when: &When) -> Option<Value> {
        match when.resolve().unwrap() {
            Some(TemplateValue::Value(v)) => Some(v),
            Some(other) => panic!("unexpected {:?}", other),
            None => None,
        }
    }

    #[test]
    fn test_make_success_and_fail() {
        let when = When::make(true).success(json!("yes")).fail(json!("no"));
        assert_eq!(value_of(&when), Some(json!("yes")));

        let when = When::make(false).success(json!("yes")).fail(json!("no"));
        assert_eq!(value_of(&when), Some(json!("no")));
    }

    #[test]
    fn test_missing_branch_is_none() {
        assert_eq!(value_of(&When::make(false).success(json!(1))), None);
        assert_eq!(value_of(&When::make(true)), None);
    }

    #[test]
    fn test_make_with_closure_arguments() {
        let (a, b) = (2, 3);
        let when = When::make_with(|| a + b == 5).success(json!("sum"));
        assert!(when.is_met());
        assert_eq!(value_of(&when), Some(json!("sum")));
    }

    #[test]
    fn test_producer_branch_runs_on_resolve() {
        let when = When::make(true).success(TemplateValue::producer(|| json!(42).into()));
        assert!(matches!(when.result(), Some(TemplateValue::Producer(_))));
        assert_eq!(value_of(&when), Some(json!(42)));
    }

    #[test]
    fn test_from_value() {
        assert!(When::from_value(Some(&json!("x"))).is_met());
        assert!(!When::from_value(Some(&json!(0))).is_met());
        assert!(!When::from_value(None).is_met());
    }
}
