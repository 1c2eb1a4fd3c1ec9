// searchplan-core/src/template.rs
//! Author-declared search templates.
//!
//! A template says which input keys become filters and what the defaults
//! for ordering, grouping and having are. The generator binds a template
//! against one request's input to produce a [`SearchRequest`].
//!
//! [`SearchRequest`]: crate::request::SearchRequest

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::condition::{NamedScope, QueryMutator, RawExpression};
use crate::cursor::QueryCursor;
use crate::error::{Result, SearchError};
use crate::input::InputArgs;
use crate::when::When;

/// Producers may return producers; give up after this many hops.
const MAX_RESOLVE_DEPTH: usize = 16;

type ProducerFn = dyn Fn() -> TemplateValue + Send + Sync;

/// Zero-argument function evaluated when the template is bound
#[derive(Clone)]
pub struct Producer(Arc<ProducerFn>);

impl Producer {
    pub fn call(&self) -> TemplateValue {
        (self.0)()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer({:p})", Arc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone)]
pub enum TemplateValue {
    Value(Value),
    Raw(RawExpression),
    Callback(QueryMutator),
    Scope(NamedScope),
    Producer(Producer),
    When(Box<When>),
    List(Vec<TemplateValue>),
    Entries(Vec<TemplateEntry>),
}

impl TemplateValue {
    pub fn null() -> Self {
        TemplateValue::Value(Value::Null)
    }

    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> TemplateValue + Send + Sync + 'static,
    {
        TemplateValue::Producer(Producer(Arc::new(f)))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&mut dyn QueryCursor) -> Result<()> + Send + Sync + 'static,
    {
        TemplateValue::Callback(QueryMutator::new(f))
    }

    /// Run producers and pick conditional branches until a concrete value
    /// remains. An unmet conditional without a fallback resolves to null.
    pub fn resolve(self) -> Result<TemplateValue> {
        let mut current = self;
        for _ in 0..MAX_RESOLVE_DEPTH {
            current = match current {
                TemplateValue::Producer(producer) => producer.call(),
                TemplateValue::When(when) => when.into_branch().unwrap_or_else(TemplateValue::null),
                resolved => return Ok(resolved),
            };
        }
        Err(SearchError::InvalidTemplate(format!(
            "template value still unresolved after {} producer calls",
            MAX_RESOLVE_DEPTH
        )))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TemplateValue::Value(_) => "value",
            TemplateValue::Raw(_) => "raw expression",
            TemplateValue::Callback(_) => "callback",
            TemplateValue::Scope(_) => "scope",
            TemplateValue::Producer(_) => "producer",
            TemplateValue::When(_) => "conditional",
            TemplateValue::List(_) => "list",
            TemplateValue::Entries(_) => "entry list",
        }
    }
}

impl From<Value> for TemplateValue {
    fn from(value: Value) -> Self {
        TemplateValue::Value(value)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        TemplateValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        TemplateValue::Value(Value::String(value))
    }
}

impl From<RawExpression> for TemplateValue {
    fn from(expr: RawExpression) -> Self {
        TemplateValue::Raw(expr)
    }
}

impl From<NamedScope> for TemplateValue {
    fn from(scope: NamedScope) -> Self {
        TemplateValue::Scope(scope)
    }
}

impl From<QueryMutator> for TemplateValue {
    fn from(mutator: QueryMutator) -> Self {
        TemplateValue::Callback(mutator)
    }
}

impl From<When> for TemplateValue {
    fn from(when: When) -> Self {
        TemplateValue::When(Box::new(when))
    }
}

impl From<Vec<TemplateEntry>> for TemplateValue {
    fn from(entries: Vec<TemplateEntry>) -> Self {
        TemplateValue::Entries(entries)
    }
}

/// One declared where/having entry; `key: None` is positional
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub key: Option<String>,
    pub value: TemplateValue,
}

impl TemplateEntry {
    /// Filter on the request input at `path`, skipped when the input is blank
    pub fn input(path: impl Into<String>) -> Self {
        TemplateEntry {
            key: None,
            value: TemplateValue::Value(Value::String(path.into())),
        }
    }

    pub fn field(key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        TemplateEntry {
            key: Some(key.into()),
            value: value.into(),
        }
    }

    pub fn positional(value: impl Into<TemplateValue>) -> Self {
        TemplateEntry {
            key: None,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    Page,
    PageSize,
}

/// Input paths holding the page number and size; later aliases win
pub const DEFAULT_PAGE_ALIASES: [(&str, PageField); 4] = [
    ("paginator.page", PageField::Page),
    ("page", PageField::Page),
    ("paginator.limit", PageField::PageSize),
    ("page_size", PageField::PageSize),
];

/// Declared defaults bound against request input
///
/// Every method has an empty default, so a template only overrides what it
/// declares.
pub trait ConditionTemplate: Send + Sync {
    fn wheres(&self, _input: &InputArgs) -> Vec<TemplateEntry> {
        Vec::new()
    }

    /// Default order: a sort token, a list of them, or a raw expression
    fn order(&self, _input: &InputArgs) -> TemplateValue {
        TemplateValue::null()
    }

    fn group_by(&self, _input: &InputArgs) -> TemplateValue {
        TemplateValue::null()
    }

    fn having(&self, _input: &InputArgs) -> Vec<TemplateEntry> {
        Vec::new()
    }

    fn page_aliases(&self) -> &[(&'static str, PageField)] {
        &DEFAULT_PAGE_ALIASES
    }

    /// Input keys copied into the request keyword, first non-blank wins
    fn keyword_aliases(&self) -> &[&'static str] {
        &[]
    }
}
