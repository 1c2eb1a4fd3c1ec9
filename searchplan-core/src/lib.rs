// searchplan-core/src/lib.rs
// Pure Rust API - no bindings, no database driver

pub mod condition;
pub mod config;
pub mod cursor;
pub mod directive;
pub mod error;
pub mod generator;
pub mod input;
pub mod logging;
pub mod memory;
pub mod normalizer;
pub mod operator;
pub mod pagination;
pub mod path;
pub mod plan;
pub mod recording;
pub mod request;
pub mod schema;
pub mod search;
pub mod template;
pub mod value_utils;
pub mod when;

// Public exports
pub use condition::{
    Condition, ConditionSet, FieldCondition, GroupBy, GroupSpec, NamedScope, OrderBy, OrderSpec,
    QueryMutator, RawExpression,
};
pub use config::SearchConfig;
pub use cursor::{Direction, QueryCursor, RowSource};
pub use directive::ListDirective;
pub use error::{Result, SearchError};
pub use generator::ConditionGenerator;
pub use input::InputArgs;
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use memory::{MemoryQuery, MemoryTable};
pub use operator::{Combinator, Comparison, Operator};
pub use pagination::{Page, PageInfo, Projection, ResultShape, SearchResult, SimplePage};
pub use path::{ConditionKey, FieldPath, RelationPath};
pub use plan::{PlanStep, QueryPlan};
pub use recording::{CursorOp, RecordingCursor};
pub use request::{SearchRequest, WhereEntry, WhereItem, WhereKey};
pub use schema::{ModelIntrospector, ModelRegistry, ModelSchema};
pub use search::{QuerySource, SearchOptions, Searcher};
pub use template::{ConditionTemplate, PageField, TemplateEntry, TemplateValue};
pub use when::When;
