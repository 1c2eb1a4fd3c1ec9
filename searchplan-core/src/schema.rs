// searchplan-core/src/schema.rs
//! Model introspection: declared columns and named scopes per model type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use heck::ToSnakeCase;
use serde_json::Value;

use crate::cursor::QueryCursor;
use crate::error::Result;

/// A named scope body: receives the cursor and the declared arguments
pub type ScopeFn = dyn Fn(&mut dyn QueryCursor, &[Value]) -> Result<()> + Send + Sync;

/// Scope names are matched snake/camel insensitively, with an optional
/// `scope` prefix: `searchKeyword`, `search_keyword` and `scopeSearchKeyword`
/// are the same scope.
fn scope_key(name: &str) -> String {
    let snake = name.to_snake_case();
    match snake.strip_prefix("scope_") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => snake,
    }
}

#[derive(Clone, Default)]
pub struct ModelSchema {
    name: String,
    columns: Vec<String>,
    scopes: HashMap<String, Arc<ScopeFn>>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        ModelSchema {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self
    }

    pub fn with_scope<F>(mut self, name: &str, scope: F) -> Self
    where
        F: Fn(&mut dyn QueryCursor, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.scopes.insert(scope_key(name), Arc::new(scope));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn has_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(&scope_key(name))
    }

    pub fn scope(&self, name: &str) -> Option<Arc<ScopeFn>> {
        self.scopes.get(&scope_key(name)).cloned()
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scopes: Vec<_> = self.scopes.keys().collect();
        scopes.sort();
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("scopes", &scopes)
            .finish()
    }
}

/// Lookup of model schemas by type name
pub trait ModelIntrospector {
    fn model(&self, name: &str) -> Option<&ModelSchema>;
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSchema>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ModelSchema) {
        self.models.insert(schema.name().to_string(), schema);
    }

    pub fn with_model(mut self, schema: ModelSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelIntrospector for ModelRegistry {
    fn model(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }
}
