// searchplan-core/src/request.rs
//! Bound search request: the input accepted by the normalizer.
//!
//! A request is either produced by the [`ConditionGenerator`] from a template
//! or parsed straight from JSON:
//!
//! ```json
//! {
//!   "wheres": {"name.like": "%ann%", "company$name": "acme", "age": {"gt": 18, "lt": 65}},
//!   "order": ["+rank", "-id"],
//!   "group_by": "company_id",
//!   "having": {"count.gt": 1},
//!   "page": 2, "page_size": 10,
//!   "keyword": "ann"
//! }
//! ```
//!
//! `wheres` may also be an array of positional entries: `{"field", "value"}`
//! structured conditions, `{"$raw": sql, "bindings": [..]}` fragments and
//! `{"$scope": name, "args": [..], "model": owner}` scope references.
//!
//! [`ConditionGenerator`]: crate::generator::ConditionGenerator

use serde_json::{Map, Value};

use crate::condition::{GroupBy, GroupSpec, NamedScope, OrderBy, OrderSpec, QueryMutator, RawExpression};
use crate::cursor::Direction;
use crate::error::{Result, SearchError};
use crate::log_debug;

pub const RAW_TAG: &str = "$raw";
pub const SCOPE_TAG: &str = "$scope";

/// Keyword aliases, highest precedence first
pub const KEYWORD_KEYS: [&str; 3] = ["keyword", "search", "key"];

#[derive(Debug, Clone, PartialEq)]
pub enum WhereKey {
    Positional,
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WhereItem {
    Value(Value),
    Raw(RawExpression),
    Callback(QueryMutator),
    Scope(NamedScope),
}

/// One where (or having) entry before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct WhereEntry {
    pub key: WhereKey,
    pub item: WhereItem,
}

impl WhereEntry {
    pub fn keyed(key: impl Into<String>, value: Value) -> Self {
        WhereEntry {
            key: WhereKey::Field(key.into()),
            item: WhereItem::Value(value),
        }
    }

    /// Structured `{field, value}` entry; `value` is an operator map
    pub fn positional(field: impl Into<String>, operators: Value) -> Self {
        let mut map = Map::new();
        map.insert("field".to_string(), Value::String(field.into()));
        map.insert("value".to_string(), operators);
        WhereEntry {
            key: WhereKey::Positional,
            item: WhereItem::Value(Value::Object(map)),
        }
    }

    pub fn raw(expr: RawExpression) -> Self {
        WhereEntry {
            key: WhereKey::Positional,
            item: WhereItem::Raw(expr),
        }
    }

    pub fn callback(mutator: QueryMutator) -> Self {
        WhereEntry {
            key: WhereKey::Positional,
            item: WhereItem::Callback(mutator),
        }
    }

    pub fn scope(scope: NamedScope) -> Self {
        WhereEntry {
            key: WhereKey::Positional,
            item: WhereItem::Scope(scope),
        }
    }

    /// Key for error messages
    pub fn label(&self) -> String {
        match &self.key {
            WhereKey::Field(key) => key.clone(),
            WhereKey::Positional => "<positional>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub wheres: Vec<WhereEntry>,
    pub order: OrderSpec,
    pub group_by: GroupSpec,
    pub having: Vec<WhereEntry>,
    pub keyword: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub offset: u64,
    pub limit: u64,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, key: impl Into<String>, value: Value) -> Self {
        self.wheres.push(WhereEntry::keyed(key, value));
        self
    }

    pub fn with_entry(mut self, entry: WhereEntry) -> Self {
        self.wheres.push(entry);
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    /// Parse a request map.
    ///
    /// Unknown top-level keys are ignored. `page_size` takes precedence over
    /// `pageSize`, and `keyword` over `search` over `key`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            SearchError::InvalidQuery("search request must be a JSON object".to_string())
        })?;

        let mut request = SearchRequest::new();

        if let Some(wheres) = obj.get("wheres") {
            request.wheres = parse_entries("wheres", wheres)?;
        }
        if let Some(having) = obj.get("having") {
            request.having = parse_entries("having", having)?;
        }
        if let Some(order) = obj.get("order") {
            request.order = parse_order(order, obj.get("direction"))?;
        }
        if let Some(group_by) = obj.get("group_by") {
            request.group_by = parse_group_by(group_by);
        }

        request.keyword = KEYWORD_KEYS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        request.page = obj.get("page").and_then(as_count);
        request.page_size = page_size_of(obj);
        request.offset = obj.get("offset").and_then(as_count).unwrap_or(0);
        request.limit = obj.get("limit").and_then(as_count).unwrap_or(0);

        Ok(request)
    }
}

/// Non-negative integer from a number or a numeric string
pub fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `page_size`, falling back to `pageSize`
pub fn page_size_of(obj: &Map<String, Value>) -> Option<u64> {
    obj.get("page_size")
        .and_then(as_count)
        .or_else(|| obj.get("pageSize").and_then(as_count))
}

fn parse_entries(section: &str, value: &Value) -> Result<Vec<WhereEntry>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(key, value)| WhereEntry::keyed(key.clone(), value.clone()))
            .collect()),
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(parse_positional)
            .collect(),
        other => Err(SearchError::malformed(
            section,
            format!("expected a map or a list of entries, got {}", other),
        )),
    }
}

fn parse_positional(item: &Value) -> Result<WhereEntry> {
    let obj = match item {
        Value::Object(obj) => obj,
        other => {
            return Err(SearchError::malformed(
                "<positional>",
                format!("positional entries must be objects, got {}", other),
            ))
        }
    };

    if let Some(expr) = parse_raw(obj)? {
        return Ok(WhereEntry::raw(expr));
    }

    if let Some(name) = obj.get(SCOPE_TAG) {
        let name = name
            .as_str()
            .ok_or_else(|| SearchError::malformed(SCOPE_TAG, "scope name must be a string"))?;
        let mut scope = NamedScope::new(name);
        match obj.get("args") {
            Some(Value::Array(args)) => scope.args = args.clone(),
            Some(Value::Null) | None => {}
            Some(single) => scope.args = vec![single.clone()],
        }
        if let Some(owner) = obj.get("model").and_then(Value::as_str) {
            scope = scope.owned_by(owner);
        }
        return Ok(WhereEntry::scope(scope));
    }

    // Structured {field, value}; the normalizer validates the value shape
    Ok(WhereEntry {
        key: WhereKey::Positional,
        item: WhereItem::Value(item.clone()),
    })
}

fn parse_raw(obj: &Map<String, Value>) -> Result<Option<RawExpression>> {
    let sql = match obj.get(RAW_TAG) {
        Some(sql) => sql
            .as_str()
            .ok_or_else(|| SearchError::malformed(RAW_TAG, "raw expression must be a string"))?,
        None => return Ok(None),
    };
    let bindings = match obj.get("bindings") {
        Some(Value::Array(bindings)) => bindings.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    };
    Ok(Some(RawExpression::with_bindings(sql, bindings)))
}

fn parse_order(value: &Value, direction: Option<&Value>) -> Result<OrderSpec> {
    let mut order = OrderSpec::default();
    match value {
        // a bare column sorts by `direction`, descending unless told otherwise
        Value::String(field) if !field.starts_with(['+', '-']) => {
            if field.trim().is_empty() {
                return Ok(order);
            }
            let direction = match direction.and_then(Value::as_str) {
                Some(raw) => Direction::parse(raw).ok_or_else(|| {
                    SearchError::malformed("direction", format!("unknown sort direction '{}'", raw))
                })?,
                None => Direction::Desc,
            };
            order.push(OrderBy::column(field.trim(), direction));
        }
        Value::String(token) => push_sort_token(&mut order, token),
        Value::Object(map) if map.contains_key(RAW_TAG) => {
            if let Some(expr) = parse_raw(map)? {
                order.push(OrderBy::Raw(expr));
            }
        }
        Value::Object(map) => {
            for (field, dir) in map {
                let raw = dir.as_str().unwrap_or_default();
                let direction = Direction::parse(raw).ok_or_else(|| {
                    SearchError::malformed(field, format!("unknown sort direction '{}'", raw))
                })?;
                order.push(OrderBy::column(field.clone(), direction));
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(token) => push_sort_token(&mut order, token),
                    Value::Object(map) => {
                        if let Some(expr) = parse_raw(map)? {
                            order.push(OrderBy::Raw(expr));
                        }
                    }
                    other => log_debug!("dropping sort entry {}", other),
                }
            }
        }
        Value::Null => {}
        other => log_debug!("dropping order {}", other),
    }
    Ok(order)
}

pub(crate) fn push_sort_token(order: &mut OrderSpec, token: &str) {
    match OrderBy::from_sort_token(token.trim()) {
        Some(sort) => order.push(sort),
        None => log_debug!("dropping unprefixed sort token '{}'", token),
    }
}

fn parse_group_by(value: &Value) -> GroupSpec {
    let mut groups = GroupSpec::default();
    let mut push = |item: &Value| match item {
        Value::String(column) if !column.trim().is_empty() => {
            groups.push(GroupBy::Column(column.trim().to_string()))
        }
        Value::Object(map) => match parse_raw(map) {
            Ok(Some(expr)) => groups.push(GroupBy::Raw(expr)),
            _ => log_debug!("dropping group_by entry {}", item),
        },
        other => log_debug!("dropping group_by entry {}", other),
    };

    match value {
        Value::Array(items) => items.iter().for_each(&mut push),
        single => push(single),
    }
    groups
}
