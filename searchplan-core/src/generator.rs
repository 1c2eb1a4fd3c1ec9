// searchplan-core/src/generator.rs
//! Binds a [`ConditionTemplate`] against request input.
//!
//! Binding runs in a fixed order over a private copy of the input:
//!
//! 1. keys under `more` are lifted to the top level
//! 2. page aliases are consumed into `page` / `page_size`
//! 3. `paginator.sort` / `paginator.sorts` are consumed and appended after
//!    the template order
//! 4. keyword aliases are copied into `keyword`
//! 5. group by, having and finally wheres are bound
//!
//! Wheres see the input after steps 1-3, so a template forwarding "all
//! remaining input" never filters on paging keys.

use serde_json::Value;

use crate::condition::{GroupBy, GroupSpec, OrderBy, OrderSpec};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::input::InputArgs;
use crate::request::{as_count, push_sort_token, SearchRequest, WhereEntry, WhereItem, WhereKey};
use crate::template::{ConditionTemplate, PageField, TemplateEntry, TemplateValue};
use crate::value_utils::{is_blank, scalar_to_string};
use crate::{log_debug, log_warn};

pub const SORT_ALIASES: [&str; 2] = ["paginator.sort", "paginator.sorts"];

pub struct ConditionGenerator<'a> {
    config: &'a SearchConfig,
    appended: Vec<TemplateEntry>,
}

impl<'a> ConditionGenerator<'a> {
    pub fn new(config: &'a SearchConfig) -> Self {
        ConditionGenerator {
            config,
            appended: Vec::new(),
        }
    }

    /// Extra where entries bound before the template's own.
    pub fn append_wheres(mut self, entries: Vec<TemplateEntry>) -> Self {
        self.appended.extend(entries);
        self
    }

    pub fn generate(&self, template: &dyn ConditionTemplate, input: &Value) -> Result<SearchRequest> {
        let mut args = InputArgs::from_value(input.clone())?;
        args.flatten_more();

        let mut request = SearchRequest::new();
        self.bind_paging(template, &mut args, &mut request);

        let sorts: Vec<Value> = SORT_ALIASES.iter().filter_map(|alias| args.take(alias)).collect();
        request.order = bind_order(template.order(&args), sorts)?;

        request.keyword = template
            .keyword_aliases()
            .iter()
            .filter(|alias| args.is_valid_input(alias))
            .find_map(|alias| args.get(alias).and_then(scalar_to_string));

        request.group_by = bind_group_by(template.group_by(&args))?;

        for entry in template.having(&args) {
            bind_having_entry(entry, &args, &mut request.having)?;
        }

        for entry in self.appended.iter().cloned().chain(template.wheres(&args)) {
            let value = entry.value.resolve()?;
            bind_where(entry.key.as_deref(), value, &args, &mut request.wheres)?;
        }

        log_debug!(
            "bound {} wheres, {} having, {} sorts",
            request.wheres.len(),
            request.having.len(),
            request.order.len()
        );
        Ok(request)
    }

    fn bind_paging(&self, template: &dyn ConditionTemplate, args: &mut InputArgs, request: &mut SearchRequest) {
        for (alias, field) in template.page_aliases() {
            if !args.has(alias) {
                continue;
            }
            let value = args.take(alias).as_ref().and_then(as_count);
            match field {
                PageField::Page => request.page = value,
                PageField::PageSize => request.page_size = value,
            }
        }

        if self.config.paginate_by_default {
            request.page.get_or_insert(1);
            request.page_size.get_or_insert(self.config.default_page_size);
        }
    }
}

fn bind_order(template_order: TemplateValue, sorts: Vec<Value>) -> Result<OrderSpec> {
    let mut order = OrderSpec::default();
    push_order(&mut order, template_order)?;
    for sort in sorts {
        push_order(&mut order, TemplateValue::Value(sort))?;
    }
    Ok(order)
}

fn push_order(order: &mut OrderSpec, value: TemplateValue) -> Result<()> {
    match value.resolve()? {
        TemplateValue::Value(Value::String(token)) => push_sort_token(order, &token),
        TemplateValue::Value(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(token) => push_sort_token(order, &token),
                    other => log_debug!("dropping sort entry {}", other),
                }
            }
        }
        TemplateValue::Value(Value::Null) => {}
        TemplateValue::Raw(expr) => order.push(OrderBy::Raw(expr)),
        TemplateValue::List(items) => {
            for item in items {
                push_order(order, item)?;
            }
        }
        other => log_debug!("dropping {} in order", other.kind()),
    }
    Ok(())
}

fn bind_group_by(value: TemplateValue) -> Result<GroupSpec> {
    let mut groups = GroupSpec::default();
    push_group(&mut groups, value)?;
    Ok(groups)
}

fn push_group(groups: &mut GroupSpec, value: TemplateValue) -> Result<()> {
    match value.resolve()? {
        TemplateValue::Value(Value::String(column)) => {
            if !column.trim().is_empty() {
                groups.push(GroupBy::Column(column.trim().to_string()));
            }
        }
        TemplateValue::Value(Value::Array(items)) => {
            for item in items {
                push_group(groups, TemplateValue::Value(item))?;
            }
        }
        TemplateValue::Value(Value::Null) => {}
        TemplateValue::Raw(expr) => groups.push(GroupBy::Raw(expr)),
        TemplateValue::List(items) => {
            for item in items {
                push_group(groups, item)?;
            }
        }
        other => log_debug!("dropping {} in group_by", other.kind()),
    }
    Ok(())
}

/// A positional having entry may expand into several keyed conditions:
/// either a map of `key => value` or a list of entries.
fn bind_having_entry(entry: TemplateEntry, args: &InputArgs, out: &mut Vec<WhereEntry>) -> Result<()> {
    let value = entry.value.resolve()?;
    match (entry.key.as_deref(), value) {
        (None, TemplateValue::Entries(inner)) => {
            for nested in inner {
                let value = nested.value.resolve()?;
                bind_where(nested.key.as_deref(), value, args, out)?;
            }
            Ok(())
        }
        (None, TemplateValue::Value(Value::Object(map))) if !map.contains_key("field") => {
            for (key, value) in map {
                if !is_blank(Some(&value)) {
                    out.push(WhereEntry::keyed(key, value));
                }
            }
            Ok(())
        }
        (key, value) => bind_where(key, value, args, out),
    }
}

/// Bind one resolved entry; blank values and unset inputs are skipped.
fn bind_where(key: Option<&str>, value: TemplateValue, args: &InputArgs, out: &mut Vec<WhereEntry>) -> Result<()> {
    let label = key.unwrap_or("<positional>");
    let item = match value {
        TemplateValue::Raw(expr) => WhereItem::Raw(expr),
        TemplateValue::Callback(mutator) => WhereItem::Callback(mutator),
        TemplateValue::Scope(scope) => WhereItem::Scope(scope),
        TemplateValue::Value(value) => {
            let entry = match key {
                Some(key) => bind_keyed(key, value),
                None => bind_positional(value, args)?,
            };
            out.extend(entry);
            return Ok(());
        }
        other => {
            return Err(SearchError::InvalidTemplate(format!(
                "where entry '{}' resolved to a {}",
                label,
                other.kind()
            )))
        }
    };

    if key.is_some() {
        log_warn!("key '{}' ignored for a {} entry", label, item_kind(&item));
    }
    out.push(WhereEntry {
        key: WhereKey::Positional,
        item,
    });
    Ok(())
}

fn bind_keyed(key: &str, value: Value) -> Option<WhereEntry> {
    if is_blank(Some(&value)) {
        log_debug!("skipping blank value for '{}'", key);
        return None;
    }
    Some(WhereEntry::keyed(key, value))
}

/// A positional scalar names an input path whose value becomes the filter.
fn bind_positional(value: Value, args: &InputArgs) -> Result<Option<WhereEntry>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) if map.contains_key("field") => Ok(Some(WhereEntry {
            key: WhereKey::Positional,
            item: WhereItem::Value(Value::Object(map)),
        })),
        Value::Object(_) | Value::Array(_) => Err(SearchError::InvalidTemplate(format!(
            "positional where entry must name an input, got {}",
            value
        ))),
        scalar => {
            let path = scalar_to_string(&scalar).unwrap_or_default();
            if !args.is_valid_input(&path) {
                log_debug!("input '{}' not set", path);
                return Ok(None);
            }
            Ok(args.get(&path).map(|input| WhereEntry::keyed(path.clone(), input.clone())))
        }
    }
}

fn item_kind(item: &WhereItem) -> &'static str {
    match item {
        WhereItem::Value(_) => "value",
        WhereItem::Raw(_) => "raw expression",
        WhereItem::Callback(_) => "callback",
        WhereItem::Scope(_) => "scope",
    }
}
