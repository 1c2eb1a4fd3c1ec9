// searchplan-core/src/search.rs
//! End-to-end search: normalize, plan, apply, then page.

use crate::condition::ConditionSet;
use crate::config::SearchConfig;
use crate::cursor::{QueryCursor, RowSource};
use crate::error::Result;
use crate::memory::{MemoryQuery, MemoryTable};
use crate::pagination::{
    resolve_page_size, result_shape, Page, PageInfo, PageWindow, Projection, ResultShape, SearchResult,
    SimplePage,
};
use crate::plan::QueryPlan;
use crate::request::SearchRequest;
use crate::schema::{ModelIntrospector, ModelSchema};
use crate::{log_debug, log_info};

/// Something a fresh cursor can be opened on
pub trait QuerySource {
    type Cursor: QueryCursor + RowSource;

    fn schema(&self) -> &ModelSchema;

    fn open(&self) -> Self::Cursor;
}

impl QuerySource for MemoryTable {
    type Cursor = MemoryQuery;

    fn schema(&self) -> &ModelSchema {
        MemoryTable::schema(self)
    }

    fn open(&self) -> MemoryQuery {
        self.query()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub projection: Projection,
    /// Page size carried by the surrounding request, below the conditions'
    pub request_page_size: Option<u64>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_request_page_size(mut self, page_size: Option<u64>) -> Self {
        self.request_page_size = page_size;
        self
    }
}

/// Runs searches with one configuration and model registry
pub struct Searcher<'a> {
    config: &'a SearchConfig,
    registry: &'a dyn ModelIntrospector,
}

impl<'a> Searcher<'a> {
    pub fn new(config: &'a SearchConfig, registry: &'a dyn ModelIntrospector) -> Self {
        Searcher { config, registry }
    }

    /// Normalize and plan without touching any cursor.
    pub fn compile(&self, schema: &ModelSchema, request: &SearchRequest) -> Result<QueryPlan> {
        let set = ConditionSet::compile(request)?;
        QueryPlan::build(&set, schema, self.registry)
    }

    pub fn search<S: QuerySource>(
        &self,
        source: &S,
        request: &SearchRequest,
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        let plan = self.compile(source.schema(), request)?;
        let mut cursor = source.open();
        plan.apply(&mut cursor)?;

        let page = match request.page {
            Some(page) => page,
            None => {
                let rows = cursor.fetch()?;
                log_info!("{}: {} rows", source.schema().name(), rows.len());
                return Ok(SearchResult::Rows { rows });
            }
        };

        let page_size = resolve_page_size(
            request.page_size,
            options.request_page_size,
            self.config.default_page_size,
        );
        let window = PageWindow::new(page, page_size);
        let shape = result_shape(request.page, options.projection);
        log_debug!(
            "{}: page {} of size {} as {:?}",
            source.schema().name(),
            window.page,
            page_size,
            shape
        );

        cursor.skip(window.offset())?;
        let result = match shape {
            ResultShape::SimplePage => {
                // one extra row tells whether another page exists
                cursor.take(page_size.saturating_add(1))?;
                let mut rows = cursor.fetch()?;
                let has_more = rows.len() as u64 > page_size;
                rows.truncate(page_size as usize);
                SearchResult::SimplePage(SimplePage {
                    rows,
                    page: window.page,
                    page_size,
                    has_more,
                })
            }
            ResultShape::Page => {
                let total_count = cursor.count()?;
                cursor.take(page_size)?;
                SearchResult::Page(Page {
                    rows: cursor.fetch()?,
                    total_count,
                    page: window.page,
                    page_size,
                    has_more: window.has_more(total_count),
                })
            }
            ResultShape::PageInfo | ResultShape::Rows => {
                let total_count = cursor.count()?;
                SearchResult::PageInfo(PageInfo {
                    total_count,
                    page: window.page,
                    page_size,
                    has_more: window.has_more(total_count),
                })
            }
        };
        log_info!(
            "{}: {} rows, total {:?}",
            source.schema().name(),
            result.rows().len(),
            result.total_count()
        );
        Ok(result)
    }

    /// Number of matching rows, ignoring paging.
    pub fn count<S: QuerySource>(&self, source: &S, request: &SearchRequest) -> Result<u64> {
        let plan = self.compile(source.schema(), request)?;
        let mut cursor = source.open();
        plan.apply(&mut cursor)?;
        cursor.count()
    }
}
