// searchplan-core/src/pagination.rs
//! Page window and result shape selection.
//!
//! ```text
//! page absent                    -> Rows        (every matching row)
//! page + total not projected     -> SimplePage  (rows, has_more; no count query)
//! page + rows and total          -> Page        (rows, total_count, ...)
//! page + total only              -> PageInfo    (total_count, ...; no rows)
//! ```

use serde::Serialize;
use serde_json::Value;

/// Which parts of a paged result the caller will read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub rows: bool,
    pub total: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Projection::all()
    }
}

impl Projection {
    pub fn all() -> Self {
        Projection {
            rows: true,
            total: true,
        }
    }

    pub fn page_info() -> Self {
        Projection {
            rows: false,
            total: true,
        }
    }

    pub fn simple() -> Self {
        Projection {
            rows: true,
            total: false,
        }
    }

    /// Derive the projection from requested result fields such as
    /// `items`, `data`, `cursor.total` or `paginatorInfo.total`.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut projection = Projection {
            rows: false,
            total: false,
        };
        for field in fields {
            let field = field.as_ref();
            let leaf = field.rsplit('.').next().unwrap_or(field);
            match leaf {
                "items" | "data" | "rows" => projection.rows = true,
                "total" | "total_count" | "totalCount" | "count" => projection.total = true,
                _ => {}
            }
        }
        projection
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Rows,
    Page,
    PageInfo,
    SimplePage,
}

pub fn result_shape(page: Option<u64>, projection: Projection) -> ResultShape {
    match (page, projection) {
        (None, _) => ResultShape::Rows,
        (Some(_), Projection { total: false, .. }) => ResultShape::SimplePage,
        (Some(_), Projection { rows: true, .. }) => ResultShape::Page,
        (Some(_), _) => ResultShape::PageInfo,
    }
}

/// First non-zero of: condition page size, request page size, default.
pub fn resolve_page_size(conditions: Option<u64>, request: Option<u64>, default: u64) -> u64 {
    conditions
        .filter(|size| *size > 0)
        .or_else(|| request.filter(|size| *size > 0))
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub page_size: u64,
}

impl PageWindow {
    /// Pages are 1-based; page 0 is treated as page 1.
    pub fn new(page: u64, page_size: u64) -> Self {
        PageWindow {
            page: page.max(1),
            page_size,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn has_more(&self, total: u64) -> bool {
        self.offset().saturating_add(self.page_size) < total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimplePage {
    pub rows: Vec<Value>,
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResult {
    Rows { rows: Vec<Value> },
    Page(Page),
    PageInfo(PageInfo),
    SimplePage(SimplePage),
}

impl SearchResult {
    /// Rows carried by the result; empty for `PageInfo`
    pub fn rows(&self) -> &[Value] {
        match self {
            SearchResult::Rows { rows } => rows,
            SearchResult::Page(page) => &page.rows,
            SearchResult::SimplePage(page) => &page.rows,
            SearchResult::PageInfo(_) => &[],
        }
    }

    pub fn total_count(&self) -> Option<u64> {
        match self {
            SearchResult::Page(page) => Some(page.total_count),
            SearchResult::PageInfo(info) => Some(info.total_count),
            SearchResult::Rows { rows } => Some(rows.len() as u64),
            SearchResult::SimplePage(_) => None,
        }
    }

    pub fn shape(&self) -> ResultShape {
        match self {
            SearchResult::Rows { .. } => ResultShape::Rows,
            SearchResult::Page(_) => ResultShape::Page,
            SearchResult::PageInfo(_) => ResultShape::PageInfo,
            SearchResult::SimplePage(_) => ResultShape::SimplePage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_size_precedence() {
        assert_eq!(resolve_page_size(Some(10), Some(20), 15), 10);
        assert_eq!(resolve_page_size(None, Some(20), 15), 20);
        assert_eq!(resolve_page_size(None, None, 15), 15);
        assert_eq!(resolve_page_size(Some(0), Some(0), 15), 15);
    }

    #[test]
    fn test_window() {
        let window = PageWindow::new(4, 10);
        assert_eq!(window.offset(), 30);
        assert!(!window.has_more(33));
        assert!(PageWindow::new(3, 10).has_more(33));
        assert_eq!(PageWindow::new(0, 10).offset(), 0);
    }

    #[test]
    fn test_result_shape() {
        assert_eq!(result_shape(None, Projection::page_info()), ResultShape::Rows);
        assert_eq!(result_shape(Some(1), Projection::all()), ResultShape::Page);
        assert_eq!(result_shape(Some(1), Projection::page_info()), ResultShape::PageInfo);
        assert_eq!(result_shape(Some(1), Projection::simple()), ResultShape::SimplePage);
    }

    #[test]
    fn test_projection_from_fields() {
        assert_eq!(Projection::from_fields(["items", "cursor.total"]), Projection::all());
        assert_eq!(Projection::from_fields(["paginatorInfo.total"]), Projection::page_info());
        assert_eq!(Projection::from_fields(["data"]), Projection::simple());
    }

    #[test]
    fn test_serialized_result() {
        let result = SearchResult::PageInfo(PageInfo {
            total_count: 33,
            page: 1,
            page_size: 10,
            has_more: true,
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"kind": "page_info", "total_count": 33, "page": 1, "page_size": 10, "has_more": true})
        );
        assert!(result.rows().is_empty());
    }
}
