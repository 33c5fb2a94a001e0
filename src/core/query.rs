//! Query parameters and pagination utilities

use crate::core::field::Filter;
use crate::core::service::{Record, Repository};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

/// Page size used when none is configured
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Query parameters for paginated listings
///
/// The page is kept as raw text so that a non-numeric value degrades to the
/// first page instead of rejecting the request.
///
/// # Example
/// ```rust,ignore
/// GET /courses?page=2
/// GET /courses?page=abc   // same as page=1
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page number, defaulting to 1 when missing or non-numeric
    ///
    /// Numbers beyond `i64` saturate, so a huge page still clamps to the last.
    pub fn requested_page(&self) -> i64 {
        let Some(raw) = self.page.as_deref() else {
            return 1;
        };
        match raw.trim().parse::<i64>() {
            Ok(page) => page,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => i64::MAX,
            Err(_) => 1,
        }
    }
}

/// Result of applying the page-size policy to a result count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (starts at 1)
    pub page: usize,

    /// Total number of pages, 0 when there is nothing to list
    pub total_pages: usize,

    /// Number of items per page
    pub page_size: usize,

    /// Number of records skipped before this page
    pub offset: usize,

    /// Total number of matching records
    pub count: usize,
}

impl Pagination {
    /// Clamp `requested_page` into `1..=total_pages` and compute the window
    ///
    /// A page past the end is served as the last page, a page below 1 as the
    /// first. With no records `total_pages` is 0 and the page is still 1.
    pub fn new(total_count: usize, requested_page: i64, page_size: usize) -> Self {
        // Ensure page_size is at least 1 to avoid division by zero
        let page_size = page_size.max(1);
        let total_pages = total_count.div_ceil(page_size);

        let requested = usize::try_from(requested_page.max(0)).unwrap_or(usize::MAX);
        let page = requested.min(total_pages).max(1);

        Self {
            page,
            total_pages,
            page_size,
            offset: (page - 1) * page_size,
            count: total_count,
        }
    }
}

/// Paginated response envelope
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub count: usize,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self {
            data,
            page: pagination.page,
            total_pages: pagination.total_pages,
            page_size: pagination.page_size,
            count: pagination.count,
        }
    }

    /// Project every item, keeping the pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            total_pages: self.total_pages,
            page_size: self.page_size,
            count: self.count,
        }
    }
}

/// Count, clamp, then fetch one window of `filter`'s matches
///
/// Count and fetch are independent reads, so a concurrent insert or delete
/// can make `count` disagree with what a later page returns.
pub async fn fetch_page<T, R>(
    repository: &R,
    filter: &Filter,
    requested_page: i64,
    page_size: usize,
) -> Result<Page<T>>
where
    T: Record,
    R: Repository<T> + ?Sized,
{
    let count = repository.count(filter).await?;
    let pagination = Pagination::new(count, requested_page, page_size);
    let data = repository
        .find_page(filter, pagination.offset, pagination.page_size)
        .await?;
    Ok(Page::new(data, pagination))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(String::from),
        }
    }

    #[test]
    fn test_page_query_defaults_to_first_page() {
        assert_eq!(PageQuery::default().requested_page(), 1);
        assert_eq!(query(Some("abc")).requested_page(), 1);
        assert_eq!(query(Some("")).requested_page(), 1);
        assert_eq!(query(Some("3")).requested_page(), 3);
        assert_eq!(query(Some("-2")).requested_page(), -2);
    }

    #[test]
    fn test_page_query_saturates_huge_numbers() {
        assert_eq!(query(Some("99999999999999999999")).requested_page(), i64::MAX);
        assert_eq!(query(Some(" 99999999999999999999 ")).requested_page(), i64::MAX);
        assert_eq!(query(Some("-99999999999999999999")).requested_page(), 1);

        let last = Pagination::new(25, query(Some("99999999999999999999")).requested_page(), 10);
        assert_eq!(last.page, 3);
    }

    #[test]
    fn test_pagination_total_pages_is_ceiling() {
        assert_eq!(Pagination::new(145, 1, 10).total_pages, 15);
        assert_eq!(Pagination::new(140, 1, 10).total_pages, 14);
        assert_eq!(Pagination::new(1, 1, 10).total_pages, 1);
    }

    #[test]
    fn test_pagination_empty_collection() {
        let p = Pagination::new(0, 5, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
        assert_eq!(p.count, 0);
    }

    #[test]
    fn test_pagination_clamps_low_pages_to_first() {
        for requested in [0, -1, -100, i64::MIN] {
            assert_eq!(Pagination::new(25, requested, 10), Pagination::new(25, 1, 10));
        }
    }

    #[test]
    fn test_pagination_clamps_high_pages_to_last() {
        let last = Pagination::new(25, 3, 10);
        assert_eq!(last.offset, 20);
        assert_eq!(Pagination::new(25, 4, 10), last);
        assert_eq!(Pagination::new(25, i64::MAX, 10), last);
    }

    #[test]
    fn test_pagination_zero_page_size_is_treated_as_one() {
        let p = Pagination::new(3, 2, 0);
        assert_eq!(p.page_size, 1);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 1);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page = Page::new(vec![1, 2], Pagination::new(12, 2, 10));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["count"], 12);
        assert_eq!(json["page"], 2);
    }
}
