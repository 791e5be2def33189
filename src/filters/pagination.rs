//! Page-number pagination.

use serde::{Deserialize, Serialize};

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 50.
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    50
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl Pagination {
    /// Builds a clamped pagination.
    #[must_use]
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }.clamped()
    }

    /// Clamps `page` to at least 1 and `size` to `1..=100`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// `LIMIT` value.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.clamped().size)
    }

    /// `OFFSET` value.
    #[must_use]
    pub fn offset(&self) -> i64 {
        let p = self.clamped();
        i64::from(p.page - 1) * i64::from(p.size)
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    /// Current page number.
    pub page: u32,
    /// Page size.
    pub size: u32,
    /// Total number of pages.
    pub pages: u64,
}

impl<T> Page<T> {
    /// Assembles a page from the rows and the total match count.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let p = pagination.clamped();
        let pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(p.size))
        };
        Self {
            items,
            total,
            page: p.page,
            size: p.size,
            pages,
        }
    }

    /// Converts every item, keeping the page metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let p = Pagination::new(0, 500);
        assert_eq!(p, Pagination { page: 1, size: 100 });
        assert_eq!(Pagination::new(3, 0).size, 1);
    }

    #[test]
    fn offset_skips_previous_pages() {
        let p = Pagination::new(3, 20);
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::new(vec![1, 2, 3], 41, Pagination::new(1, 20));
        assert_eq!(page.pages, 3);
        let empty: Page<u8> = Page::new(Vec::new(), 0, Pagination::default());
        assert_eq!(empty.pages, 0);
        assert_eq!(empty.size, 50);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2], 2, Pagination::default()).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 2);
    }
}
