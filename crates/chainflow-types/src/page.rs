//! Offset pagination for list endpoints.

use serde::Serialize;

/// A 1-based page of `limit` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const MAX_LIMIT: u32 = 100;

    /// Normalize client input: page at least 1, limit within `1..=MAX_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of items plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    /// The `pagination` block clients use to walk the result set.
    pub fn pagination(&self, request: PageRequest) -> Pagination {
        Pagination {
            page: request.page,
            limit: request.limit,
            total: self.total,
            total_pages: self.total.div_ceil(u64::from(request.limit)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_normalized() {
        let req = PageRequest::new(0, 0);
        assert_eq!(req, PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(3, 5_000).limit, PageRequest::MAX_LIMIT);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<u8> = Page { items: vec![], total: 21 };
        let meta = page.pagination(PageRequest::new(2, 10));
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.page, 2);

        let empty: Page<u8> = Page { items: vec![], total: 0 };
        assert_eq!(empty.pagination(PageRequest::default()).total_pages, 0);
    }
}
