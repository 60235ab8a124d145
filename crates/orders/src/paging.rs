//! Pagination math for order listings.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A clamped page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Clamp raw query values: `page < 1` becomes 1, `limit < 1` becomes the
    /// default page size, and `limit` is capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.clamp(1, i64::from(u32::MAX)) as u32;
        let limit = if limit < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(i64::from(MAX_PAGE_SIZE)) as u32
        };
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(DEFAULT_PAGE_SIZE))
    }
}

/// One page of results plus the counts needed to navigate the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page(),
            limit: request.limit(),
            total_pages: total.div_ceil(u64::from(request.limit())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_values_are_clamped() {
        let req = PageRequest::new(0, 0);
        assert_eq!((req.page(), req.limit()), (1, DEFAULT_PAGE_SIZE));

        let req = PageRequest::new(-4, -1);
        assert_eq!((req.page(), req.limit()), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(PageRequest::new(1, 5_000).limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(1, 10);
        assert_eq!(Page::<()>::new(vec![], 0, req).total_pages, 0);
        assert_eq!(Page::<()>::new(vec![], 10, req).total_pages, 1);
        assert_eq!(Page::<()>::new(vec![], 11, req).total_pages, 2);
    }

    #[test]
    fn serializes_envelope_in_camel_case() {
        let page = Page::new(vec![1, 2], 12, PageRequest::new(2, 2));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"data": [1, 2], "total": 12, "page": 2, "limit": 2, "totalPages": 6})
        );
    }
}
