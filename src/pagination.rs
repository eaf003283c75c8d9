//! Page-based pagination for list endpoints.

use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Normalized 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page defaults to 1, limit to `DEFAULT_LIMIT`
    /// within `1..=MAX_LIMIT`.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    /// Number of items to skip.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Slice one page out of an already sorted, fully materialized list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Paginated<T> {
        let total = items.len() as i64;
        let page_items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect();
        Paginated::new(page_items, self.meta(total))
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            page: self.page,
            limit: self.limit,
            total,
            has_next_page: self.page.saturating_mul(self.limit) < total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    /// Total number of items (across all pages)
    pub total: i64,
    pub has_next_page: bool,
}

/// Paginated response wrapper for list endpoints.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, meta: PageMeta) -> Self {
        Self { items, meta }
    }
}
