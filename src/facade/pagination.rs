use crate::query::FilterRequest;
use serde::Serialize;

/// Page parameters as the caller sent them, possibly out of range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
        }
    }

    pub fn first(limit: i64) -> Self {
        Self::new(0, limit)
    }
}

/// Effective window after clamping: `offset >= 0`, `1 <= limit <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

impl PageWindow {
    pub fn clamp(offset: i64, limit: i64, page_max_limit: usize) -> Self {
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(1))
            .unwrap_or(usize::MAX)
            .min(page_max_limit.max(1));
        Self { offset, limit }
    }
}

/// One page of results with the total over the same filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        u64::try_from(self.offset + self.items.len()).unwrap_or(u64::MAX) < self.total
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// Aggregate view of a kind under a filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total: u64,
    pub filters: FilterRequest,
}
