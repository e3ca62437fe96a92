//! Offset pagination helpers for list endpoints.

use serde::Deserialize;

/// Default page size when the client does not send `limit`.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Query string parameters accepted by list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A resolved page window, safe to bind into `LIMIT $n OFFSET $m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PageParams {
    /// Clamps the requested window: limit to `1..=max_limit`, offset to `>= 0`.
    pub fn resolve(&self, default_limit: i64, max_limit: i64) -> Page {
        let max_limit = max_limit.max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, max_limit);
        let offset = self.offset.unwrap_or(0).max(0);
        Page { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
