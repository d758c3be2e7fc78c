//! Pagination parameters for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page number (1-indexed)
const DEFAULT_PAGE: u32 = 1;

/// Default items per page
const DEFAULT_PER_PAGE: u32 = 20;

/// Maximum items per page
const MAX_PER_PAGE: u32 = 100;

/// Page-based pagination parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: u32,

    /// Items per page
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationParams {
    /// Create parameters, clamping out-of-range values.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(DEFAULT_PAGE),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Offset for database queries (0-indexed).
    pub fn offset(&self) -> u32 {
        (self.page.max(1) - 1) * self.per_page
    }

    /// Limit for database queries.
    pub fn limit(&self) -> u32 {
        self.per_page
    }
}
