//! Common wire types shared by procedures

use serde::{Deserialize, Serialize};

/// Generic paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: u32,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Build a page from the full item count and one page of data.
    pub fn new(data: Vec<T>, total: u32, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            data,
            total,
            page,
            total_pages,
        }
    }
}

/// Generic success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}

/// Pagination input
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaginationInput {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationInput {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }
}
