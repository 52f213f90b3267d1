use serde::{Deserialize, Serialize};

/// Pagination + search query params shared across the find endpoints.
/// `page` is 1-based; `per_page` defaults to 10, capped at 100.
#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub query: Option<String>,
}

impl FindParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }

    /// Search term, normalized to `None` when empty.
    pub fn term(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

/// One page of results plus the paging bookkeeping the dashboard tables need.
#[derive(Debug, Serialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub count: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> PagedResult<T> {
    pub fn new(data: Vec<T>, count: i64, params: &FindParams) -> Self {
        let per_page = params.per_page();

        Self {
            data,
            count,
            current_page: params.page(),
            per_page,
            total_pages: (count + per_page - 1) / per_page,
        }
    }
}
