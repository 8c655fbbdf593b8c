use std::collections::HashMap;

use serde::Serialize;

use crate::config::PaginationConfig;

/// Page-number request parsed leniently from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// `page` defaults to 1; `page_size` falls back to the configured default
    /// when missing or invalid and is clamped to the configured maximum.
    pub fn from_params(params: &HashMap<String, String>, cfg: &PaginationConfig) -> Self {
        let page = params
            .get("page")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let page_size = params
            .get("page_size")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|s| *s >= 1)
            .unwrap_or(cfg.default_page_size)
            .min(cfg.max_page_size);
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, req: PageRequest) -> Self {
        let total_pages = if count == 0 {
            0
        } else {
            let size = req.page_size.max(1);
            (count + size - 1) / size
        };
        Self {
            count,
            page: req.page,
            page_size: req.page_size,
            total_pages,
            results,
        }
    }
}
