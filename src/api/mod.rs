//! HTTP handlers, grouped the way the API is routed.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod notices;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod returns;
pub mod site;

use axum::Json;
use serde::{Deserialize, Serialize};

/// Uniform response envelope: `{"status": "success", "data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { status: "success", data })
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

impl ListParams {
    /// Clamped page/limit/offset. Page size defaults to 10 and is capped
    /// at 500.
    pub fn page_window(&self) -> (u32, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(10).clamp(1, 500);
        (page, per_page as i64, ((page - 1) * per_page) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps() {
        let p = ListParams { page: Some(0), per_page: Some(10_000), search: None };
        assert_eq!(p.page_window(), (1, 500, 0));
        let p = ListParams { page: Some(3), per_page: None, search: None };
        assert_eq!(p.page_window(), (3, 10, 20));
    }
}
