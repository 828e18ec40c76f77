use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{ApiResponse, PaginatedResponse};

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// One-based page, never zero
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// Filter for warehouse listings scoped to one product
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub product_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ProductFilter {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Wrap one page of results with its paging metadata
pub fn paginated<T>(
    items: Vec<T>,
    total: u64,
    page: Option<u64>,
    per_page: Option<u64>,
) -> PaginatedResponse<T> {
    let params = PaginationParams { page, per_page };
    PaginatedResponse::new(items, total, params.page(), params.per_page())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let params = PaginationParams {
            page: Some(0),
            per_page: Some(1_000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), MAX_PER_PAGE);
        assert_eq!(PaginationParams::default().per_page(), DEFAULT_PER_PAGE);
    }

    #[test]
    fn total_pages_round_up() {
        let page = paginated(vec![1, 2, 3], 41, Some(2), Some(20));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(paginated(Vec::<i32>::new(), 0, None, None).total_pages, 0);
    }
}
