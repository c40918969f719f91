//! Concrete `PageFetcher` implementations backed by the marketplace API client.
//! One per resource; all share the same envelope/pagination shape (§6.4), so only
//! the endpoint name and result type differ between them.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use crate::api_client::{MarketplaceApiClient, Pagination};
use crate::error::AppError;
use crate::models::product::{Account, Product};
use crate::rate_limiter::ResourceClass;

use super::{PageFetcher, RemotePage};

/// A page with no results and no envelope (an edge empty response) is its own last page.
fn fallback_pagination(page: u32, items_per_page: u32, returned: usize) -> Pagination {
    Pagination { total: (page.saturating_sub(1) as i64) * items_per_page as i64 + returned as i64, page, items_per_page }
}

pub struct ProductPageFetcher {
    pub client: std::sync::Arc<MarketplaceApiClient>,
    pub account: Account,
    pub items_per_page: u32,
}

#[async_trait]
impl PageFetcher<Product> for ProductPageFetcher {
    async fn fetch_page(&self, page: u32) -> Result<RemotePage<Product>, AppError> {
        let body = json!({ "currentPage": page, "itemsPerPage": self.items_per_page });
        let envelope = self
            .client
            .call::<_, Product>(Method::POST, "product_offer/read", self.account, ResourceClass::Other, Some(&body), None)
            .await?;

        let returned = envelope.results.len();
        let pagination = envelope
            .pagination
            .unwrap_or_else(|| fallback_pagination(page, self.items_per_page, returned));

        Ok(RemotePage {
            items: envelope.results,
            current_page: pagination.page,
            items_per_page: pagination.items_per_page,
            total_items: pagination.total,
        })
    }
}

/// Orders are always pulled `orders` class (§4.1 rate classes); offers share the
/// `other` class with product reads. Both follow the identical envelope shape as
/// products above, differing only in endpoint and result type.
pub struct OrderPageFetcher {
    pub client: std::sync::Arc<MarketplaceApiClient>,
    pub account: Account,
    pub items_per_page: u32,
}

#[async_trait]
impl PageFetcher<serde_json::Value> for OrderPageFetcher {
    async fn fetch_page(&self, page: u32) -> Result<RemotePage<serde_json::Value>, AppError> {
        let body = json!({ "currentPage": page, "itemsPerPage": self.items_per_page });
        let envelope = self
            .client
            .call::<_, serde_json::Value>(Method::POST, "order/read", self.account, ResourceClass::Orders, Some(&body), None)
            .await?;
        let returned = envelope.results.len();
        let pagination = envelope
            .pagination
            .unwrap_or_else(|| fallback_pagination(page, self.items_per_page, returned));
        Ok(RemotePage {
            items: envelope.results,
            current_page: pagination.page,
            items_per_page: pagination.items_per_page,
            total_items: pagination.total,
        })
    }
}
