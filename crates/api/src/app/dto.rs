use serde::Deserialize;

use orderdesk_orders::{OrderStatus, UnknownStatus};

// -------------------------
// Request DTOs
// -------------------------

// Order creation bodies deserialize straight into
// `orderdesk_orders::CreateOrderRequest`.

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn parse_status(&self) -> Result<OrderStatus, UnknownStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListOrdersQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(i64::from(orderdesk_orders::paging::DEFAULT_PAGE_SIZE))
    }
}
