use async_trait::async_trait;

use orderdesk_core::ProductId;

use crate::types::{DeductionError, InventoryCheckResult, StockDeduction, StockRequest};

/// Boundary to the external inventory authority.
///
/// Implementations normalize whatever the authority speaks into the two fixed
/// outcomes below. They never retry and never guess a quantity.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Availability of every requested product, quantities summed per product.
    ///
    /// Infallible by signature: a product the authority could not answer for
    /// is reported as unavailable.
    async fn check_availability(&self, items: &[StockRequest]) -> InventoryCheckResult;

    /// Commit `quantity` units of `product_id`.
    async fn deduct_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockDeduction, DeductionError>;
}
