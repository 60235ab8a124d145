//! Order pricing.

use orderdesk_core::{DomainError, DomainResult, Money};

use crate::order::NewOrderItem;

/// Exact order total: `Σ quantity × unit_price`.
///
/// Unit prices are already restricted to two decimal places and quantities are
/// integers, so every intermediate value is exact; the only failure is
/// exceeding the storable maximum.
pub fn order_total(items: &[NewOrderItem]) -> DomainResult<Money> {
    items.iter().try_fold(Money::ZERO, |total, item| {
        let line_total = item.unit_price.checked_mul_quantity(item.quantity).map_err(|e| {
            DomainError::overflow(format!("line total for product {}: {e}", item.product_id))
        })?;
        total.checked_add(line_total)
    })
}
