//! Stock queries and their normalized outcomes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use orderdesk_core::ProductId;

/// One product/quantity pair to check against the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self { product_id, quantity }
    }
}

/// Sum requested quantities per product.
///
/// An order may list the same product on several lines; the authority must
/// be asked about the combined quantity.
pub fn aggregate_quantities(requests: &[StockRequest]) -> BTreeMap<ProductId, u64> {
    let mut totals = BTreeMap::new();
    for request in requests {
        *totals.entry(request.product_id.clone()).or_insert(0u64) += u64::from(request.quantity);
    }
    totals
}

/// Per-product availability verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemAvailability {
    /// `on_hand` is unknown when the authority answered in bulk.
    Available { on_hand: Option<i64> },
    Insufficient { on_hand: Option<i64>, requested: u64 },
    Unreachable { reason: String },
}

impl ItemAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, ItemAvailability::Available { .. })
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, ItemAvailability::Unreachable { .. })
    }

    /// Verdict for a known on-hand count.
    pub fn from_on_hand(on_hand: i64, requested: u64) -> Self {
        let enough = u64::try_from(on_hand).is_ok_and(|stock| stock >= requested);
        if enough {
            ItemAvailability::Available { on_hand: Some(on_hand) }
        } else {
            ItemAvailability::Insufficient {
                on_hand: Some(on_hand),
                requested,
            }
        }
    }
}

/// Outcome of an availability check.
///
/// `available` holds exactly when `unavailable_items` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryCheckResult {
    pub available: bool,
    pub unavailable_items: BTreeSet<ProductId>,
    pub details: BTreeMap<ProductId, ItemAvailability>,
}

impl InventoryCheckResult {
    pub fn from_details(details: BTreeMap<ProductId, ItemAvailability>) -> Self {
        let unavailable_items: BTreeSet<ProductId> = details
            .iter()
            .filter(|(_, verdict)| !verdict.is_available())
            .map(|(id, _)| id.clone())
            .collect();
        Self {
            available: unavailable_items.is_empty(),
            unavailable_items,
            details,
        }
    }

    /// Every product was unreachable; nothing was actually short.
    pub fn all_unreachable(&self) -> bool {
        !self.available
            && self
                .unavailable_items
                .iter()
                .all(|id| self.details.get(id).is_some_and(ItemAvailability::is_unreachable))
    }

    pub fn detail(&self, product_id: &ProductId) -> Option<&ItemAvailability> {
        self.details.get(product_id)
    }
}

/// Confirmation of a successful deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockDeduction {
    pub product_id: ProductId,
    pub new_quantity: i64,
}

/// Why a deduction did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeductionFailure {
    #[error("insufficient stock (requested {requested}{})", on_hand_suffix(.on_hand))]
    InsufficientStock { on_hand: Option<i64>, requested: u32 },

    #[error("inventory request timed out")]
    Timeout,

    #[error("inventory unreachable: {0}")]
    Transport(String),

    #[error("inventory rejected the request with HTTP {status}")]
    Rejected { status: u16 },

    #[error("malformed inventory response: {0}")]
    MalformedResponse(String),
}

fn on_hand_suffix(on_hand: &Option<i64>) -> String {
    on_hand.map(|n| format!(", {n} on hand")).unwrap_or_default()
}

impl DeductionFailure {
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(self, DeductionFailure::InsufficientStock { .. })
    }
}

/// A failed deduction for one product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stock deduction for product {product_id} failed: {reason}")]
pub struct DeductionError {
    pub product_id: ProductId,
    pub reason: DeductionFailure,
}

impl DeductionError {
    pub fn new(product_id: ProductId, reason: DeductionFailure) -> Self {
        Self { product_id, reason }
    }
}
