//! In-process inventory authority for tests/dev.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use orderdesk_core::ProductId;

use crate::gateway::InventoryGateway;
use crate::types::{
    DeductionError, DeductionFailure, InventoryCheckResult, ItemAvailability, StockDeduction, StockRequest,
    aggregate_quantities,
};

#[derive(Debug, Default)]
struct State {
    stock: HashMap<ProductId, i64>,
    unreachable: HashSet<ProductId>,
    deductions: Vec<(ProductId, u32)>,
}

/// Stock levels held in memory.
///
/// Unknown products behave like a 404 from the real authority. Products can be
/// marked unreachable to simulate transport failures.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    state: RwLock<State>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_stock<I, P>(levels: I) -> Self
    where
        I: IntoIterator<Item = (P, i64)>,
        P: AsRef<str>,
    {
        let inventory = Self::new();
        for (product, level) in levels {
            if let Ok(id) = ProductId::parse(product) {
                inventory.set_stock(id, level);
            }
        }
        inventory
    }

    pub fn set_stock(&self, product_id: ProductId, level: i64) {
        self.write().stock.insert(product_id, level);
    }

    pub fn stock_of(&self, product_id: &ProductId) -> Option<i64> {
        self.read().stock.get(product_id).copied()
    }

    pub fn mark_unreachable(&self, product_id: ProductId) {
        self.write().unreachable.insert(product_id);
    }

    /// Successful deductions, in the order they were applied.
    pub fn deductions(&self) -> Vec<(ProductId, u32)> {
        self.read().deductions.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn check_availability(&self, items: &[StockRequest]) -> InventoryCheckResult {
        let state = self.read();
        let details: BTreeMap<ProductId, ItemAvailability> = aggregate_quantities(items)
            .into_iter()
            .map(|(product_id, requested)| {
                let verdict = if state.unreachable.contains(&product_id) {
                    ItemAvailability::Unreachable {
                        reason: "inventory unreachable".to_string(),
                    }
                } else {
                    match state.stock.get(&product_id) {
                        Some(&on_hand) => ItemAvailability::from_on_hand(on_hand, requested),
                        None => ItemAvailability::Unreachable {
                            reason: "product not found".to_string(),
                        },
                    }
                };
                (product_id, verdict)
            })
            .collect();
        InventoryCheckResult::from_details(details)
    }

    async fn deduct_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockDeduction, DeductionError> {
        let mut state = self.write();
        let fail = |reason| DeductionError::new(product_id.clone(), reason);

        if state.unreachable.contains(product_id) {
            return Err(fail(DeductionFailure::Transport("inventory unreachable".to_string())));
        }
        let Some(on_hand) = state.stock.get_mut(product_id) else {
            return Err(fail(DeductionFailure::Rejected { status: 404 }));
        };
        if *on_hand < i64::from(quantity) {
            return Err(fail(DeductionFailure::InsufficientStock {
                on_hand: Some(*on_hand),
                requested: quantity,
            }));
        }

        *on_hand -= i64::from(quantity);
        let new_quantity = *on_hand;
        state.deductions.push((product_id.clone(), quantity));

        Ok(StockDeduction {
            product_id: product_id.clone(),
            new_quantity,
        })
    }
}
