//! Order persistence boundary.
//!
//! The repository stores orders and answers queries. It owns no business
//! rules: which transitions are legal is decided by the lifecycle engine, the
//! repository only guarantees that `save_status` is an atomic compare-and-set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use orderdesk_core::OrderId;
use orderdesk_orders::{Order, OrderStatus};

/// Repository error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("order not found: {0}")]
    NotFound(OrderId),
    #[error("order already exists: {0}")]
    AlreadyExists(OrderId),
    /// The stored status was not the one the caller expected.
    #[error("status conflict on order {id}: expected {expected}, found {actual}")]
    StatusConflict {
        id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store an order together with all of its items, atomically.
    async fn create_order(&self, order: &Order) -> Result<Order, RepositoryError>;

    /// An order with its items in insertion order.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// One page of orders, newest first (ties broken by id, descending), plus
    /// the total number of stored orders.
    async fn list_orders(&self, offset: u64, limit: u32) -> Result<(Vec<Order>, u64), RepositoryError>;

    /// Set the status to `new` only if it is currently `expected`.
    async fn save_status(&self, id: OrderId, expected: OrderStatus, new: OrderStatus) -> Result<Order, RepositoryError>;
}

/// Newest-first ordering shared by every backend.
pub fn newest_first(a: &Order, b: &Order) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

/// In-memory order repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("order store lock poisoned".to_string())
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::AlreadyExists(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&id).cloned())
    }

    async fn list_orders(&self, offset: u64, limit: u32) -> Result<(Vec<Order>, u64), RepositoryError> {
        let orders = self.orders.read().map_err(poisoned)?;
        let mut all: Vec<&Order> = orders.values().collect();
        all.sort_by(|a, b| newest_first(a, b));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let page = all
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, orders.len() as u64))
    }

    async fn save_status(&self, id: OrderId, expected: OrderStatus, new: OrderStatus) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if order.status != expected {
            return Err(RepositoryError::StatusConflict {
                id,
                expected,
                actual: order.status,
            });
        }
        order.status = new;
        Ok(order.clone())
    }
}
