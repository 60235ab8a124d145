//! Order lifecycle engine.
//!
//! Orchestrates the pure order rules (`orderdesk-orders`) against the two
//! boundaries it depends on: the [`OrderRepository`] and the
//! [`InventoryGateway`].
//!
//! ```text
//! create         validate → resolve buyer → price → (availability check) → persist PENDING
//! update_status  load → check transition → (deduct stock, per line) → compare-and-set status
//! ```
//!
//! The engine holds no state between calls and takes no locks: concurrent
//! status updates race at the repository's compare-and-set, and the loser
//! fails with [`OrderError::InvalidTransition`] from the status it lost to.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use orderdesk_core::{DomainError, OrderId, ProductId};
use orderdesk_inventory::{DeductionFailure, InventoryGateway, StockRequest};
use orderdesk_observability::StructuredLog;
use orderdesk_orders::{
    CreateOrderRequest, FieldViolation, NewOrder, Order, OrderStatus, Page, PageRequest, ValidationErrors,
    guest_buyer_id,
};

use crate::repository::{OrderRepository, RepositoryError};

/// Engine failure, one variant per outcome callers must tell apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {order_id}: invalid status transition from {from} to {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Availability check at creation failed. `unreachable` is set when no
    /// product was actually short and the authority just could not answer.
    #[error("insufficient stock for products: {}", join_ids(.product_ids))]
    InsufficientStock {
        product_ids: Vec<ProductId>,
        unreachable: bool,
    },

    /// A deduction failed while confirming. `deducted` lists the products
    /// whose stock was already committed and has not been given back.
    #[error("order {order_id}: stock deduction failed for product {failed}: {reason}")]
    StockDeduction {
        order_id: OrderId,
        failed: ProductId,
        deducted: Vec<ProductId>,
        reason: DeductionFailure,
    },

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter().map(ProductId::as_str).collect::<Vec<_>>().join(", ")
}

impl From<ValidationErrors> for OrderError {
    fn from(value: ValidationErrors) -> Self {
        OrderError::Validation(value)
    }
}

impl From<DomainError> for OrderError {
    fn from(value: DomainError) -> Self {
        let field = match &value {
            DomainError::Overflow(_) => "total",
            DomainError::InvalidId(_) => "id",
            DomainError::Validation(_) | DomainError::InvariantViolation(_) => "order",
        };
        OrderError::Validation(ValidationErrors(vec![FieldViolation::new(field, value.to_string())]))
    }
}

impl From<RepositoryError> for OrderError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Infrastructure(other.to_string()),
        }
    }
}

/// Tunable engine behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Refuse orders the inventory authority cannot cover.
    pub inventory_check_on_create: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            inventory_check_on_create: true,
        }
    }
}

pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    inventory: Arc<dyn InventoryGateway>,
    log: Arc<dyn StructuredLog>,
    policy: LifecyclePolicy,
}

impl OrderService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        inventory: Arc<dyn InventoryGateway>,
        log: Arc<dyn StructuredLog>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            repository,
            inventory,
            log,
            policy,
        }
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    /// Validate a raw checkout request, then [`place`](Self::place) it.
    pub async fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let new_order = request.validate().inspect_err(|errors| {
            self.log.warn(
                "order rejected by validation",
                json!({ "violations": errors.violations() }),
            );
        })?;
        self.place(new_order).await
    }

    /// Price, optionally check availability, and persist a PENDING order.
    ///
    /// Nothing is persisted when any step fails, and inventory is never
    /// mutated here.
    pub async fn place(&self, new_order: NewOrder) -> Result<Order, OrderError> {
        let now = Utc::now();
        let buyer_id = match &new_order.buyer_id {
            Some(id) => id.clone(),
            None => guest_buyer_id(now),
        };

        let order = Order::place(new_order, buyer_id, now)?;

        if self.policy.inventory_check_on_create {
            let requests: Vec<StockRequest> = order
                .items
                .iter()
                .map(|item| StockRequest::new(item.product_id.clone(), item.quantity))
                .collect();

            let availability = self.inventory.check_availability(&requests).await;
            if !availability.available {
                let product_ids: Vec<ProductId> = availability.unavailable_items.iter().cloned().collect();
                let unreachable = availability.all_unreachable();
                self.log.warn(
                    "order rejected: insufficient stock",
                    json!({
                        "buyer_id": order.buyer_id.as_str(),
                        "unavailable": join_ids(&product_ids),
                        "details": availability.details,
                    }),
                );
                return Err(OrderError::InsufficientStock {
                    product_ids,
                    unreachable,
                });
            }
        }

        let stored = self.repository.create_order(&order).await?;
        self.log.info(
            "order created",
            json!({
                "order_id": stored.id.to_string(),
                "buyer_id": stored.buyer_id.as_str(),
                "guest": stored.is_guest(),
                "items": stored.items.len(),
                "total": stored.total.to_string(),
            }),
        );
        Ok(stored)
    }

    pub async fn find_one(&self, id: OrderId) -> Result<Order, OrderError> {
        self.repository.get_order(id).await?.ok_or(OrderError::NotFound(id))
    }

    /// Page through orders, newest first. Out-of-range paging parameters are
    /// clamped, never rejected.
    pub async fn find_all(&self, page: i64, limit: i64) -> Result<Page<Order>, OrderError> {
        let request = PageRequest::new(page, limit);
        let (orders, total) = self
            .repository
            .list_orders(request.offset(), request.limit())
            .await?;
        Ok(Page::new(orders, total, request))
    }

    /// Move an order along its lifecycle.
    ///
    /// Entering CONFIRMED first deducts stock for every line; the status is
    /// only written once all deductions succeeded.
    pub async fn update_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order, OrderError> {
        let order = self.find_one(id).await?;

        if let Err(illegal) = order.ensure_transition(new_status) {
            self.log.warn(
                "status transition rejected",
                json!({
                    "order_id": id.to_string(),
                    "from": illegal.from,
                    "to": illegal.to,
                }),
            );
            return Err(OrderError::InvalidTransition {
                order_id: id,
                from: illegal.from,
                to: illegal.to,
            });
        }

        let deducted = if new_status.commits_stock() {
            self.deduct_all(&order).await?
        } else {
            Vec::new()
        };

        match self.repository.save_status(id, order.status, new_status).await {
            Ok(updated) => {
                self.log.info(
                    "order status updated",
                    json!({
                        "order_id": id.to_string(),
                        "from": order.status,
                        "to": new_status,
                    }),
                );
                Ok(updated)
            }
            Err(RepositoryError::StatusConflict { actual, .. }) => {
                if !deducted.is_empty() {
                    self.log.error(
                        "stock deducted for a confirmation that lost a concurrent update",
                        json!({
                            "order_id": id.to_string(),
                            "deducted": join_ids(&deducted),
                        }),
                    );
                } else {
                    self.log.warn(
                        "concurrent status update won the race",
                        json!({ "order_id": id.to_string(), "current": actual }),
                    );
                }
                Err(OrderError::InvalidTransition {
                    order_id: id,
                    from: actual,
                    to: new_status,
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Deduct stock for each line, one at a time, stopping at the first
    /// failure so a failing order commits as little stock as possible.
    /// Deductions applied before the failure are not compensated.
    async fn deduct_all(&self, order: &Order) -> Result<Vec<ProductId>, OrderError> {
        let mut deducted = Vec::with_capacity(order.items.len());

        for item in &order.items {
            match self.inventory.deduct_stock(&item.product_id, item.quantity).await {
                Ok(_) => deducted.push(item.product_id.clone()),
                Err(err) => {
                    let fields = json!({
                        "order_id": order.id.to_string(),
                        "product_id": err.product_id.as_str(),
                        "reason": err.reason.to_string(),
                        "deducted": join_ids(&deducted),
                    });
                    if deducted.is_empty() {
                        self.log.warn("stock deduction failed", fields);
                    } else {
                        self.log.error("stock deduction failed after partial deduction", fields);
                    }
                    return Err(OrderError::StockDeduction {
                        order_id: order.id,
                        failed: err.product_id,
                        deducted,
                        reason: err.reason,
                    });
                }
            }
        }

        Ok(deducted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryOrderRepository;
    use async_trait::async_trait;
    use orderdesk_inventory::InMemoryInventory;
    use orderdesk_observability::{LogLevel, MemoryLog};
    use orderdesk_orders::CreateOrderItemRequest;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    struct Harness {
        service: Arc<OrderService>,
        repository: Arc<InMemoryOrderRepository>,
        inventory: Arc<InMemoryInventory>,
        log: Arc<MemoryLog>,
    }

    fn harness_with(stock: &[(&str, i64)], policy: LifecyclePolicy) -> Harness {
        let repository = InMemoryOrderRepository::arc();
        let inventory = Arc::new(InMemoryInventory::with_stock(stock.iter().copied()));
        let log = Arc::new(MemoryLog::new());
        let service = Arc::new(OrderService::new(
            repository.clone(),
            inventory.clone(),
            log.clone(),
            policy,
        ));
        Harness {
            service,
            repository,
            inventory,
            log,
        }
    }

    fn harness(stock: &[(&str, i64)]) -> Harness {
        harness_with(stock, LifecyclePolicy::default())
    }

    fn item(product: &str, quantity: i64, price: &str) -> CreateOrderItemRequest {
        CreateOrderItemRequest {
            product_id: Some(product.to_string()),
            quantity: Some(quantity),
            price: Some(price.parse::<Decimal>().unwrap()),
        }
    }

    fn request(user_id: Option<&str>, items: Vec<CreateOrderItemRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: user_id.map(str::to_string),
            full_name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            address: Some("12 Analytical Way".to_string()),
            city: Some("London".to_string()),
            zip_code: Some("N1 9GU".to_string()),
            items: Some(items),
        }
    }

    fn pid(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_scenario() {
        let h = harness(&[("A", 10), ("B", 10)]);
        let order = h
            .service
            .create(request(Some("user-1"), vec![item("A", 2, "10.00"), item("B", 1, "5.00")]))
            .await
            .unwrap();

        assert_eq!(order.total.to_string(), "25.00");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.buyer_id.as_str(), "user-1");

        let confirmed = h.service.update_status(order.id, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(h.inventory.stock_of(&pid("A")), Some(8));
        assert_eq!(h.inventory.stock_of(&pid("B")), Some(9));

        let completed = h.service.update_status(order.id, OrderStatus::Completed).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(h.inventory.deductions().len(), 2, "completion must not deduct again");

        let err = h.service.update_status(order.id, OrderStatus::Pending).await.unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                order_id: order.id,
                from: OrderStatus::Completed,
                to: OrderStatus::Pending,
            }
        );
    }

    #[tokio::test]
    async fn failed_deduction_leaves_order_pending() {
        // X is short at confirmation time; the availability check is off so
        // the order can be created at all.
        let h = harness_with(
            &[("X", 5)],
            LifecyclePolicy {
                inventory_check_on_create: false,
            },
        );
        let order = h
            .service
            .create(request(None, vec![item("X", 100, "1.00")]))
            .await
            .unwrap();

        let err = h.service.update_status(order.id, OrderStatus::Confirmed).await.unwrap_err();
        match err {
            OrderError::StockDeduction {
                order_id,
                failed,
                deducted,
                reason,
            } => {
                assert_eq!(order_id, order.id);
                assert_eq!(failed, pid("X"));
                assert!(deducted.is_empty());
                assert!(reason.is_insufficient_stock());
            }
            other => panic!("expected StockDeduction, got {other:?}"),
        }

        let stored = h.service.find_one(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn deductions_stop_at_first_failure_and_report_partial_progress() {
        let h = harness_with(
            &[("A", 10), ("B", 0), ("C", 10)],
            LifecyclePolicy {
                inventory_check_on_create: false,
            },
        );
        let order = h
            .service
            .create(request(
                None,
                vec![item("A", 1, "1.00"), item("B", 1, "1.00"), item("C", 1, "1.00")],
            ))
            .await
            .unwrap();

        let err = h.service.update_status(order.id, OrderStatus::Confirmed).await.unwrap_err();
        let OrderError::StockDeduction { failed, deducted, .. } = err else {
            panic!("expected StockDeduction, got {err:?}");
        };
        assert_eq!(failed, pid("B"));
        assert_eq!(deducted, vec![pid("A")]);
        assert_eq!(h.inventory.stock_of(&pid("C")), Some(10), "C must not be touched");
        assert_eq!(h.inventory.stock_of(&pid("A")), Some(9), "no compensation");

        let partial = h.log.find("partial deduction").unwrap();
        assert_eq!(partial.level, LogLevel::Error);
        assert_eq!(partial.fields["deducted"], "A");
    }

    #[tokio::test]
    async fn transition_matrix_through_the_engine() {
        let mut legal = Vec::new();

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let h = harness(&[("A", 100)]);
                let order = h
                    .service
                    .create(request(None, vec![item("A", 1, "1.00")]))
                    .await
                    .unwrap();
                // Drive the order to `from` along the legal path.
                let mut current = OrderStatus::Pending;
                while current != from {
                    let next = current.successor().unwrap();
                    h.service.update_status(order.id, next).await.unwrap();
                    current = next;
                }

                match h.service.update_status(order.id, to).await {
                    Ok(updated) => {
                        assert_eq!(updated.status, to);
                        legal.push((from, to));
                    }
                    Err(err) => {
                        assert_eq!(
                            err,
                            OrderError::InvalidTransition {
                                order_id: order.id,
                                from,
                                to
                            }
                        );
                        let stored = h.service.find_one(order.id).await.unwrap();
                        assert_eq!(stored.status, from, "rejected transition must not persist");
                    }
                }
            }
        }

        assert_eq!(
            legal,
            vec![
                (OrderStatus::Pending, OrderStatus::Confirmed),
                (OrderStatus::Confirmed, OrderStatus::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn guest_checkout_gets_distinct_identities() {
        let h = harness(&[("A", 1000)]);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create(request(Some("  "), vec![item("A", 1, "1.00")]))
                    .await
                    .unwrap()
                    .buyer_id
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let buyer = handle.await.unwrap();
            assert!(buyer.is_guest(), "{buyer}");
            ids.insert(buyer);
        }
        assert_eq!(ids.len(), 16);
    }

    #[tokio::test]
    async fn invalid_requests_persist_nothing() {
        let h = harness(&[("A", 10)]);

        let empty = h.service.create(request(None, vec![])).await.unwrap_err();
        assert!(matches!(&empty, OrderError::Validation(v) if v.has_field("items")));

        let zero = h
            .service
            .create(request(None, vec![item("A", 0, "1.00")]))
            .await
            .unwrap_err();
        assert!(matches!(&zero, OrderError::Validation(v) if v.has_field("items[0].quantity")));

        let page = h.service.find_all(1, 10).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(h.log.find("validation").is_some());
    }

    #[tokio::test]
    async fn availability_check_rejects_short_orders() {
        let h = harness(&[("A", 1), ("B", 10)]);

        let err = h
            .service
            .create(request(None, vec![item("A", 1, "1.00"), item("B", 2, "1.00"), item("A", 1, "1.00")]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            OrderError::InsufficientStock {
                product_ids: vec![pid("A")],
                unreachable: false,
            }
        );
        assert_eq!(h.service.find_all(1, 10).await.unwrap().total, 0);
        assert!(h.inventory.deductions().is_empty());
    }

    #[tokio::test]
    async fn unreachable_inventory_is_flagged() {
        let h = harness(&[]);
        let err = h
            .service
            .create(request(None, vec![item("ghost", 1, "1.00")]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InsufficientStock { unreachable: true, .. }));
    }

    #[tokio::test]
    async fn availability_check_can_be_disabled() {
        let h = harness_with(
            &[],
            LifecyclePolicy {
                inventory_check_on_create: false,
            },
        );
        let order = h
            .service
            .create(request(None, vec![item("ghost", 1, "1.00")]))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn find_one_unknown_is_not_found() {
        let h = harness(&[]);
        let id = OrderId::new();
        assert_eq!(h.service.find_one(id).await.unwrap_err(), OrderError::NotFound(id));
        assert_eq!(
            h.service.update_status(id, OrderStatus::Confirmed).await.unwrap_err(),
            OrderError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn find_all_on_empty_store() {
        let h = harness(&[]);
        let page = h.service.find_all(1, 10).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn find_all_clamps_and_pages_newest_first() {
        let h = harness(&[("A", 1000)]);
        let mut created = Vec::new();
        for _ in 0..3 {
            created.push(
                h.service
                    .create(request(None, vec![item("A", 1, "1.00")]))
                    .await
                    .unwrap()
                    .id,
            );
        }

        let page = h.service.find_all(0, 2).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 2);
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data[0].id, created[2]);

        let clamped = h.service.find_all(1, 1000).await.unwrap();
        assert_eq!(clamped.limit, 100);
        assert_eq!(clamped.data.len(), 3);

        let defaulted = h.service.find_all(1, 0).await.unwrap();
        assert_eq!(defaulted.limit, 10);
    }

    /// Simulates another request winning the compare-and-set between this
    /// request's read and its write.
    struct RacingRepository {
        inner: InMemoryOrderRepository,
    }

    #[async_trait]
    impl OrderRepository for RacingRepository {
        async fn create_order(&self, order: &Order) -> Result<Order, RepositoryError> {
            self.inner.create_order(order).await
        }

        async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
            self.inner.get_order(id).await
        }

        async fn list_orders(&self, offset: u64, limit: u32) -> Result<(Vec<Order>, u64), RepositoryError> {
            self.inner.list_orders(offset, limit).await
        }

        async fn save_status(
            &self,
            id: OrderId,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<Order, RepositoryError> {
            let _ = self.inner.save_status(id, expected, new).await;
            self.inner.save_status(id, expected, new).await
        }
    }

    #[tokio::test]
    async fn losing_a_concurrent_update_reports_the_winning_status() {
        let repository = Arc::new(RacingRepository {
            inner: InMemoryOrderRepository::new(),
        });
        let inventory = Arc::new(InMemoryInventory::with_stock([("A", 10)]));
        let log = Arc::new(MemoryLog::new());
        let service = OrderService::new(repository, inventory, log.clone(), LifecyclePolicy::default());

        let order = service
            .create(request(None, vec![item("A", 1, "1.00")]))
            .await
            .unwrap();
        let err = service.update_status(order.id, OrderStatus::Confirmed).await.unwrap_err();

        assert_eq!(
            err,
            OrderError::InvalidTransition {
                order_id: order.id,
                from: OrderStatus::Confirmed,
                to: OrderStatus::Confirmed,
            }
        );
        assert_eq!(log.at_level(LogLevel::Error).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_confirmations_succeed_once() {
        let h = harness(&[("A", 10)]);
        let order = h
            .service
            .create(request(None, vec![item("A", 1, "1.00")]))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            h.service.update_status(order.id, OrderStatus::Confirmed),
            h.service.update_status(order.id, OrderStatus::Confirmed),
        );

        let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(successes, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser.unwrap_err(),
            OrderError::InvalidTransition {
                from: OrderStatus::Confirmed,
                ..
            }
        ));
        let stored = h.repository.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: every valid order is created PENDING with an exact total.
        #[test]
        fn created_orders_are_pending_with_exact_totals(
            lines in prop::collection::vec((1i64..1_000, 0i64..1_000_000), 1..8)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let h = harness_with(&[], LifecyclePolicy { inventory_check_on_create: false });

            let items = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, cents))| CreateOrderItemRequest {
                    product_id: Some(format!("P{i}")),
                    quantity: Some(*qty),
                    price: Some(Decimal::new(*cents, 2)),
                })
                .collect();
            let expected: Decimal = lines
                .iter()
                .map(|(qty, cents)| Decimal::from(*qty) * Decimal::new(*cents, 2))
                .sum();

            let order = runtime.block_on(h.service.create(request(None, items))).unwrap();
            prop_assert_eq!(order.status, OrderStatus::Pending);
            prop_assert_eq!(order.total.as_decimal(), expected);
            prop_assert_eq!(order.total.as_decimal().scale(), 2);
        }
    }
}
