//! Postgres-backed order repository.
//!
//! Two tables: `orders` and `order_items`. Money columns are `NUMERIC(12, 2)`
//! mapped to `rust_decimal::Decimal`; items carry a `position` column so they
//! come back in insertion order.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Database (other) | any other | `Storage` |
//! | PoolClosed, Io, Tls, ... | N/A | `Storage` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use orderdesk_core::{BuyerId, Money, OrderId, OrderItemId, ProductId};
use orderdesk_orders::{ContactDetails, Order, OrderItem, OrderStatus};

use crate::repository::{OrderRepository, RepositoryError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id          UUID PRIMARY KEY,
        user_id     TEXT NOT NULL,
        full_name   TEXT NOT NULL,
        email       TEXT NOT NULL,
        address     TEXT NOT NULL,
        city        TEXT NOT NULL,
        zip_code    TEXT NOT NULL,
        status      TEXT NOT NULL CHECK (status IN ('PENDING', 'CONFIRMED', 'COMPLETED')),
        total       NUMERIC(12, 2) NOT NULL CHECK (total >= 0),
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS orders_newest_first_idx ON orders (created_at DESC, id DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id          UUID PRIMARY KEY,
        order_id    UUID NOT NULL REFERENCES orders (id),
        position    INTEGER NOT NULL,
        product_id  TEXT NOT NULL,
        quantity    BIGINT NOT NULL CHECK (quantity >= 1),
        price       NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        UNIQUE (order_id, position)
    )
    "#,
];

const ORDER_COLUMNS: &str = "id, user_id, full_name, email, address, city, zip_code, status, total, created_at";

/// Postgres-backed [`OrderRepository`].
#[derive(Debug, Clone)]
pub struct PostgresOrderRepository {
    pool: Arc<PgPool>,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    /// Create tables and indexes if missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id: Uuid = row.try_get("order_id").map_err(|e| map_sqlx_error("load_items", e))?;
            items.entry(order_id).or_default().push(item_from_row(&row)?);
        }
        Ok(items)
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[instrument(skip(self, order), fields(order_id = %order.id, items = order.items.len()), err)]
    async fn create_order(&self, order: &Order) -> Result<Order, RepositoryError> {
        // TIMESTAMPTZ keeps microseconds; hand back exactly what a re-read returns.
        let mut stored = order.clone();
        stored.created_at = order.created_at.trunc_subsecs(6);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, full_name, email, address, city, zip_code, status, total, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(stored.id.as_uuid())
        .bind(stored.buyer_id.as_str())
        .bind(&stored.contact.full_name)
        .bind(&stored.contact.email)
        .bind(&stored.contact.address)
        .bind(&stored.contact.city)
        .bind(&stored.contact.zip_code)
        .bind(stored.status.as_str())
        .bind(stored.total.as_decimal())
        .bind(stored.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::AlreadyExists(stored.id)
            } else {
                map_sqlx_error("insert_order", e)
            }
        })?;

        for (position, item) in stored.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(stored.id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.as_decimal())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(stored)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = self.load_items(&[*id.as_uuid()]).await?;
        let order_items = items.remove(id.as_uuid()).unwrap_or_default();
        order_from_row(&row, order_items).map(Some)
    }

    #[instrument(skip(self), fields(returned = tracing::field::Empty), err)]
    async fn list_orders(&self, offset: u64, limit: u32) -> Result<(Vec<Order>, u64), RepositoryError> {
        let span = Span::current();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_orders", e))?;
        let mut items = self.load_items(&ids).await?;

        let mut orders = Vec::with_capacity(rows.len());
        for (row, id) in rows.iter().zip(&ids) {
            orders.push(order_from_row(row, items.remove(id).unwrap_or_default())?);
        }

        span.record("returned", orders.len());
        Ok((orders, u64::try_from(total).unwrap_or_default()))
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn save_status(&self, id: OrderId, expected: OrderStatus, new: OrderStatus) -> Result<Order, RepositoryError> {
        let updated = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(new.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_status", e))?;

        let current = self.get_order(id).await?.ok_or(RepositoryError::NotFound(id))?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::StatusConflict {
                id,
                expected,
                actual: current.status,
            });
        }
        Ok(current)
    }
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let get_err = |e| map_sqlx_error("decode_order", e);

    let id: Uuid = row.try_get("id").map_err(get_err)?;
    let user_id: String = row.try_get("user_id").map_err(get_err)?;
    let status: String = row.try_get("status").map_err(get_err)?;
    let total: Decimal = row.try_get("total").map_err(get_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(get_err)?;

    Ok(Order {
        id: OrderId::from_uuid(id),
        buyer_id: BuyerId::parse(&user_id).map_err(corrupt)?,
        contact: ContactDetails {
            full_name: row.try_get("full_name").map_err(get_err)?,
            email: row.try_get("email").map_err(get_err)?,
            address: row.try_get("address").map_err(get_err)?,
            city: row.try_get("city").map_err(get_err)?,
            zip_code: row.try_get("zip_code").map_err(get_err)?,
        },
        status: status.parse::<OrderStatus>().map_err(corrupt)?,
        total: Money::from_decimal(total).map_err(corrupt)?,
        created_at,
        items,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, RepositoryError> {
    let get_err = |e| map_sqlx_error("decode_order_item", e);

    let id: Uuid = row.try_get("id").map_err(get_err)?;
    let product_id: String = row.try_get("product_id").map_err(get_err)?;
    let quantity: i64 = row.try_get("quantity").map_err(get_err)?;
    let price: Decimal = row.try_get("price").map_err(get_err)?;

    Ok(OrderItem {
        id: OrderItemId::from_uuid(id),
        product_id: ProductId::parse(&product_id).map_err(corrupt)?,
        quantity: u32::try_from(quantity).map_err(corrupt)?,
        unit_price: Money::from_decimal(price).map_err(corrupt)?,
    })
}

fn corrupt(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("corrupt row: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            RepositoryError::Storage(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => RepositoryError::Storage(format!("connection pool closed during {operation}")),
        other => RepositoryError::Storage(format!("{operation} failed: {other}")),
    }
}
