//! Infrastructure layer: storage, configuration, and the order lifecycle engine.

pub mod config;
pub mod order_service;
pub mod postgres;
pub mod repository;

pub use config::{AppConfig, ConfigError, InventoryConfig, StorageBackend};
pub use order_service::{LifecyclePolicy, OrderError, OrderService};
pub use postgres::PostgresOrderRepository;
pub use repository::{InMemoryOrderRepository, OrderRepository, RepositoryError};
