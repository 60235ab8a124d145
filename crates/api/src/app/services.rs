//! Service wiring: picks the storage backend and inventory client from
//! configuration and assembles the lifecycle engine.

use std::sync::Arc;

use orderdesk_infra::{
    AppConfig, InMemoryOrderRepository, LifecyclePolicy, OrderRepository, OrderService, PostgresOrderRepository,
    RepositoryError, StorageBackend,
};
use orderdesk_inventory::{GatewayError, HttpInventoryGateway, InventoryGateway};
use orderdesk_observability::{StructuredLog, TracingLog};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("inventory client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("order storage: {0}")]
    Repository(#[from] RepositoryError),
}

/// Shared application services, handed to handlers via `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(orders: Arc<OrderService>) -> Self {
        Self { orders }
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, BuildError> {
    let repository: Arc<dyn OrderRepository> = match &config.storage {
        StorageBackend::InMemory => {
            tracing::info!("using in-memory order storage");
            InMemoryOrderRepository::arc()
        }
        StorageBackend::Postgres { database_url } => {
            tracing::info!("using postgres order storage");
            Arc::new(PostgresOrderRepository::connect(database_url).await?)
        }
    };

    let inventory: Arc<dyn InventoryGateway> =
        Arc::new(HttpInventoryGateway::new(config.inventory.gateway_config())?);
    let log: Arc<dyn StructuredLog> = Arc::new(TracingLog);

    let policy = LifecyclePolicy {
        inventory_check_on_create: config.inventory_check_on_create,
    };

    Ok(AppServices::new(Arc::new(OrderService::new(
        repository, inventory, log, policy,
    ))))
}
