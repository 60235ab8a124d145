//! `orderdesk-inventory`: access to the external inventory authority.
//!
//! The authority is the system of record for stock levels. This crate only
//! asks it questions (availability) and sends it commands (deductions); it
//! owns no stock state of its own outside [`InMemoryInventory`], which stands
//! in for the authority in tests and local development.

pub mod gateway;
pub mod http;
pub mod memory;
pub mod types;

pub use gateway::InventoryGateway;
pub use http::{AvailabilityMode, DeductionMode, GatewayError, HttpGatewayConfig, HttpInventoryGateway};
pub use memory::InMemoryInventory;
pub use types::{
    DeductionError, DeductionFailure, InventoryCheckResult, ItemAvailability, StockDeduction, StockRequest,
    aggregate_quantities,
};
