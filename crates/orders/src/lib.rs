//! Orders domain module.
//!
//! This crate contains the business rules for purchase orders, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage): the order
//! model, the status state machine, request validation, pricing, guest
//! identities and pagination math.

pub mod guest;
pub mod order;
pub mod paging;
pub mod pricing;
pub mod status;
pub mod validation;

pub use guest::guest_buyer_id;
pub use order::{ContactDetails, NewOrder, NewOrderItem, Order, OrderItem};
pub use paging::{Page, PageRequest};
pub use pricing::order_total;
pub use status::{InvalidTransition, OrderStatus, UnknownStatus};
pub use validation::{CreateOrderItemRequest, CreateOrderRequest, FieldViolation, ValidationErrors};
