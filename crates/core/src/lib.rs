//! `orderdesk-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, money, and the shared domain error type.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{BuyerId, GUEST_PREFIX, OrderId, OrderItemId, ProductId};
pub use money::Money;
