//! Order status lifecycle.
//!
//! ```text
//! PENDING ──confirm (deducts stock)──▶ CONFIRMED ──complete──▶ COMPLETED
//! ```
//!
//! Only the two forward edges exist. Self-transitions, reversals and skipping
//! CONFIRMED are rejected.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
}

/// A status change that is not an edge of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Completed,
    ];

    /// The single status this one may move to, if any.
    pub fn successor(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Completed),
            OrderStatus::Completed => None,
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.successor() == Some(next)
    }

    pub fn ensure_transition(self, next: OrderStatus) -> Result<(), InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }

    /// Whether entering `self` commits stock at the inventory authority.
    pub fn commits_stock(self) -> bool {
        matches!(self, OrderStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse error for [`OrderStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status {0:?}; expected one of PENDING, CONFIRMED, COMPLETED")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "COMPLETED" => Ok(OrderStatus::Completed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_matrix_has_exactly_two_legal_edges() {
        let mut legal = Vec::new();
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                match from.ensure_transition(to) {
                    Ok(()) => legal.push((from, to)),
                    Err(e) => assert_eq!(e, InvalidTransition { from, to }),
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

    #[test]
    fn completed_is_terminal() {
        assert_eq!(OrderStatus::Completed.successor(), None);
    }

    #[test]
    fn only_confirmation_commits_stock() {
        let committing: Vec<_> = OrderStatus::ALL.into_iter().filter(|s| s.commits_stock()).collect();
        assert_eq!(committing, vec![OrderStatus::Confirmed]);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!(" COMPLETED ".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serializes_uppercase() {
        let json = serde_json::to_value(OrderStatus::Pending).unwrap();
        assert_eq!(json, serde_json::json!("PENDING"));
    }
}
