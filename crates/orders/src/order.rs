use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{BuyerId, DomainResult, Money, OrderId, OrderItemId, ProductId};

use crate::pricing::order_total;
use crate::status::{InvalidTransition, OrderStatus};

/// Contact and shipping details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

/// A validated line item that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A validated order request (see [`crate::CreateOrderRequest::validate`]).
///
/// Holding a `NewOrder` means every field-level rule has already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub buyer_id: Option<BuyerId>,
    pub contact: ContactDetails,
    pub items: Vec<NewOrderItem>,
}

/// Order line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(rename = "price")]
    pub unit_price: Money,
}

/// A purchase order with its line items in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "userId")]
    pub buyer_id: BuyerId,
    #[serde(flatten)]
    pub contact: ContactDetails,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Materialize a new PENDING order, pricing it from its line items.
    pub fn place(new_order: NewOrder, buyer_id: BuyerId, created_at: DateTime<Utc>) -> DomainResult<Self> {
        let total = order_total(&new_order.items)?;

        let items = new_order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(),
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        Ok(Self {
            id: OrderId::new(),
            buyer_id,
            contact: new_order.contact,
            status: OrderStatus::Pending,
            total,
            created_at,
            items,
        })
    }

    pub fn ensure_transition(&self, next: OrderStatus) -> Result<(), InvalidTransition> {
        self.status.ensure_transition(next)
    }

    pub fn is_guest(&self) -> bool {
        self.buyer_id.is_guest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactDetails {
        ContactDetails {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            address: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            zip_code: "N1 9GU".to_string(),
        }
    }

    fn line(product: &str, quantity: u32, price: &str) -> NewOrderItem {
        NewOrderItem {
            product_id: ProductId::parse(product).unwrap(),
            quantity,
            unit_price: price.parse().unwrap(),
        }
    }

    #[test]
    fn place_prices_items_and_starts_pending() {
        let new_order = NewOrder {
            buyer_id: None,
            contact: contact(),
            items: vec![line("A", 2, "10.00"), line("B", 1, "5.00")],
        };

        let order = Order::place(new_order, BuyerId::parse("user-1").unwrap(), Utc::now()).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total.to_string(), "25.00");
        let products: Vec<_> = order.items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(products, vec!["A", "B"]);
    }

    #[test]
    fn serializes_with_original_field_names() {
        let new_order = NewOrder {
            buyer_id: None,
            contact: contact(),
            items: vec![line("A", 1, "3.50")],
        };
        let order = Order::place(new_order, BuyerId::parse("user-1").unwrap(), Utc::now()).unwrap();

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["zipCode"], "N1 9GU");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["total"], "3.50");
        assert_eq!(json["items"][0]["productId"], "A");
        assert_eq!(json["items"][0]["price"], "3.50");
    }
}
