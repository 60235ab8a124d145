//! Checkout request validation.
//!
//! `CreateOrderRequest` mirrors the inbound JSON body. Every field is optional
//! at the serde level so that a missing field is reported as a field-level
//! violation rather than a deserialization failure; `validate` collects every
//! violation in one pass and only then produces a [`NewOrder`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderdesk_core::{BuyerId, GUEST_PREFIX, Money, ProductId};

use crate::order::{ContactDetails, NewOrder, NewOrderItem};

/// Inbound line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
}

/// Inbound checkout request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateOrderRequest {
    /// Absent or blank for guest checkout.
    pub user_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub items: Option<Vec<CreateOrderItemRequest>>,
}

/// One rejected field, addressed by its JSON path (e.g. `items[1].quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every violation found in a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldViolation::new(field, message)])
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CreateOrderRequest {
    /// Check every field and build the validated order.
    pub fn validate(self) -> Result<NewOrder, ValidationErrors> {
        let mut violations = Vec::new();

        let buyer_id = buyer_id(&mut violations, self.user_id);

        let full_name = required(&mut violations, "fullName", self.full_name);
        let email = required(&mut violations, "email", self.email);
        if let Some(email) = &email {
            if !is_valid_email(email) {
                violations.push(FieldViolation::new("email", "must be a valid email address"));
            }
        }
        let address = required(&mut violations, "address", self.address);
        let city = required(&mut violations, "city", self.city);
        let zip_code = required(&mut violations, "zipCode", self.zip_code);

        let raw_items = self.items.unwrap_or_default();
        if raw_items.is_empty() {
            violations.push(FieldViolation::new("items", "must contain at least one item"));
        }

        let items: Vec<Option<NewOrderItem>> = raw_items
            .into_iter()
            .enumerate()
            .map(|(i, item)| validate_item(&mut violations, i, item))
            .collect();

        if !violations.is_empty() {
            return Err(ValidationErrors(violations));
        }

        match (full_name, email, address, city, zip_code) {
            (Some(full_name), Some(email), Some(address), Some(city), Some(zip_code)) => Ok(NewOrder {
                buyer_id,
                contact: ContactDetails {
                    full_name,
                    email,
                    address,
                    city,
                    zip_code,
                },
                items: items.into_iter().flatten().collect(),
            }),
            _ => Err(ValidationErrors::single("request", "missing required fields")),
        }
    }
}

/// A blank or absent `userId` means guest checkout. The guest prefix is
/// reserved for generated identities.
fn buyer_id(violations: &mut Vec<FieldViolation>, user_id: Option<String>) -> Option<BuyerId> {
    let user_id = user_id.filter(|s| !s.trim().is_empty())?;
    match BuyerId::parse(&user_id) {
        Ok(id) if id.is_guest() => {
            violations.push(FieldViolation::new(
                "userId",
                format!("must not start with the reserved prefix {GUEST_PREFIX:?}"),
            ));
            None
        }
        Ok(id) => Some(id),
        Err(e) => {
            violations.push(FieldViolation::new("userId", e.to_string()));
            None
        }
    }
}

fn required(violations: &mut Vec<FieldViolation>, field: &str, value: Option<String>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            violations.push(FieldViolation::new(field, "must not be empty"));
            None
        }
    }
}

fn validate_item(
    violations: &mut Vec<FieldViolation>,
    index: usize,
    item: CreateOrderItemRequest,
) -> Option<NewOrderItem> {
    let path = |field: &str| format!("items[{index}].{field}");
    let before = violations.len();

    let product_id = match item.product_id.as_deref().map(ProductId::parse) {
        Some(Ok(id)) => Some(id),
        _ => {
            violations.push(FieldViolation::new(path("productId"), "must not be empty"));
            None
        }
    };

    let quantity = match item.quantity {
        None => {
            violations.push(FieldViolation::new(path("quantity"), "is required"));
            None
        }
        Some(q) if q < 1 => {
            violations.push(FieldViolation::new(path("quantity"), "must be at least 1"));
            None
        }
        Some(q) => match u32::try_from(q) {
            Ok(q) => Some(q),
            Err(_) => {
                violations.push(FieldViolation::new(path("quantity"), "is too large"));
                None
            }
        },
    };

    let unit_price = match item.price.map(Money::from_decimal) {
        None => {
            violations.push(FieldViolation::new(path("price"), "is required"));
            None
        }
        Some(Err(e)) => {
            violations.push(FieldViolation::new(path("price"), e.to_string()));
            None
        }
        Some(Ok(price)) => Some(price),
    };

    if violations.len() != before {
        return None;
    }

    Some(NewOrderItem {
        product_id: product_id?,
        quantity: quantity?,
        unit_price: unit_price?,
    })
}

/// Syntactic email check: `local@domain.tld`, no whitespace, dotted domain
/// with non-empty labels.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty() && !l.starts_with('-') && !l.ends_with('-'))
}
