//! HTTP client for the inventory authority.
//!
//! Wire shapes:
//!
//! - per-item lookup: `GET {base}/products/{id}` answering `{"stock": n}`
//!   (`quantity` or `available_quantity` are accepted too)
//! - bulk check: `POST {base}/inventory/check` with
//!   `{"items": [{"product_id", "quantity"}]}` answering
//!   `{"available", "unavailable_items"}`
//! - deduction: `PUT {base}/inventory/{id}/deduct` with `{"quantity": n}`
//!   answering `{"product_id", "new_quantity", "message"}`
//!
//! Deployments whose authority has no deduction endpoint use
//! [`DeductionMode::Verify`], which reads the product and reports the
//! post-deduction level without mutating anything remotely.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use orderdesk_core::ProductId;

use crate::gateway::InventoryGateway;
use crate::types::{
    DeductionError, DeductionFailure, InventoryCheckResult, ItemAvailability, StockDeduction, StockRequest,
    aggregate_quantities,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// How availability is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityMode {
    /// One concurrent `GET /products/{id}` per product.
    #[default]
    PerItem,
    /// A single `POST /inventory/check`.
    Bulk,
}

/// How stock is committed on confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeductionMode {
    #[default]
    Put,
    Verify,
}

impl FromStr for AvailabilityMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_item" | "per-item" => Ok(AvailabilityMode::PerItem),
            "bulk" => Ok(AvailabilityMode::Bulk),
            other => Err(GatewayError::UnknownMode {
                kind: "availability",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for DeductionMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "put" => Ok(DeductionMode::Put),
            "verify" => Ok(DeductionMode::Verify),
            other => Err(GatewayError::UnknownMode {
                kind: "deduction",
                value: other.to_string(),
            }),
        }
    }
}

/// Failure to construct a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid inventory base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unknown {kind} mode {value:?}")]
    UnknownMode { kind: &'static str, value: String },

    #[error("failed to build inventory HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub availability_mode: AvailabilityMode,
    pub deduction_mode: DeductionMode,
}

impl HttpGatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            availability_mode: AvailabilityMode::default(),
            deduction_mode: DeductionMode::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_availability_mode(mut self, mode: AvailabilityMode) -> Self {
        self.availability_mode = mode;
        self
    }

    pub fn with_deduction_mode(mut self, mode: DeductionMode) -> Self {
        self.deduction_mode = mode;
        self
    }
}

/// [`InventoryGateway`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpInventoryGateway {
    client: Client,
    base_url: Url,
    availability_mode: AvailabilityMode,
    deduction_mode: DeductionMode,
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    stock: Option<i64>,
    quantity: Option<i64>,
    available_quantity: Option<i64>,
    #[serde(rename = "availableQuantity")]
    available_quantity_camel: Option<i64>,
}

impl ProductPayload {
    fn on_hand(&self) -> Option<i64> {
        self.stock
            .or(self.quantity)
            .or(self.available_quantity)
            .or(self.available_quantity_camel)
    }
}

#[derive(Debug, Serialize)]
struct BulkCheckRequest<'a> {
    items: Vec<BulkCheckItem<'a>>,
}

#[derive(Debug, Serialize)]
struct BulkCheckItem<'a> {
    product_id: &'a str,
    quantity: u64,
}

#[derive(Debug, Deserialize)]
struct BulkCheckResponse {
    available: bool,
    #[serde(default, alias = "unavailableItems")]
    unavailable_items: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct DeductRequest {
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct DeductResponse {
    #[serde(default, alias = "newQuantity")]
    new_quantity: Option<i64>,
}

impl HttpInventoryGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason,
        };
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            availability_mode: config.availability_mode,
            deduction_mode: config.deduction_mode,
        })
    }

    /// `{base}/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// On-hand level for one product.
    #[instrument(skip(self, product_id), fields(product_id = %product_id), err(Display))]
    async fn fetch_stock(&self, product_id: &ProductId) -> Result<i64, DeductionFailure> {
        let url = self.endpoint(&["products", product_id.as_str()]);
        let resp = self.client.get(url).send().await.map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(DeductionFailure::Rejected {
                status: resp.status().as_u16(),
            });
        }

        let payload: ProductPayload = resp.json().await.map_err(transport_failure)?;
        payload
            .on_hand()
            .ok_or_else(|| DeductionFailure::MalformedResponse("product payload carried no stock level".to_string()))
    }

    async fn check_per_item(&self, totals: BTreeMap<ProductId, u64>) -> BTreeMap<ProductId, ItemAvailability> {
        let lookups = totals.into_iter().map(|(product_id, requested)| async move {
            let verdict = match self.fetch_stock(&product_id).await {
                Ok(on_hand) => ItemAvailability::from_on_hand(on_hand, requested),
                Err(failure) => ItemAvailability::Unreachable {
                    reason: failure.to_string(),
                },
            };
            (product_id, verdict)
        });

        join_all(lookups).await.into_iter().collect()
    }

    async fn check_bulk(&self, totals: BTreeMap<ProductId, u64>) -> BTreeMap<ProductId, ItemAvailability> {
        let outcome = {
            let body = BulkCheckRequest {
                items: totals
                    .iter()
                    .map(|(product_id, quantity)| BulkCheckItem {
                        product_id: product_id.as_str(),
                        quantity: *quantity,
                    })
                    .collect(),
            };
            self.post_bulk_check(&body).await
        };

        match outcome {
            Ok(response) => {
                let flagged: BTreeSet<&str> = response
                    .unavailable_items
                    .iter()
                    .flatten()
                    .map(String::as_str)
                    .collect();
                // "unavailable" without naming a requested product marks the whole request.
                let names_requested = totals.keys().any(|product_id| flagged.contains(product_id.as_str()));
                let all_short = !response.available && !names_requested;

                totals
                    .into_iter()
                    .map(|(product_id, requested)| {
                        let verdict = if all_short || flagged.contains(product_id.as_str()) {
                            ItemAvailability::Insufficient {
                                on_hand: None,
                                requested,
                            }
                        } else {
                            ItemAvailability::Available { on_hand: None }
                        };
                        (product_id, verdict)
                    })
                    .collect()
            }
            Err(failure) => {
                let reason = failure.to_string();
                totals
                    .into_keys()
                    .map(|product_id| {
                        (
                            product_id,
                            ItemAvailability::Unreachable {
                                reason: reason.clone(),
                            },
                        )
                    })
                    .collect()
            }
        }
    }

    #[instrument(skip(self, body), fields(items = body.items.len()), err(Display))]
    async fn post_bulk_check(&self, body: &BulkCheckRequest<'_>) -> Result<BulkCheckResponse, DeductionFailure> {
        let url = self.endpoint(&["inventory", "check"]);
        let resp = self.client.post(url).json(body).send().await.map_err(transport_failure)?;

        if !resp.status().is_success() {
            return Err(DeductionFailure::Rejected {
                status: resp.status().as_u16(),
            });
        }

        resp.json().await.map_err(transport_failure)
    }

    async fn deduct_put(&self, product_id: &ProductId, quantity: u32) -> Result<i64, DeductionFailure> {
        let url = self.endpoint(&["inventory", product_id.as_str(), "deduct"]);
        let resp = self
            .client
            .put(url)
            .json(&DeductRequest { quantity })
            .send()
            .await
            .map_err(transport_failure)?;

        let status = resp.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(DeductionFailure::InsufficientStock {
                on_hand: None,
                requested: quantity,
            });
        }
        if !status.is_success() {
            return Err(DeductionFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body: DeductResponse = resp.json().await.map_err(transport_failure)?;
        body.new_quantity
            .ok_or_else(|| DeductionFailure::MalformedResponse("deduction response carried no new_quantity".to_string()))
    }

    async fn deduct_verify(&self, product_id: &ProductId, quantity: u32) -> Result<i64, DeductionFailure> {
        let on_hand = self.fetch_stock(product_id).await?;
        if on_hand < i64::from(quantity) {
            return Err(DeductionFailure::InsufficientStock {
                on_hand: Some(on_hand),
                requested: quantity,
            });
        }
        Ok(on_hand - i64::from(quantity))
    }
}

fn transport_failure(err: reqwest::Error) -> DeductionFailure {
    if err.is_timeout() {
        DeductionFailure::Timeout
    } else if err.is_decode() {
        DeductionFailure::MalformedResponse(err.to_string())
    } else {
        DeductionFailure::Transport(err.to_string())
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    #[instrument(skip(self, items), fields(items = items.len(), mode = ?self.availability_mode))]
    async fn check_availability(&self, items: &[StockRequest]) -> InventoryCheckResult {
        let totals = aggregate_quantities(items);
        let details = match self.availability_mode {
            AvailabilityMode::PerItem => self.check_per_item(totals).await,
            AvailabilityMode::Bulk => self.check_bulk(totals).await,
        };

        let result = InventoryCheckResult::from_details(details);
        if result.available {
            debug!(products = result.details.len(), "inventory available");
        } else {
            warn!(unavailable = ?result.unavailable_items, "inventory unavailable");
        }
        result
    }

    #[instrument(skip(self, product_id), fields(product_id = %product_id, mode = ?self.deduction_mode))]
    async fn deduct_stock(&self, product_id: &ProductId, quantity: u32) -> Result<StockDeduction, DeductionError> {
        let outcome = match self.deduction_mode {
            DeductionMode::Put => self.deduct_put(product_id, quantity).await,
            DeductionMode::Verify => self.deduct_verify(product_id, quantity).await,
        };

        match outcome {
            Ok(new_quantity) => {
                debug!(new_quantity, "stock deducted");
                Ok(StockDeduction {
                    product_id: product_id.clone(),
                    new_quantity,
                })
            }
            Err(reason) => {
                warn!(error = %reason, "stock deduction failed");
                Err(DeductionError::new(product_id.clone(), reason))
            }
        }
    }
}
