use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};

use orderdesk_core::OrderId;
use orderdesk_orders::CreateOrderRequest;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
}

fn parse_order_id(id: &str) -> Result<OrderId, Response> {
    id.parse::<OrderId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

pub async fn create_order(
    Extension(services): Extension<AppServices>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };

    match services.orders.create(request).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<AppServices>,
    query: Result<Query<dto::ListOrdersQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()),
    };

    match services.orders.find_all(query.page(), query.limit()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn get_order(Extension(services): Extension<AppServices>, Path(id): Path<String>) -> Response {
    let id = match parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orders.find_one(id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}

pub async fn update_order_status(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> Response {
    let id = match parse_order_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };
    let status = match body.parse_status() {
        Ok(status) => status,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    match services.orders.update_status(id, status).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::order_error_to_response(e),
    }
}
