use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use orderdesk_infra::OrderError;
use orderdesk_inventory::DeductionFailure;

pub fn order_error_to_response(err: OrderError) -> Response {
    let message = err.to_string();
    match err {
        OrderError::Validation(errors) => json_error_with_details(
            StatusCode::BAD_REQUEST,
            "validation_error",
            message,
            json!({ "violations": errors.violations() }),
        ),
        OrderError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        OrderError::InvalidTransition { from, to, .. } => json_error_with_details(
            StatusCode::CONFLICT,
            "invalid_transition",
            message,
            json!({ "from": from, "to": to }),
        ),
        OrderError::InsufficientStock {
            product_ids,
            unreachable,
        } => {
            let (status, code) = if unreachable {
                (StatusCode::SERVICE_UNAVAILABLE, "inventory_unavailable")
            } else {
                (StatusCode::CONFLICT, "insufficient_stock")
            };
            json_error_with_details(status, code, message, json!({ "unavailable_items": product_ids }))
        }
        OrderError::StockDeduction {
            order_id,
            failed,
            deducted,
            reason,
        } => {
            let (status, code) = match reason {
                DeductionFailure::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
                _ => (StatusCode::SERVICE_UNAVAILABLE, "stock_deduction_failed"),
            };
            json_error_with_details(
                status,
                code,
                message,
                json!({
                    "order_id": order_id,
                    "failed_product": failed,
                    "deducted": deducted,
                }),
            )
        }
        OrderError::Infrastructure(msg) => {
            tracing::error!(error = %msg, "order storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn json_error_with_details(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}
