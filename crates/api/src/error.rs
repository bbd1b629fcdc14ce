//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, LifecycleError};
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout rejected or failed.
    Checkout(CheckoutError),
    /// Lifecycle operation rejected or failed.
    Lifecycle(LifecycleError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Lifecycle(err) => lifecycle_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(%status, body = %body, "request failed");
        }

        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, Value) {
    let message = err.to_string();
    match &err {
        CheckoutError::ItemUnavailable {
            variant_id,
            requested,
            available,
            reason,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": message,
                "reason": reason,
                "variant_id": variant_id,
                "requested": requested,
                "available": available,
            }),
        ),
        CheckoutError::PaymentMethodNotFound(_) | CheckoutError::EmptyCart => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message }),
        ),
        CheckoutError::InvalidAdjustment(_) | CheckoutError::InvalidShipping { .. } => {
            (StatusCode::BAD_REQUEST, json!({ "error": message }))
        }
        other if other.is_retryable() => {
            (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message }))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": message }),
        ),
    }
}

fn lifecycle_error_to_response(err: LifecycleError) -> (StatusCode, Value) {
    let message = err.to_string();
    let status = match &err {
        LifecycleError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::NoOpTransition { .. }
        | LifecycleError::InvalidTransition { .. }
        | LifecycleError::InvalidPaymentTransition { .. } => StatusCode::CONFLICT,
        other if other.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match err {
        LifecycleError::NoOpTransition { status } => json!({
            "error": message,
            "current": status,
            "target": status,
        }),
        LifecycleError::InvalidTransition { current, target } => json!({
            "error": message,
            "current": current,
            "target": target,
        }),
        LifecycleError::InvalidPaymentTransition { current, target } => json!({
            "error": message,
            "current": current,
            "target": target,
        }),
        _ => json!({ "error": message }),
    };

    (status, body)
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Lifecycle(err)
    }
}
