//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

/// Registers help text for every metric the checkout subsystem emits.
pub fn describe() {
    metrics::describe_counter!("checkout_attempts_total", "Checkout calls received");
    metrics::describe_counter!("checkout_completed_total", "Checkouts committed");
    metrics::describe_counter!(
        "checkout_failed_total",
        "Checkouts rolled back, labelled by reason"
    );
    metrics::describe_histogram!(
        "checkout_duration_seconds",
        Unit::Seconds,
        "Wall time of one checkout transaction"
    );
    metrics::describe_counter!(
        "stock_reserved_units_total",
        "Units taken from stock by committed checkouts"
    );
    metrics::describe_counter!(
        "stock_released_units_total",
        "Units returned to stock by cancellations and returns"
    );
    metrics::describe_counter!(
        "order_transitions_total",
        "Applied order status transitions, labelled by from and to"
    );
    metrics::describe_counter!(
        "order_transition_rejected_total",
        "Status transitions rejected by the state machine"
    );
    metrics::describe_counter!(
        "cart_clear_failures_total",
        "Failed post-commit cart clear attempts"
    );
}
