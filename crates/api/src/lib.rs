//! HTTP API server for the order checkout subsystem.
//!
//! Exposes checkout, order lifecycle and read endpoints over the
//! [`checkout`] crate, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod demo;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CartReader, CheckoutCoordinator, CheckoutSettings, OrderLifecycle, PaymentMethodLookup,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C, P>
where
    S: Store,
    C: CartReader,
    P: PaymentMethodLookup,
{
    pub coordinator: CheckoutCoordinator<S, C, P>,
    pub lifecycle: OrderLifecycle<S>,
}

/// Builds the application state over one store and its collaborators.
pub fn create_state<S, C, P>(
    store: S,
    cart: C,
    payment_methods: P,
    settings: CheckoutSettings,
) -> Arc<AppState<S, C, P>>
where
    S: Store + Clone,
    C: CartReader,
    P: PaymentMethodLookup,
{
    let lifecycle = OrderLifecycle::new(store.clone(), settings.timeout);
    let coordinator = CheckoutCoordinator::new(store, cart, payment_methods, settings);

    Arc::new(AppState {
        coordinator,
        lifecycle,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C, P>(state: Arc<AppState<S, C, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::place::<S, C, P>))
        .route("/orders/{id}", get(routes::orders::get::<S, C, P>))
        .route("/orders/{id}/status", post(routes::orders::transition::<S, C, P>))
        .route("/orders/{id}/payment", post(routes::orders::record_payment::<S, C, P>))
        .route("/orders/{id}/history", get(routes::orders::history::<S, C, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
