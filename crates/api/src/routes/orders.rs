//! Order read and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{CartReader, PaymentMethodLookup};
use common::{ActorId, OrderId};
use domain::{Order, OrderItem, OrderStatus, OrderStatusHistory, PaymentStatus, ShippingInfo};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub actor_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
    pub actor_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub code: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub payment_method_id: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping: ShippingInfo,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_fee_cents: i64,
    pub grand_total_cents: i64,
    pub placed_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub variant_id: i64,
    pub product_name: String,
    pub sku: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct HistoryEntryResponse {
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
    pub recorded_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            code: order.code.to_string(),
            user_id: order.buyer.user_id().map(|id| id.to_string()),
            session_id: order.buyer.session_id().map(|id| id.to_string()),
            payment_method_id: order.payment_method_id.as_i64(),
            status: order.status,
            payment_status: order.payment_status,
            shipping: order.shipping,
            notes: order.notes,
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            subtotal_cents: order.totals.subtotal.cents(),
            discount_cents: order.totals.discount.cents(),
            shipping_fee_cents: order.totals.shipping_fee.cents(),
            grand_total_cents: order.totals.grand_total.cents(),
            placed_at: order.placed_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            variant_id: item.variant_id.as_i64(),
            product_name: item.product_name.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            line_total_cents: item.line_total.cents(),
        }
    }
}

impl From<OrderStatusHistory> for HistoryEntryResponse {
    fn from(entry: OrderStatusHistory) -> Self {
        Self {
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            notes: entry.notes,
            actor_id: entry.actor_id.map(|id| id.to_string()),
            recorded_at: entry.recorded_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// GET /orders/{id}: the order with its item snapshots.
#[tracing::instrument(skip(state))]
pub async fn get<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.lifecycle.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{id}/status: apply a status transition.
#[tracing::instrument(skip(state, req), fields(target = %req.status))]
pub async fn transition<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let order_id = parse_order_id(&id)?;
    let actor_id = parse_actor_id(req.actor_id.as_deref())?;

    let order = state
        .lifecycle
        .transition(order_id, req.status, actor_id, req.notes)
        .await?;

    Ok(Json(order.into()))
}

/// POST /orders/{id}/payment: record a payment outcome.
#[tracing::instrument(skip(state, req), fields(target = %req.payment_status))]
pub async fn record_payment<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    Path(id): Path<String>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let order_id = parse_order_id(&id)?;
    let actor_id = parse_actor_id(req.actor_id.as_deref())?;

    let order = state
        .lifecycle
        .record_payment(order_id, req.payment_status, actor_id)
        .await?;

    Ok(Json(order.into()))
}

/// GET /orders/{id}/history: the status log, oldest first.
#[tracing::instrument(skip(state))]
pub async fn history<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError>
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let order_id = parse_order_id(&id)?;
    let entries = state.lifecycle.list_history(order_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_actor_id(id: Option<&str>) -> Result<Option<ActorId>, ApiError> {
    id.map(|id| {
        uuid::Uuid::parse_str(id)
            .map(ActorId::from_uuid)
            .map_err(|e| ApiError::BadRequest(format!("Invalid actor_id: {e}")))
    })
    .transpose()
}
