//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CartReader, CheckoutRequest, PaymentMethodLookup};
use common::{BuyerIdentity, PaymentMethodId, SessionId, UserId};
use domain::{Money, ShippingInfo};
use serde::Deserialize;
use store::Store;

use super::orders::OrderResponse;
use crate::AppState;
use crate::error::ApiError;

/// Exactly one of `user_id` and `session_id` identifies the buyer.
#[derive(Deserialize)]
pub struct CheckoutBody {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub payment_method_id: i64,
    pub shipping: ShippingInfo,
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub shipping_fee_cents: i64,
}

/// POST /checkout: place an order from the buyer's cart.
#[tracing::instrument(skip(state, body))]
pub async fn place<S, C, P>(
    State(state): State<Arc<AppState<S, C, P>>>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: Store + 'static,
    C: CartReader + 'static,
    P: PaymentMethodLookup + 'static,
{
    let buyer = parse_buyer(body.user_id.as_deref(), body.session_id)?;

    let mut request = CheckoutRequest::new(
        buyer,
        body.shipping,
        PaymentMethodId::new(body.payment_method_id),
    )
    .with_discount(Money::from_cents(body.discount_cents))
    .with_shipping_fee(Money::from_cents(body.shipping_fee_cents));
    request.notes = body.notes;

    let order = state.coordinator.checkout(request).await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

fn parse_buyer(
    user_id: Option<&str>,
    session_id: Option<String>,
) -> Result<BuyerIdentity, ApiError> {
    let user_id = user_id
        .map(|id| {
            uuid::Uuid::parse_str(id)
                .map(UserId::from_uuid)
                .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))
        })
        .transpose()?;
    let session_id = session_id
        .filter(|s| !s.trim().is_empty())
        .map(SessionId::new);

    BuyerIdentity::from_parts(user_id, session_id).ok_or_else(|| {
        ApiError::BadRequest("exactly one of user_id or session_id is required".to_string())
    })
}
