//! Checkout coordinator: converts a cart into an order in one transaction.

use std::time::Instant;

use chrono::Utc;
use common::{ActorId, BuyerIdentity, OrderId, PaymentMethodId};
use domain::{Money, NewOrder, Order, OrderItem, ShippingInfo};
use store::{InventoryLedger, OrderRepository, Store, StoreTransaction, VariantCatalog};

use crate::error::CheckoutError;
use crate::order_code::OrderCodeGenerator;
use crate::services::{CartLine, CartReader, PaymentMethodLookup, normalize_lines};
use crate::settings::CheckoutSettings;

/// Input to [`CheckoutCoordinator::checkout`].
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub buyer: BuyerIdentity,
    pub shipping: ShippingInfo,
    pub payment_method_id: PaymentMethodId,
    pub notes: Option<String>,
    /// Pre-computed by the promotions subsystem.
    pub discount: Money,
    /// Pre-computed by the shipping-rate subsystem.
    pub shipping_fee: Money,
}

impl CheckoutRequest {
    /// Creates a request with no notes, discount or shipping fee.
    pub fn new(
        buyer: BuyerIdentity,
        shipping: ShippingInfo,
        payment_method_id: PaymentMethodId,
    ) -> Self {
        Self {
            buyer,
            shipping,
            payment_method_id,
            notes: None,
            discount: Money::zero(),
            shipping_fee: Money::zero(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_shipping_fee(mut self, shipping_fee: Money) -> Self {
        self.shipping_fee = shipping_fee;
        self
    }
}

/// Orchestrates the cart to order conversion.
///
/// Payment method validation and the cart read happen before the store
/// transaction opens, so no pooled connection is held while waiting on
/// collaborators. Stock reservation, snapshotting, code generation and order
/// persistence all run inside one store transaction. The cart is cleared only
/// after the commit, best effort.
pub struct CheckoutCoordinator<S, C, P>
where
    S: Store,
    C: CartReader,
    P: PaymentMethodLookup,
{
    store: S,
    cart: C,
    payment_methods: P,
    codes: OrderCodeGenerator,
    settings: CheckoutSettings,
}

impl<S, C, P> CheckoutCoordinator<S, C, P>
where
    S: Store,
    C: CartReader,
    P: PaymentMethodLookup,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: S, cart: C, payment_methods: P, settings: CheckoutSettings) -> Self {
        let codes =
            OrderCodeGenerator::new(settings.order_code_strategy, settings.order_code_prefix.clone());
        Self {
            store,
            cart,
            payment_methods,
            codes,
            settings,
        }
    }

    /// Places an order from the buyer's current cart.
    ///
    /// Either the order, its items, its first history row and every stock
    /// reservation are committed together, or none of them are.
    #[tracing::instrument(
        skip(self, request),
        fields(buyer = %request.buyer, payment_method_id = %request.payment_method_id)
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = Instant::now();

        let result = self.place_order(&request).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                metrics::counter!("stock_reserved_units_total").increment(order.total_quantity());
                tracing::info!(
                    order_id = %order.id,
                    order_code = %order.code,
                    lines = order.items.len(),
                    grand_total = %order.totals.grand_total,
                    "checkout committed"
                );

                self.clear_cart(&request.buyer).await;
                Ok(order)
            }
            Err(err) => {
                metrics::counter!("checkout_failed_total", "reason" => err.reason()).increment(1);
                tracing::warn!(error = %err, reason = err.reason(), "checkout rejected");
                Err(err)
            }
        }
    }

    async fn place_order(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
        request.shipping.validate()?;

        let timeout = self.settings.timeout;
        let deadline = tokio::time::Instant::now() + timeout;

        let lines = tokio::time::timeout_at(deadline, self.load_cart(request))
            .await
            .map_err(|_| CheckoutError::Timeout(timeout))??;

        let mut tx = tokio::time::timeout_at(deadline, self.store.begin())
            .await
            .map_err(|_| CheckoutError::Timeout(timeout))??;

        match tokio::time::timeout_at(deadline, self.build_order(&mut tx, request, &lines)).await {
            Ok(Ok(order)) => {
                tx.commit().await?;
                Ok(order)
            }
            Ok(Err(err)) => {
                rollback(tx).await;
                Err(err)
            }
            Err(_) => {
                rollback(tx).await;
                Err(CheckoutError::Timeout(timeout))
            }
        }
    }

    /// Checks the payment method and snapshots the normalized cart.
    async fn load_cart(&self, request: &CheckoutRequest) -> Result<Vec<CartLine>, CheckoutError> {
        if !self.payment_methods.exists(request.payment_method_id).await? {
            return Err(CheckoutError::PaymentMethodNotFound(request.payment_method_id));
        }

        let lines = normalize_lines(self.cart.snapshot(&request.buyer).await?)?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(lines)
    }

    async fn build_order(
        &self,
        tx: &mut S::Tx,
        request: &CheckoutRequest,
        lines: &[CartLine],
    ) -> Result<Order, CheckoutError> {
        let order_id = OrderId::new();
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(reserve_line(&mut *tx, order_id, line).await?);
        }

        let placed_at = Utc::now();
        let code = self.codes.generate(&mut *tx, placed_at.date_naive()).await?;

        let order = Order::place(
            NewOrder {
                id: order_id,
                code,
                buyer: request.buyer.clone(),
                payment_method_id: request.payment_method_id,
                shipping: request.shipping.clone(),
                notes: request.notes.clone(),
                discount: request.discount,
                shipping_fee: request.shipping_fee,
                placed_at,
            },
            items,
        )?;

        let actor = request.buyer.user_id().map(ActorId::from);
        tx.insert_order(&order).await?;
        tx.append_history(&order.initial_history(actor)).await?;

        Ok(order)
    }

    async fn clear_cart(&self, buyer: &BuyerIdentity) {
        let attempts = self.settings.cart_clear_max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.cart.clear(buyer).await {
                Ok(()) => return,
                Err(err) => {
                    metrics::counter!("cart_clear_failures_total").increment(1);
                    tracing::warn!(%buyer, attempt, error = %err, "cart clear failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.cart_clear_backoff * attempt).await;
                    }
                }
            }
        }

        tracing::error!(%buyer, attempts, "giving up on cart clear; order stays committed");
    }
}

/// Reserves one normalized cart line and snapshots it into an order item.
async fn reserve_line<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
    line: &CartLine,
) -> Result<OrderItem, CheckoutError> {
    let outcome = tx.reserve_stock(line.variant_id, line.quantity).await?;
    if let Some((reason, available)) = outcome.unavailable() {
        return Err(CheckoutError::ItemUnavailable {
            variant_id: line.variant_id,
            requested: line.quantity,
            available,
            reason,
        });
    }

    // Read after the reservation so the price is the one in force when the
    // stock was taken.
    let variant = tx.variant(line.variant_id).await?.ok_or_else(|| {
        CheckoutError::InvariantViolation(format!(
            "variant {} reserved but missing from catalog",
            line.variant_id
        ))
    })?;

    Ok(OrderItem::snapshot(order_id, &variant, line.quantity)?)
}

pub(crate) async fn rollback<T: StoreTransaction>(tx: T) {
    if let Err(err) = tx.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}
