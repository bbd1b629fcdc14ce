//! Post-creation order lifecycle: status transitions, payment outcomes and
//! read projections.

use std::time::Duration;

use chrono::Utc;
use common::{ActorId, OrderId};
use domain::{Order, OrderStatus, OrderStatusHistory, PaymentStatus};
use store::{InventoryLedger, OrderRepository, Store, StoreTransaction};
use tokio::time::error::Elapsed;

use crate::coordinator::rollback;
use crate::error::LifecycleError;

/// The single writer of `order_status` and `payment_status`.
pub struct OrderLifecycle<S: Store> {
    store: S,
    timeout: Duration,
}

impl<S: Store> OrderLifecycle<S> {
    /// Creates a lifecycle bounded by `timeout` per operation.
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Moves an order to `target`.
    ///
    /// Entering `Cancelled` or `Returned` releases every item's quantity back
    /// to stock in the same transaction. Both are terminal, so the release
    /// cannot run twice for the same order.
    #[tracing::instrument(skip(self, notes))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor_id: Option<ActorId>,
        notes: Option<String>,
    ) -> Result<Order, LifecycleError> {
        let result = match self.begin().await {
            Ok(mut tx) => {
                let outcome = tokio::time::timeout(
                    self.timeout,
                    apply_transition(&mut tx, order_id, target, actor_id, notes),
                )
                .await;
                self.finish(tx, outcome).await
            }
            Err(err) => Err(err),
        };

        match &result {
            Ok((order, previous)) => {
                metrics::counter!(
                    "order_transitions_total",
                    "from" => previous.as_str(),
                    "to" => target.as_str()
                )
                .increment(1);
                if target.releases_stock() {
                    metrics::counter!("stock_released_units_total")
                        .increment(order.total_quantity());
                }
                tracing::info!(%order_id, from = %previous, to = %target, "order status changed");
            }
            Err(err) if err.is_rejection() => {
                metrics::counter!("order_transition_rejected_total").increment(1);
                tracing::warn!(%order_id, %target, error = %err, "transition rejected");
            }
            Err(err) => {
                tracing::warn!(%order_id, %target, error = %err, "transition failed");
            }
        }

        result.map(|(order, _)| order)
    }

    /// Records a payment outcome. Never touches `order_status`.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment(
        &self,
        order_id: OrderId,
        target: PaymentStatus,
        actor_id: Option<ActorId>,
    ) -> Result<Order, LifecycleError> {
        let mut tx = self.begin().await?;
        let outcome =
            tokio::time::timeout(self.timeout, apply_payment(&mut tx, order_id, target)).await;

        match self.finish(tx, outcome).await {
            Ok((order, previous)) => {
                tracing::info!(%order_id, from = %previous, to = %target, "payment recorded");
                Ok(order)
            }
            Err(err) => {
                tracing::warn!(%order_id, %target, error = %err, "payment not recorded");
                Err(err)
            }
        }
    }

    /// Returns the order with its item snapshots.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, LifecycleError> {
        let mut tx = self.begin().await?;
        let outcome = tokio::time::timeout(self.timeout, find_order(&mut tx, order_id)).await;
        self.finish(tx, outcome).await
    }

    /// Returns the status log of an order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_history(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderStatusHistory>, LifecycleError> {
        let mut tx = self.begin().await?;
        let outcome = tokio::time::timeout(self.timeout, async {
            find_order(&mut tx, order_id).await?;
            Ok::<_, LifecycleError>(tx.history(order_id).await?)
        })
        .await;
        self.finish(tx, outcome).await
    }

    async fn begin(&self) -> Result<S::Tx, LifecycleError> {
        tokio::time::timeout(self.timeout, self.store.begin())
            .await
            .map_err(|_| LifecycleError::Timeout(self.timeout))?
            .map_err(LifecycleError::from)
    }

    /// Commits on success, rolls back on failure or expiry.
    async fn finish<T>(
        &self,
        tx: S::Tx,
        outcome: Result<Result<T, LifecycleError>, Elapsed>,
    ) -> Result<T, LifecycleError> {
        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                rollback(tx).await;
                Err(err)
            }
            Err(_) => {
                rollback(tx).await;
                Err(LifecycleError::Timeout(self.timeout))
            }
        }
    }
}

async fn find_order<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
) -> Result<Order, LifecycleError> {
    tx.find_order(order_id)
        .await?
        .ok_or(LifecycleError::OrderNotFound(order_id))
}

async fn apply_transition<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
    target: OrderStatus,
    actor_id: Option<ActorId>,
    notes: Option<String>,
) -> Result<(Order, OrderStatus), LifecycleError> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or(LifecycleError::OrderNotFound(order_id))?;

    let previous = order.status;
    let entry = order.transition_to(target, actor_id, notes, Utc::now())?;

    tx.update_order_status(order_id, previous, target, order.updated_at)
        .await?;
    tx.append_history(&entry).await?;

    if target.releases_stock() {
        // Quantities come from the immutable item snapshots, not the cart.
        for item in &order.items {
            tx.release_stock(item.variant_id, item.quantity).await?;
        }
    }

    Ok((order, previous))
}

async fn apply_payment<T: StoreTransaction>(
    tx: &mut T,
    order_id: OrderId,
    target: PaymentStatus,
) -> Result<(Order, PaymentStatus), LifecycleError> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or(LifecycleError::OrderNotFound(order_id))?;

    let previous = order.record_payment(target, Utc::now())?;
    tx.update_payment_status(order_id, previous, target, order.updated_at)
        .await?;

    Ok((order, previous))
}
