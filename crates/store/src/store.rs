use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, VariantId};
use domain::{Order, OrderStatus, OrderStatusHistory, PaymentStatus, ProductVariant, ReserveOutcome};

use crate::Result;

/// Per-variant stock counter.
///
/// Both operations are single atomic writes at the storage layer; callers
/// never read stock and write it back.
#[async_trait]
pub trait InventoryLedger: Send {
    /// Decrements stock by `quantity` only if the variant is active and holds
    /// at least that much.
    async fn reserve_stock(&mut self, variant_id: VariantId, quantity: u32)
    -> Result<ReserveOutcome>;

    /// Increments stock by `quantity`. Idempotency is the caller's concern.
    async fn release_stock(&mut self, variant_id: VariantId, quantity: u32) -> Result<()>;
}

/// Read access to the display and price fields of a variant.
#[async_trait]
pub trait VariantCatalog: Send {
    async fn variant(&mut self, variant_id: VariantId) -> Result<Option<ProductVariant>>;
}

/// Order header, item and history persistence.
#[async_trait]
pub trait OrderRepository: Send {
    /// Draws the next value of the store-owned order counter.
    ///
    /// Values are never handed out twice, even if the drawing transaction rolls back.
    async fn next_order_number(&mut self) -> Result<u64>;

    /// Persists the order header and all of its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Appends one row to the status log.
    async fn append_history(&mut self, entry: &OrderStatusHistory) -> Result<()>;

    /// Loads an order without locking it.
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads an order and holds it against concurrent status writers until
    /// the transaction ends.
    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Compare-and-set of the order status; fails if it is no longer `from`.
    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Compare-and-set of the payment status; fails if it is no longer `from`.
    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Returns the status log for an order, oldest first.
    async fn history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusHistory>>;
}

/// One atomic unit of work.
///
/// Dropping a transaction without committing discards every write made through it.
#[async_trait]
pub trait StoreTransaction: InventoryLedger + VariantCatalog + OrderRepository + Sized {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Entry point to the backing store.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTransaction + 'static;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}
