use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, VariantId};
use domain::{
    Money, Order, OrderCode, OrderStatus, OrderStatusHistory, PaymentStatus, ProductVariant,
    ReserveOutcome,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{InventoryLedger, OrderRepository, Store, StoreTransaction, VariantCatalog},
};

/// Store operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    Reserve,
    Release,
    VariantLookup,
    NextOrderNumber,
    InsertOrder,
    AppendHistory,
    LockOrder,
    UpdateOrderStatus,
    UpdatePaymentStatus,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    variants: BTreeMap<VariantId, ProductVariant>,
    orders: HashMap<OrderId, Order>,
    order_codes: HashSet<OrderCode>,
    history: Vec<OrderStatusHistory>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_points: HashSet<FailPoint>,
    delay: Option<Duration>,
}

/// In-memory store for tests and local runs.
///
/// Transactions are serialized: `begin` takes an exclusive lock on the whole
/// state and works on a private copy that only replaces the shared state on
/// commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    order_sequence: Arc<AtomicU64>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog variant.
    pub async fn insert_variant(&self, variant: ProductVariant) {
        self.state.lock().await.variants.insert(variant.id, variant);
    }

    /// Changes the catalog price of a variant. Returns false if it does not exist.
    pub async fn set_selling_price(&self, variant_id: VariantId, price: Money) -> bool {
        match self.state.lock().await.variants.get_mut(&variant_id) {
            Some(variant) => {
                variant.selling_price = price;
                true
            }
            None => false,
        }
    }

    /// Returns the committed stock of a variant.
    pub async fn stock_of(&self, variant_id: VariantId) -> Option<u32> {
        self.state
            .lock()
            .await
            .variants
            .get(&variant_id)
            .map(|v| v.stock_quantity)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed order items across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.state
            .lock()
            .await
            .orders
            .values()
            .map(|order| order.items.len())
            .sum()
    }

    /// Returns the number of committed history rows across all orders.
    pub async fn history_count(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Makes every later call to `point` fail with [`StoreError::Unavailable`].
    pub fn fail_on(&self, point: FailPoint) {
        self.faults().fail_points.insert(point);
    }

    /// Stops injecting failures at `point`.
    pub fn clear_failure(&self, point: FailPoint) {
        self.faults().fail_points.remove(&point);
    }

    /// Adds a fixed latency to every transactional operation.
    pub fn set_operation_delay(&self, delay: Option<Duration>) {
        self.faults().delay = delay;
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check(faults: &Mutex<Faults>, point: FailPoint) -> (Result<()>, Option<Duration>) {
    let faults = faults.lock().unwrap_or_else(PoisonError::into_inner);
    let result = if faults.fail_points.contains(&point) {
        Err(StoreError::Unavailable(format!(
            "injected failure at {point:?}"
        )))
    } else {
        Ok(())
    };
    (result, faults.delay)
}

async fn enter(faults: &Mutex<Faults>, point: FailPoint) -> Result<()> {
    let (result, delay) = check(faults, point);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    result
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        enter(&self.faults, FailPoint::Begin).await?;

        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(MemoryTransaction {
            guard,
            working,
            order_sequence: self.order_sequence.clone(),
            faults: self.faults.clone(),
        })
    }
}

/// A transaction over [`MemoryStore`].
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    order_sequence: Arc<AtomicU64>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryTransaction {
    fn order_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::InvariantViolation(format!("order {order_id} does not exist")))
    }
}

#[async_trait]
impl InventoryLedger for MemoryTransaction {
    async fn reserve_stock(
        &mut self,
        variant_id: VariantId,
        quantity: u32,
    ) -> Result<ReserveOutcome> {
        enter(&self.faults, FailPoint::Reserve).await?;

        let Some(variant) = self.working.variants.get_mut(&variant_id) else {
            return Ok(ReserveOutcome::NotFound);
        };
        if !variant.is_active {
            return Ok(ReserveOutcome::Inactive);
        }

        match variant.stock_quantity.checked_sub(quantity) {
            Some(remaining) => {
                variant.stock_quantity = remaining;
                Ok(ReserveOutcome::Reserved { remaining })
            }
            None => Ok(ReserveOutcome::InsufficientStock {
                available: variant.stock_quantity,
            }),
        }
    }

    async fn release_stock(&mut self, variant_id: VariantId, quantity: u32) -> Result<()> {
        enter(&self.faults, FailPoint::Release).await?;

        let variant = self.working.variants.get_mut(&variant_id).ok_or_else(|| {
            StoreError::InvariantViolation(format!("cannot release stock of unknown variant {variant_id}"))
        })?;

        variant.stock_quantity = variant.stock_quantity.checked_add(quantity).ok_or_else(|| {
            StoreError::InvariantViolation(format!("stock of variant {variant_id} overflows"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl VariantCatalog for MemoryTransaction {
    async fn variant(&mut self, variant_id: VariantId) -> Result<Option<ProductVariant>> {
        enter(&self.faults, FailPoint::VariantLookup).await?;
        Ok(self.working.variants.get(&variant_id).cloned())
    }
}

#[async_trait]
impl OrderRepository for MemoryTransaction {
    async fn next_order_number(&mut self) -> Result<u64> {
        enter(&self.faults, FailPoint::NextOrderNumber).await?;
        Ok(self.order_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        enter(&self.faults, FailPoint::InsertOrder).await?;

        if self.working.order_codes.contains(&order.code) {
            return Err(StoreError::DuplicateOrderCode(order.code.to_string()));
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::InvariantViolation(format!(
                "order {} already exists",
                order.id
            )));
        }

        self.working.order_codes.insert(order.code.clone());
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn append_history(&mut self, entry: &OrderStatusHistory) -> Result<()> {
        enter(&self.faults, FailPoint::AppendHistory).await?;

        if !self.working.orders.contains_key(&entry.order_id) {
            return Err(StoreError::InvariantViolation(format!(
                "history for unknown order {}",
                entry.order_id
            )));
        }
        self.working.history.push(entry.clone());
        Ok(())
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        // The whole state is already held exclusively.
        enter(&self.faults, FailPoint::LockOrder).await?;
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order_status(
        &mut self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        enter(&self.faults, FailPoint::UpdateOrderStatus).await?;

        let order = self.order_mut(order_id)?;
        if order.status != from {
            return Err(StoreError::InvariantViolation(format!(
                "order {order_id} is {} but {from} was expected",
                order.status
            )));
        }
        order.status = to;
        order.updated_at = at;
        Ok(())
    }

    async fn update_payment_status(
        &mut self,
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        enter(&self.faults, FailPoint::UpdatePaymentStatus).await?;

        let order = self.order_mut(order_id)?;
        if order.payment_status != from {
            return Err(StoreError::InvariantViolation(format!(
                "order {order_id} payment is {} but {from} was expected",
                order.payment_status
            )));
        }
        order.payment_status = to;
        order.updated_at = at;
        Ok(())
    }

    async fn history(&mut self, order_id: OrderId) -> Result<Vec<OrderStatusHistory>> {
        Ok(self
            .working
            .history
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self) -> Result<()> {
        enter(&self.faults, FailPoint::Commit).await?;

        let MemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
