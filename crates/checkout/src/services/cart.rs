//! Cart reader trait and its implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{BuyerIdentity, VariantId};
use serde::{Deserialize, Serialize};
use store::PostgresStore;

use crate::error::CheckoutError;

/// One (variant, quantity) pair in a buyer's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(variant_id: VariantId, quantity: u32) -> Self {
        Self {
            variant_id,
            quantity,
        }
    }
}

/// Read-and-clear access to the cart owned by another service.
#[async_trait]
pub trait CartReader: Send + Sync {
    /// Returns the current lines for a buyer.
    async fn snapshot(&self, buyer: &BuyerIdentity) -> Result<Vec<CartLine>, CheckoutError>;

    /// Removes every line for a buyer.
    async fn clear(&self, buyer: &BuyerIdentity) -> Result<(), CheckoutError>;
}

/// Merges duplicate variants, drops zero quantities and sorts by variant id.
///
/// Reserving in ascending id order keeps lock acquisition order identical
/// across concurrent checkouts.
pub fn normalize_lines(lines: Vec<CartLine>) -> Result<Vec<CartLine>, CheckoutError> {
    let mut merged: BTreeMap<VariantId, u32> = BTreeMap::new();

    for line in lines.into_iter().filter(|line| line.quantity > 0) {
        let quantity = merged.entry(line.variant_id).or_insert(0);
        *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
            CheckoutError::InvariantViolation(format!(
                "cart quantity for variant {} overflows",
                line.variant_id
            ))
        })?;
    }

    Ok(merged
        .into_iter()
        .map(|(variant_id, quantity)| CartLine::new(variant_id, quantity))
        .collect())
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<BuyerIdentity, Vec<CartLine>>,
    fail_on_snapshot: bool,
    /// Number of upcoming clear calls that fail.
    failing_clears: u32,
    clear_calls: u32,
}

/// In-memory cart for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCart {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCart {
    /// Creates a new in-memory cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a buyer's cart.
    pub fn set_lines(&self, buyer: BuyerIdentity, lines: Vec<CartLine>) {
        self.write().carts.insert(buyer, lines);
    }

    /// Appends one line to a buyer's cart.
    pub fn add_line(&self, buyer: BuyerIdentity, variant_id: VariantId, quantity: u32) {
        self.write()
            .carts
            .entry(buyer)
            .or_default()
            .push(CartLine::new(variant_id, quantity));
    }

    /// Returns the raw lines currently stored for a buyer.
    pub fn lines(&self, buyer: &BuyerIdentity) -> Vec<CartLine> {
        self.read().carts.get(buyer).cloned().unwrap_or_default()
    }

    /// Configures the cart to fail on snapshot calls.
    pub fn set_fail_on_snapshot(&self, fail: bool) {
        self.write().fail_on_snapshot = fail;
    }

    /// Makes the next `count` clear calls fail.
    pub fn fail_next_clears(&self, count: u32) {
        self.write().failing_clears = count;
    }

    /// Returns how many times clear was called.
    pub fn clear_calls(&self) -> u32 {
        self.read().clear_calls
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryCartState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryCartState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CartReader for InMemoryCart {
    async fn snapshot(&self, buyer: &BuyerIdentity) -> Result<Vec<CartLine>, CheckoutError> {
        let state = self.read();
        if state.fail_on_snapshot {
            return Err(CheckoutError::Collaborator("cart service unavailable".to_string()));
        }
        Ok(state.carts.get(buyer).cloned().unwrap_or_default())
    }

    async fn clear(&self, buyer: &BuyerIdentity) -> Result<(), CheckoutError> {
        let mut state = self.write();
        state.clear_calls += 1;

        if state.failing_clears > 0 {
            state.failing_clears -= 1;
            return Err(CheckoutError::Collaborator("cart service unavailable".to_string()));
        }

        state.carts.remove(buyer);
        Ok(())
    }
}

/// Cart lines stored in the `cart_items` table.
#[async_trait]
impl CartReader for PostgresStore {
    async fn snapshot(&self, buyer: &BuyerIdentity) -> Result<Vec<CartLine>, CheckoutError> {
        let lines = self.cart_lines(buyer).await?;
        Ok(lines
            .into_iter()
            .map(|(variant_id, quantity)| CartLine::new(variant_id, quantity))
            .collect())
    }

    async fn clear(&self, buyer: &BuyerIdentity) -> Result<(), CheckoutError> {
        self.clear_cart(buyer).await?;
        Ok(())
    }
}
