//! Product variants and the outcome of a stock reservation.

use common::VariantId;
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// A sellable variant as the catalog stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_name: String,
    pub sku: String,
    pub selling_price: Money,
    /// Units available for sale; never negative.
    pub stock_quantity: u32,
    pub is_active: bool,
}

/// Why a variant could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    InsufficientStock,
    NotFound,
    Inactive,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            UnavailableReason::InsufficientStock => "insufficient stock",
            UnavailableReason::NotFound => "not found",
            UnavailableReason::Inactive => "inactive",
        };
        write!(f, "{text}")
    }
}

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was decremented; `remaining` is what is left.
    Reserved { remaining: u32 },
    /// The variant is active but holds fewer units than requested.
    InsufficientStock { available: u32 },
    NotFound,
    Inactive,
}

impl ReserveOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved { .. })
    }

    /// Returns the failure reason and the stock the caller can still see.
    pub fn unavailable(&self) -> Option<(UnavailableReason, u32)> {
        match *self {
            ReserveOutcome::Reserved { .. } => None,
            ReserveOutcome::InsufficientStock { available } => {
                Some((UnavailableReason::InsufficientStock, available))
            }
            ReserveOutcome::NotFound => Some((UnavailableReason::NotFound, 0)),
            ReserveOutcome::Inactive => Some((UnavailableReason::Inactive, 0)),
        }
    }
}
