//! Orders, their line snapshots and their lifecycle.

mod code;
mod model;
mod payment;
mod status;
mod value_objects;

pub use code::{OrderCode, OrderCodeStrategy};
pub use model::{NewOrder, Order, OrderItem, OrderStatusHistory, OrderTotals};
pub use payment::PaymentStatus;
pub use status::OrderStatus;
pub use value_objects::{Money, ShippingInfo};

use thiserror::Error;

/// Errors raised by pure order rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requested status equals the current one.
    #[error("Order is already {status}")]
    NoOpTransition { status: OrderStatus },

    /// The transition table does not allow moving from `current` to `target`.
    #[error("Invalid status transition: {current} -> {target}")]
    InvalidTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    /// The payment transition table does not allow moving from `current` to `target`.
    #[error("Invalid payment transition: {current} -> {target}")]
    InvalidPaymentTransition {
        current: PaymentStatus,
        target: PaymentStatus,
    },

    /// A discount or shipping fee cannot be applied to the order.
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    /// A required shipping field is blank.
    #[error("Invalid shipping info: {field} is required")]
    InvalidShipping { field: &'static str },

    /// An order needs at least one line.
    #[error("Order has no items")]
    NoItems,

    /// Quantity must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A monetary computation left the representable range.
    #[error("Amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    /// Stored or computed totals disagree with `grand_total = subtotal - discount + shipping_fee`.
    #[error("Totals mismatch: {0}")]
    TotalsMismatch(String),

    /// A status or code string could not be parsed.
    #[error("Unknown {kind}: {value}")]
    Unrecognized { kind: &'static str, value: String },
}
