//! Domain layer for order checkout.
//!
//! This crate holds the pure, I/O-free model:
//! - Order status state machine with its explicit transition table
//! - Payment status transitions
//! - Immutable order, order item and status history records
//! - Money arithmetic in integer cents
//! - Order code formatting
//! - Inventory reservation outcomes

pub mod inventory;
pub mod order;

pub use inventory::{ProductVariant, ReserveOutcome, UnavailableReason};
pub use order::{
    Money, NewOrder, Order, OrderCode, OrderCodeStrategy, OrderError, OrderItem,
    OrderStatus, OrderStatusHistory, OrderTotals, PaymentStatus, ShippingInfo,
};
