//! Checkout and lifecycle error types.

use std::time::Duration;

use common::{OrderId, PaymentMethodId, VariantId};
use domain::{OrderError, OrderStatus, PaymentStatus, UnavailableReason};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`crate::CheckoutCoordinator::checkout`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Payment method not found: {0}")]
    PaymentMethodNotFound(PaymentMethodId),

    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line could not be reserved.
    #[error("Variant {variant_id} unavailable ({reason}): requested {requested}, available {available}")]
    ItemUnavailable {
        variant_id: VariantId,
        requested: u32,
        available: u32,
        reason: UnavailableReason,
    },

    /// Discount or shipping fee rejected.
    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Invalid shipping info: {field} is required")]
    InvalidShipping { field: &'static str },

    #[error("Checkout timed out after {0:?}")]
    Timeout(Duration),

    #[error("Persistence failure: {0}")]
    Persistence(StoreError),

    /// Indicates a bug; never retried.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A cart or payment-method collaborator failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

impl CheckoutError {
    /// Returns true if the caller may retry with a fresh cart read.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::Persistence(err) => err.is_transient(),
            CheckoutError::Timeout(_) | CheckoutError::Collaborator(_) => true,
            _ => false,
        }
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::PaymentMethodNotFound(_) => "payment_method_not_found",
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::ItemUnavailable { .. } => "item_unavailable",
            CheckoutError::InvalidAdjustment(_) => "invalid_adjustment",
            CheckoutError::InvalidShipping { .. } => "invalid_shipping",
            CheckoutError::Timeout(_) => "timeout",
            CheckoutError::Persistence(_) => "persistence",
            CheckoutError::InvariantViolation(_) => "invariant_violation",
            CheckoutError::Collaborator(_) => "collaborator",
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvariantViolation(msg) => CheckoutError::InvariantViolation(msg),
            other => CheckoutError::Persistence(other),
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidAdjustment(msg) => CheckoutError::InvalidAdjustment(msg),
            OrderError::InvalidShipping { field } => CheckoutError::InvalidShipping { field },
            other => CheckoutError::InvariantViolation(other.to_string()),
        }
    }
}

/// Errors surfaced by [`crate::OrderLifecycle`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order is already {status}")]
    NoOpTransition { status: OrderStatus },

    #[error("Invalid status transition: {current} -> {target}")]
    InvalidTransition {
        current: OrderStatus,
        target: OrderStatus,
    },

    #[error("Invalid payment transition: {current} -> {target}")]
    InvalidPaymentTransition {
        current: PaymentStatus,
        target: PaymentStatus,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Persistence failure: {0}")]
    Persistence(StoreError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl LifecycleError {
    /// Returns true for deterministic rejections of the requested change.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LifecycleError::NoOpTransition { .. }
                | LifecycleError::InvalidTransition { .. }
                | LifecycleError::InvalidPaymentTransition { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            LifecycleError::Persistence(err) => err.is_transient(),
            LifecycleError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvariantViolation(msg) => LifecycleError::InvariantViolation(msg),
            other => LifecycleError::Persistence(other),
        }
    }
}

impl From<OrderError> for LifecycleError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoOpTransition { status } => LifecycleError::NoOpTransition { status },
            OrderError::InvalidTransition { current, target } => {
                LifecycleError::InvalidTransition { current, target }
            }
            OrderError::InvalidPaymentTransition { current, target } => {
                LifecycleError::InvalidPaymentTransition { current, target }
            }
            other => LifecycleError::InvariantViolation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CheckoutError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(CheckoutError::Persistence(StoreError::Unavailable("down".into())).is_retryable());
        assert!(CheckoutError::Collaborator("cart".into()).is_retryable());
        assert!(!CheckoutError::EmptyCart.is_retryable());
        assert!(!CheckoutError::InvariantViolation("bug".into()).is_retryable());
        assert!(
            !CheckoutError::ItemUnavailable {
                variant_id: VariantId::new(1),
                requested: 2,
                available: 1,
                reason: UnavailableReason::InsufficientStock,
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_store_invariant_is_not_persistence() {
        let err = CheckoutError::from(StoreError::InvariantViolation("negative stock".into()));
        assert!(matches!(err, CheckoutError::InvariantViolation(_)));

        let err = LifecycleError::from(StoreError::InvariantViolation("stale".into()));
        assert!(matches!(err, LifecycleError::InvariantViolation(_)));
    }

    #[test]
    fn test_order_error_mapping() {
        let err = CheckoutError::from(OrderError::TotalsMismatch("off by one".into()));
        assert!(matches!(err, CheckoutError::InvariantViolation(_)));

        let err = LifecycleError::from(OrderError::InvalidTransition {
            current: OrderStatus::Processing,
            target: OrderStatus::Delivered,
        });
        assert!(err.is_rejection());
    }
}
