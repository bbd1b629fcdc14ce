//! Checkout for the order subsystem.
//!
//! [`CheckoutCoordinator`] turns a buyer's cart into an immutable order:
//! 1. Validate the payment method
//! 2. Read and normalize the cart
//!
//! Then, in a single store transaction:
//! 3. Reserve stock per line, in ascending variant order
//! 4. Snapshot prices and names, compute totals
//! 5. Persist the order, its items and the first history row
//!
//! Any failure rolls the whole unit back. The cart is cleared after commit.
//!
//! [`OrderLifecycle`] applies later status transitions and releases stock
//! when an order is cancelled or returned.

pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod order_code;
pub mod services;
pub mod settings;

pub use coordinator::{CheckoutCoordinator, CheckoutRequest};
pub use error::{CheckoutError, LifecycleError};
pub use lifecycle::OrderLifecycle;
pub use order_code::OrderCodeGenerator;
pub use services::{
    CartLine, CartReader, InMemoryCart, InMemoryPaymentMethods, PaymentMethodLookup,
    normalize_lines,
};
pub use settings::CheckoutSettings;
