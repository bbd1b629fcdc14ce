//! Collaborator traits consumed by checkout, with in-memory implementations.

pub mod cart;
pub mod payment;

pub use cart::{CartLine, CartReader, InMemoryCart, normalize_lines};
pub use payment::{InMemoryPaymentMethods, PaymentMethodLookup};
