//! Shared identifier types used across the checkout crates.

mod types;

pub use types::{ActorId, BuyerIdentity, OrderId, PaymentMethodId, SessionId, UserId, VariantId};
