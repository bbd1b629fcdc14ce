//! Payment method lookup trait and its implementations.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::PaymentMethodId;
use store::PostgresStore;

use crate::error::CheckoutError;

/// Existence check for payment methods.
#[async_trait]
pub trait PaymentMethodLookup: Send + Sync {
    async fn exists(&self, id: PaymentMethodId) -> Result<bool, CheckoutError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentMethodsState {
    methods: HashSet<PaymentMethodId>,
    fail_on_lookup: bool,
}

/// In-memory payment method registry for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentMethods {
    state: Arc<RwLock<InMemoryPaymentMethodsState>>,
}

impl InMemoryPaymentMethods {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the given methods.
    pub fn with_methods(ids: impl IntoIterator<Item = PaymentMethodId>) -> Self {
        let methods = Self::new();
        for id in ids {
            methods.register(id);
        }
        methods
    }

    pub fn register(&self, id: PaymentMethodId) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .methods
            .insert(id);
    }

    /// Configures the registry to fail on lookups.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_lookup = fail;
    }
}

#[async_trait]
impl PaymentMethodLookup for InMemoryPaymentMethods {
    async fn exists(&self, id: PaymentMethodId) -> Result<bool, CheckoutError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.fail_on_lookup {
            return Err(CheckoutError::Collaborator(
                "payment method registry unavailable".to_string(),
            ));
        }
        Ok(state.methods.contains(&id))
    }
}

/// Active rows of the `payment_methods` table.
#[async_trait]
impl PaymentMethodLookup for PostgresStore {
    async fn exists(&self, id: PaymentMethodId) -> Result<bool, CheckoutError> {
        Ok(self.payment_method_exists(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let methods = InMemoryPaymentMethods::with_methods([PaymentMethodId::new(1)]);

        assert!(methods.exists(PaymentMethodId::new(1)).await.unwrap());
        assert!(!methods.exists(PaymentMethodId::new(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_on_lookup() {
        let methods = InMemoryPaymentMethods::with_methods([PaymentMethodId::new(1)]);
        methods.set_fail_on_lookup(true);

        let result = methods.exists(PaymentMethodId::new(1)).await;
        assert!(matches!(result, Err(CheckoutError::Collaborator(_))));
    }
}
