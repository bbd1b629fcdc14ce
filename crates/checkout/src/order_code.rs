//! Order code generation.

use chrono::NaiveDate;
use domain::{OrderCode, OrderCodeStrategy};
use store::{OrderRepository, StoreError};

/// Produces unique order codes according to a [`OrderCodeStrategy`].
#[derive(Debug, Clone)]
pub struct OrderCodeGenerator {
    strategy: OrderCodeStrategy,
    prefix: String,
}

impl OrderCodeGenerator {
    pub fn new(strategy: OrderCodeStrategy, prefix: impl Into<String>) -> Self {
        Self {
            strategy,
            prefix: prefix.into(),
        }
    }

    /// Generates the next code. `Sequence` draws from the store counter
    /// through `repo`; `Random` needs no store access.
    pub async fn generate<R>(&self, repo: &mut R, today: NaiveDate) -> Result<OrderCode, StoreError>
    where
        R: OrderRepository + ?Sized,
    {
        match self.strategy {
            OrderCodeStrategy::Sequence => {
                let number = repo.next_order_number().await?;
                Ok(OrderCode::from_sequence(&self.prefix, today, number))
            }
            OrderCodeStrategy::Random => Ok(OrderCode::random(&self.prefix)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use store::{MemoryStore, Store};

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[tokio::test]
    async fn test_sequence_codes_are_monotonic() {
        let store = MemoryStore::new();
        let generator = OrderCodeGenerator::new(OrderCodeStrategy::Sequence, "ORD");
        let mut tx = store.begin().await.unwrap();

        let first = generator.generate(&mut tx, today()).await.unwrap();
        let second = generator.generate(&mut tx, today()).await.unwrap();

        assert_eq!(first.as_str(), "ORD-20250630-00000001");
        assert_eq!(second.as_str(), "ORD-20250630-00000002");
    }

    #[tokio::test]
    async fn test_random_codes_are_unique() {
        let store = MemoryStore::new();
        let generator = OrderCodeGenerator::new(OrderCodeStrategy::Random, "SHOP");
        let mut tx = store.begin().await.unwrap();

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let code = generator.generate(&mut tx, today()).await.unwrap();
            assert!(code.as_str().starts_with("SHOP-"));
            assert!(seen.insert(code));
        }
    }
}
