use std::time::Duration;

use domain::OrderCodeStrategy;

/// Tunables shared by the coordinator and the lifecycle.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub order_code_strategy: OrderCodeStrategy,
    pub order_code_prefix: String,
    /// Upper bound for one transactional unit of work.
    pub timeout: Duration,
    pub cart_clear_max_attempts: u32,
    /// Multiplied by the attempt number between cart clear retries.
    pub cart_clear_backoff: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            order_code_strategy: OrderCodeStrategy::Sequence,
            order_code_prefix: "ORD".to_string(),
            timeout: Duration::from_millis(5000),
            cart_clear_max_attempts: 3,
            cart_clear_backoff: Duration::from_millis(50),
        }
    }
}
