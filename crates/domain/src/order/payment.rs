//! Payment outcome recorded against an order.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Payment state of an order, independent of its fulfilment status.
///
/// ```text
/// Pending ──► Paid ──► Refunded
///    │         ▲
///    └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Returns the payment statuses this one may move to.
    pub fn allowed_targets(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[PaymentStatus::Paid, PaymentStatus::Failed],
            // A failed attempt may be retried successfully.
            PaymentStatus::Failed => &[PaymentStatus::Paid],
            PaymentStatus::Paid => &[PaymentStatus::Refunded],
            PaymentStatus::Refunded => &[],
        }
    }

    /// Checks a requested payment transition; recording the same outcome twice is rejected.
    pub fn validate_transition(&self, target: PaymentStatus) -> Result<(), OrderError> {
        if self.allowed_targets().contains(&target) {
            Ok(())
        } else {
            Err(OrderError::InvalidPaymentTransition {
                current: *self,
                target,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::Unrecognized {
                kind: "payment status",
                value: s.to_string(),
            })
    }
}
