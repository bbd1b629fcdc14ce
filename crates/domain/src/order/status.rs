//! Order status state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order after it has been placed.
///
/// State transitions:
/// ```text
/// PendingConfirmation ──► Processing ──► Shipped ──► Delivered
///         │                   │             │            │
///         └───────────────────┴──► Cancelled └──► Returned ◄┘
/// ```
///
/// `Cancelled` and `Returned` are terminal and both give the reserved stock back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order was placed and stock reserved; awaiting confirmation.
    #[default]
    PendingConfirmation,

    /// Order confirmed and being prepared.
    Processing,

    /// Handed over to the carrier.
    Shipped,

    /// Received by the buyer.
    Delivered,

    /// Order was cancelled before shipping (terminal state).
    Cancelled,

    /// Goods came back after shipping (terminal state).
    Returned,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::PendingConfirmation,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// Returns the statuses this one may move to.
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::PendingConfirmation => {
                &[OrderStatus::Processing, OrderStatus::Cancelled]
            }
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Returned],
            OrderStatus::Delivered => &[OrderStatus::Returned],
            OrderStatus::Cancelled | OrderStatus::Returned => &[],
        }
    }

    /// Returns true if the transition table allows moving to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Checks a requested transition against the table.
    ///
    /// A request for the current status is reported as a no-op before the
    /// table is consulted.
    pub fn validate_transition(&self, target: OrderStatus) -> Result<(), OrderError> {
        if *self == target {
            return Err(OrderError::NoOpTransition { status: target });
        }

        if !self.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                current: *self,
                target,
            });
        }

        Ok(())
    }

    /// Returns true if entering this status must return the order's stock.
    pub fn releases_stock(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::Unrecognized {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending_confirmation() {
        assert_eq!(OrderStatus::default(), OrderStatus::PendingConfirmation);
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        let expected: [(OrderStatus, &[OrderStatus]); 6] = [
            (PendingConfirmation, &[Processing, Cancelled]),
            (Processing, &[Shipped, Cancelled]),
            (Shipped, &[Delivered, Returned]),
            (Delivered, &[Returned]),
            (Cancelled, &[]),
            (Returned, &[]),
        ];

        for (source, targets) in expected {
            for target in OrderStatus::ALL {
                assert_eq!(
                    source.can_transition_to(target),
                    targets.contains(&target),
                    "{source} -> {target}"
                );
            }
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.validate_transition(status),
                Err(OrderError::NoOpTransition { status })
            );
        }
    }

    #[test]
    fn test_disallowed_transition_is_invalid() {
        assert_eq!(
            OrderStatus::Processing.validate_transition(OrderStatus::Delivered),
            Err(OrderError::InvalidTransition {
                current: OrderStatus::Processing,
                target: OrderStatus::Delivered,
            })
        );
        assert!(
            OrderStatus::Cancelled
                .validate_transition(OrderStatus::Processing)
                .is_err()
        );
        assert!(
            OrderStatus::PendingConfirmation
                .validate_transition(OrderStatus::Processing)
                .is_ok()
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::PendingConfirmation.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Returned.is_terminal());
    }

    #[test]
    fn test_only_negative_outcomes_release_stock() {
        let releasing: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::releases_stock)
            .collect();
        assert_eq!(releasing, vec![OrderStatus::Cancelled, OrderStatus::Returned]);
    }

    #[test]
    fn test_parse_and_display() {
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(
            "shipped".parse::<OrderStatus>().unwrap(),
            OrderStatus::Shipped
        );
        assert!("LOST".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serialization_uses_stored_names() {
        let json = serde_json::to_string(&OrderStatus::PendingConfirmation).unwrap();
        assert_eq!(json, "\"PENDING_CONFIRMATION\"");
    }
}
